//! 1:1 session tests over the in-memory store.
//!
//! Two parties with their own stores and seeded engines run the full
//! handshake: bundle, prekey message, whisper replies.

mod common;

use async_trait::async_trait;
use ciborium::Value;
use common::{FIRST_PRE_KEY_ID, Party, SIGNED_PRE_KEY_ID};
use signet_core::{
    IdentityKeyPair, MemoryStore, MessageType, PreKey, SessionBuilder, SessionCipher, SessionError,
    SessionRecord, SessionStore, SignedPreKey, StoreError, fields,
};

fn cipher<S: SessionStore>(store: S, local: &Party, remote: &Party) -> SessionCipher<S> {
    SessionCipher::with_engine(store, remote.addr.clone(), local.engine.clone())
}

async fn establish(alice: &Party, bob: &Party, with_one_time_key: bool) {
    SessionBuilder::with_engine(alice.store.clone(), bob.addr.clone(), alice.engine.clone())
        .init_outgoing(&bob.bundle(with_one_time_key))
        .await
        .expect("init outgoing");
}

#[tokio::test]
async fn prekey_message_then_whisper_both_ways() {
    let alice = Party::new("alice", 1);
    let bob = Party::new("bob", 2);
    establish(&alice, &bob, true).await;

    let to_bob = cipher(alice.store.clone(), &alice, &bob);
    let to_alice = cipher(bob.store.clone(), &bob, &alice);

    let first = to_bob.encrypt(b"hello bob").await.expect("encrypt");
    assert_eq!(first.kind, MessageType::PreKey);
    assert_eq!(first.kind.as_u8(), 3);

    let plaintext =
        to_alice.decrypt_pre_key_whisper_message(&first.body).await.expect("decrypt prekey");
    assert_eq!(plaintext, b"hello bob");

    let reply = to_alice.encrypt(b"hello alice").await.expect("reply");
    assert_eq!(reply.kind, MessageType::Whisper);
    let plaintext = to_bob.decrypt_whisper_message(&reply.body).await.expect("decrypt reply");
    assert_eq!(plaintext, b"hello alice");

    let second = to_bob.encrypt(b"second").await.expect("encrypt");
    assert_eq!(second.kind, MessageType::Whisper);
    assert_eq!(to_alice.decrypt_whisper_message(&second.body).await.expect("decrypt"), b"second");

    assert!(to_bob.has_open_session().await.expect("has session"));
    assert!(to_alice.has_open_session().await.expect("has session"));
}

#[tokio::test]
async fn used_one_time_key_is_removed() {
    let alice = Party::new("alice", 3);
    let bob = Party::new("bob", 4);
    establish(&alice, &bob, true).await;

    let message = cipher(alice.store.clone(), &alice, &bob).encrypt(b"hi").await.expect("encrypt");
    assert!(bob.store.has_pre_key(FIRST_PRE_KEY_ID));

    cipher(bob.store.clone(), &bob, &alice)
        .decrypt_pre_key_whisper_message(&message.body)
        .await
        .expect("decrypt");
    assert!(!bob.store.has_pre_key(FIRST_PRE_KEY_ID));
    assert!(bob.store.has_pre_key(FIRST_PRE_KEY_ID + 1));
    assert!(bob.store.session(&alice.addr.to_string()).is_some());
}

#[tokio::test]
async fn bundle_without_one_time_key() {
    let alice = Party::new("alice", 5);
    let bob = Party::new("bob", 6);
    establish(&alice, &bob, false).await;

    let to_bob = cipher(alice.store.clone(), &alice, &bob);
    let to_alice = cipher(bob.store.clone(), &bob, &alice);

    let message = to_bob.encrypt(b"no one-time key").await.expect("encrypt");
    assert_eq!(message.kind.as_u8(), 3);
    let plaintext = to_alice.decrypt_pre_key_whisper_message(&message.body).await.expect("decrypt");
    assert_eq!(plaintext, b"no one-time key");
    assert!(bob.store.has_pre_key(FIRST_PRE_KEY_ID));

    for text in ["two", "three", "four"] {
        let message = to_bob.encrypt(text.as_bytes()).await.expect("encrypt");
        assert_eq!(message.kind.as_u8(), 1);
        let plaintext = to_alice.decrypt_whisper_message(&message.body).await.expect("decrypt");
        assert_eq!(plaintext, text.as_bytes());
    }
}

#[tokio::test]
async fn encrypt_without_session() {
    let alice = Party::new("alice", 7);
    let bob = Party::new("bob", 8);

    let to_bob = cipher(alice.store.clone(), &alice, &bob);
    assert!(!to_bob.has_open_session().await.expect("has session"));

    let err = to_bob.encrypt(b"nobody home").await.unwrap_err();
    assert_eq!(err, SessionError::NoSession("bob.1".to_string()));
    assert_eq!(alice.store.session_count(), 0);
}

#[tokio::test]
async fn whisper_without_session() {
    let alice = Party::new("alice", 9);
    let bob = Party::new("bob", 10);
    establish(&alice, &bob, true).await;

    // Carol never heard of alice.
    let carol = Party::new("carol", 11);
    cipher(alice.store.clone(), &alice, &bob).encrypt(b"first").await.expect("encrypt");
    let whisper =
        cipher(alice.store.clone(), &alice, &bob).encrypt(b"second").await.expect("encrypt");
    assert_eq!(whisper.kind, MessageType::Whisper);

    let err = cipher(carol.store.clone(), &carol, &alice)
        .decrypt_whisper_message(&whisper.body)
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::NoSession("alice.1".to_string()));
}

#[tokio::test]
async fn unknown_signed_pre_key() {
    let alice = Party::new("alice", 12);
    let bob = Party::new("bob", 13);

    // Bundle advertises an id bob's store does not hold.
    let mut bundle = bob.bundle(false);
    let signed = fields::get_mut(&mut bundle, "signedPreKey").expect("signed prekey");
    fields::set(signed, "keyId", ciborium::Value::Integer((SIGNED_PRE_KEY_ID + 1).into()));

    SessionBuilder::with_engine(alice.store.clone(), bob.addr.clone(), alice.engine.clone())
        .init_outgoing(&bundle)
        .await
        .expect("init outgoing");
    let message = cipher(alice.store.clone(), &alice, &bob).encrypt(b"hi").await.expect("encrypt");

    let err = cipher(bob.store.clone(), &bob, &alice)
        .decrypt_pre_key_whisper_message(&message.body)
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::SignedPreKeyNotFound(SIGNED_PRE_KEY_ID + 1));
    assert!(err.is_store_consistency());
    assert_eq!(bob.store.session_count(), 0);
}

#[tokio::test]
async fn replayed_prekey_message_after_key_removal() {
    let alice = Party::new("alice", 14);
    let bob = Party::new("bob", 15);
    establish(&alice, &bob, true).await;

    let message =
        cipher(alice.store.clone(), &alice, &bob).encrypt(b"once").await.expect("encrypt");
    let to_alice = cipher(bob.store.clone(), &bob, &alice);
    to_alice.decrypt_pre_key_whisper_message(&message.body).await.expect("decrypt");

    let before = bob.store.session(&alice.addr.to_string());
    let err = to_alice.decrypt_pre_key_whisper_message(&message.body).await.unwrap_err();
    assert_eq!(err, SessionError::PreKeyNotFound(FIRST_PRE_KEY_ID));
    assert_eq!(bob.store.session(&alice.addr.to_string()), before);
}

#[tokio::test]
async fn garbage_prekey_message() {
    let alice = Party::new("alice", 16);
    let bob = Party::new("bob", 17);

    let err = cipher(bob.store.clone(), &bob, &alice)
        .decrypt_pre_key_whisper_message(b"not a message")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidPreKeyMessage(_)));
    assert_eq!(bob.store.session_count(), 0);
}

#[tokio::test]
async fn bundle_missing_identity() {
    let alice = Party::new("alice", 18);
    let bob = Party::new("bob", 19);

    let signed = fields::get(&bob.bundle(false), "signedPreKey").cloned().expect("signed");
    let bundle = fields::map([("signedPreKey", signed)]);
    let builder =
        SessionBuilder::with_engine(alice.store.clone(), bob.addr.clone(), alice.engine.clone());
    let err = builder.init_outgoing(&bundle).await.unwrap_err();

    assert_eq!(err.to_string(), "bundle.identity missing");
    assert_eq!(alice.store.session_count(), 0);
}

#[tokio::test]
async fn one_time_public_key_with_marker_is_rejected() {
    let alice = Party::new("alice", 24);
    let bob = Party::new("bob", 25);
    establish(&alice, &bob, true).await;

    // Stored one-time keys are raw; a 33-byte wire key is a broken store.
    let pre_key = &bob.pre_keys[0];
    bob.store.add_pre_key(
        pre_key.id,
        PreKey {
            key_id: Some(pre_key.id),
            public_key: Value::Bytes(pre_key.key_pair.serialized_public().to_vec()),
            private_key: Value::Bytes(pre_key.key_pair.private_key.to_vec()),
        },
    );

    let message = cipher(alice.store.clone(), &alice, &bob).encrypt(b"hi").await.expect("encrypt");
    let err = cipher(bob.store.clone(), &bob, &alice)
        .decrypt_pre_key_whisper_message(&message.body)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SessionError::KeyLength { what: "prekey public key", expected: 32, actual: 33 }
    );
    assert!(err.is_validation());
    assert_eq!(bob.store.session_count(), 0);
    assert!(bob.store.has_pre_key(FIRST_PRE_KEY_ID));
}

#[tokio::test]
async fn json_round_tripped_session_is_normalized() {
    let alice = Party::new("alice", 26);
    let bob = Party::new("bob", 27);
    establish(&alice, &bob, true).await;

    // A store that kept the session as JSON hands byte fields back as
    // integer arrays.
    let address = bob.addr.to_string();
    let record = alice.store.session(&address).expect("session");
    let json = serde_json::to_vec(record.serialize().expect("state")).expect("json");
    let state: Value = serde_json::from_slice(&json).expect("value");
    assert!(matches!(fields::get(&state, "rootKey"), Some(Value::Array(_))));
    alice.store.store_session(&address, SessionRecord::new(state)).await.expect("overwrite");

    let message = cipher(alice.store.clone(), &alice, &bob).encrypt(b"x").await.expect("encrypt");
    assert_eq!(message.kind, MessageType::PreKey);
    let stored = alice.store.session(&address).and_then(SessionRecord::into_state).expect("state");
    assert!(matches!(fields::get(&stored, "rootKey"), Some(Value::Bytes(_))));

    let plaintext = cipher(bob.store.clone(), &bob, &alice)
        .decrypt_pre_key_whisper_message(&message.body)
        .await
        .expect("decrypt");
    assert_eq!(plaintext, b"x");
}

/// Store whose prekey removal always fails.
#[derive(Clone)]
struct StickyPreKeys(MemoryStore);

#[async_trait]
impl SessionStore for StickyPreKeys {
    async fn get_our_registration_id(&self) -> Result<u32, StoreError> {
        self.0.get_our_registration_id().await
    }

    async fn get_our_identity(&self) -> Result<IdentityKeyPair, StoreError> {
        self.0.get_our_identity().await
    }

    async fn load_session(&self, address: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.0.load_session(address).await
    }

    async fn store_session(&self, address: &str, record: SessionRecord) -> Result<(), StoreError> {
        self.0.store_session(address, record).await
    }

    async fn load_signed_pre_key(&self, id: u32) -> Result<Option<SignedPreKey>, StoreError> {
        self.0.load_signed_pre_key(id).await
    }

    async fn load_pre_key(&self, id: u32) -> Result<Option<PreKey>, StoreError> {
        self.0.load_pre_key(id).await
    }

    async fn remove_pre_key(&self, _id: u32) -> Result<(), StoreError> {
        Err(StoreError::Backend("read-only prekey table".to_string()))
    }
}

#[tokio::test]
async fn failed_prekey_removal_still_decrypts() {
    let alice = Party::new("alice", 20);
    let bob = Party::new("bob", 21);
    establish(&alice, &bob, true).await;

    let message =
        cipher(alice.store.clone(), &alice, &bob).encrypt(b"kept").await.expect("encrypt");
    let plaintext = cipher(StickyPreKeys(bob.store.clone()), &bob, &alice)
        .decrypt_pre_key_whisper_message(&message.body)
        .await
        .expect("decrypt");

    assert_eq!(plaintext, b"kept");
    assert!(bob.store.has_pre_key(FIRST_PRE_KEY_ID));
    assert!(bob.store.session(&alice.addr.to_string()).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_encrypts_share_one_chain() {
    let alice = Party::new("alice", 22);
    let bob = Party::new("bob", 23);
    establish(&alice, &bob, true).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let to_bob = cipher(alice.store.clone(), &alice, &bob);
        tasks.push(tokio::spawn(async move {
            to_bob.encrypt(format!("message {i}").as_bytes()).await
        }));
    }

    let mut messages = Vec::new();
    for task in tasks {
        messages.push(task.await.expect("join").expect("encrypt"));
    }
    let (prekey, whispers): (Vec<_>, Vec<_>) =
        messages.into_iter().partition(|m| m.kind == MessageType::PreKey);
    assert_eq!(prekey.len(), 1);

    let to_alice = cipher(bob.store.clone(), &bob, &alice);
    let first =
        to_alice.decrypt_pre_key_whisper_message(&prekey[0].body).await.expect("decrypt prekey");
    let mut received = vec![first];
    for whisper in &whispers {
        let plaintext =
            to_alice.decrypt_whisper_message(&whisper.body).await.expect("decrypt whisper");
        received.push(plaintext);
    }

    let mut received: Vec<String> =
        received.into_iter().map(|p| String::from_utf8(p).expect("utf-8")).collect();
    received.sort();
    let mut expected: Vec<String> = (0..8).map(|i| format!("message {i}")).collect();
    expected.sort();
    assert_eq!(received, expected);
}
