//! Fixtures shared by the integration tests.
//!
//! A [`Party`] is one device with its own in-memory store, a seeded engine
//! and published prekeys.

#![allow(dead_code, reason = "each test binary uses a subset of the fixtures")]

use std::sync::{Arc, Once};

use ciborium::Value;
use signet_core::{
    Engine, EngineConfig, KeyPairValues, MemoryStore, NativeEngine, PreKey, ProtocolAddress,
    SignedPreKey,
    fields::{map, set},
};
use signet_crypto::{KeyPair, PreKeyRecord, Rng, SignedPreKeyRecord};
use tracing_subscriber::EnvFilter;

/// Signed prekey id every party publishes
pub const SIGNED_PRE_KEY_ID: u32 = 7;

/// First one-time prekey id
pub const FIRST_PRE_KEY_ID: u32 = 1;

/// Route `tracing` output to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One device under test.
pub struct Party {
    pub addr: ProtocolAddress,
    pub store: MemoryStore,
    pub engine: Arc<dyn Engine>,
    pub identity: KeyPair,
    pub registration_id: u32,
    pub signed_pre_key: SignedPreKeyRecord,
    pub pre_keys: Vec<PreKeyRecord>,
}

impl Party {
    /// Device `id.1` with three one-time prekeys, all loaded into its store.
    pub fn new(id: &str, seed: u8) -> Self {
        init_tracing();
        let engine: Arc<dyn Engine> =
            Arc::new(NativeEngine::with_rng(Rng::from_seed([seed; 32]), EngineConfig::default()));

        let registration_id = engine.generate_registration_id().expect("registration id");
        let identity = engine.generate_key_pair().expect("identity key pair");
        let signed_pre_key =
            engine.generate_signed_pre_key(&identity, SIGNED_PRE_KEY_ID).expect("signed prekey");
        let pre_keys = engine.generate_pre_keys(FIRST_PRE_KEY_ID, 3).expect("prekeys");

        let store = MemoryStore::new(registration_id, KeyPairValues::from_key_pair(&identity));
        store.add_signed_pre_key(SIGNED_PRE_KEY_ID, SignedPreKey::from_record(&signed_pre_key));
        for pre_key in &pre_keys {
            store.add_pre_key(pre_key.id, PreKey::from_record(pre_key));
        }

        Self {
            addr: ProtocolAddress::new(id, 1).expect("valid address"),
            store,
            engine,
            identity,
            registration_id,
            signed_pre_key,
            pre_keys,
        }
    }

    /// Published bundle in the `identityKey` / `signedPreKey` / `preKey`
    /// layout, optionally without a one-time key.
    pub fn bundle(&self, with_one_time_key: bool) -> Value {
        let signed_public = self.signed_pre_key.key_pair.serialized_public();
        let mut bundle = map([
            ("registrationId", Value::Integer(self.registration_id.into())),
            ("identityKey", Value::Bytes(self.identity.serialized_public().to_vec())),
            (
                "signedPreKey",
                map([
                    ("keyId", Value::Integer(self.signed_pre_key.id.into())),
                    ("publicKey", Value::Bytes(signed_public.to_vec())),
                ]),
            ),
        ]);

        if with_one_time_key {
            let pre_key = &self.pre_keys[0];
            set(
                &mut bundle,
                "preKey",
                map([
                    ("keyId", Value::Integer(pre_key.id.into())),
                    ("publicKey", Value::Bytes(pre_key.key_pair.serialized_public().to_vec())),
                ]),
            );
        }
        bundle
    }
}

/// Lowercase hex text, as older stores wrote byte fields.
pub fn hex_text(bytes: &[u8]) -> Value {
    Value::Text(hex::encode(bytes))
}

/// Integer array, as JSON round trips leave byte fields.
pub fn int_array(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::Integer((*b).into())).collect())
}
