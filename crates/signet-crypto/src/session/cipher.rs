//! 1:1 session operations.
//!
//! Every function takes the current state by reference and returns the
//! updated state alongside its output. On error the caller keeps the state it
//! already has.

use serde_bytes::ByteBuf;

use super::{
    Envelope, EnvelopeKind, LocalKeyBundle,
    message::{MESSAGE_VERSION, PreKeyWhisperMessage, WhisperMessage},
    state::{PendingPreKey, SESSION_VERSION, SessionState},
    x3dh::{initiator_root_key, ratchet_root, responder_root_key},
};
use crate::{
    config::EngineConfig,
    encryption::{WHISPER_MESSAGE_KEYS, open, seal},
    error::CryptoError,
    keys::{KeyPair, SERIALIZED_PUBLIC_KEY_LEN, decode_public, decode_serialized_public},
    prekey::{LocalIdentity, PreKeyBundle, PreKeyRecord, SignedPreKeyRecord},
    rng::Rng,
};

/// Start a session towards the owner of `bundle`.
///
/// The returned state can encrypt immediately; its first message is a
/// [`PreKeyWhisperMessage`].
pub fn initiate_outgoing(
    local: &LocalIdentity,
    bundle: &PreKeyBundle,
    rng: &Rng,
) -> Result<SessionState, CryptoError> {
    let their_identity = decode_public(&bundle.identity_key)?;
    let their_signed = decode_public(&bundle.signed_pre_key)?;
    let their_one_time =
        bundle.one_time_pre_key.as_ref().map(|k| decode_public(&k.public_key)).transpose()?;
    let their_ratchet = decode_public(&bundle.ratchet_key)?;

    let base_key = KeyPair::generate(rng)?;
    let root = initiator_root_key(
        &local.identity,
        &base_key,
        &their_identity,
        &their_signed,
        their_one_time.as_ref(),
    );

    let sender_ratchet = KeyPair::generate(rng)?;
    let (root, sending) = ratchet_root(&root, &sender_ratchet, &their_ratchet);

    Ok(SessionState {
        session_version: SESSION_VERSION,
        local_identity_key: local.identity.serialized_public(),
        remote_identity_key: decode_serialized_public(&bundle.identity_key)?,
        local_registration_id: local.registration_id,
        remote_registration_id: bundle.registration_id,
        base_key: base_key.serialized_public(),
        root_key: root,
        sender_ratchet,
        sending_chain: Some(sending),
        receiving_chains: Vec::new(),
        previous_counter: 0,
        pending_pre_key: Some(PendingPreKey {
            signed_pre_key_id: bundle.signed_pre_key_id,
            pre_key_id: bundle.one_time_pre_key.as_ref().map(|k| k.id),
            base_key: base_key.serialized_public(),
        }),
    })
}

/// Encrypt one message.
///
/// Produces a prekey envelope while the handshake is pending, a whisper
/// envelope afterwards.
pub fn encrypt(
    state: &SessionState,
    plaintext: &[u8],
) -> Result<(SessionState, Envelope), CryptoError> {
    let mut state = state.clone();
    let (counter, seed) = state.next_sending_seed()?;
    let ratchet_key = state.sender_ratchet.serialized_public();

    let mut message = WhisperMessage {
        version: MESSAGE_VERSION,
        ratchet_key: Some(ByteBuf::from(ratchet_key.to_vec())),
        counter,
        previous_counter: state.previous_counter,
        ciphertext: Vec::new(),
    };
    let header = message.header(&ratchet_key);
    let aad = associated_data(&state.local_identity_key, &state.remote_identity_key, &header);
    message.ciphertext = seal(&seed, WHISPER_MESSAGE_KEYS, plaintext, &aad);
    let encoded = message.to_bytes()?;

    let envelope = match state.pending_pre_key.take() {
        Some(pending) => {
            let wrapped = PreKeyWhisperMessage {
                version: MESSAGE_VERSION,
                registration_id: state.local_registration_id,
                pre_key_id: pending.pre_key_id,
                signed_pre_key_id: pending.signed_pre_key_id,
                base_key: pending.base_key,
                identity_key: state.local_identity_key,
                message: encoded,
            };
            Envelope { kind: EnvelopeKind::PreKey, ciphertext: wrapped.to_bytes()? }
        },
        None => Envelope { kind: EnvelopeKind::Whisper, ciphertext: encoded },
    };

    Ok((state, envelope))
}

/// Decrypt a whisper message on an established session.
pub fn decrypt(
    state: &SessionState,
    message: &WhisperMessage,
    config: &EngineConfig,
    rng: &Rng,
) -> Result<(SessionState, Vec<u8>), CryptoError> {
    let mut state = state.clone();
    let plaintext = decrypt_in_place(&mut state, message, config, rng)?;
    Ok((state, plaintext))
}

/// Decrypt a prekey message, establishing a session if needed.
///
/// A message repeating the base key of `existing` continues that session;
/// anything else runs X3DH with the supplied local keys and replaces it.
pub fn decrypt_prekey(
    local: &LocalIdentity,
    existing: Option<&SessionState>,
    message: &PreKeyWhisperMessage,
    keys: &LocalKeyBundle,
    config: &EngineConfig,
    rng: &Rng,
) -> Result<(SessionState, Vec<u8>), CryptoError> {
    let inner = message.inner()?;

    if let Some(existing) = existing.filter(|s| s.base_key == message.base_key) {
        return decrypt(existing, &inner, config, rng);
    }

    let signed = SignedPreKeyRecord::from_bytes(&keys.signed_pre_key)?;
    if signed.id != message.signed_pre_key_id {
        return Err(CryptoError::PreKeyIdMismatch {
            expected: message.signed_pre_key_id,
            actual: signed.id,
        });
    }

    let one_time = match message.pre_key_id {
        Some(id) => {
            let bytes =
                keys.one_time_pre_key.as_ref().ok_or(CryptoError::MissingOneTimePreKey(id))?;
            let record = PreKeyRecord::from_bytes(bytes)?;
            if record.id != id {
                return Err(CryptoError::PreKeyIdMismatch { expected: id, actual: record.id });
            }
            Some(record)
        },
        None => None,
    };

    let their_identity = decode_public(&message.identity_key)?;
    let their_base = decode_public(&message.base_key)?;
    let root = responder_root_key(
        &local.identity,
        &signed.key_pair,
        one_time.as_ref().map(|r| &r.key_pair),
        &their_identity,
        &their_base,
    );

    let mut state = SessionState {
        session_version: SESSION_VERSION,
        local_identity_key: local.identity.serialized_public(),
        remote_identity_key: message.identity_key,
        local_registration_id: local.registration_id,
        remote_registration_id: message.registration_id,
        base_key: message.base_key,
        root_key: root,
        sender_ratchet: signed.key_pair.clone(),
        sending_chain: None,
        receiving_chains: Vec::new(),
        previous_counter: 0,
        pending_pre_key: None,
    };
    let plaintext = decrypt_in_place(&mut state, &inner, config, rng)?;
    Ok((state, plaintext))
}

fn decrypt_in_place(
    state: &mut SessionState,
    message: &WhisperMessage,
    config: &EngineConfig,
    rng: &Rng,
) -> Result<Vec<u8>, CryptoError> {
    let ratchet_key = message.ratchet_key.as_ref().ok_or(CryptoError::MissingRatchetKey)?;
    let ratchet_key = decode_serialized_public(ratchet_key)?;

    let seed = state.receiving_seed(&ratchet_key, message.counter, config, rng)?;
    let header = message.header(&ratchet_key);
    let aad = associated_data(&state.remote_identity_key, &state.local_identity_key, &header);
    open(&seed, WHISPER_MESSAGE_KEYS, &message.ciphertext, &aad)
}

fn associated_data(
    sender_identity: &[u8; SERIALIZED_PUBLIC_KEY_LEN],
    receiver_identity: &[u8; SERIALIZED_PUBLIC_KEY_LEN],
    header: &[u8],
) -> Vec<u8> {
    let mut aad = Vec::with_capacity(2 * SERIALIZED_PUBLIC_KEY_LEN + header.len());
    aad.extend_from_slice(sender_identity);
    aad.extend_from_slice(receiver_identity);
    aad.extend_from_slice(header);
    aad
}
