//! Sender-key group operations.

use serde_bytes::ByteBuf;

use super::{
    message::{SENDER_KEY_VERSION, SenderKeyDistributionMessage, SenderKeyMessage},
    state::{SenderKeySession, SenderKeyState, StoredSenderKeyState},
};
use crate::{
    chain::ChainKey,
    config::EngineConfig,
    encryption::{WHISPER_GROUP, open, seal},
    error::CryptoError,
    keys::KeyPair,
    rng::Rng,
    xeddsa,
};

/// Fresh own sender-key state in persisted form.
pub fn create_state(rng: &Rng) -> Result<StoredSenderKeyState, CryptoError> {
    let signing = KeyPair::generate(rng)?;
    let state = SenderKeyState {
        sender_key_id: rng.random_u32()? & 0x7FFF_FFFF,
        sender_key_chain_key: ChainKey::new(rng.random_array()?),
        sender_signing_key_public: signing.serialized_public(),
        sender_signing_key_private: Some(ByteBuf::from(signing.private_key.to_vec())),
        sender_message_keys: Vec::new(),
    };
    Ok(StoredSenderKeyState::from(&state))
}

/// Distribution message for `state` at its current chain index.
pub fn create_distribution_message(state: &SenderKeyState) -> SenderKeyDistributionMessage {
    SenderKeyDistributionMessage {
        version: SENDER_KEY_VERSION,
        key_id: state.sender_key_id,
        iteration: state.sender_key_chain_key.index,
        chain_key: state.sender_key_chain_key.seed,
        signing_key: state.sender_signing_key_public,
    }
}

/// Add the state carried by `message` to `session`.
///
/// A message for a known key id with the same signing key changes nothing;
/// one with a different signing key replaces that state. New states are
/// appended, dropping the oldest beyond `max_sender_key_states`.
pub fn process_distribution_message(
    session: &SenderKeySession,
    message: &SenderKeyDistributionMessage,
    config: &EngineConfig,
) -> SenderKeySession {
    let mut session = session.clone();
    let state = SenderKeyState {
        sender_key_id: message.key_id,
        sender_key_chain_key: ChainKey::at(message.iteration, message.chain_key),
        sender_signing_key_public: message.signing_key,
        sender_signing_key_private: None,
        sender_message_keys: Vec::new(),
    };

    match session.sender_key_states.iter_mut().find(|s| s.sender_key_id == message.key_id) {
        Some(existing) if existing.sender_signing_key_public == message.signing_key => {},
        Some(existing) => *existing = state,
        None => {
            session.sender_key_states.push(state);
            let keep = config.max_sender_key_states.max(1);
            if session.sender_key_states.len() > keep {
                let excess = session.sender_key_states.len() - keep;
                session.sender_key_states.drain(..excess);
            }
        },
    }
    session
}

/// Encrypt with the newest state, which must be our own.
pub fn encrypt(
    session: &SenderKeySession,
    plaintext: &[u8],
    rng: &Rng,
) -> Result<(SenderKeySession, SenderKeyMessage), CryptoError> {
    let mut session = session.clone();
    let state = session.sender_key_states.last_mut().ok_or(CryptoError::EmptySenderKeySession)?;
    let signing_private = state.signing_private()?;

    let key = state.sender_key_chain_key.message_key();
    state.sender_key_chain_key = state.sender_key_chain_key.next()?;

    let mut message = SenderKeyMessage {
        version: SENDER_KEY_VERSION,
        key_id: state.sender_key_id,
        iteration: key.index,
        ciphertext: Vec::new(),
        signature: Vec::new(),
    };
    message.ciphertext = seal(&key.seed, WHISPER_GROUP, plaintext, &message.header());
    message.signature = xeddsa::sign(&message.signed_content(), &signing_private, rng)?.to_vec();

    Ok((session, message))
}

/// Verify and decrypt a message from the state matching its key id.
pub fn decrypt(
    session: &SenderKeySession,
    message: &SenderKeyMessage,
    config: &EngineConfig,
) -> Result<(SenderKeySession, Vec<u8>), CryptoError> {
    if session.sender_key_states.is_empty() {
        return Err(CryptoError::EmptySenderKeySession);
    }

    let mut session = session.clone();
    let state = session
        .sender_key_states
        .iter_mut()
        .find(|s| s.sender_key_id == message.key_id)
        .ok_or(CryptoError::NoSenderKeyState(message.key_id))?;

    xeddsa::verify(&message.signed_content(), &state.signing_public_raw()?, &message.signature)?;

    let seed = state.sender_key_chain_key.seed_for(
        message.iteration,
        &mut state.sender_message_keys,
        config.max_skip,
        config.max_message_keys,
    )?;
    let plaintext = open(&seed, WHISPER_GROUP, &message.ciphertext, &message.header())?;

    Ok((session, plaintext))
}
