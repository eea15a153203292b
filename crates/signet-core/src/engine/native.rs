//! Engine backed by `signet-crypto`.

use std::time::{SystemTime, UNIX_EPOCH};

use ciborium::Value;
use serde::{Serialize, de::DeserializeOwned};
use signet_crypto::{
    EngineConfig, Envelope, KeyPair, LocalIdentity, LocalKeyBundle, PreKeyBundle, PreKeyRecord,
    PreKeyWhisperMessage, Rng, SenderKeyDistributionMessage, SenderKeyMessage, SenderKeySession,
    SenderKeyState, SessionState, SignedPreKeyRecord, StoredSenderKeyState, WhisperMessage, prekey,
    sender_keys, session,
};

use super::{Engine, EngineError, EngineResult, INVALID_STATE};

/// Code reported when a parsed message value has the wrong layout
const INVALID_MESSAGE: &str = "InvalidMessage";

/// [`Engine`] over the native X3DH, double-ratchet and sender-key cipher.
///
/// Holds its own RNG (OS-seeded unless built with [`NativeEngine::with_rng`])
/// and the limits applied while advancing chains.
#[derive(Debug, Default)]
pub struct NativeEngine {
    rng: Rng,
    config: EngineConfig,
}

impl NativeEngine {
    /// Engine with custom limits.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { rng: Rng::default(), config }
    }

    /// Engine with a caller-supplied RNG, e.g. [`Rng::from_seed`] in tests.
    pub fn with_rng(rng: Rng, config: EngineConfig) -> Self {
        Self { rng, config }
    }

    /// Limits in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Engine for NativeEngine {
    fn generate_key_pair(&self) -> EngineResult<KeyPair> {
        Ok(KeyPair::generate(&self.rng)?)
    }

    fn generate_registration_id(&self) -> EngineResult<u32> {
        Ok(prekey::generate_registration_id(&self.rng)?)
    }

    fn generate_pre_keys(&self, start: u32, count: u32) -> EngineResult<Vec<PreKeyRecord>> {
        Ok(prekey::generate_pre_keys(start, count, &self.rng)?)
    }

    fn generate_signed_pre_key(
        &self,
        identity: &KeyPair,
        id: u32,
    ) -> EngineResult<SignedPreKeyRecord> {
        Ok(prekey::generate_signed_pre_key(identity, id, unix_millis(), &self.rng)?)
    }

    fn initiate_outgoing(
        &self,
        local: &LocalIdentity,
        bundle: &PreKeyBundle,
    ) -> EngineResult<Value> {
        let state = session::initiate_outgoing(local, bundle, &self.rng)?;
        to_value(&state)
    }

    fn encrypt(&self, state: &Value, plaintext: &[u8]) -> EngineResult<(Value, Envelope)> {
        let state: SessionState = from_value(state, INVALID_STATE)?;
        let (state, envelope) = session::encrypt(&state, plaintext)?;
        Ok((to_value(&state)?, envelope))
    }

    fn deserialize_message(&self, bytes: &[u8]) -> EngineResult<Value> {
        to_value(&WhisperMessage::from_bytes(bytes)?)
    }

    fn decrypt(&self, state: &Value, message: &Value) -> EngineResult<(Value, Vec<u8>)> {
        let state: SessionState = from_value(state, INVALID_STATE)?;
        let message: WhisperMessage = from_value(message, INVALID_MESSAGE)?;
        let (state, plaintext) = session::decrypt(&state, &message, &self.config, &self.rng)?;
        Ok((to_value(&state)?, plaintext))
    }

    fn deserialize_prekey_message(&self, bytes: &[u8]) -> EngineResult<Value> {
        to_value(&PreKeyWhisperMessage::from_bytes(bytes)?)
    }

    fn decrypt_prekey_message(
        &self,
        local: &LocalIdentity,
        existing: Option<&Value>,
        message: &Value,
        keys: &LocalKeyBundle,
    ) -> EngineResult<(Value, Vec<u8>)> {
        let existing: Option<SessionState> =
            existing.map(|s| from_value(s, INVALID_STATE)).transpose()?;
        let message: PreKeyWhisperMessage = from_value(message, INVALID_MESSAGE)?;
        let (state, plaintext) = session::decrypt_prekey(
            local,
            existing.as_ref(),
            &message,
            keys,
            &self.config,
            &self.rng,
        )?;
        Ok((to_value(&state)?, plaintext))
    }

    fn serialize_signed_pre_key(&self, record: &SignedPreKeyRecord) -> EngineResult<Vec<u8>> {
        Ok(record.to_bytes()?)
    }

    fn serialize_pre_key(
        &self,
        id: u32,
        public_key: &[u8],
        private_key: &[u8],
    ) -> EngineResult<Vec<u8>> {
        Ok(PreKeyRecord::from_parts(id, public_key, private_key)?.to_bytes()?)
    }

    fn deserialize_pre_key(&self, bytes: &[u8]) -> EngineResult<PreKeyRecord> {
        Ok(PreKeyRecord::from_bytes(bytes)?)
    }

    fn create_sender_key_state(&self) -> EngineResult<Value> {
        to_value(&sender_keys::create_state(&self.rng)?)
    }

    fn parse_sender_key_state(&self, state: &Value) -> EngineResult<Value> {
        let stored: StoredSenderKeyState = from_value(state, INVALID_STATE)?;
        to_value(&SenderKeyState::try_from(&stored)?)
    }

    fn serialize_sender_key_session(&self, session: &Value) -> EngineResult<Value> {
        let session: SenderKeySession = from_value(session, INVALID_STATE)?;
        to_value(&session.to_stored())
    }

    fn create_distribution_message(&self, state: &Value) -> EngineResult<Vec<u8>> {
        let state: SenderKeyState = from_value(state, INVALID_STATE)?;
        Ok(sender_keys::create_distribution_message(&state).to_bytes()?)
    }

    fn process_distribution_message(&self, message: &[u8], session: &Value) -> EngineResult<Value> {
        let message = SenderKeyDistributionMessage::from_bytes(message)?;
        let session: SenderKeySession = from_value(session, INVALID_STATE)?;
        to_value(&sender_keys::process_distribution_message(&session, &message, &self.config))
    }

    fn group_encrypt(&self, session: &Value, plaintext: &[u8]) -> EngineResult<(Value, Vec<u8>)> {
        let session: SenderKeySession = from_value(session, INVALID_STATE)?;
        let (session, message) = sender_keys::encrypt(&session, plaintext, &self.rng)?;
        Ok((to_value(&session)?, message.to_bytes()?))
    }

    fn deserialize_sender_key_message(&self, bytes: &[u8]) -> EngineResult<Value> {
        to_value(&SenderKeyMessage::from_bytes(bytes)?)
    }

    fn group_decrypt(&self, session: &Value, message: &Value) -> EngineResult<(Value, Vec<u8>)> {
        let session: SenderKeySession = from_value(session, INVALID_STATE)?;
        let message: SenderKeyMessage = from_value(message, INVALID_MESSAGE)?;
        let (session, plaintext) = sender_keys::decrypt(&session, &message, &self.config)?;
        Ok((to_value(&session)?, plaintext))
    }
}

/// Current unix time in milliseconds; 0 if the clock is before the epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}

fn to_value<T: Serialize>(value: &T) -> EngineResult<Value> {
    Value::serialized(value).map_err(|_| EngineError::new(INVALID_STATE))
}

fn from_value<T: DeserializeOwned>(value: &Value, code: &'static str) -> EngineResult<T> {
    value.deserialized().map_err(|_| EngineError::new(code))
}
