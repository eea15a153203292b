//! Engine contract.
//!
//! The layer never touches curve arithmetic, KDFs, AEADs or wire encodings;
//! it hands dynamic state values and wire bytes to an [`Engine`] and stores
//! whatever comes back. Every engine call is synchronous and either succeeds
//! with a value or fails with an [`EngineError`] carrying a stable code.
//!
//! Session states, sender-key sessions and parsed messages cross this
//! boundary as [`ciborium::Value`] so stores can persist them without
//! knowing their layout.

mod native;

use std::fmt;

use ciborium::Value;
pub use native::NativeEngine;
pub(crate) use native::unix_millis;
use signet_crypto::{
    CryptoError, Envelope, KeyPair, LocalIdentity, LocalKeyBundle, PreKeyBundle, PreKeyRecord,
    SignedPreKeyRecord,
};

/// Code reported when a state value has the wrong layout
pub const INVALID_STATE: &str = "InvalidState";

/// Failure reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Stable error code, e.g. `"InvalidMessage"`
    pub code: String,
}

impl EngineError {
    /// Error with the given code.
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl std::error::Error for EngineError {}

impl From<CryptoError> for EngineError {
    fn from(err: CryptoError) -> Self {
        Self::new(err.code())
    }
}

/// Result of an engine call.
pub type EngineResult<T> = Result<T, EngineError>;

/// Cryptographic backend driven by the session and group layer.
///
/// Implementations must be pure with respect to their inputs: states are
/// passed by reference and updated states are returned, never written in
/// place.
pub trait Engine: Send + Sync {
    /// Fresh X25519 key pair.
    fn generate_key_pair(&self) -> EngineResult<KeyPair>;

    /// Fresh registration id.
    fn generate_registration_id(&self) -> EngineResult<u32>;

    /// `count` one-time prekeys with ids from `start`.
    fn generate_pre_keys(&self, start: u32, count: u32) -> EngineResult<Vec<PreKeyRecord>>;

    /// Signed prekey `id`, signed by `identity`.
    fn generate_signed_pre_key(
        &self,
        identity: &KeyPair,
        id: u32,
    ) -> EngineResult<SignedPreKeyRecord>;

    /// Session state towards the owner of `bundle`.
    fn initiate_outgoing(
        &self,
        local: &LocalIdentity,
        bundle: &PreKeyBundle,
    ) -> EngineResult<Value>;

    /// Encrypt on `state`; returns the updated state and the envelope.
    fn encrypt(&self, state: &Value, plaintext: &[u8]) -> EngineResult<(Value, Envelope)>;

    /// Parse a whisper message into its fields.
    fn deserialize_message(&self, bytes: &[u8]) -> EngineResult<Value>;

    /// Decrypt a parsed whisper message on `state`.
    fn decrypt(&self, state: &Value, message: &Value) -> EngineResult<(Value, Vec<u8>)>;

    /// Parse a prekey whisper message into its fields.
    fn deserialize_prekey_message(&self, bytes: &[u8]) -> EngineResult<Value>;

    /// Decrypt a parsed prekey message, reusing `existing` when it belongs to
    /// the same handshake.
    fn decrypt_prekey_message(
        &self,
        local: &LocalIdentity,
        existing: Option<&Value>,
        message: &Value,
        keys: &LocalKeyBundle,
    ) -> EngineResult<(Value, Vec<u8>)>;

    /// Encode a signed prekey record.
    fn serialize_signed_pre_key(&self, record: &SignedPreKeyRecord) -> EngineResult<Vec<u8>>;

    /// Encode a one-time prekey from its halves.
    fn serialize_pre_key(
        &self,
        id: u32,
        public_key: &[u8],
        private_key: &[u8],
    ) -> EngineResult<Vec<u8>>;

    /// Decode a one-time prekey.
    fn deserialize_pre_key(&self, bytes: &[u8]) -> EngineResult<PreKeyRecord>;

    /// Fresh own sender-key state, in stored shape.
    fn create_sender_key_state(&self) -> EngineResult<Value>;

    /// Convert a stored-shape sender-key state to canonical shape.
    fn parse_sender_key_state(&self, state: &Value) -> EngineResult<Value>;

    /// Convert a canonical `{ senderKeyStates }` session to stored shape.
    fn serialize_sender_key_session(&self, session: &Value) -> EngineResult<Value>;

    /// Distribution message for a canonical state.
    fn create_distribution_message(&self, state: &Value) -> EngineResult<Vec<u8>>;

    /// Apply a distribution message to a canonical session.
    fn process_distribution_message(&self, message: &[u8], session: &Value) -> EngineResult<Value>;

    /// Encrypt with the session's newest state.
    fn group_encrypt(&self, session: &Value, plaintext: &[u8]) -> EngineResult<(Value, Vec<u8>)>;

    /// Parse a sender-key message into its fields.
    fn deserialize_sender_key_message(&self, bytes: &[u8]) -> EngineResult<Value>;

    /// Verify and decrypt a parsed sender-key message.
    fn group_decrypt(&self, session: &Value, message: &Value) -> EngineResult<(Value, Vec<u8>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_errors_keep_their_code() {
        let err = EngineError::from(CryptoError::DuplicateMessage { counter: 4 });
        assert_eq!(err.code, "DuplicateMessage");
        assert_eq!(err.to_string(), "DuplicateMessage");
    }

    #[test]
    fn engine_is_object_safe() {
        let engine: Box<dyn Engine> = Box::new(NativeEngine::default());
        assert!(engine.generate_registration_id().is_ok());
    }
}
