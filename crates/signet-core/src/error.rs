//! Error types for session and group orchestration.
//!
//! Engine failures keep the engine's error code verbatim so callers can match
//! on it; the displayed message reads `"<operation> failed: <code>"`.

use std::fmt;

use thiserror::Error;

use crate::{bytes::BytesError, engine::EngineError, store::StoreError};

/// Required prekey bundle fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleField {
    /// Peer identity key
    Identity,
    /// Signed prekey public key
    SignedPublicKey,
    /// Signed prekey id
    SignedKeyId,
}

impl fmt::Display for BundleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identity => "bundle.identity",
            Self::SignedPublicKey => "bundle.signedKey.publicKey",
            Self::SignedKeyId => "bundle.signedKey.id",
        })
    }
}

/// Prekey bundle validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// Required field absent under every alias
    #[error("{0} missing")]
    MissingField(BundleField),

    /// Id present but not a non-negative 32-bit integer
    #[error("bundle id is not a valid integer: {0}")]
    InvalidId(&'static str),
}

/// 1:1 session failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session stored for the address
    #[error("no session for {0}")]
    NoSession(String),

    /// Engine could not parse a wire message
    #[error("{kind} deserialize failed: {code}")]
    Deserialize {
        /// Message kind
        kind: &'static str,
        /// Engine error code
        code: String,
    },

    /// Parsed whisper message has no ratchet key
    #[error("message has no ratchet key")]
    MissingRatchetKey,

    /// Prekey message could not be parsed
    #[error("invalid prekey message: {0}")]
    InvalidPreKeyMessage(String),

    /// Signed prekey referenced by a message is not in the store
    #[error("signed prekey {0} not found")]
    SignedPreKeyNotFound(u32),

    /// One-time prekey referenced by a message is not in the store
    #[error("prekey {0} not found")]
    PreKeyNotFound(u32),

    /// Stored one-time prekey lacks its public or private half
    #[error("prekey is missing key material")]
    PreKeyMissingKeys,

    /// Key material of the wrong size
    #[error("{what} must be {expected} bytes, got {actual}")]
    KeyLength {
        /// Which key
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Encoded prekey could not be read back
    #[error("prekey round trip failed")]
    PreKeyRoundTripFailed,

    /// Encoded prekey reads back with another id
    #[error("prekey round trip changed id: expected {expected}, got {actual}")]
    PreKeyRoundTrip {
        /// Id written
        expected: u32,
        /// Id read back
        actual: u32,
    },

    /// Engine operation failed
    #[error("{op} failed: {code}")]
    Engine {
        /// Operation name
        op: &'static str,
        /// Engine error code
        code: String,
    },

    /// Bundle validation failed
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Key material could not be normalized
    #[error("key material: {0}")]
    Bytes(#[from] BytesError),

    /// Store backend failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Maps an engine error for operation `op`.
    pub fn engine(op: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |err| Self::Engine { op, code: err.code }
    }

    /// Returns true for bad caller input (bundles, key material).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Bundle(_) | Self::Bytes(_) | Self::KeyLength { .. } | Self::PreKeyMissingKeys
        )
    }

    /// Returns true when the store lacks a record the operation needs.
    pub fn is_store_consistency(&self) -> bool {
        matches!(self, Self::NoSession(_) | Self::SignedPreKeyNotFound(_) | Self::PreKeyNotFound(_))
    }

    /// Returns true when the engine rejected the operation.
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine { .. } | Self::Deserialize { .. })
    }

    /// Engine error code, if the engine reported this failure.
    pub fn engine_code(&self) -> Option<&str> {
        match self {
            Self::Engine { code, .. } | Self::Deserialize { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Group (sender-key) failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// No sender-key record for the name
    #[error("no sender key state for {name}")]
    NoSenderKeyState {
        /// Encoded sender-key name
        name: String,
    },

    /// Engine could not parse a group message or state
    #[error("{kind} deserialize failed: {code}")]
    Deserialize {
        /// Message kind
        kind: &'static str,
        /// Engine error code
        code: String,
    },

    /// Engine operation failed
    #[error("{op} failed: {code}")]
    Engine {
        /// Operation name
        op: &'static str,
        /// Engine error code
        code: String,
    },

    /// Stored state bytes could not be normalized
    #[error("sender key material: {0}")]
    Bytes(#[from] BytesError),

    /// Store backend failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GroupError {
    /// Maps an engine error for operation `op`.
    pub fn engine(op: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |err| Self::Engine { op, code: err.code }
    }

    /// Maps an engine parse error for message kind `kind`.
    pub fn deserialize(kind: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |err| Self::Deserialize { kind, code: err.code }
    }

    /// Returns true when the store lacks a record the operation needs.
    pub fn is_store_consistency(&self) -> bool {
        matches!(self, Self::NoSenderKeyState { .. })
    }

    /// Returns true when the engine rejected the operation.
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine { .. } | Self::Deserialize { .. })
    }

    /// Engine error code, if the engine reported this failure.
    pub fn engine_code(&self) -> Option<&str> {
        match self {
            Self::Engine { code, .. } | Self::Deserialize { code, .. } => Some(code),
            _ => None,
        }
    }
}
