//! Error types for engine operations

use thiserror::Error;

/// Errors from the cryptographic engine.
///
/// Every variant maps to a stable string [`code`](Self::code) which the
/// orchestration layer surfaces verbatim to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length
    #[error("invalid key length for {what}: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Which key was being read
        what: &'static str,
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Serialized public key does not carry the curve type marker
    #[error("invalid public key type {0:#04x}")]
    InvalidKeyType(u8),

    /// A state or wire structure could not be decoded
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// Which structure failed to decode
        what: &'static str,
        /// Decoder error
        reason: String,
    },

    /// Message or record version is not supported
    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    /// Session cannot send yet (responder before first receive)
    #[error("session has no sending chain")]
    NoSendingChain,

    /// Whisper message header lacks the sender ratchet key
    #[error("message header is missing its ratchet key")]
    MissingRatchetKey,

    /// Message key for this counter was already used or discarded
    #[error("duplicate message at counter {counter}")]
    DuplicateMessage {
        /// Counter of the rejected message
        counter: u32,
    },

    /// Message counter is beyond the allowed skip window
    #[error("message counter {requested} too far ahead of {current}")]
    TooFarInFuture {
        /// Current chain index
        current: u32,
        /// Counter carried by the message
        requested: u32,
    },

    /// AEAD authentication failed
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for decryption failure
        reason: String,
    },

    /// PreKey message references a one-time prekey that was not supplied
    #[error("one-time prekey {0} referenced but not supplied")]
    MissingOneTimePreKey(u32),

    /// Supplied prekey record does not match the referenced id
    #[error("prekey id mismatch: expected {expected}, got {actual}")]
    PreKeyIdMismatch {
        /// Id referenced by the message
        expected: u32,
        /// Id of the supplied record
        actual: u32,
    },

    /// Sender-key session holds no state at all
    #[error("sender key session is empty")]
    EmptySenderKeySession,

    /// No sender-key state with the requested key id
    #[error("no sender key state for key id {0}")]
    NoSenderKeyState(u32),

    /// Sender-key state belongs to a peer and cannot encrypt
    #[error("sender key state has no signing private key")]
    NoSigningKey,

    /// Signature did not verify
    #[error("signature verification failed")]
    InvalidSignature,

    /// Chain index would overflow
    #[error("chain index overflow at {current}")]
    ChainOverflow {
        /// Index at which overflow was detected
        current: u32,
    },

    /// Random number generator failed
    #[error("randomness unavailable: {0}")]
    Rng(String),
}

impl CryptoError {
    /// Stable error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKeyLength { .. } | Self::InvalidKeyType(_) => "InvalidKey",
            Self::Malformed { .. } => "InvalidMessage",
            Self::UnsupportedVersion(_) => "InvalidVersion",
            Self::NoSendingChain => "NoSendingChain",
            Self::MissingRatchetKey => "MissingRatchetKey",
            Self::DuplicateMessage { .. } => "DuplicateMessage",
            Self::TooFarInFuture { .. } => "TooFarInFuture",
            Self::DecryptionFailed { .. } => "DecryptionFailed",
            Self::MissingOneTimePreKey(_) | Self::PreKeyIdMismatch { .. } => "InvalidPreKeyId",
            Self::EmptySenderKeySession | Self::NoSenderKeyState(_) => "NoSenderKeyState",
            Self::NoSigningKey => "NoSigningKey",
            Self::InvalidSignature => "InvalidSignature",
            Self::ChainOverflow { .. } => "ChainOverflow",
            Self::Rng(_) => "RngFailure",
        }
    }

    /// Returns true if this error indicates a tampered or forged input.
    ///
    /// Duplicate and far-future counters are replay/ordering conditions, not
    /// forgery; missing state is recoverable by redistributing keys.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DecryptionFailed { .. }
                | Self::InvalidSignature
                | Self::Malformed { .. }
                | Self::InvalidKeyLength { .. }
                | Self::InvalidKeyType(_)
        )
    }

    pub(crate) fn malformed(what: &'static str, reason: impl ToString) -> Self {
        Self::Malformed { what, reason: reason.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decryption_failed_is_fatal() {
        let err = CryptoError::DecryptionFailed { reason: "tag mismatch".to_string() };
        assert!(err.is_fatal());
        assert_eq!(err.code(), "DecryptionFailed");
    }

    #[test]
    fn duplicate_message_is_not_fatal() {
        let err = CryptoError::DuplicateMessage { counter: 3 };
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_state_codes_collapse() {
        assert_eq!(CryptoError::EmptySenderKeySession.code(), "NoSenderKeyState");
        assert_eq!(CryptoError::NoSenderKeyState(7).code(), "NoSenderKeyState");
    }

    #[test]
    fn error_display() {
        let err = CryptoError::TooFarInFuture { current: 10, requested: 5000 };
        assert_eq!(err.to_string(), "message counter 5000 too far ahead of 10");
    }
}
