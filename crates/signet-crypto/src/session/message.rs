//! 1:1 wire messages.
//!
//! A [`WhisperMessage`] carries one ratchet-encrypted payload. The first
//! messages of an initiator are wrapped in a [`PreKeyWhisperMessage`] that
//! also carries what the responder needs to run X3DH.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::{cbor, error::CryptoError, keys::SERIALIZED_PUBLIC_KEY_LEN};

/// Current message version
pub const MESSAGE_VERSION: u8 = 3;

/// Ratchet-encrypted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhisperMessage {
    /// Message version
    pub version: u8,
    /// Sender's current ratchet public key (33 bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratchet_key: Option<ByteBuf>,
    /// Index in the sender's current sending chain
    pub counter: u32,
    /// Length of the sender's previous sending chain
    pub previous_counter: u32,
    /// AEAD output
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

impl WhisperMessage {
    /// Decode from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let message: Self = cbor::decode("whisper message", bytes)?;
        if message.version != MESSAGE_VERSION {
            return Err(CryptoError::UnsupportedVersion(message.version));
        }
        Ok(message)
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        cbor::encode("whisper message", self)
    }

    /// Header bound into the AEAD associated data.
    pub(crate) fn header(&self, ratchet_key: &[u8; SERIALIZED_PUBLIC_KEY_LEN]) -> Vec<u8> {
        let mut header = Vec::with_capacity(1 + SERIALIZED_PUBLIC_KEY_LEN + 8);
        header.push(self.version);
        header.extend_from_slice(ratchet_key);
        header.extend_from_slice(&self.counter.to_be_bytes());
        header.extend_from_slice(&self.previous_counter.to_be_bytes());
        header
    }
}

/// Session-establishing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreKeyWhisperMessage {
    /// Message version
    pub version: u8,
    /// Initiator registration id
    pub registration_id: u32,
    /// Responder one-time prekey used, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_key_id: Option<u32>,
    /// Responder signed prekey used
    pub signed_pre_key_id: u32,
    /// Initiator base key (33 bytes)
    #[serde(with = "serde_bytes")]
    pub base_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Initiator identity key (33 bytes)
    #[serde(with = "serde_bytes")]
    pub identity_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Encoded inner [`WhisperMessage`]
    #[serde(with = "serde_bytes")]
    pub message: Vec<u8>,
}

impl PreKeyWhisperMessage {
    /// Decode from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let message: Self = cbor::decode("prekey message", bytes)?;
        if message.version != MESSAGE_VERSION {
            return Err(CryptoError::UnsupportedVersion(message.version));
        }
        Ok(message)
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        cbor::encode("prekey message", self)
    }

    /// Decode the inner whisper message.
    pub fn inner(&self) -> Result<WhisperMessage, CryptoError> {
        WhisperMessage::from_bytes(&self.message)
    }
}
