//! Sender-key wire messages.

use serde::{Deserialize, Serialize};

use crate::{cbor, error::CryptoError, keys::SERIALIZED_PUBLIC_KEY_LEN, xeddsa::SIGNATURE_LEN};

/// Sender-key message version
pub const SENDER_KEY_VERSION: u8 = 3;

/// Hands a sender's chain key and signing public key to a group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderKeyDistributionMessage {
    /// Message version
    pub version: u8,
    /// Key id of the distributed state
    pub key_id: u32,
    /// Chain index the chain key belongs to
    pub iteration: u32,
    /// Chain key at `iteration`
    #[serde(with = "serde_bytes")]
    pub chain_key: [u8; 32],
    /// Signing public key (33 bytes)
    #[serde(with = "serde_bytes")]
    pub signing_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
}

impl SenderKeyDistributionMessage {
    /// Decode from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let message: Self = cbor::decode("sender key distribution message", bytes)?;
        if message.version != SENDER_KEY_VERSION {
            return Err(CryptoError::UnsupportedVersion(message.version));
        }
        Ok(message)
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        cbor::encode("sender key distribution message", self)
    }
}

/// Group message encrypted under a sender key and signed by its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderKeyMessage {
    /// Message version
    pub version: u8,
    /// Key id of the sending state
    pub key_id: u32,
    /// Chain index of the message key
    pub iteration: u32,
    /// AEAD output
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    /// XEdDSA signature over [`signed_content`](Self::signed_content)
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl SenderKeyMessage {
    /// Decode from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let message: Self = cbor::decode("sender key message", bytes)?;
        if message.version != SENDER_KEY_VERSION {
            return Err(CryptoError::UnsupportedVersion(message.version));
        }
        if message.signature.len() != SIGNATURE_LEN {
            return Err(CryptoError::malformed("sender key message", "signature must be 64 bytes"));
        }
        Ok(message)
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        cbor::encode("sender key message", self)
    }

    /// Header bound into the AEAD associated data.
    pub(crate) fn header(&self) -> [u8; 9] {
        let mut header = [0u8; 9];
        header[0] = self.version;
        header[1..5].copy_from_slice(&self.key_id.to_be_bytes());
        header[5..].copy_from_slice(&self.iteration.to_be_bytes());
        header
    }

    /// Bytes covered by the signature: header then ciphertext.
    pub fn signed_content(&self) -> Vec<u8> {
        let mut content = self.header().to_vec();
        content.extend_from_slice(&self.ciphertext);
        content
    }
}
