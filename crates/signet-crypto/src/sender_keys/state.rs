//! Sender-key state in its two encodings.
//!
//! [`SenderKeyState`] is what the cipher works on. [`StoredSenderKeyState`]
//! is the persisted layout, which older records also use:
//!
//! ```text
//! canonical                         stored
//! senderKeyId                       senderKeyId
//! senderKeyChainKey { index, seed } senderChainKey { iteration, seed }
//! senderSigningKeyPublic            senderSigningKey { public, private? }
//! senderSigningKeyPrivate?
//! senderMessageKeys [{ index, seed }] senderMessageKeys [{ iteration, seed }]
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_bytes::ByteBuf;

use crate::{
    chain::{ChainKey, MessageKeySeed},
    error::CryptoError,
    keys::{KEY_LEN, SERIALIZED_PUBLIC_KEY_LEN, array32, decode_public, serialize_public},
};

/// Sender-key state used by the group cipher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderKeyState {
    /// Key id, unique per sender within a group
    pub sender_key_id: u32,
    /// Current chain key
    pub sender_key_chain_key: ChainKey,
    /// Signing public key (33 bytes)
    #[serde(with = "serde_bytes")]
    pub sender_signing_key_public: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Signing private key, present only on the sender's own state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_signing_key_private: Option<ByteBuf>,
    /// Seeds skipped over while catching up
    #[serde(default)]
    pub sender_message_keys: Vec<MessageKeySeed>,
}

impl SenderKeyState {
    /// Signing private key as a fixed array.
    pub fn signing_private(&self) -> Result<[u8; KEY_LEN], CryptoError> {
        let private = self.sender_signing_key_private.as_ref().ok_or(CryptoError::NoSigningKey)?;
        array32(private, "sender signing private key")
    }

    /// Signing public key without its type marker.
    pub fn signing_public_raw(&self) -> Result<[u8; KEY_LEN], CryptoError> {
        decode_public(&self.sender_signing_key_public)
    }
}

/// Persisted chain key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChainKey {
    /// Chain index
    #[serde(alias = "index")]
    pub iteration: u32,
    /// Chain key bytes
    pub seed: ByteBuf,
}

/// Persisted signing key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSigningKey {
    /// Public key, 33 bytes (32 in records written before the type marker)
    pub public: ByteBuf,
    /// Private key, own states only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<ByteBuf>,
}

/// Persisted skipped message key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessageKey {
    /// Chain index
    #[serde(alias = "index")]
    pub iteration: u32,
    /// Seed bytes
    pub seed: ByteBuf,
}

/// Sender-key state as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSenderKeyState {
    /// Key id
    pub sender_key_id: u32,
    /// Chain key
    pub sender_chain_key: StoredChainKey,
    /// Signing key pair
    pub sender_signing_key: StoredSigningKey,
    /// Skipped message keys
    #[serde(default)]
    pub sender_message_keys: Vec<StoredMessageKey>,
}

impl TryFrom<&StoredSenderKeyState> for SenderKeyState {
    type Error = CryptoError;

    fn try_from(stored: &StoredSenderKeyState) -> Result<Self, CryptoError> {
        let public = decode_public(&stored.sender_signing_key.public)?;
        let private = stored
            .sender_signing_key
            .private
            .as_ref()
            .map(|p| array32(p, "sender signing private key").map(|p| ByteBuf::from(p.to_vec())))
            .transpose()?;
        let message_keys = stored
            .sender_message_keys
            .iter()
            .map(|k| {
                let seed = array32(&k.seed, "sender message key")?;
                Ok(MessageKeySeed { index: k.iteration, seed })
            })
            .collect::<Result<Vec<_>, CryptoError>>()?;

        Ok(Self {
            sender_key_id: stored.sender_key_id,
            sender_key_chain_key: ChainKey::at(
                stored.sender_chain_key.iteration,
                array32(&stored.sender_chain_key.seed, "sender chain key")?,
            ),
            sender_signing_key_public: serialize_public(&public),
            sender_signing_key_private: private,
            sender_message_keys: message_keys,
        })
    }
}

impl From<&SenderKeyState> for StoredSenderKeyState {
    fn from(state: &SenderKeyState) -> Self {
        Self {
            sender_key_id: state.sender_key_id,
            sender_chain_key: StoredChainKey {
                iteration: state.sender_key_chain_key.index,
                seed: ByteBuf::from(state.sender_key_chain_key.seed.to_vec()),
            },
            sender_signing_key: StoredSigningKey {
                public: ByteBuf::from(state.sender_signing_key_public.to_vec()),
                private: state.sender_signing_key_private.clone(),
            },
            sender_message_keys: state
                .sender_message_keys
                .iter()
                .map(|k| StoredMessageKey {
                    iteration: k.index,
                    seed: ByteBuf::from(k.seed.to_vec()),
                })
                .collect(),
        }
    }
}

/// All sender-key states under one sender-key name, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderKeySession {
    /// States; null entries are dropped on read
    #[serde(default, deserialize_with = "without_nulls")]
    pub sender_key_states: Vec<SenderKeyState>,
}

impl SenderKeySession {
    /// State with the given key id.
    pub fn state(&self, key_id: u32) -> Option<&SenderKeyState> {
        self.sender_key_states.iter().find(|s| s.sender_key_id == key_id)
    }

    /// Persisted form.
    pub fn to_stored(&self) -> StoredSenderKeySession {
        StoredSenderKeySession {
            sender_key_states: self.sender_key_states.iter().map(Into::into).collect(),
        }
    }
}

/// Persisted form of [`SenderKeySession`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSenderKeySession {
    /// Persisted states
    #[serde(default)]
    pub sender_key_states: Vec<StoredSenderKeyState>,
}

fn without_nulls<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<SenderKeyState>, D::Error> {
    let states: Vec<Option<SenderKeyState>> = Deserialize::deserialize(deserializer)?;
    Ok(states.into_iter().flatten().collect())
}
