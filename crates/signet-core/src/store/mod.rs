//! Store contracts.
//!
//! The layer persists nothing itself. Applications implement
//! [`SessionStore`] and [`SenderKeyStore`] over their own storage;
//! [`MemoryStore`] is the in-memory reference implementation.
//!
//! Key material handed back by stores may use any byte encoding the layer
//! normalizes (raw bytes, hex, base64, integer arrays, Node buffer JSON), so
//! the key types here carry dynamic values rather than fixed arrays.

mod memory;

use async_trait::async_trait;
use ciborium::Value;
pub use memory::MemoryStore;
use signet_crypto::{KeyPair, PreKeyRecord, SignedPreKeyRecord};
use thiserror::Error;

use crate::{
    address::SenderKeyName,
    fields,
    record::{SenderKeyRecord, SessionRecord},
};

/// Store backend failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend I/O or encoding failed
    #[error("store backend error: {0}")]
    Backend(String),

    /// A record the store must always have is absent
    #[error("not found: {0}")]
    NotFound(String),
}

/// A key pair as handed back by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPairValues {
    /// Public key in any byte encoding; `Null` when absent
    pub public_key: Value,
    /// Private key in any byte encoding; `Null` when absent
    pub private_key: Value,
}

const PUBLIC_KEY: &[&str] = &["pubKey", "publicKey", "keyPair.pubKey", "keyPair.publicKey"];

const PRIVATE_KEY: &[&str] = &["privKey", "privateKey", "keyPair.privKey", "keyPair.privateKey"];

/// Our long-term identity key pair.
pub type IdentityKeyPair = KeyPairValues;

impl KeyPairValues {
    /// Parse `{pubKey|publicKey, privKey|privateKey}`, also nested under
    /// `keyPair`.
    pub fn from_value(value: &Value) -> Self {
        Self {
            public_key: lookup(value, PUBLIC_KEY),
            private_key: lookup(value, PRIVATE_KEY),
        }
    }

    /// Values for a generated key pair: 33-byte public, raw private.
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        Self {
            public_key: Value::Bytes(key_pair.serialized_public().to_vec()),
            private_key: Value::Bytes(key_pair.private_key.to_vec()),
        }
    }
}

/// A signed prekey as handed back by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedPreKey {
    /// Key id, when the store keeps it alongside the key
    pub key_id: Option<u32>,
    /// Key pair
    pub key_pair: KeyPairValues,
    /// Signature in any byte encoding
    pub signature: Option<Value>,
    /// Creation time in unix milliseconds
    pub timestamp: Option<u64>,
}

impl SignedPreKey {
    /// Parse a free-form stored record.
    pub fn from_value(value: &Value) -> Self {
        Self {
            key_id: fields::first(value, &["keyId", "id"]).and_then(fields::as_u32),
            key_pair: KeyPairValues::from_value(value),
            signature: fields::first(value, &["signature"]).cloned(),
            timestamp: fields::first(value, &["timestamp", "ts"]).and_then(fields::as_u64),
        }
    }

    /// Values for a generated record.
    pub fn from_record(record: &SignedPreKeyRecord) -> Self {
        Self {
            key_id: Some(record.id),
            key_pair: KeyPairValues::from_key_pair(&record.key_pair),
            signature: Some(Value::Bytes(record.signature.clone())),
            timestamp: Some(record.timestamp),
        }
    }
}

/// A one-time prekey as handed back by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct PreKey {
    /// Key id, when the store keeps it alongside the key
    pub key_id: Option<u32>,
    /// Public key in any byte encoding; `Null` when absent
    pub public_key: Value,
    /// Private key in any byte encoding; `Null` when absent
    pub private_key: Value,
}

impl PreKey {
    /// Parse a free-form stored record.
    pub fn from_value(value: &Value) -> Self {
        let KeyPairValues { public_key, private_key } = KeyPairValues::from_value(value);
        let key_id = fields::first(value, &["keyId", "id"]).and_then(fields::as_u32);
        Self { key_id, public_key, private_key }
    }

    /// Values for a generated record. Both halves are stored raw, 32 bytes
    /// each.
    pub fn from_record(record: &PreKeyRecord) -> Self {
        Self {
            key_id: Some(record.id),
            public_key: Value::Bytes(record.key_pair.public_key.to_vec()),
            private_key: Value::Bytes(record.key_pair.private_key.to_vec()),
        }
    }
}

/// Persistence for 1:1 sessions and our own key material.
///
/// Session records are keyed by the encoded address (`"<id>.<device>"`).
/// Writes replace the whole record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Our registration id.
    async fn get_our_registration_id(&self) -> Result<u32, StoreError>;

    /// Our identity key pair.
    async fn get_our_identity(&self) -> Result<IdentityKeyPair, StoreError>;

    /// Session record for `address`, if any.
    async fn load_session(&self, address: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Replace the session record for `address`.
    async fn store_session(&self, address: &str, record: SessionRecord) -> Result<(), StoreError>;

    /// Signed prekey `id`, if any.
    async fn load_signed_pre_key(&self, id: u32) -> Result<Option<SignedPreKey>, StoreError>;

    /// One-time prekey `id`, if any.
    async fn load_pre_key(&self, id: u32) -> Result<Option<PreKey>, StoreError>;

    /// Delete one-time prekey `id` after use. Stores that never delete keep
    /// the default.
    async fn remove_pre_key(&self, _id: u32) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Persistence for sender-key records.
#[async_trait]
pub trait SenderKeyStore: Send + Sync {
    /// Sender-key record for `name`, if any.
    async fn load_sender_key(
        &self,
        name: &SenderKeyName,
    ) -> Result<Option<SenderKeyRecord>, StoreError>;

    /// Replace the sender-key record for `name`.
    async fn store_sender_key(
        &self,
        name: &SenderKeyName,
        record: SenderKeyRecord,
    ) -> Result<(), StoreError>;
}

fn lookup(value: &Value, paths: &[&str]) -> Value {
    fields::first(value, paths).cloned().unwrap_or(Value::Null)
}

/// Signature bytes as a Node buffer JSON map, the shape some stores persist.
pub fn node_buffer(bytes: &[u8]) -> Value {
    fields::map([
        ("type", Value::Text("Buffer".to_string())),
        ("data", Value::Array(bytes.iter().map(|b| Value::Integer((*b).into())).collect())),
    ])
}
