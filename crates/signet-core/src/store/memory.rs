#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use super::{IdentityKeyPair, PreKey, SenderKeyStore, SessionStore, SignedPreKey, StoreError};
use crate::{
    address::SenderKeyName,
    record::{SenderKeyRecord, SessionRecord},
};

/// In-memory store for tests and examples.
///
/// Implements both [`SessionStore`] and [`SenderKeyStore`]. All state is
/// wrapped in `Arc<Mutex<>>` so clones share the same data. Lock poisoning is
/// reported as [`StoreError::Backend`] by trait methods.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    registration_id: u32,
    identity: IdentityKeyPair,

    /// Encoded address -> session record
    sessions: HashMap<String, SessionRecord>,

    signed_pre_keys: HashMap<u32, SignedPreKey>,
    pre_keys: HashMap<u32, PreKey>,

    /// Encoded sender-key name -> record
    sender_keys: HashMap<String, SenderKeyRecord>,
}

impl MemoryStore {
    /// Empty store for the given local identity.
    pub fn new(registration_id: u32, identity: IdentityKeyPair) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                registration_id,
                identity,
                sessions: HashMap::new(),
                signed_pre_keys: HashMap::new(),
                pre_keys: HashMap::new(),
                sender_keys: HashMap::new(),
            })),
        }
    }

    /// Add or replace signed prekey `id`.
    pub fn add_signed_pre_key(&self, id: u32, key: SignedPreKey) {
        self.guard().signed_pre_keys.insert(id, key);
    }

    /// Add or replace one-time prekey `id`.
    pub fn add_pre_key(&self, id: u32, key: PreKey) {
        self.guard().pre_keys.insert(id, key);
    }

    /// True while one-time prekey `id` is present.
    pub fn has_pre_key(&self, id: u32) -> bool {
        self.guard().pre_keys.contains_key(&id)
    }

    /// Number of stored session records.
    pub fn session_count(&self) -> usize {
        self.guard().sessions.len()
    }

    /// Stored session record for `address`.
    pub fn session(&self, address: &str) -> Option<SessionRecord> {
        self.guard().sessions.get(address).cloned()
    }

    /// Stored sender-key record for `name`.
    pub fn sender_key(&self, name: &SenderKeyName) -> Option<SenderKeyRecord> {
        self.guard().sender_keys.get(&name.to_string()).cloned()
    }

    fn guard(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_guard(&self) -> Result<MutexGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_our_registration_id(&self) -> Result<u32, StoreError> {
        Ok(self.try_guard()?.registration_id)
    }

    async fn get_our_identity(&self) -> Result<IdentityKeyPair, StoreError> {
        Ok(self.try_guard()?.identity.clone())
    }

    async fn load_session(&self, address: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.try_guard()?.sessions.get(address).cloned())
    }

    async fn store_session(&self, address: &str, record: SessionRecord) -> Result<(), StoreError> {
        self.try_guard()?.sessions.insert(address.to_string(), record);
        Ok(())
    }

    async fn load_signed_pre_key(&self, id: u32) -> Result<Option<SignedPreKey>, StoreError> {
        Ok(self.try_guard()?.signed_pre_keys.get(&id).cloned())
    }

    async fn load_pre_key(&self, id: u32) -> Result<Option<PreKey>, StoreError> {
        Ok(self.try_guard()?.pre_keys.get(&id).cloned())
    }

    async fn remove_pre_key(&self, id: u32) -> Result<(), StoreError> {
        self.try_guard()?.pre_keys.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SenderKeyStore for MemoryStore {
    async fn load_sender_key(
        &self,
        name: &SenderKeyName,
    ) -> Result<Option<SenderKeyRecord>, StoreError> {
        Ok(self.try_guard()?.sender_keys.get(&name.to_string()).cloned())
    }

    async fn store_sender_key(
        &self,
        name: &SenderKeyName,
        record: SenderKeyRecord,
    ) -> Result<(), StoreError> {
        self.try_guard()?.sender_keys.insert(name.to_string(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ciborium::Value;

    use super::*;

    fn store() -> MemoryStore {
        let identity = IdentityKeyPair {
            public_key: Value::Bytes(vec![5; 33]),
            private_key: Value::Bytes(vec![1; 32]),
        };
        MemoryStore::new(7, identity)
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = store();
        let clone = store.clone();

        clone.store_session("bob.1", SessionRecord::new(Value::Bool(true))).await.unwrap();
        assert_eq!(store.session_count(), 1);
        assert_eq!(
            store.load_session("bob.1").await.unwrap(),
            Some(SessionRecord::new(Value::Bool(true)))
        );
    }

    #[tokio::test]
    async fn pre_keys_can_be_removed() {
        let store = store();
        let empty = PreKey { key_id: Some(3), public_key: Value::Null, private_key: Value::Null };
        store.add_pre_key(3, empty);

        assert!(store.has_pre_key(3));
        store.remove_pre_key(3).await.unwrap();
        assert!(!store.has_pre_key(3));
        assert_eq!(store.load_pre_key(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sender_keys_by_name() {
        let store = store();
        let name = SenderKeyName::from_raw("team", "alice").unwrap();

        assert_eq!(store.load_sender_key(&name).await.unwrap(), None);
        store.store_sender_key(&name, SenderKeyRecord::default()).await.unwrap();
        assert_eq!(store.sender_key(&name), Some(SenderKeyRecord::default()));
    }

    #[tokio::test]
    async fn identity_is_returned() {
        let store = store();
        assert_eq!(store.get_our_registration_id().await.unwrap(), 7);
        assert_eq!(store.get_our_identity().await.unwrap().public_key, Value::Bytes(vec![5; 33]));
    }
}
