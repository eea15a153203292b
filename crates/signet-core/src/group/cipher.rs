//! Group encrypt and decrypt over stored sender keys.

use std::sync::Arc;

use tracing::debug;

use super::migrate::normalize_session;
use crate::{
    address::SenderKeyName,
    engine::Engine,
    error::GroupError,
    record::SenderKeyRecord,
    registry::{self, sender_key_key},
    store::SenderKeyStore,
};

/// Encrypts with our sender key, or decrypts with a member's, under one
/// sender-key name.
pub struct GroupCipher<K: SenderKeyStore> {
    store: K,
    name: SenderKeyName,
    engine: Arc<dyn Engine>,
}

impl<K: SenderKeyStore> GroupCipher<K> {
    /// Cipher using the process-wide engine.
    pub fn new(store: K, name: SenderKeyName) -> Self {
        Self::with_engine(store, name, registry::engine())
    }

    /// Cipher using `engine`.
    pub fn with_engine(store: K, name: SenderKeyName, engine: Arc<dyn Engine>) -> Self {
        Self { store, name, engine }
    }

    /// Sender-key name.
    pub fn name(&self) -> &SenderKeyName {
        &self.name
    }

    /// Encrypt `plaintext` with our newest sender-key state.
    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, GroupError> {
        let _guard = registry::locks().lock(sender_key_key(&self.name)).await;

        let session = self.load_session().await?;
        let (session, ciphertext) = self
            .engine
            .group_encrypt(&session, plaintext)
            .map_err(GroupError::engine("Group encrypt"))?;
        self.store_session(&session).await?;

        Ok(ciphertext)
    }

    /// Verify and decrypt a group message from the sender named by this
    /// cipher.
    pub async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, GroupError> {
        let _guard = registry::locks().lock(sender_key_key(&self.name)).await;

        let session = self.load_session().await?;
        let message = self
            .engine
            .deserialize_sender_key_message(ciphertext)
            .map_err(GroupError::deserialize("Group msg"))?;
        let (session, plaintext) = self
            .engine
            .group_decrypt(&session, &message)
            .map_err(GroupError::engine("Group decrypt"))?;
        self.store_session(&session).await?;

        Ok(plaintext)
    }

    async fn load_session(&self) -> Result<ciborium::Value, GroupError> {
        let record = self
            .store
            .load_sender_key(&self.name)
            .await?
            .ok_or_else(|| GroupError::NoSenderKeyState { name: self.name.to_string() })?;
        normalize_session(self.engine.as_ref(), record.serialize())
    }

    async fn store_session(&self, session: &ciborium::Value) -> Result<(), GroupError> {
        let stored = self
            .engine
            .serialize_sender_key_session(session)
            .map_err(GroupError::engine("serializeSenderKeySession"))?;
        self.store.store_sender_key(&self.name, SenderKeyRecord::deserialize(stored)).await?;
        debug!(sender_key_name = %self.name, "sender key state advanced");
        Ok(())
    }
}
