//! Sender-key creation and distribution.

use std::sync::Arc;

use ciborium::Value;
use tracing::debug;

use super::{SenderKeyDistributionMessage, migrate::normalize_session, states};
use crate::{
    address::SenderKeyName,
    engine::Engine,
    error::GroupError,
    fields,
    record::{SENDER_KEY_STATES, SenderKeyRecord},
    registry::{self, sender_key_key},
    store::SenderKeyStore,
};

/// Creates our own sender keys and consumes other members' distributions.
pub struct GroupSessionBuilder<K: SenderKeyStore> {
    store: K,
    engine: Arc<dyn Engine>,
}

impl<K: SenderKeyStore> GroupSessionBuilder<K> {
    /// Builder using the process-wide engine.
    pub fn new(store: K) -> Self {
        Self::with_engine(store, registry::engine())
    }

    /// Builder using `engine`.
    pub fn with_engine(store: K, engine: Arc<dyn Engine>) -> Self {
        Self { store, engine }
    }

    /// Distribution message for our sender key under `name`, creating the
    /// key on first use. Later calls reuse the stored state.
    pub async fn create(
        &self,
        name: &SenderKeyName,
    ) -> Result<SenderKeyDistributionMessage, GroupError> {
        let _guard = registry::locks().lock(sender_key_key(name)).await;

        let record = match self.store.load_sender_key(name).await? {
            Some(record) if !record.is_empty() => record,
            _ => {
                let state = self
                    .engine
                    .create_sender_key_state()
                    .map_err(GroupError::engine("createSenderKeyState"))?;
                let record = SenderKeyRecord::deserialize(fields::map([(
                    SENDER_KEY_STATES,
                    Value::Array(vec![state]),
                )]));
                self.store.store_sender_key(name, record.clone()).await?;
                debug!(sender_key_name = %name, "sender key created");
                record
            },
        };

        let session = normalize_session(self.engine.as_ref(), record.serialize())?;
        let state = states(&session)
            .iter()
            .rev()
            .find(|state| !state.is_null())
            .ok_or_else(|| GroupError::NoSenderKeyState { name: name.to_string() })?;

        let bytes = self
            .engine
            .create_distribution_message(state)
            .map_err(GroupError::engine("createDistributionMessage"))?;
        Ok(SenderKeyDistributionMessage::from_bytes(bytes))
    }

    /// Add the sender key carried by `message` under `name`.
    pub async fn process(
        &self,
        name: &SenderKeyName,
        message: &SenderKeyDistributionMessage,
    ) -> Result<(), GroupError> {
        let _guard = registry::locks().lock(sender_key_key(name)).await;

        let record = self.store.load_sender_key(name).await?.unwrap_or_default();
        let session = normalize_session(self.engine.as_ref(), record.serialize())?;

        let session = self
            .engine
            .process_distribution_message(message.serialize(), &session)
            .map_err(GroupError::engine("processSenderKeyDistributionMsg"))?;
        let stored = self
            .engine
            .serialize_sender_key_session(&session)
            .map_err(GroupError::engine("serializeSenderKeySession"))?;
        self.store.store_sender_key(name, SenderKeyRecord::deserialize(stored)).await?;

        debug!(sender_key_name = %name, "sender key distribution processed");
        Ok(())
    }
}
