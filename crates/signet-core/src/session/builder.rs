//! Outgoing session establishment.

use std::sync::Arc;

use ciborium::Value;
use tracing::debug;

use super::{bundle::parse_bundle, local_identity};
use crate::{
    address::ProtocolAddress,
    engine::Engine,
    error::SessionError,
    record::SessionRecord,
    registry::{self, session_key},
    store::SessionStore,
};

/// Starts sessions with one remote device.
pub struct SessionBuilder<S: SessionStore> {
    store: S,
    addr: ProtocolAddress,
    engine: Arc<dyn Engine>,
}

impl<S: SessionStore> SessionBuilder<S> {
    /// Builder using the process-wide engine.
    pub fn new(store: S, addr: ProtocolAddress) -> Self {
        Self::with_engine(store, addr, registry::engine())
    }

    /// Builder using `engine`.
    pub fn with_engine(store: S, addr: ProtocolAddress, engine: Arc<dyn Engine>) -> Self {
        Self { store, addr, engine }
    }

    /// Remote address.
    pub fn addr(&self) -> &ProtocolAddress {
        &self.addr
    }

    /// Run X3DH against `bundle` and store the resulting session.
    ///
    /// Any session already stored for the address is replaced.
    pub async fn init_outgoing(&self, bundle: &Value) -> Result<(), SessionError> {
        let address = self.addr.to_string();
        let _guard = registry::locks().lock(session_key(&address)).await;

        let local = local_identity(&self.store).await?;
        let bundle = parse_bundle(bundle)?;

        let state = self
            .engine
            .initiate_outgoing(&local, &bundle)
            .map_err(SessionError::engine("initOutgoing"))?;
        self.store.store_session(&address, SessionRecord::new(state)).await?;

        debug!(
            address = %address,
            one_time_pre_key = bundle.one_time_pre_key.is_some(),
            "outgoing session stored"
        );
        Ok(())
    }
}
