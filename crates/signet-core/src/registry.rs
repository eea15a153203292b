//! Process-wide engine handle and per-key operation locks.
//!
//! The engine is initialized at most once. The first caller of [`engine`]
//! gets a [`NativeEngine`] unless [`install`] ran before.
//!
//! Every builder and cipher operation is a read-modify-write of one stored
//! record. [`KeyedLocks`] serializes those operations per key
//! (`session:<address>`, `sender-key:<name>`) while letting different keys
//! proceed in parallel.

#![allow(clippy::disallowed_types, reason = "Table lock is never held across an await")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::engine::{Engine, NativeEngine};

static ENGINE: OnceLock<Arc<dyn Engine>> = OnceLock::new();
static LOCKS: OnceLock<KeyedLocks> = OnceLock::new();

/// Registry failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// An engine is already in use
    #[error("engine already initialized")]
    AlreadyInitialized,
}

/// The process-wide engine, initializing the default one on first use.
pub fn engine() -> Arc<dyn Engine> {
    Arc::clone(ENGINE.get_or_init(|| Arc::new(NativeEngine::default())))
}

/// Install `engine` as the process-wide engine.
///
/// Fails once any engine has been initialized, including the default one.
pub fn install(engine: Arc<dyn Engine>) -> Result<(), RegistryError> {
    ENGINE.set(engine).map_err(|_| RegistryError::AlreadyInitialized)
}

/// Initialize the default engine ahead of first use.
pub fn bootstrap() {
    let _ = engine();
}

/// The process-wide lock table.
pub fn locks() -> &'static KeyedLocks {
    LOCKS.get_or_init(KeyedLocks::default)
}

/// Async mutexes keyed by string.
///
/// Entries nobody holds or waits on are dropped on the next acquisition, so
/// the table stays proportional to the number of keys in flight.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Wait for exclusive access to `key`. Access ends when the guard drops.
    pub async fn lock(&self, key: impl Into<String>) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(key.into()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock key for a 1:1 session.
pub(crate) fn session_key(address: &impl std::fmt::Display) -> String {
    format!("session:{address}")
}

/// Lock key for a sender-key record.
pub(crate) fn sender_key_key(name: &impl std::fmt::Display) -> String {
    format!("sender-key:{name}")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn install_after_first_use_fails() {
        bootstrap();
        assert_eq!(
            install(Arc::new(NativeEngine::default())),
            Err(RegistryError::AlreadyInitialized)
        );
        assert!(Arc::ptr_eq(&engine(), &engine()));
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::default());
        let guard = locks.lock("session:a.1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("session:a.1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::default();
        let _a = locks.lock("session:a.1").await;
        let _b = locks.lock("session:b.1").await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_keys_are_pruned() {
        let locks = KeyedLocks::default();
        drop(locks.lock("session:a.1").await);
        drop(locks.lock("session:b.1").await);
        let _c = locks.lock("session:c.1").await;
        assert_eq!(locks.len(), 1);
    }
}
