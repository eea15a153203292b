//! Signet Core
//!
//! Orchestration layer for Signal-style end-to-end messaging. It sits between
//! an application's persistent store and a cryptographic [`Engine`]: it
//! loads records, normalizes whatever byte encodings the store hands back,
//! drives the engine, and writes the updated records back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SessionBuilder / SessionCipher    GroupSessionBuilder /     │
//! │  (1:1, per ProtocolAddress)        GroupCipher (per          │
//! │                                    SenderKeyName)            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  per-key locks · byte normalization · bundle aliases ·       │
//! │  sender-key state migration                                  │
//! ├───────────────────────────────┬──────────────────────────────┤
//! │  SessionStore / SenderKeyStore│  Engine (NativeEngine over   │
//! │  (application)                │  signet-crypto)              │
//! └───────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Every builder and cipher operation holds a lock keyed by its address or
//! sender-key name from the first read to the last write, so concurrent
//! operations on one key never interleave.
//!
//! # Example
//!
//! ```ignore
//! let addr: ProtocolAddress = "bob.1".parse()?;
//! SessionBuilder::new(store.clone(), addr.clone()).init_outgoing(&bundle).await?;
//! let message = SessionCipher::new(store, addr).encrypt(b"hello").await?;
//! assert_eq!(message.kind, MessageType::PreKey);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod bytes;
pub mod engine;
pub mod error;
pub mod fields;
pub mod group;
pub mod helpers;
pub mod record;
pub mod registry;
pub mod session;
pub mod store;

pub use address::{AddressError, ProtocolAddress, SenderKeyName};
pub use bytes::{BytesError, deep_normalize_bytes, to_bytes, to_raw32, to_wire33};
pub use engine::{Engine, EngineError, EngineResult, NativeEngine};
pub use error::{BundleError, BundleField, GroupError, SessionError};
pub use group::{GroupCipher, GroupSessionBuilder, SenderKeyDistributionMessage};
pub use helpers::{
    DEFAULT_PRE_KEY_COUNT, DEFAULT_PRE_KEY_START, GeneratedIdentity, generate_identity,
    generate_pre_keys, generate_signed_pre_key,
};
pub use record::{RecordError, SenderKeyRecord, SessionRecord};
pub use registry::RegistryError;
pub use session::{
    CiphertextMessage, MessageType, PREKEY_TYPE, SessionBuilder, SessionCipher, WHISPER_TYPE,
};
pub use signet_crypto::EngineConfig;
pub use store::{
    IdentityKeyPair, KeyPairValues, MemoryStore, PreKey, SenderKeyStore, SessionStore, SignedPreKey,
    StoreError,
};
