//! Signet Cryptographic Engine
//!
//! Cryptographic building blocks behind the signet orchestration layer. All
//! protocol operations are pure functions: they take a state value, return an
//! updated state value, and never touch storage. Randomness comes from an
//! explicit [`Rng`] so tests can run deterministically from a seed.
//!
//! # Key Lifecycle
//!
//! ```text
//! Identity + Signed PreKey (+ One-Time PreKey)
//!        │
//!        ▼ X3DH
//! Root Key
//!        │
//!        ▼ DH Ratchet (per ratchet-key change)
//! Chain Key ──▶ Chain Key ──▶ ...
//!        │
//!        ▼ HMAC
//! Message Key Seed
//!        │
//!        ▼ HKDF
//! XChaCha20-Poly1305 key + nonce
//! ```
//!
//! Group messaging uses sender keys: each sender owns a chain key and a
//! signing key pair, distributes both (public half only) to the group once,
//! and then encrypts every group message with the next key of its chain.
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are replaced after every derived message key
//! - Message key seeds are dropped once used
//! - Fresh DH ratchet keys on every reply turn
//!
//! Authenticity:
//! - AEAD binds identity keys and message header to every ciphertext
//! - Sender-key messages carry an XEdDSA signature by the sender's signing key
//!
//! # Wire Format
//!
//! Public keys use the 33-byte form `0x05 || x25519`. Engine states and wire
//! messages are CBOR.

#![forbid(unsafe_code)]

pub mod chain;
pub mod config;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod prekey;
pub mod rng;
pub mod sender_keys;
pub mod session;
pub mod xeddsa;

mod cbor;

pub use chain::{ChainKey, MessageKeySeed};
pub use config::EngineConfig;
pub use error::CryptoError;
pub use keys::{KEY_LEN, KeyPair, PUBLIC_KEY_TYPE, SERIALIZED_PUBLIC_KEY_LEN};
pub use prekey::{
    LocalIdentity, OneTimePreKeyPublic, PreKeyBundle, PreKeyRecord, SignedPreKeyRecord,
    generate_pre_keys, generate_registration_id, generate_signed_pre_key,
};
pub use rng::Rng;
pub use sender_keys::{
    SenderKeyDistributionMessage, SenderKeyMessage, SenderKeySession, SenderKeyState,
    StoredSenderKeySession, StoredSenderKeyState,
};
pub use session::{
    Envelope, EnvelopeKind, LocalKeyBundle, PreKeyWhisperMessage, SessionState, WhisperMessage,
};
