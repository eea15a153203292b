//! Key generation through the process-wide engine.

use signet_crypto::{KeyPair, PreKeyRecord, SignedPreKeyRecord};

use crate::{
    engine::EngineResult,
    registry,
    store::{IdentityKeyPair, KeyPairValues},
};

/// First prekey id handed out by default
pub const DEFAULT_PRE_KEY_START: u32 = 1;

/// Number of prekeys generated per batch by default
pub const DEFAULT_PRE_KEY_COUNT: u32 = 100;

/// A fresh local identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedIdentity {
    /// Registration id in the extended range
    pub registration_id: u32,
    /// Long-term identity key pair
    pub identity: KeyPair,
}

impl GeneratedIdentity {
    /// The identity as a store hands it back.
    pub fn key_pair_values(&self) -> IdentityKeyPair {
        KeyPairValues::from_key_pair(&self.identity)
    }
}

/// New registration id and identity key pair.
pub fn generate_identity() -> EngineResult<GeneratedIdentity> {
    let engine = registry::engine();
    Ok(GeneratedIdentity {
        registration_id: engine.generate_registration_id()?,
        identity: engine.generate_key_pair()?,
    })
}

/// `count` one-time prekeys with consecutive ids from `start`.
///
/// Use [`DEFAULT_PRE_KEY_START`] and [`DEFAULT_PRE_KEY_COUNT`] for the usual
/// initial batch.
pub fn generate_pre_keys(start: u32, count: u32) -> EngineResult<Vec<PreKeyRecord>> {
    registry::engine().generate_pre_keys(start, count)
}

/// Signed prekey `id`, signed with `identity`.
pub fn generate_signed_pre_key(identity: &KeyPair, id: u32) -> EngineResult<SignedPreKeyRecord> {
    registry::engine().generate_signed_pre_key(identity, id)
}
