//! Seedable cryptographic randomness.

#![allow(clippy::disallowed_types, reason = "Lock is held only for a single draw")]

use std::sync::Mutex;

use rand::{RngCore, rngs::OsRng};
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};

use crate::error::CryptoError;

/// Cryptographically-secure random number generator using ChaCha20.
///
/// Production instances are seeded from the OS RNG. Tests use
/// [`Rng::from_seed`] for reproducible key material.
#[derive(Debug)]
pub struct Rng {
    rng: Mutex<ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }
}

impl Rng {
    /// Deterministic generator from a fixed seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { rng: Mutex::new(ChaCha20Rng::from_seed(seed)) }
    }

    /// Fill an array with random bytes.
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], CryptoError> {
        let mut rng = self.rng.lock().map_err(|_| CryptoError::Rng("lock poisoned".into()))?;
        let mut out = [0u8; N];
        rng.try_fill_bytes(&mut out).map_err(|e| CryptoError::Rng(e.to_string()))?;
        Ok(out)
    }

    /// Random `u32`.
    pub fn random_u32(&self) -> Result<u32, CryptoError> {
        Ok(u32::from_be_bytes(self.random_array()?))
    }
}
