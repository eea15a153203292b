//! Symmetric chain keys for forward-secure message key derivation
//!
//! Shared by the 1:1 double ratchet (sending/receiving chains) and by sender
//! keys. Each step derives a message key seed from the current chain key and
//! replaces the chain key with its successor.
//!
//! # Security Properties
//!
//! - Forward Secrecy: Old chain keys are zeroized when advancing
//! - Key Uniqueness: Each index produces a unique message key seed
//! - Determinism: Same seed always produces same key sequence

use std::fmt;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// HMAC input for deriving a message key seed
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// HMAC input for deriving the next chain key
const CHAIN_KEY_SEED: &[u8] = &[0x02];

/// A chain key at a given index.
///
/// Serialized as `{ index, seed }`; older records name the index
/// `iteration`, which is accepted on read.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ChainKey {
    /// Number of message keys derived from this chain so far
    #[serde(alias = "iteration")]
    pub index: u32,
    /// Current 32-byte chain key
    #[serde(with = "serde_bytes")]
    pub seed: [u8; 32],
}

/// A message key seed kept for an out-of-order message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MessageKeySeed {
    /// Chain index this seed belongs to
    #[serde(alias = "iteration")]
    pub index: u32,
    /// Seed from which the AEAD key is expanded
    #[serde(with = "serde_bytes")]
    pub seed: [u8; 32],
}

impl ChainKey {
    /// Chain starting at index 0.
    pub fn new(seed: [u8; 32]) -> Self {
        Self { index: 0, seed }
    }

    /// Chain starting at an arbitrary index.
    pub fn at(index: u32, seed: [u8; 32]) -> Self {
        Self { index, seed }
    }

    /// Message key seed for the current index.
    pub fn message_key(&self) -> MessageKeySeed {
        MessageKeySeed { index: self.index, seed: hmac(&self.seed, MESSAGE_KEY_SEED) }
    }

    /// Successor chain key.
    pub fn next(&self) -> Result<Self, CryptoError> {
        let index =
            self.index.checked_add(1).ok_or(CryptoError::ChainOverflow { current: self.index })?;
        Ok(Self { index, seed: hmac(&self.seed, CHAIN_KEY_SEED) })
    }

    /// Derive the message key seed for `target` and advance past it.
    ///
    /// Targets behind the chain are served from `cache`, which holds seeds
    /// skipped by earlier calls; a served seed is removed. Targets ahead of
    /// the chain cache every skipped seed, keeping at most `max_cached`
    /// (oldest dropped first).
    pub fn seed_for(
        &mut self,
        target: u32,
        cache: &mut Vec<MessageKeySeed>,
        max_skip: u32,
        max_cached: usize,
    ) -> Result<[u8; 32], CryptoError> {
        if target < self.index {
            let position = cache
                .iter()
                .position(|key| key.index == target)
                .ok_or(CryptoError::DuplicateMessage { counter: target })?;
            return Ok(cache.remove(position).seed);
        }

        if target - self.index > max_skip {
            return Err(CryptoError::TooFarInFuture { current: self.index, requested: target });
        }

        while self.index < target {
            cache.push(self.message_key());
            *self = self.next()?;
        }
        if cache.len() > max_cached {
            let excess = cache.len() - max_cached;
            cache.drain(..excess);
        }

        let seed = self.message_key().seed;
        *self = self.next()?;
        Ok(seed)
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKey").field("index", &self.index).field("seed", &"***").finish()
    }
}

impl fmt::Debug for MessageKeySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageKeySeed").field("index", &self.index).field("seed", &"***").finish()
    }
}

fn hmac(key: &[u8; 32], input: &[u8]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(input);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
