//! X25519 key pairs and the serialized public-key form.
//!
//! Public keys travel as 33 bytes: the curve type marker [`PUBLIC_KEY_TYPE`]
//! followed by the raw 32-byte X25519 point. Private keys are stored clamped
//! so the same scalar serves both Diffie-Hellman and XEdDSA signing.

use std::fmt;

use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{error::CryptoError, rng::Rng};

/// Type marker prefixed to serialized Curve25519 public keys
pub const PUBLIC_KEY_TYPE: u8 = 0x05;

/// Raw key length
pub const KEY_LEN: usize = 32;

/// Serialized public key length (type marker + raw key)
pub const SERIALIZED_PUBLIC_KEY_LEN: usize = 33;

/// X25519 key pair with raw 32-byte halves.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    /// Raw 32-byte public key
    #[serde(with = "serde_bytes")]
    pub public_key: [u8; KEY_LEN],
    /// Clamped 32-byte private scalar
    #[serde(with = "serde_bytes")]
    pub private_key: [u8; KEY_LEN],
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate(rng: &Rng) -> Result<Self, CryptoError> {
        Ok(Self::from_private(rng.random_array()?))
    }

    /// Rebuild a key pair from its private half.
    pub fn from_private(private_key: [u8; KEY_LEN]) -> Self {
        let private_key = clamp(private_key);
        let public_key = PublicKey::from(&StaticSecret::from(private_key)).to_bytes();
        Self { public_key, private_key }
    }

    /// Public key in 33-byte wire form.
    pub fn serialized_public(&self) -> [u8; SERIALIZED_PUBLIC_KEY_LEN] {
        serialize_public(&self.public_key)
    }

    /// X25519 agreement with a raw peer public key.
    pub fn agree(&self, their_public: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
        agree(&self.private_key, their_public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .finish()
    }
}

/// Prefix a raw public key with the type marker.
pub fn serialize_public(raw: &[u8; KEY_LEN]) -> [u8; SERIALIZED_PUBLIC_KEY_LEN] {
    let mut out = [0u8; SERIALIZED_PUBLIC_KEY_LEN];
    out[0] = PUBLIC_KEY_TYPE;
    out[1..].copy_from_slice(raw);
    out
}

/// Decode a public key given in 33-byte wire form or as 32 raw bytes.
pub fn decode_public(bytes: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    match bytes.len() {
        SERIALIZED_PUBLIC_KEY_LEN if bytes[0] == PUBLIC_KEY_TYPE => {
            array32(&bytes[1..], "public key")
        },
        SERIALIZED_PUBLIC_KEY_LEN => Err(CryptoError::InvalidKeyType(bytes[0])),
        _ => array32(bytes, "public key"),
    }
}

/// Decode a 33-byte wire-form public key, rejecting raw keys.
pub fn decode_serialized_public(
    bytes: &[u8],
) -> Result<[u8; SERIALIZED_PUBLIC_KEY_LEN], CryptoError> {
    let raw = decode_public(bytes)?;
    if bytes.len() != SERIALIZED_PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            what: "serialized public key",
            expected: SERIALIZED_PUBLIC_KEY_LEN,
            actual: bytes.len(),
        });
    }
    Ok(serialize_public(&raw))
}

/// X25519 agreement between a private scalar and a raw public key.
pub fn agree(private_key: &[u8; KEY_LEN], their_public: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let secret = StaticSecret::from(*private_key);
    secret.diffie_hellman(&PublicKey::from(*their_public)).to_bytes()
}

/// Copy exactly 32 bytes out of a slice.
pub(crate) fn array32(bytes: &[u8], what: &'static str) -> Result<[u8; KEY_LEN], CryptoError> {
    <[u8; KEY_LEN]>::try_from(bytes).map_err(|_| CryptoError::InvalidKeyLength {
        what,
        expected: KEY_LEN,
        actual: bytes.len(),
    })
}

/// RFC 7748 scalar clamping.
pub(crate) fn clamp(mut scalar: [u8; KEY_LEN]) -> [u8; KEY_LEN] {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
    scalar
}
