//! Identity, prekey and bundle types used by the X3DH handshake.

use serde::{Deserialize, Serialize};

use crate::{
    cbor,
    error::CryptoError,
    keys::{KEY_LEN, KeyPair, SERIALIZED_PUBLIC_KEY_LEN, decode_public},
    rng::Rng,
    xeddsa,
};

/// Largest registration id handed out (extended range).
pub const MAX_REGISTRATION_ID: u32 = 0x7FFF_FFFF;

/// Our own identity as seen by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Local registration id
    pub registration_id: u32,
    /// Long-term identity key pair (raw halves)
    pub identity: KeyPair,
}

/// Public half of a peer's one-time prekey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimePreKeyPublic {
    /// Prekey id
    pub id: u32,
    /// Public key in 33-byte wire form
    pub public_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
}

/// A peer's published prekey bundle, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeyBundle {
    /// Peer registration id (0 when the bundle did not carry one)
    pub registration_id: u32,
    /// Peer identity key
    pub identity_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Signed prekey id
    pub signed_pre_key_id: u32,
    /// Signed prekey public key
    pub signed_pre_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Optional one-time prekey
    pub one_time_pre_key: Option<OneTimePreKeyPublic>,
    /// Peer's initial ratchet key, usually the signed prekey
    pub ratchet_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
}

/// Signed prekey with its private half, as kept in private storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPreKeyRecord {
    /// Signed prekey id
    pub id: u32,
    /// Creation time in unix milliseconds
    pub timestamp: u64,
    /// Key pair
    pub key_pair: KeyPair,
    /// XEdDSA signature by the identity key over the 33-byte public key
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl SignedPreKeyRecord {
    /// Encode for private storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        cbor::encode("signed prekey record", self)
    }

    /// Decode from private storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        cbor::decode("signed prekey record", bytes)
    }

    /// Check the signature against an identity public key.
    pub fn verify(&self, identity_key: &[u8]) -> Result<(), CryptoError> {
        let identity = decode_public(identity_key)?;
        xeddsa::verify(&self.key_pair.serialized_public(), &identity, &self.signature)
    }
}

/// One-time prekey with its private half.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreKeyRecord {
    /// Prekey id
    pub id: u32,
    /// Key pair
    pub key_pair: KeyPair,
}

impl PreKeyRecord {
    /// Build from a 33-byte (or raw) public key and a raw private key.
    ///
    /// The public key must match the one derived from the private key.
    pub fn from_parts(
        id: u32,
        public_key: &[u8],
        private_key: &[u8],
    ) -> Result<Self, CryptoError> {
        let public = decode_public(public_key)?;
        let private =
            <[u8; KEY_LEN]>::try_from(private_key).map_err(|_| CryptoError::InvalidKeyLength {
                what: "prekey private key",
                expected: KEY_LEN,
                actual: private_key.len(),
            })?;
        let key_pair = KeyPair::from_private(private);
        if key_pair.public_key != public {
            return Err(CryptoError::malformed(
                "prekey record",
                "public key does not match private key",
            ));
        }
        Ok(Self { id, key_pair })
    }

    /// Encode for private storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        cbor::encode("prekey record", self)
    }

    /// Decode from private storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        cbor::decode("prekey record", bytes)
    }
}

/// Random registration id in `1..=MAX_REGISTRATION_ID`.
pub fn generate_registration_id(rng: &Rng) -> Result<u32, CryptoError> {
    Ok(rng.random_u32()? % MAX_REGISTRATION_ID + 1)
}

/// Generate `count` one-time prekeys with consecutive ids from `start`.
///
/// Ids wrap within the 24-bit prekey id space, skipping 0.
pub fn generate_pre_keys(
    start: u32,
    count: u32,
    rng: &Rng,
) -> Result<Vec<PreKeyRecord>, CryptoError> {
    (0..count)
        .map(|offset| {
            let id = (start.wrapping_add(offset).wrapping_sub(1) % 0xFF_FFFF) + 1;
            Ok(PreKeyRecord { id, key_pair: KeyPair::generate(rng)? })
        })
        .collect()
}

/// Generate a signed prekey, signing its 33-byte public key with `identity`.
pub fn generate_signed_pre_key(
    identity: &KeyPair,
    id: u32,
    timestamp: u64,
    rng: &Rng,
) -> Result<SignedPreKeyRecord, CryptoError> {
    let key_pair = KeyPair::generate(rng)?;
    let signature = xeddsa::sign(&key_pair.serialized_public(), &identity.private_key, rng)?;
    Ok(SignedPreKeyRecord { id, timestamp, key_pair, signature: signature.to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_pre_key_verifies_against_identity() {
        let rng = Rng::from_seed([3; 32]);
        let identity = KeyPair::generate(&rng).unwrap();
        let record = generate_signed_pre_key(&identity, 7, 1_700_000_000_000, &rng).unwrap();

        assert_eq!(record.id, 7);
        assert!(record.verify(&identity.serialized_public()).is_ok());

        let stranger = KeyPair::generate(&rng).unwrap();
        assert_eq!(
            record.verify(&stranger.serialized_public()),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn pre_keys_have_consecutive_ids() {
        let rng = Rng::from_seed([3; 32]);
        let keys = generate_pre_keys(1, 5, &rng).unwrap();
        let ids: Vec<u32> = keys.iter().map(|k| k.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_ne!(keys[0].key_pair, keys[1].key_pair);
    }

    #[test]
    fn pre_key_ids_skip_zero_on_wrap() {
        let rng = Rng::from_seed([3; 32]);
        let keys = generate_pre_keys(0xFF_FFFF, 2, &rng).unwrap();
        assert_eq!(keys[0].id, 0xFF_FFFF);
        assert_eq!(keys[1].id, 1);
    }

    #[test]
    fn registration_id_in_range() {
        let rng = Rng::from_seed([3; 32]);
        for _ in 0..100 {
            let id = generate_registration_id(&rng).unwrap();
            assert!((1..=MAX_REGISTRATION_ID).contains(&id));
        }
    }

    #[test]
    fn pre_key_record_storage_roundtrip() {
        let rng = Rng::from_seed([3; 32]);
        let record = generate_pre_keys(42, 1, &rng).unwrap().remove(0);
        let decoded = PreKeyRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn from_parts_rejects_mismatched_public() {
        let rng = Rng::from_seed([3; 32]);
        let a = KeyPair::generate(&rng).unwrap();
        let b = KeyPair::generate(&rng).unwrap();

        assert!(PreKeyRecord::from_parts(1, &a.serialized_public(), &a.private_key).is_ok());
        assert!(PreKeyRecord::from_parts(1, &b.serialized_public(), &a.private_key).is_err());
        assert!(matches!(
            PreKeyRecord::from_parts(1, &a.serialized_public(), &a.private_key[..31]),
            Err(CryptoError::InvalidKeyLength { actual: 31, .. })
        ));
    }
}
