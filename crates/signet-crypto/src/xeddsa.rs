//! XEdDSA signatures with X25519 key pairs.
//!
//! Lets a single Curve25519 key pair serve both Diffie-Hellman and Ed25519
//! signatures. Used for signed prekeys and sender-key messages.
//!
//! <https://signal.org/docs/specifications/xeddsa/>

use curve25519_dalek::{EdwardsPoint, MontgomeryPoint, Scalar, constants::ED25519_BASEPOINT_TABLE};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::{
    error::CryptoError,
    keys::{KEY_LEN, clamp},
    rng::Rng,
};

/// Signature length
pub const SIGNATURE_LEN: usize = 64;

/// hash1 prefix: 0xFE followed by 31 bytes of 0xFF.
const HASH_1_PREFIX: [u8; 32] = {
    let mut prefix = [0xFFu8; 32];
    prefix[0] = 0xFE;
    prefix
};

fn sha512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Sign `message` with a Curve25519 private key.
pub fn sign(
    message: &[u8],
    private_key: &[u8; KEY_LEN],
    rng: &Rng,
) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
    let cap_z: [u8; SIGNATURE_LEN] = rng.random_array()?;

    // calculate_key_pair(k): A = kB with sign bit forced to zero
    let k = Scalar::from_bytes_mod_order(clamp(*private_key));
    let cap_e = &k * ED25519_BASEPOINT_TABLE;
    let mut cap_a = cap_e.compress();
    let sign_bit = cap_a.0[31] >> 7;
    cap_a.0[31] &= 0b0111_1111;
    let a = if sign_bit == 1 { -k } else { k };

    // r = hash1(a || M || Z)
    let nonce = sha512(&[&HASH_1_PREFIX, a.as_bytes(), message, &cap_z]);
    let r = Scalar::from_bytes_mod_order_wide(&nonce);
    let cap_r = (&r * ED25519_BASEPOINT_TABLE).compress();

    // h = hash(R || A || M)
    let h =
        Scalar::from_bytes_mod_order_wide(&sha512(&[cap_r.as_bytes(), cap_a.as_bytes(), message]));
    let s = r + h * a;

    let mut signature = [0u8; SIGNATURE_LEN];
    signature[..32].copy_from_slice(cap_r.as_bytes());
    signature[32..].copy_from_slice(s.as_bytes());
    Ok(signature)
}

/// Verify an XEdDSA signature against a raw Curve25519 public key.
pub fn verify(
    message: &[u8],
    public_key: &[u8; KEY_LEN],
    signature: &[u8],
) -> Result<(), CryptoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidSignature);
    }

    let mut cap_r = [0u8; 32];
    cap_r.copy_from_slice(&signature[..32]);
    let mut s = [0u8; 32];
    s.copy_from_slice(&signature[32..]);

    // Reject s with excess bits
    if s[31] & 0b1110_0000 != 0 {
        return Err(CryptoError::InvalidSignature);
    }

    let a = MontgomeryPoint(*public_key).to_edwards(0).ok_or(CryptoError::InvalidSignature)?;
    let cap_a = a.compress();

    let h = Scalar::from_bytes_mod_order_wide(&sha512(&[&cap_r, cap_a.as_bytes(), message]));

    // Rcheck = sB - hA
    let cap_r_check =
        EdwardsPoint::vartime_double_scalar_mul_basepoint(&h, &-a, &Scalar::from_bytes_mod_order(s))
            .compress();

    if bool::from(cap_r_check.as_bytes().ct_eq(&cap_r)) {
        Ok(())
    } else {
        Err(CryptoError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn sign_and_verify() {
        let rng = Rng::from_seed([1; 32]);
        let pair = KeyPair::generate(&rng).unwrap();

        let signature = sign(b"signed prekey", &pair.private_key, &rng).unwrap();
        assert!(verify(b"signed prekey", &pair.public_key, &signature).is_ok());
    }

    #[test]
    fn verify_rejects_other_message_or_key() {
        let rng = Rng::from_seed([1; 32]);
        let pair = KeyPair::generate(&rng).unwrap();
        let other = KeyPair::generate(&rng).unwrap();
        let signature = sign(b"hello", &pair.private_key, &rng).unwrap();

        let wrong_message = verify(b"hullo", &pair.public_key, &signature);
        assert_eq!(wrong_message, Err(CryptoError::InvalidSignature));
        let wrong_key = verify(b"hello", &other.public_key, &signature);
        assert_eq!(wrong_key, Err(CryptoError::InvalidSignature));
    }

    #[test]
    fn verify_rejects_truncated_signature() {
        let rng = Rng::from_seed([1; 32]);
        let pair = KeyPair::generate(&rng).unwrap();
        let signature = sign(b"hello", &pair.private_key, &rng).unwrap();

        assert!(verify(b"hello", &pair.public_key, &signature[..63]).is_err());
    }
}
