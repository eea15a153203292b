//! Message encryption using `XChaCha20-Poly1305`
//!
//! Each message key seed is expanded with HKDF into a 32-byte AEAD key and a
//! 24-byte nonce. Seeds are single-use, so the derived nonce never repeats
//! under the same key.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// HKDF info for 1:1 message keys
pub const WHISPER_MESSAGE_KEYS: &[u8] = b"WhisperMessageKeys";

/// HKDF info for sender-key message keys
pub const WHISPER_GROUP: &[u8] = b"WhisperGroup";

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;

/// Encrypt `plaintext` under the key expanded from `seed`.
pub fn seal(seed: &[u8; 32], info: &[u8], plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let (mut key, nonce) = expand(seed, info);
    let cipher = XChaCha20Poly1305::new((&key).into());
    key.zeroize();

    let payload = Payload { msg: plaintext, aad };
    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), payload) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    ciphertext
}

/// Decrypt `ciphertext` under the key expanded from `seed`.
///
/// # Errors
///
/// - `DecryptionFailed`: authentication tag, key or associated data mismatch
pub fn open(
    seed: &[u8; 32],
    info: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptionFailed {
            reason: "ciphertext shorter than tag".to_string(),
        });
    }

    let (mut key, nonce) = expand(seed, info);
    let cipher = XChaCha20Poly1305::new((&key).into());
    key.zeroize();

    cipher
        .decrypt(XNonce::from_slice(&nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::DecryptionFailed { reason: "authentication failed".to_string() })
}

fn expand(seed: &[u8; 32], info: &[u8]) -> ([u8; KEY_SIZE], [u8; NONCE_SIZE]) {
    let hkdf = Hkdf::<Sha256>::new(None, seed);
    let mut okm = [0u8; KEY_SIZE + NONCE_SIZE];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("56 bytes is a valid HKDF-SHA256 output length");
    };

    let mut key = [0u8; KEY_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    key.copy_from_slice(&okm[..KEY_SIZE]);
    nonce.copy_from_slice(&okm[KEY_SIZE..]);
    okm.zeroize();
    (key, nonce)
}
