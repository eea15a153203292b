//! X3DH key agreement and the root-key KDF of the double ratchet.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    chain::ChainKey,
    keys::{KEY_LEN, KeyPair, agree},
};

/// HKDF info for the X3DH master secret
const WHISPER_TEXT: &[u8] = b"WhisperText";

/// HKDF info for root-key ratchet steps
const WHISPER_RATCHET: &[u8] = b"WhisperRatchet";

/// Curve discontinuity prefix mixed in before the DH outputs
const DISCONTINUITY: [u8; 32] = [0xFF; 32];

/// Initiator side: our identity and base key against the peer's prekeys.
///
/// DH1 = DH(IK_A, SPK_B), DH2 = DH(EK_A, IK_B), DH3 = DH(EK_A, SPK_B),
/// DH4 = DH(EK_A, OPK_B) when a one-time prekey is used.
pub fn initiator_root_key(
    identity: &KeyPair,
    base_key: &KeyPair,
    their_identity: &[u8; KEY_LEN],
    their_signed_pre_key: &[u8; KEY_LEN],
    their_one_time_pre_key: Option<&[u8; KEY_LEN]>,
) -> [u8; 32] {
    let dh1 = identity.agree(their_signed_pre_key);
    let dh2 = base_key.agree(their_identity);
    let dh3 = base_key.agree(their_signed_pre_key);
    let dh4 = their_one_time_pre_key.map(|opk| base_key.agree(opk));
    master_secret(&dh1, &dh2, &dh3, dh4.as_ref())
}

/// Responder side: mirrors [`initiator_root_key`] with private halves swapped.
pub fn responder_root_key(
    identity: &KeyPair,
    signed_pre_key: &KeyPair,
    one_time_pre_key: Option<&KeyPair>,
    their_identity: &[u8; KEY_LEN],
    their_base_key: &[u8; KEY_LEN],
) -> [u8; 32] {
    let dh1 = signed_pre_key.agree(their_identity);
    let dh2 = identity.agree(their_base_key);
    let dh3 = signed_pre_key.agree(their_base_key);
    let dh4 = one_time_pre_key.map(|opk| opk.agree(their_base_key));
    master_secret(&dh1, &dh2, &dh3, dh4.as_ref())
}

/// One DH ratchet step: `(root, chain) = HKDF(salt = root, DH(ours, theirs))`.
pub fn ratchet_root(
    root_key: &[u8; 32],
    ours: &KeyPair,
    theirs: &[u8; KEY_LEN],
) -> ([u8; 32], ChainKey) {
    let mut shared = agree(&ours.private_key, theirs);
    let hkdf = Hkdf::<Sha256>::new(Some(root_key.as_slice()), &shared);
    shared.zeroize();

    let mut okm = [0u8; 64];
    let Ok(()) = hkdf.expand(WHISPER_RATCHET, &mut okm) else {
        unreachable!("64 bytes is a valid HKDF-SHA256 output length");
    };

    let mut root = [0u8; 32];
    let mut chain = [0u8; 32];
    root.copy_from_slice(&okm[..32]);
    chain.copy_from_slice(&okm[32..]);
    okm.zeroize();
    (root, ChainKey::new(chain))
}

fn master_secret(
    dh1: &[u8; 32],
    dh2: &[u8; 32],
    dh3: &[u8; 32],
    dh4: Option<&[u8; 32]>,
) -> [u8; 32] {
    let mut km = Vec::with_capacity(32 * 5);
    km.extend_from_slice(&DISCONTINUITY);
    km.extend_from_slice(dh1);
    km.extend_from_slice(dh2);
    km.extend_from_slice(dh3);
    if let Some(dh4) = dh4 {
        km.extend_from_slice(dh4);
    }

    let hkdf = Hkdf::<Sha256>::new(None, &km);
    km.zeroize();

    let mut root = [0u8; 32];
    let Ok(()) = hkdf.expand(WHISPER_TEXT, &mut root) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    root
}
