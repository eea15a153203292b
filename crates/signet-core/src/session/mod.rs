//! 1:1 sessions.
//!
//! ```text
//! SessionBuilder::init_outgoing(bundle)   store ← X3DH state
//! SessionCipher::encrypt                  PreKey (3) first, Whisper (1) after
//! SessionCipher::decrypt_*                store ← advanced state
//! ```

mod builder;
mod bundle;
mod cipher;

pub use builder::SessionBuilder;
pub use bundle::parse_bundle;
pub use cipher::{CiphertextMessage, MessageType, PREKEY_TYPE, SessionCipher, WHISPER_TYPE};
use signet_crypto::{KeyPair, LocalIdentity};

use crate::{bytes::to_raw32, error::SessionError, store::SessionStore};

/// Our registration id and identity key pair, normalized to raw keys.
async fn local_identity<S: SessionStore>(store: &S) -> Result<LocalIdentity, SessionError> {
    let registration_id = store.get_our_registration_id().await?;
    let identity = store.get_our_identity().await?;
    Ok(LocalIdentity {
        registration_id,
        identity: KeyPair {
            public_key: to_raw32(&identity.public_key)?,
            private_key: to_raw32(&identity.private_key)?,
        },
    })
}
