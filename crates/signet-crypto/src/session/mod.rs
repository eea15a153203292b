//! 1:1 sessions: X3DH establishment and the double ratchet.
//!
//! ```text
//! Alice                                         Bob
//!   initiate_outgoing(bundle)
//!   encrypt ──── PreKeyWhisperMessage ────▶ decrypt_prekey
//!   encrypt ──── WhisperMessage ──────────▶ decrypt
//!   decrypt ◀─── WhisperMessage ──────────  encrypt
//! ```

pub mod cipher;
pub mod message;
pub mod state;
pub mod x3dh;

pub use cipher::{decrypt, decrypt_prekey, encrypt, initiate_outgoing};
pub use message::{MESSAGE_VERSION, PreKeyWhisperMessage, WhisperMessage};
pub use state::{PendingPreKey, ReceivingChain, SessionState};

/// Which wire message an [`Envelope`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// [`PreKeyWhisperMessage`]
    PreKey,
    /// [`WhisperMessage`]
    Whisper,
}

impl EnvelopeKind {
    /// Short tag: `pkmsg` or `msg`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreKey => "pkmsg",
            Self::Whisper => "msg",
        }
    }
}

/// Output of [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message kind
    pub kind: EnvelopeKind,
    /// Encoded wire message
    pub ciphertext: Vec<u8>,
}

/// Serialized local prekeys handed to [`decrypt_prekey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalKeyBundle {
    /// Encoded [`SignedPreKeyRecord`](crate::SignedPreKeyRecord)
    pub signed_pre_key: Vec<u8>,
    /// Encoded [`PreKeyRecord`](crate::PreKeyRecord), when the message uses one
    pub one_time_pre_key: Option<Vec<u8>>,
}
