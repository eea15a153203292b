//! Sender keys for group messaging.
//!
//! Each sender owns a state per group: a chain key plus a signing key pair.
//! The sender hands the chain key and the signing public key to every member
//! once, through a [`SenderKeyDistributionMessage`]. Every group message is
//! then encrypted with the next key of the chain and signed.

pub mod cipher;
pub mod message;
pub mod state;

pub use cipher::{
    create_distribution_message, create_state, decrypt, encrypt, process_distribution_message,
};
pub use message::{SENDER_KEY_VERSION, SenderKeyDistributionMessage, SenderKeyMessage};
pub use state::{
    SenderKeySession, SenderKeyState, StoredChainKey, StoredMessageKey, StoredSenderKeySession,
    StoredSenderKeyState, StoredSigningKey,
};
