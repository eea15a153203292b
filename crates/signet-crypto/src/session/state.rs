//! Double-ratchet session state.

use serde::{Deserialize, Serialize};

use super::x3dh::ratchet_root;
use crate::{
    chain::{ChainKey, MessageKeySeed},
    config::EngineConfig,
    error::CryptoError,
    keys::{KeyPair, SERIALIZED_PUBLIC_KEY_LEN, decode_public},
    rng::Rng,
};

/// Session state version
pub const SESSION_VERSION: u8 = 3;

/// Handshake data the initiator repeats until its first message is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPreKey {
    /// Responder signed prekey id
    pub signed_pre_key_id: u32,
    /// Responder one-time prekey id, if one was used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_key_id: Option<u32>,
    /// Our base key
    #[serde(with = "serde_bytes")]
    pub base_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
}

/// Receiving chain for one of the peer's ratchet keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivingChain {
    /// Peer ratchet public key this chain belongs to
    #[serde(with = "serde_bytes")]
    pub ratchet_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Next expected chain key
    pub chain_key: ChainKey,
    /// Seeds skipped over while catching up
    #[serde(default)]
    pub message_keys: Vec<MessageKeySeed>,
}

/// One side of a 1:1 session.
///
/// Passed to and returned from every cipher call; never mutated in place by
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// State version
    pub session_version: u8,
    /// Our identity key (33 bytes)
    #[serde(with = "serde_bytes")]
    pub local_identity_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Peer identity key (33 bytes)
    #[serde(with = "serde_bytes")]
    pub remote_identity_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Our registration id
    pub local_registration_id: u32,
    /// Peer registration id
    pub remote_registration_id: u32,
    /// Initiator base key, identifying the handshake
    #[serde(with = "serde_bytes")]
    pub base_key: [u8; SERIALIZED_PUBLIC_KEY_LEN],
    /// Current root key
    #[serde(with = "serde_bytes")]
    pub root_key: [u8; 32],
    /// Our current ratchet key pair
    pub sender_ratchet: KeyPair,
    /// Sending chain, absent until the responder first receives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sending_chain: Option<ChainKey>,
    /// Receiving chains, oldest first
    #[serde(default)]
    pub receiving_chains: Vec<ReceivingChain>,
    /// Length of our previous sending chain
    pub previous_counter: u32,
    /// Set on the initiator until the first message goes out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_pre_key: Option<PendingPreKey>,
}

impl SessionState {
    /// Message key seed for the next outgoing message.
    pub(crate) fn next_sending_seed(&mut self) -> Result<(u32, [u8; 32]), CryptoError> {
        let chain = self.sending_chain.as_mut().ok_or(CryptoError::NoSendingChain)?;
        let key = chain.message_key();
        *chain = chain.next()?;
        Ok((key.index, key.seed))
    }

    /// Message key seed for an incoming message, ratcheting if the peer
    /// switched to a new ratchet key.
    pub(crate) fn receiving_seed(
        &mut self,
        their_ratchet_key: &[u8; SERIALIZED_PUBLIC_KEY_LEN],
        counter: u32,
        config: &EngineConfig,
        rng: &Rng,
    ) -> Result<[u8; 32], CryptoError> {
        let existing =
            self.receiving_chains.iter().position(|c| &c.ratchet_key == their_ratchet_key);
        let position = match existing {
            Some(position) => position,
            None => {
                self.ratchet_step(their_ratchet_key, config, rng)?;
                self.receiving_chains.len() - 1
            },
        };

        let chain = &mut self.receiving_chains[position];
        chain.chain_key.seed_for(
            counter,
            &mut chain.message_keys,
            config.max_skip,
            config.max_message_keys,
        )
    }

    /// DH ratchet: derive a receiving chain for `their_ratchet_key`, then a
    /// fresh sending ratchet pair and chain.
    fn ratchet_step(
        &mut self,
        their_ratchet_key: &[u8; SERIALIZED_PUBLIC_KEY_LEN],
        config: &EngineConfig,
        rng: &Rng,
    ) -> Result<(), CryptoError> {
        let theirs = decode_public(their_ratchet_key)?;

        let (root, receiving) = ratchet_root(&self.root_key, &self.sender_ratchet, &theirs);
        let next_ratchet = KeyPair::generate(rng)?;
        let (root, sending) = ratchet_root(&root, &next_ratchet, &theirs);

        self.previous_counter = self.sending_chain.as_ref().map_or(0, |c| c.index);
        self.root_key = root;
        self.sender_ratchet = next_ratchet;
        self.sending_chain = Some(sending);
        self.receiving_chains.push(ReceivingChain {
            ratchet_key: *their_ratchet_key,
            chain_key: receiving,
            message_keys: Vec::new(),
        });
        let keep = config.max_receiver_chains.max(1);
        if self.receiving_chains.len() > keep {
            let excess = self.receiving_chains.len() - keep;
            self.receiving_chains.drain(..excess);
        }
        Ok(())
    }
}
