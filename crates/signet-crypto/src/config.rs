//! Engine limits.

/// Limits applied by the engine when advancing chains and keeping state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of message keys skipped in one step
    pub max_skip: u32,
    /// Maximum number of cached out-of-order message keys per chain
    pub max_message_keys: usize,
    /// Maximum number of receiving chains kept per 1:1 session
    pub max_receiver_chains: usize,
    /// Maximum number of sender-key states kept per sender
    pub max_sender_key_states: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_skip: 1000,
            max_message_keys: 2000,
            max_receiver_chains: 5,
            max_sender_key_states: 5,
        }
    }
}
