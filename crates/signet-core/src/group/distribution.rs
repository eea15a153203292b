//! Serialized sender-key distribution message.

/// Encoded distribution message as produced by
/// [`GroupSessionBuilder::create`](super::GroupSessionBuilder::create).
///
/// The layer never looks inside; it is sent to every group member over their
/// 1:1 sessions and handed to
/// [`GroupSessionBuilder::process`](super::GroupSessionBuilder::process).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderKeyDistributionMessage {
    bytes: Vec<u8>,
}

impl SenderKeyDistributionMessage {
    /// Wrap received bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Encoded message.
    pub fn serialize(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the encoded message.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for SenderKeyDistributionMessage {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
