//! Opaque record containers for engine-owned state.
//!
//! Records are replaced whole after every successful operation; nothing in
//! this crate edits a stored record in place.

use ciborium::Value;
use thiserror::Error;

/// Key of the state list inside a sender-key record
pub const SENDER_KEY_STATES: &str = "senderKeyStates";

/// Record encoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// CBOR encoding or decoding failed
    #[error("record encoding failed: {0}")]
    Encoding(String),
}

/// 1:1 session state for one address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecord {
    state: Option<Value>,
}

impl SessionRecord {
    /// Record holding `state`.
    pub fn new(state: Value) -> Self {
        Self { state: Some(state) }
    }

    /// Wrap a state value; `Null` is an empty record.
    pub fn deserialize(state: Value) -> Self {
        match state {
            Value::Null => Self::default(),
            state => Self::new(state),
        }
    }

    /// The wrapped state, if any.
    pub fn serialize(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    /// Take the wrapped state.
    pub fn into_state(self) -> Option<Value> {
        self.state
    }

    /// True when no state is present.
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    /// CBOR encoding of the state for byte-oriented stores.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        encode(self.state.as_ref().unwrap_or(&Value::Null))
    }

    /// Decode bytes written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let value: Value =
            ciborium::from_reader(bytes).map_err(|e| RecordError::Encoding(e.to_string()))?;
        Ok(Self::deserialize(value))
    }
}

/// Sender-key states for one sender-key name.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderKeyRecord {
    state: Value,
}

impl Default for SenderKeyRecord {
    fn default() -> Self {
        let states = (Value::Text(SENDER_KEY_STATES.to_string()), Value::Array(Vec::new()));
        Self { state: Value::Map(vec![states]) }
    }
}

impl SenderKeyRecord {
    /// Wrap a `{ senderKeyStates: [...] }` value.
    ///
    /// Byte input is parsed as CBOR, then as JSON; unreadable bytes and
    /// `Null` yield an empty record.
    pub fn deserialize(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Bytes(bytes) => Self::from_bytes(&bytes),
            state => Self { state },
        }
    }

    /// Parse a stored blob, CBOR first then JSON.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let parsed = ciborium::from_reader::<Value, _>(bytes)
            .ok()
            .filter(Value::is_map)
            .or_else(|| {
                serde_json::from_slice::<serde_json::Value>(bytes).ok().and_then(json_to_value)
            });
        match parsed {
            Some(state) => Self { state },
            None => Self::default(),
        }
    }

    /// The wrapped value.
    pub fn serialize(&self) -> &Value {
        &self.state
    }

    /// Take the wrapped value.
    pub fn into_value(self) -> Value {
        self.state
    }

    /// The state list; empty when absent or not an array.
    pub fn sender_key_states(&self) -> &[Value] {
        self.state
            .as_map()
            .and_then(|entries| {
                entries.iter().find(|(k, _)| k.as_text() == Some(SENDER_KEY_STATES))
            })
            .and_then(|(_, states)| states.as_array())
            .map_or(&[][..], Vec::as_slice)
    }

    /// True when there are no states.
    pub fn is_empty(&self) -> bool {
        self.sender_key_states().is_empty()
    }

    /// CBOR encoding for byte-oriented stores.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        encode(&self.state)
    }
}

fn encode(value: &Value) -> Result<Vec<u8>, RecordError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| RecordError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// JSON documents only map onto CBOR values through serde; non-finite or
/// otherwise unrepresentable input yields `None`.
fn json_to_value(json: serde_json::Value) -> Option<Value> {
    Value::serialized(&json).ok().filter(Value::is_map)
}
