//! Sender-key state migration.
//!
//! Stored group records hold states in the engine's stored shape, or in
//! older variants of it with byte fields in text or array encodings and
//! 32-byte signing public keys. Every read normalizes each state's byte
//! fields and converts it to the canonical shape the group cipher works on:
//!
//! ```text
//! stored  { senderChainKey, senderSigningKey { public, private? }, ... }
//!    │ normalize bytes, promote 32-byte public key
//!    ▼ engine.parse_sender_key_state
//! canonical { senderKeyChainKey, senderSigningKeyPublic, ... }
//! ```
//!
//! Canonical states pass through unchanged, so the migration can be applied
//! any number of times.

use ciborium::Value;
use tracing::trace;

use crate::{
    bytes::{self, BytesError, RAW_KEY_LEN},
    engine::Engine,
    error::GroupError,
    fields,
    record::SENDER_KEY_STATES,
};

/// Byte fields rewritten in place: (path, promote 32-byte keys to 33).
const BYTE_FIELDS: &[(&[&str], bool)] = &[
    (&["senderSigningKey", "public"], true),
    (&["senderSigningKey", "private"], false),
    (&["senderChainKey", "seed"], false),
    (&["senderSigningKeyPublic"], true),
    (&["senderSigningKeyPrivate"], false),
    (&["senderKeyChainKey", "seed"], false),
];

/// Canonical `{ senderKeyStates }` session for a stored record value.
///
/// A missing or non-array state list yields an empty session. Null entries
/// pass through.
pub fn normalize_session(engine: &dyn Engine, record: &Value) -> Result<Value, GroupError> {
    let states = fields::get(record, SENDER_KEY_STATES)
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    let states =
        states.iter().map(|state| normalize_state(engine, state)).collect::<Result<Vec<_>, _>>()?;
    Ok(fields::map([(SENDER_KEY_STATES, Value::Array(states))]))
}

/// Canonical form of one stored or canonical state.
pub fn normalize_state(engine: &dyn Engine, state: &Value) -> Result<Value, GroupError> {
    if state.is_null() {
        return Ok(Value::Null);
    }

    let mut state = state.clone();
    for (path, promote) in BYTE_FIELDS {
        rewrite(&mut state, path, *promote)?;
    }
    let message_keys = fields::get_mut(&mut state, "senderMessageKeys");
    if let Some(keys) = message_keys.and_then(Value::as_array_mut) {
        for key in keys {
            rewrite(key, &["seed"], false)?;
        }
    }

    if is_canonical(&state) {
        return Ok(state);
    }

    let key_id = fields::get(&state, "senderKeyId").and_then(fields::as_u32);
    let canonical = engine
        .parse_sender_key_state(&state)
        .map_err(GroupError::deserialize("SenderKeyState"))?;
    trace!(sender_key_id = ?key_id, "sender key state migrated to canonical shape");
    Ok(canonical)
}

/// Canonical states carry both `senderKeyChainKey` and
/// `senderSigningKeyPublic`.
pub fn is_canonical(state: &Value) -> bool {
    fields::path(state, "senderKeyChainKey").is_some()
        && fields::path(state, "senderSigningKeyPublic").is_some()
}

fn rewrite(node: &mut Value, path: &[&str], promote: bool) -> Result<(), BytesError> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut node = node;
    for segment in parents {
        node = match fields::get_mut(node, segment) {
            Some(child) => child,
            None => return Ok(()),
        };
    }

    let Some(slot) = fields::get_mut(node, last) else {
        return Ok(());
    };
    if let Some(found) = bytes::to_bytes(slot)? {
        let found = if promote && found.len() == RAW_KEY_LEN {
            bytes::wire33(&found)?.to_vec()
        } else {
            found
        };
        *slot = Value::Bytes(found);
    }
    Ok(())
}
