//! Byte normalization for key material arriving from callers and stores.
//!
//! Stores hand back binary fields in whatever shape their serializer left
//! them: CBOR byte strings, Node buffer JSON, index-keyed maps, integer
//! arrays, hex or base64 text. Everything is canonicalized to
//! [`Value::Bytes`] / `Vec<u8>` before it reaches the engine.
//!
//! Recognition order for a single value:
//!
//! 1. `Value::Bytes`
//! 2. `{ "type": "Buffer", "data": [..] }`
//! 3. non-empty map keyed by decimal indices, values in `0..=255`
//! 4. non-empty array of integers in `0..=255`
//! 5. text: hex (optional `0x`), then base64 (standard or URL-safe)
//!
//! Anything else is not byte-like and is left for the caller to handle.

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use ciborium::Value;
use thiserror::Error;

/// Curve type marker of a serialized public key
pub const PUBLIC_KEY_TYPE: u8 = 0x05;

/// Raw public key length
pub const RAW_KEY_LEN: usize = 32;

/// Serialized (wire) public key length
pub const WIRE_KEY_LEN: usize = 33;

/// Nesting limit for [`deep_normalize_bytes`]
pub const MAX_DEPTH: usize = 64;

/// Base64 decoding that accepts missing padding and non-zero trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Byte normalization failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BytesError {
    /// Text uses the base64 alphabet but cannot be valid base64
    #[error("malformed base64 input")]
    MalformedBase64,

    /// Key material shorter than a raw key
    #[error("key too short: expected at least {RAW_KEY_LEN} bytes, got {0}")]
    KeyTooShort(usize),

    /// Value is not in any recognised byte encoding
    #[error("value is not byte-like")]
    NotByteLike,

    /// Structure nested deeper than [`MAX_DEPTH`]
    #[error("structure nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Decode a byte-like value.
///
/// Returns `Ok(None)` when the value is not byte-like, so callers can keep the
/// original value. Malformed base64 is an error rather than a guess.
pub fn to_bytes(value: &Value) -> Result<Option<Vec<u8>>, BytesError> {
    match value {
        Value::Bytes(bytes) => Ok(Some(bytes.clone())),
        Value::Map(entries) => Ok(node_buffer(entries).or_else(|| indexed_map(entries))),
        Value::Array(items) if !items.is_empty() => Ok(byte_list(items)),
        Value::Text(text) => decode_text(text),
        _ => Ok(None),
    }
}

/// Raw 32-byte key from any byte-like value.
pub fn to_raw32(value: &Value) -> Result<[u8; RAW_KEY_LEN], BytesError> {
    let bytes = to_bytes(value)?.ok_or(BytesError::NotByteLike)?;
    raw32(&bytes)
}

/// 33-byte wire key from any byte-like value.
pub fn to_wire33(value: &Value) -> Result<[u8; WIRE_KEY_LEN], BytesError> {
    let bytes = to_bytes(value)?.ok_or(BytesError::NotByteLike)?;
    wire33(&bytes)
}

/// Raw key from bytes: strips a leading type marker, otherwise takes the
/// first 32 bytes.
pub fn raw32(bytes: &[u8]) -> Result<[u8; RAW_KEY_LEN], BytesError> {
    let raw = match bytes {
        [PUBLIC_KEY_TYPE, rest @ ..] if bytes.len() == WIRE_KEY_LEN => rest,
        _ if bytes.len() >= RAW_KEY_LEN => &bytes[..RAW_KEY_LEN],
        _ => return Err(BytesError::KeyTooShort(bytes.len())),
    };
    let mut out = [0u8; RAW_KEY_LEN];
    out.copy_from_slice(raw);
    Ok(out)
}

/// Wire key from bytes: keeps a marked 33-byte key, prefixes anything else.
pub fn wire33(bytes: &[u8]) -> Result<[u8; WIRE_KEY_LEN], BytesError> {
    let raw = raw32(bytes)?;
    let mut out = [0u8; WIRE_KEY_LEN];
    out[0] = PUBLIC_KEY_TYPE;
    out[1..].copy_from_slice(&raw);
    Ok(out)
}

/// Copy of `value` with every byte-like node replaced by `Value::Bytes`.
///
/// Recurses into arrays, map values and tags; map keys are kept as they are.
/// Applying it twice gives the same result as applying it once.
///
/// Text leaves go through the same rules as [`to_bytes`], so any text in the
/// hex or base64 alphabet becomes bytes (`"msg1"` decodes to three bytes).
/// A base64-alphabet leaf whose length is 1 mod 4 can never be valid base64
/// and fails the whole call with [`BytesError::MalformedBase64`]. States
/// passed through here should keep free-form text out of their leaves.
pub fn deep_normalize_bytes(value: &Value) -> Result<Value, BytesError> {
    normalize(value, 0)
}

fn normalize(value: &Value, depth: usize) -> Result<Value, BytesError> {
    if depth > MAX_DEPTH {
        return Err(BytesError::TooDeep);
    }
    if let Some(bytes) = to_bytes(value)? {
        return Ok(Value::Bytes(bytes));
    }

    Ok(match value {
        Value::Array(items) => Value::Array(
            items.iter().map(|item| normalize(item, depth + 1)).collect::<Result<_, _>>()?,
        ),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), normalize(item, depth + 1)?)))
                .collect::<Result<_, BytesError>>()?,
        ),
        Value::Tag(tag, inner) => Value::Tag(*tag, Box::new(normalize(inner, depth + 1)?)),
        other => other.clone(),
    })
}

fn byte_of(value: &Value) -> Option<u8> {
    match value {
        Value::Integer(int) => u8::try_from(*int).ok(),
        _ => None,
    }
}

fn byte_list(items: &[Value]) -> Option<Vec<u8>> {
    items.iter().map(byte_of).collect()
}

fn node_buffer(entries: &[(Value, Value)]) -> Option<Vec<u8>> {
    let field =
        |name: &str| entries.iter().find(|(k, _)| k.as_text() == Some(name)).map(|(_, v)| v);
    if field("type")?.as_text()? != "Buffer" {
        return None;
    }
    match field("data")? {
        Value::Array(items) => byte_list(items),
        _ => None,
    }
}

fn indexed_map(entries: &[(Value, Value)]) -> Option<Vec<u8>> {
    if entries.is_empty() {
        return None;
    }
    let mut indexed = entries
        .iter()
        .map(|(key, value)| Some((index_of(key)?, byte_of(value)?)))
        .collect::<Option<Vec<_>>>()?;
    indexed.sort_by_key(|(index, _)| *index);
    Some(indexed.into_iter().map(|(_, byte)| byte).collect())
}

fn index_of(key: &Value) -> Option<u64> {
    match key {
        Value::Text(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            text.parse().ok()
        },
        Value::Integer(int) => u64::try_from(*int).ok(),
        _ => None,
    }
}

fn decode_text(text: &str) -> Result<Option<Vec<u8>>, BytesError> {
    if let Some(bytes) = decode_hex(text) {
        return Ok(Some(bytes));
    }
    decode_base64(text)
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    hex::decode(digits).ok()
}

fn decode_base64(text: &str) -> Result<Option<Vec<u8>>, BytesError> {
    let sanitized: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let sanitized = sanitized.trim_end_matches('=');
    if sanitized.is_empty() {
        return Ok(None);
    }
    let in_alphabet = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_');
    if !sanitized.bytes().all(in_alphabet) {
        return Ok(None);
    }
    if sanitized.len() % 4 == 1 {
        return Err(BytesError::MalformedBase64);
    }

    let standard: String = sanitized
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    LENIENT_BASE64.decode(standard).map(Some).map_err(|_| BytesError::MalformedBase64)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn ints(bytes: &[u8]) -> Value {
        Value::Array(bytes.iter().map(|b| Value::Integer((*b).into())).collect())
    }

    #[test]
    fn hex_with_and_without_prefix() {
        assert_eq!(to_bytes(&text("0a0b0c")).unwrap(), Some(vec![0x0a, 0x0b, 0x0c]));
        assert_eq!(to_bytes(&text("0x0A0B0C")).unwrap(), Some(vec![0x0a, 0x0b, 0x0c]));
    }

    #[test]
    fn base64_standard_and_url_safe() {
        assert_eq!(to_bytes(&text("Cgsh")).unwrap(), Some(vec![0x0a, 0x0b, 0x21]));
        assert_eq!(to_bytes(&text("+/8=")).unwrap(), Some(vec![0xfb, 0xff]));
        assert_eq!(to_bytes(&text("-_8")).unwrap(), Some(vec![0xfb, 0xff]));
    }

    #[test]
    fn base64_ignores_whitespace_and_missing_padding() {
        assert_eq!(to_bytes(&text("SGVs\nbG8")).unwrap(), Some(b"Hello".to_vec()));
    }

    #[test]
    fn odd_hex_falls_through_to_base64() {
        // "abc" is odd-length hex but valid unpadded base64
        assert_eq!(to_bytes(&text("abc")).unwrap(), Some(vec![0x69, 0xb7]));
    }

    #[test]
    fn base64_length_one_mod_four_is_rejected() {
        assert_eq!(to_bytes(&text("abcde")), Err(BytesError::MalformedBase64));
        assert_eq!(to_bytes(&text("a")), Err(BytesError::MalformedBase64));
    }

    #[test]
    fn deep_normalize_treats_alphabet_text_as_bytes() {
        let tagged = Value::Map(vec![(text("tag"), text("msg1"))]);
        assert_eq!(
            deep_normalize_bytes(&tagged).unwrap(),
            Value::Map(vec![(text("tag"), Value::Bytes(vec![154, 200, 53]))])
        );

        let owned = Value::Map(vec![(text("owner"), text("alice")), (text("key"), ints(&[1, 2]))]);
        assert_eq!(deep_normalize_bytes(&owned), Err(BytesError::MalformedBase64));

        let addressed = Value::Map(vec![(text("peer"), text("alice.1"))]);
        assert_eq!(deep_normalize_bytes(&addressed).unwrap(), addressed);
    }

    #[test]
    fn non_alphabet_text_is_not_byte_like() {
        assert_eq!(to_bytes(&text("alice.1")).unwrap(), None);
        assert_eq!(to_bytes(&text("")).unwrap(), None);
    }

    #[test]
    fn node_buffer_json() {
        let value =
            Value::Map(vec![(text("type"), text("Buffer")), (text("data"), ints(&[1, 2, 3]))]);
        assert_eq!(to_bytes(&value).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn index_keyed_map_is_ordered_numerically() {
        let value = Value::Map(vec![
            (text("10"), Value::Integer(3.into())),
            (text("2"), Value::Integer(2.into())),
            (text("0"), Value::Integer(1.into())),
        ]);
        assert_eq!(to_bytes(&value).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn out_of_range_integers_are_not_bytes() {
        let value = Value::Array(vec![Value::Integer(1.into()), Value::Integer(256.into())]);
        assert_eq!(to_bytes(&value).unwrap(), None);
        let value = Value::Array(vec![Value::Integer((-1).into())]);
        assert_eq!(to_bytes(&value).unwrap(), None);
    }

    #[test]
    fn empty_containers_are_structure() {
        assert_eq!(to_bytes(&Value::Array(vec![])).unwrap(), None);
        assert_eq!(to_bytes(&Value::Map(vec![])).unwrap(), None);
    }

    #[test]
    fn raw32_strips_marker() {
        let mut wire = vec![PUBLIC_KEY_TYPE];
        wire.extend_from_slice(&[7u8; 32]);
        assert_eq!(raw32(&wire).unwrap(), [7u8; 32]);
        assert_eq!(raw32(&[7u8; 32]).unwrap(), [7u8; 32]);
    }

    #[test]
    fn raw32_takes_prefix_of_longer_input() {
        let mut long = vec![1u8; 32];
        long.extend_from_slice(&[2u8; 8]);
        assert_eq!(raw32(&long).unwrap(), [1u8; 32]);
    }

    #[test]
    fn raw32_rejects_short_input() {
        assert_eq!(raw32(&[1u8; 31]), Err(BytesError::KeyTooShort(31)));
        assert_eq!(to_raw32(&Value::Bool(true)), Err(BytesError::NotByteLike));
    }

    #[test]
    fn wire33_prefixes_raw_keys() {
        let wire = wire33(&[9u8; 32]).unwrap();
        assert_eq!(wire[0], PUBLIC_KEY_TYPE);
        assert_eq!(&wire[1..], &[9u8; 32]);
        assert_eq!(wire33(&wire).unwrap(), wire);
    }

    #[test]
    fn deep_normalize_rewrites_nested_leaves() {
        let value = Value::Map(vec![
            (text("seed"), text("0a0b")),
            (text("keys"), Value::Array(vec![Value::Map(vec![(text("seed"), ints(&[1, 2]))])])),
            (text("iteration"), Value::Integer(4.into())),
            (text("empty"), Value::Array(vec![])),
        ]);
        let expected = Value::Map(vec![
            (text("seed"), Value::Bytes(vec![0x0a, 0x0b])),
            (
                text("keys"),
                Value::Array(vec![Value::Map(vec![(text("seed"), Value::Bytes(vec![1, 2]))])]),
            ),
            (text("iteration"), Value::Integer(4.into())),
            (text("empty"), Value::Array(vec![])),
        ]);
        assert_eq!(deep_normalize_bytes(&value).unwrap(), expected);
    }

    #[test]
    fn deep_normalize_rejects_excessive_nesting() {
        let mut value = Value::Null;
        for _ in 0..=MAX_DEPTH + 1 {
            value = Value::Array(vec![value]);
        }
        assert_eq!(deep_normalize_bytes(&value), Err(BytesError::TooDeep));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<Vec<u8>>().prop_map(Value::Bytes),
            any::<u16>().prop_map(|n| Value::Integer(n.into())),
            "[a-z.]{0,12}".prop_map(Value::Text),
            "[0-9a-f]{2,16}".prop_map(Value::Text),
            Just(Value::Null),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::vec(("[a-z]{1,6}".prop_map(Value::Text), inner), 0..4)
                    .prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn deep_normalize_is_idempotent(value in arb_value()) {
            if let Ok(once) = deep_normalize_bytes(&value) {
                prop_assert_eq!(deep_normalize_bytes(&once).unwrap(), once);
            }
        }

        #[test]
        fn raw_wire_round_trip(key in any::<[u8; 32]>()) {
            let wire = wire33(&key).unwrap();
            prop_assert_eq!(raw32(&wire).unwrap(), key);
        }

        #[test]
        fn marked_wire_key_yields_trailing_bytes(key in any::<[u8; 32]>()) {
            let mut wire = vec![PUBLIC_KEY_TYPE];
            wire.extend_from_slice(&key);
            prop_assert_eq!(to_raw32(&Value::Bytes(wire)).unwrap(), key);
        }
    }
}
