//! Fuzz target for byte-like value normalization
//!
//! Feeds arbitrary value trees (text, integer arrays, indexed maps, Node
//! buffer maps, nested containers) through the normalizer.
//!
//! # Invariants
//!
//! - Normalization never panics, however deep or malformed the input
//! - Normalizing a normalized value changes nothing
//! - Any key accepted by `to_wire33` is 33 bytes with the `0x05` marker
//! - Any key accepted by `to_raw32` is the wire key without its marker

#![no_main]

use arbitrary::Arbitrary;
use ciborium::Value;
use libfuzzer_sys::fuzz_target;
use signet_core::bytes::{deep_normalize_bytes, to_raw32, to_wire33, PUBLIC_KEY_TYPE};

#[derive(Debug, Clone, Arbitrary)]
enum Node {
    Bytes(Vec<u8>),
    Text(String),
    Hex(Vec<u8>),
    Integer(i64),
    Ints(Vec<u8>),
    Indexed(Vec<(u16, u8)>),
    Buffer(Vec<u8>),
    Array(Vec<Node>),
    Map(Vec<(String, Node)>),
    Null,
}

impl Node {
    fn to_value(&self, depth: usize) -> Value {
        if depth > 12 {
            return Value::Null;
        }
        match self {
            Node::Bytes(b) => Value::Bytes(b.clone()),
            Node::Text(t) => Value::Text(t.clone()),
            Node::Hex(b) => Value::Text(b.iter().map(|x| format!("{x:02x}")).collect()),
            Node::Integer(i) => Value::Integer((*i).into()),
            Node::Ints(b) => ints(b),
            Node::Indexed(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(i, b)| (Value::Text(i.to_string()), Value::Integer((*b).into())))
                    .collect(),
            ),
            Node::Buffer(b) => Value::Map(vec![
                (Value::Text("type".into()), Value::Text("Buffer".into())),
                (Value::Text("data".into()), ints(b)),
            ]),
            Node::Array(items) => {
                Value::Array(items.iter().map(|n| n.to_value(depth + 1)).collect())
            },
            Node::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, n)| (Value::Text(k.clone()), n.to_value(depth + 1)))
                    .collect(),
            ),
            Node::Null => Value::Null,
        }
    }
}

fn ints(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|x| Value::Integer((*x).into())).collect())
}

fuzz_target!(|node: Node| {
    let value = node.to_value(0);

    if let Ok(once) = deep_normalize_bytes(&value) {
        let twice = deep_normalize_bytes(&once).expect("normalized value must normalize again");
        assert_eq!(once, twice, "normalization must be idempotent");
    }

    if let Ok(wire) = to_wire33(&value) {
        assert_eq!(wire[0], PUBLIC_KEY_TYPE);
        let raw = to_raw32(&value).expect("wire key implies raw key");
        assert_eq!(&wire[1..], &raw[..]);
    }
});
