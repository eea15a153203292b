//! Alias-path lookup over dynamic maps.
//!
//! Bundles, stored key records and parsed engine messages have carried
//! several field names over time. Lookups take an ordered list of dotted
//! paths and return the first one that resolves to a non-null value.

use ciborium::Value;

/// Value under `key` in a map, if `value` is a map.
pub fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_map()?.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v)
}

/// Mutable value under `key` in a map.
pub fn get_mut<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    value.as_map_mut()?.iter_mut().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v)
}

/// Insert or replace `key` in a map. No-op on non-maps.
pub fn set(value: &mut Value, key: &str, new: Value) {
    let Some(entries) = value.as_map_mut() else {
        return;
    };
    match entries.iter_mut().find(|(k, _)| k.as_text() == Some(key)) {
        Some((_, slot)) => *slot = new,
        None => entries.push((Value::Text(key.to_string()), new)),
    }
}

/// Resolve one dotted path. Every segment must exist and the final value
/// must be non-null.
pub fn path<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    let found = dotted.split('.').try_fold(value, |node, segment| get(node, segment))?;
    (!found.is_null()).then_some(found)
}

/// First of `paths` that resolves.
pub fn first<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| path(value, p))
}

/// Integer id from an integer or decimal text.
pub fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}

/// Non-negative integer from an integer, an integral float or decimal text.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(int) => u64::try_from(i128::from(*int)).ok(),
        Value::Text(text) => text.trim().parse().ok(),
        Value::Float(float)
            if float.fract() == 0.0 && (0.0..=9.007_199_254_740_991e15).contains(float) =>
        {
            Some(*float as u64)
        },
        _ => None,
    }
}

/// Shorthand for building a text-keyed map.
pub fn map<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (Value::Text(k.to_string()), v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> Value {
        map([
            ("identityKey", Value::Bytes(vec![1])),
            (
                "signedPreKey",
                map([("keyId", Value::Integer(9.into())), ("publicKey", Value::Null)]),
            ),
            ("signedKey", map([("keyPair", map([("pubKey", Value::Bytes(vec![2]))]))])),
        ])
    }

    #[test]
    fn first_match_wins() {
        let bundle = bundle();
        assert_eq!(
            first(&bundle, &["identity", "identityKey", "pubKey"]),
            Some(&Value::Bytes(vec![1]))
        );
    }

    #[test]
    fn null_does_not_match() {
        let bundle = bundle();
        let found = first(&bundle, &["signedPreKey.publicKey", "signedKey.keyPair.pubKey"]);
        assert_eq!(found, Some(&Value::Bytes(vec![2])));
    }

    #[test]
    fn partial_path_does_not_match() {
        let bundle = bundle();
        assert_eq!(path(&bundle, "signedPreKey.keyPair.publicKey"), None);
        assert_eq!(path(&bundle, "identityKey.inner"), None);
    }

    #[test]
    fn ids_from_integers_and_text() {
        assert_eq!(as_u32(&Value::Integer(7.into())), Some(7));
        assert_eq!(as_u32(&Value::Text("42".into())), Some(42));
        assert_eq!(as_u32(&Value::Float(3.0)), Some(3));
        assert_eq!(as_u32(&Value::Float(3.5)), None);
        assert_eq!(as_u32(&Value::Integer((-1).into())), None);
        assert_eq!(as_u32(&Value::Text("x".into())), None);
    }

    #[test]
    fn set_replaces_and_appends() {
        let mut value = map([("a", Value::Integer(1.into()))]);
        set(&mut value, "a", Value::Integer(2.into()));
        set(&mut value, "b", Value::Bool(true));
        assert_eq!(get(&value, "a"), Some(&Value::Integer(2.into())));
        assert_eq!(get(&value, "b"), Some(&Value::Bool(true)));
    }
}
