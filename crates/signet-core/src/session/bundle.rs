//! Prekey bundle parsing.
//!
//! Bundles reach us from several generations of key servers, so every field
//! is looked up through an ordered alias list. The first alias that resolves
//! to a non-null value wins.

use ciborium::Value;
use signet_crypto::{OneTimePreKeyPublic, PreKeyBundle};

use crate::{
    bytes::to_wire33,
    error::{BundleError, BundleField, SessionError},
    fields,
};

const IDENTITY: &[&str] = &["identity", "identityKey", "pubKey", "signedPreKeyBundle.identityKey"];

const SIGNED_PUBLIC: &[&str] = &[
    "signedKey.publicKey",
    "signedPreKey.publicKey",
    "signed.publicKey",
    "signedPreKey.keyPair.publicKey",
    "signedPreKey.keyPair.pubKey",
    "signedKey.keyPair.publicKey",
    "signedKey.keyPair.pubKey",
];

const SIGNED_ID: &[&str] =
    &["signedKey.id", "signedPreKey.id", "signedPreKey.keyId", "signed.id", "signedKey.keyId"];

const ONE_TIME_PUBLIC: &[&str] = &[
    "oneTimeKey.publicKey",
    "preKey.publicKey",
    "preKey.keyPair.publicKey",
    "preKey.keyPair.pubKey",
];

const ONE_TIME_ID: &[&str] = &["oneTimeKey.id", "preKey.id", "preKey.keyId"];

const RATCHET: &[&str] = &["ratchetKey", "baseKey", "ephemeralKey"];

const REGISTRATION_ID: &[&str] = &["regId", "registrationId"];

/// Resolve and normalize a peer's prekey bundle.
///
/// Identity, signed public key and signed key id are required. The one-time
/// key counts only when both its public key and id are present. The ratchet
/// key defaults to the signed public key; the registration id to 0.
pub fn parse_bundle(bundle: &Value) -> Result<PreKeyBundle, SessionError> {
    let identity = required(bundle, IDENTITY, BundleField::Identity)?;
    let signed_public = required(bundle, SIGNED_PUBLIC, BundleField::SignedPublicKey)?;
    let signed_id = id(required(bundle, SIGNED_ID, BundleField::SignedKeyId)?, "signedKey.id")?;

    let one_time_pre_key =
        match (fields::first(bundle, ONE_TIME_PUBLIC), fields::first(bundle, ONE_TIME_ID)) {
            (Some(public), Some(key_id)) => Some(OneTimePreKeyPublic {
                id: id(key_id, "oneTimeKey.id")?,
                public_key: to_wire33(public)?,
            }),
            _ => None,
        };

    let signed_pre_key = to_wire33(signed_public)?;
    let ratchet_key = match fields::first(bundle, RATCHET) {
        Some(ratchet) => to_wire33(ratchet)?,
        None => signed_pre_key,
    };

    let registration_id = match fields::first(bundle, REGISTRATION_ID) {
        Some(value) => id(value, "registrationId")?,
        None => 0,
    };

    Ok(PreKeyBundle {
        registration_id,
        identity_key: to_wire33(identity)?,
        signed_pre_key_id: signed_id,
        signed_pre_key,
        one_time_pre_key,
        ratchet_key,
    })
}

fn required<'a>(
    bundle: &'a Value,
    paths: &[&str],
    field: BundleField,
) -> Result<&'a Value, BundleError> {
    fields::first(bundle, paths).ok_or(BundleError::MissingField(field))
}

fn id(value: &Value, what: &'static str) -> Result<u32, BundleError> {
    fields::as_u32(value).ok_or(BundleError::InvalidId(what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::map;

    fn key(fill: u8) -> Value {
        Value::Bytes(vec![fill; 32])
    }

    fn marked(fill: u8) -> [u8; 33] {
        let mut out = [fill; 33];
        out[0] = 0x05;
        out
    }

    #[test]
    fn current_field_names() {
        let bundle = map([
            ("identityKey", key(1)),
            ("signedPreKey", map([("keyId", Value::Integer(4.into())), ("publicKey", key(2))])),
            ("preKey", map([("keyId", Value::Integer(9.into())), ("publicKey", key(3))])),
            ("registrationId", Value::Integer(77.into())),
        ]);
        let parsed = parse_bundle(&bundle).unwrap();

        assert_eq!(parsed.identity_key, marked(1));
        assert_eq!(parsed.signed_pre_key_id, 4);
        assert_eq!(parsed.signed_pre_key, marked(2));
        assert_eq!(
            parsed.one_time_pre_key,
            Some(OneTimePreKeyPublic { id: 9, public_key: marked(3) })
        );
        assert_eq!(parsed.ratchet_key, marked(2));
        assert_eq!(parsed.registration_id, 77);
    }

    #[test]
    fn legacy_field_names_and_text_encodings() {
        let hex_identity = format!("05{}", "11".repeat(32));
        let bundle = map([
            ("pubKey", Value::Text(hex_identity)),
            (
                "signedKey",
                map([("id", Value::Text("12".into())), ("keyPair", map([("pubKey", key(2))]))]),
            ),
            ("ratchetKey", key(6)),
            ("regId", Value::Integer(3.into())),
        ]);
        let parsed = parse_bundle(&bundle).unwrap();

        assert_eq!(parsed.identity_key, marked(0x11));
        assert_eq!(parsed.signed_pre_key_id, 12);
        assert_eq!(parsed.ratchet_key, marked(6));
        assert_eq!(parsed.one_time_pre_key, None);
    }

    #[test]
    fn one_time_key_needs_both_halves() {
        let bundle = map([
            ("identity", key(1)),
            ("signed", map([("id", Value::Integer(1.into())), ("publicKey", key(2))])),
            ("oneTimeKey", map([("publicKey", key(3))])),
        ]);
        assert_eq!(parse_bundle(&bundle).unwrap().one_time_pre_key, None);
    }

    #[test]
    fn missing_required_fields() {
        let err = parse_bundle(&map([])).unwrap_err();
        assert_eq!(err.to_string(), "bundle.identity missing");

        let err = parse_bundle(&map([("identity", key(1))])).unwrap_err();
        assert_eq!(err.to_string(), "bundle.signedKey.publicKey missing");

        let bundle = map([("identity", key(1)), ("signedKey", map([("publicKey", key(2))]))]);
        let err = parse_bundle(&bundle).unwrap_err();
        assert_eq!(err.to_string(), "bundle.signedKey.id missing");
    }

    #[test]
    fn null_alias_falls_through() {
        let bundle = map([
            ("identity", Value::Null),
            ("identityKey", key(1)),
            ("signedKey", map([("id", Value::Integer(1.into())), ("publicKey", key(2))])),
        ]);
        assert_eq!(parse_bundle(&bundle).unwrap().identity_key, marked(1));
    }

    #[test]
    fn non_numeric_id_is_invalid() {
        let bundle = map([
            ("identity", key(1)),
            ("signedKey", map([("id", Value::Text("first".into())), ("publicKey", key(2))])),
        ]);
        assert_eq!(
            parse_bundle(&bundle),
            Err(SessionError::Bundle(BundleError::InvalidId("signedKey.id")))
        );
    }
}
