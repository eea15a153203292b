//! 1:1 encrypt and decrypt over stored sessions.
//!
//! Every operation holds the address lock across load, engine call and
//! store, so concurrent calls for one address see each other's chain state.
//! A failed operation leaves the stored record untouched.

use std::sync::Arc;

use ciborium::Value;
use signet_crypto::{EnvelopeKind, KeyPair, LocalKeyBundle, SignedPreKeyRecord};
use tracing::{debug, warn};

use super::local_identity;
use crate::{
    address::ProtocolAddress,
    bytes::{self, BytesError, RAW_KEY_LEN, deep_normalize_bytes},
    engine::{Engine, unix_millis},
    error::SessionError,
    fields,
    record::SessionRecord,
    registry::{self, session_key},
    store::{PreKey, SessionStore, SignedPreKey},
};

/// Wire type of a whisper message
pub const WHISPER_TYPE: u8 = 1;

/// Wire type of a prekey whisper message
pub const PREKEY_TYPE: u8 = 3;

/// Length of the placeholder signature used when a store kept none
const SIGNATURE_LEN: usize = 64;

const RATCHET_KEY: &[&str] = &["ratchetKey", "ratchetPubKey", "senderRatchetKey"];
const SIGNED_PRE_KEY_ID: &[&str] = &["localSignedPreKeyId", "signedPreKeyId"];
const ONE_TIME_PRE_KEY_ID: &[&str] = &["localOneTimeKeyId", "preKeyId"];

/// Kind of an outgoing 1:1 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Message on an established session
    Whisper = WHISPER_TYPE,
    /// Session-establishing message
    PreKey = PREKEY_TYPE,
}

impl MessageType {
    /// Wire code.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        match code {
            WHISPER_TYPE => Ok(Self::Whisper),
            PREKEY_TYPE => Ok(Self::PreKey),
            other => Err(other),
        }
    }
}

impl From<EnvelopeKind> for MessageType {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::PreKey => Self::PreKey,
            EnvelopeKind::Whisper => Self::Whisper,
        }
    }
}

/// Encrypted 1:1 message ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiphertextMessage {
    /// Message kind
    pub kind: MessageType,
    /// Encoded wire message
    pub body: Vec<u8>,
}

/// Encrypts to and decrypts from one remote device.
pub struct SessionCipher<S: SessionStore> {
    store: S,
    addr: ProtocolAddress,
    engine: Arc<dyn Engine>,
}

impl<S: SessionStore> SessionCipher<S> {
    /// Cipher using the process-wide engine.
    pub fn new(store: S, addr: ProtocolAddress) -> Self {
        Self::with_engine(store, addr, registry::engine())
    }

    /// Cipher using `engine`.
    pub fn with_engine(store: S, addr: ProtocolAddress, engine: Arc<dyn Engine>) -> Self {
        Self { store, addr, engine }
    }

    /// Remote address.
    pub fn addr(&self) -> &ProtocolAddress {
        &self.addr
    }

    /// Encrypt `plaintext` on the stored session.
    ///
    /// The first message after [`SessionBuilder::init_outgoing`] is a
    /// [`MessageType::PreKey`]; later ones are [`MessageType::Whisper`].
    ///
    /// [`SessionBuilder::init_outgoing`]: super::SessionBuilder::init_outgoing
    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<CiphertextMessage, SessionError> {
        let address = self.addr.to_string();
        let _guard = registry::locks().lock(session_key(&address)).await;

        let state = self.load_state(&address).await?;
        let (state, envelope) =
            self.engine.encrypt(&state, plaintext).map_err(SessionError::engine("encrypt"))?;
        self.store.store_session(&address, SessionRecord::new(state)).await?;

        debug!(address = %address, kind = envelope.kind.as_str(), "session state advanced");
        Ok(CiphertextMessage { kind: envelope.kind.into(), body: envelope.ciphertext })
    }

    /// Decrypt a whisper message on the stored session.
    pub async fn decrypt_whisper_message(
        &self,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        let address = self.addr.to_string();
        let _guard = registry::locks().lock(session_key(&address)).await;

        let state = self.load_state(&address).await?;
        let message = self
            .engine
            .deserialize_message(ciphertext)
            .map_err(|err| SessionError::Deserialize { kind: "SignalMessage", code: err.code })?;
        if fields::first(&message, RATCHET_KEY).is_none() {
            return Err(SessionError::MissingRatchetKey);
        }

        let (state, plaintext) = self
            .engine
            .decrypt(&state, &message)
            .map_err(SessionError::engine("decryptMsgFromSession"))?;
        self.store.store_session(&address, SessionRecord::new(state)).await?;

        debug!(address = %address, "session state advanced");
        Ok(plaintext)
    }

    /// Decrypt a prekey whisper message, establishing or continuing a
    /// session.
    ///
    /// A one-time prekey used by the message is removed from the store
    /// afterwards. Removal is best-effort: a failure is logged and the
    /// plaintext is still returned.
    pub async fn decrypt_pre_key_whisper_message(
        &self,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        let message = self
            .engine
            .deserialize_prekey_message(ciphertext)
            .map_err(|err| SessionError::InvalidPreKeyMessage(err.code))?;

        let address = self.addr.to_string();
        let _guard = registry::locks().lock(session_key(&address)).await;

        let local = local_identity(&self.store).await?;
        let stored = self.store.load_session(&address).await?.and_then(SessionRecord::into_state);
        let existing = match stored {
            Some(state) => Some(deep_normalize_bytes(&state)?),
            None => None,
        };

        let signed_id = fields::first(&message, SIGNED_PRE_KEY_ID)
            .and_then(fields::as_u32)
            .ok_or_else(|| {
                SessionError::InvalidPreKeyMessage("signed prekey id missing".to_string())
            })?;
        let one_time_id = fields::first(&message, ONE_TIME_PRE_KEY_ID).and_then(fields::as_u32);

        let signed = self
            .store
            .load_signed_pre_key(signed_id)
            .await?
            .ok_or(SessionError::SignedPreKeyNotFound(signed_id))?;
        let signed_pre_key = self
            .engine
            .serialize_signed_pre_key(&signed_pre_key_record(signed_id, &signed)?)
            .map_err(SessionError::engine("serializeSignedPreKey"))?;

        let one_time_pre_key = match one_time_id {
            Some(id) => {
                let pre_key =
                    self.store.load_pre_key(id).await?.ok_or(SessionError::PreKeyNotFound(id))?;
                Some(self.serialize_pre_key(id, &pre_key)?)
            },
            None => None,
        };

        let keys = LocalKeyBundle { signed_pre_key, one_time_pre_key };
        let (state, plaintext) = self
            .engine
            .decrypt_prekey_message(&local, existing.as_ref(), &message, &keys)
            .map_err(SessionError::engine("decryptPkMsgWithNewSession"))?;
        self.store.store_session(&address, SessionRecord::new(state)).await?;
        debug!(address = %address, signed_pre_key_id = signed_id, "incoming session stored");

        if let Some(id) = one_time_id {
            if let Err(err) = self.store.remove_pre_key(id).await {
                warn!(
                    address = %address,
                    pre_key_id = id,
                    error = %err,
                    "failed to remove used prekey"
                );
            }
        }
        Ok(plaintext)
    }

    /// True when a session with state is stored for the address.
    pub async fn has_open_session(&self) -> Result<bool, SessionError> {
        let record = self.store.load_session(&self.addr.to_string()).await?;
        Ok(record.is_some_and(|r| !r.is_empty()))
    }

    async fn load_state(&self, address: &str) -> Result<Value, SessionError> {
        let state = self
            .store
            .load_session(address)
            .await?
            .and_then(SessionRecord::into_state)
            .ok_or_else(|| SessionError::NoSession(address.to_string()))?;
        Ok(deep_normalize_bytes(&state)?)
    }

    /// Encode a stored one-time prekey and check the engine reads it back.
    fn serialize_pre_key(&self, id: u32, pre_key: &PreKey) -> Result<Vec<u8>, SessionError> {
        let private = key_bytes(&pre_key.private_key)?;
        let public = key_bytes(&pre_key.public_key)?;
        check_len("prekey private key", &private)?;
        check_len("prekey public key", &public)?;

        let encoded = self
            .engine
            .serialize_pre_key(id, &bytes::wire33(&public)?, &private)
            .map_err(SessionError::engine("serializePreKey"))?;

        let decoded = self
            .engine
            .deserialize_pre_key(&encoded)
            .map_err(|_| SessionError::PreKeyRoundTripFailed)?;
        if decoded.id != id {
            return Err(SessionError::PreKeyRoundTrip { expected: id, actual: decoded.id });
        }
        Ok(encoded)
    }
}

/// Signed prekey record from stored values.
///
/// An absent or null signature becomes 64 zero bytes; a present one must be
/// byte-like. A missing timestamp becomes the current time, a missing public
/// key the one derived from the private key.
fn signed_pre_key_record(
    id: u32,
    signed: &SignedPreKey,
) -> Result<SignedPreKeyRecord, SessionError> {
    let private_key = bytes::to_raw32(&signed.key_pair.private_key)?;
    let key_pair = if signed.key_pair.public_key.is_null() {
        KeyPair::from_private(private_key)
    } else {
        KeyPair { public_key: bytes::to_raw32(&signed.key_pair.public_key)?, private_key }
    };

    let signature = match &signed.signature {
        Some(value) if !value.is_null() => {
            Some(bytes::to_bytes(value)?.ok_or(BytesError::NotByteLike)?)
        },
        _ => None,
    };

    Ok(SignedPreKeyRecord {
        id,
        timestamp: signed.timestamp.unwrap_or_else(unix_millis),
        key_pair,
        signature: signature.unwrap_or_else(|| vec![0; SIGNATURE_LEN]),
    })
}

fn key_bytes(value: &Value) -> Result<Vec<u8>, SessionError> {
    if value.is_null() {
        return Err(SessionError::PreKeyMissingKeys);
    }
    bytes::to_bytes(value)?.ok_or(SessionError::PreKeyMissingKeys)
}

fn check_len(what: &'static str, key: &[u8]) -> Result<(), SessionError> {
    if key.len() == RAW_KEY_LEN {
        Ok(())
    } else {
        Err(SessionError::KeyLength { what, expected: RAW_KEY_LEN, actual: key.len() })
    }
}
