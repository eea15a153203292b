//! CBOR helpers shared by state and wire encodings.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::CryptoError;

pub(crate) fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, CryptoError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CryptoError::malformed(what, e))?;
    Ok(buf)
}

pub(crate) fn decode<T: DeserializeOwned>(
    what: &'static str,
    bytes: &[u8],
) -> Result<T, CryptoError> {
    ciborium::from_reader(bytes).map_err(|e| CryptoError::malformed(what, e))
}
