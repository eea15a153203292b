//! Device addresses and sender-key names.
//!
//! A [`ProtocolAddress`] names one device of a user and is the session store
//! key (`"<id>.<device>"`). A [`SenderKeyName`] names one device's sender key
//! within a group (`"<group>::<id>.<device>"`).

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Separator between id and device in an encoded address
pub const ADDRESS_SEPARATOR: char = '.';

/// Address validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Id already contains the address separator
    #[error("encoded address used as id: {0}")]
    EncodedId(String),

    /// Encoded address lacks a numeric device segment
    #[error("invalid address encoding: {0}")]
    InvalidEncoding(String),
}

/// One device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolAddress {
    id: String,
    device_id: i32,
}

impl ProtocolAddress {
    /// Address for `id` and `device_id`; `id` must not contain `.`.
    pub fn new(id: impl Into<String>, device_id: i32) -> Result<Self, AddressError> {
        let id = id.into();
        if id.contains(ADDRESS_SEPARATOR) {
            return Err(AddressError::EncodedId(id));
        }
        Ok(Self { id, device_id })
    }

    /// Address for device 0.
    pub fn with_default_device(id: impl Into<String>) -> Result<Self, AddressError> {
        Self::new(id, 0)
    }

    /// User id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Device id.
    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    /// Structural equality.
    pub fn is(&self, other: &Self) -> bool {
        self == other
    }
}

impl FromStr for ProtocolAddress {
    type Err = AddressError;

    /// Parse `"<id>.<device>"`, splitting on the first `.`.
    ///
    /// The device segment is read as a decimal integer and wrapped to 32 bits.
    fn from_str(encoded: &str) -> Result<Self, AddressError> {
        let invalid = || AddressError::InvalidEncoding(encoded.to_string());

        let (id, device) = encoded.split_once(ADDRESS_SEPARATOR).ok_or_else(invalid)?;
        let (negative, digits) = match device.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, device),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let magnitude = digits
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(10).wrapping_add(u32::from(b - b'0')));
        let device_id = (if negative { magnitude.wrapping_neg() } else { magnitude }) as i32;

        Ok(Self { id: id.to_string(), device_id })
    }
}

impl fmt::Display for ProtocolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.id, ADDRESS_SEPARATOR, self.device_id)
    }
}

/// A device's sender key within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderKeyName {
    group_id: String,
    addr: ProtocolAddress,
}

impl SenderKeyName {
    /// Name for `addr` in `group_id`.
    pub fn new(group_id: impl Into<String>, addr: ProtocolAddress) -> Self {
        Self { group_id: group_id.into(), addr }
    }

    /// Name for a raw sender id, taken as device 0 of that id.
    pub fn from_raw(group_id: impl Into<String>, raw: &str) -> Result<Self, AddressError> {
        Ok(Self::new(group_id, ProtocolAddress::with_default_device(raw)?))
    }

    /// Group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Sender address.
    pub fn addr(&self) -> &ProtocolAddress {
        &self.addr
    }
}

impl fmt::Display for SenderKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.group_id, self.addr)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encodes_id_and_device() {
        assert_eq!(ProtocolAddress::new("bob", 2).unwrap().to_string(), "bob.2");
    }

    #[test]
    fn id_with_separator_is_rejected() {
        assert_eq!(
            ProtocolAddress::new("bob.1", 0),
            Err(AddressError::EncodedId("bob.1".to_string()))
        );
    }

    #[test]
    fn missing_device_is_rejected() {
        for encoded in ["alice", "alice.", "alice.x1"] {
            assert!(matches!(
                encoded.parse::<ProtocolAddress>(),
                Err(AddressError::InvalidEncoding(_))
            ));
        }
    }

    #[test]
    fn device_wraps_to_32_bits() {
        let addr: ProtocolAddress = "carol.4294967297".parse().unwrap();
        assert_eq!(addr.device_id(), 1);
        let addr: ProtocolAddress = "carol.-3".parse().unwrap();
        assert_eq!(addr.device_id(), -3);
    }

    #[test]
    fn default_device_is_zero() {
        assert_eq!(ProtocolAddress::with_default_device("dave").unwrap().to_string(), "dave.0");
    }

    #[test]
    fn sender_key_name_encoding() {
        let addr = ProtocolAddress::new("erin", 3).unwrap();
        assert_eq!(SenderKeyName::new("team", addr).to_string(), "team::erin.3");
        assert_eq!(SenderKeyName::from_raw("team", "frank").unwrap().to_string(), "team::frank.0");
        assert!(SenderKeyName::from_raw("team", "frank.1").is_err());
    }

    proptest! {
        #[test]
        fn encode_parse_round_trip(id in "[a-zA-Z0-9_@+-]{0,24}", device in any::<i32>()) {
            let addr = ProtocolAddress::new(id, device).unwrap();
            let parsed: ProtocolAddress = addr.to_string().parse().unwrap();
            prop_assert!(parsed.is(&addr));
        }
    }
}
