//! MAC address type with canonical formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// Parsing accepts colon or hyphen separators in either case. Display always
/// produces the canonical form used in `FDB_TABLE` keys and ASIC_STATE FDB
/// keys: upper-case hex octets joined by hyphens.
///
/// # Examples
///
/// ```
/// use sonic_types::MacAddress;
///
/// let mac: MacAddress = "52:54:00:25:06:e9".parse().unwrap();
/// assert_eq!(mac.to_string(), "52-54-00-25-06-E9");
///
/// let mac2: MacAddress = "52-54-00-25-06-E9".parse().unwrap();
/// assert_eq!(mac, mac2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The broadcast MAC address (FF-FF-FF-FF-FF-FF).
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// The zero MAC address.
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns true if the group bit is set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Returns true if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Returns true if the address can be installed as an FDB destination.
    ///
    /// Multicast (including broadcast) and all-zero addresses are never
    /// learned or provisioned as unicast forwarding entries.
    pub fn is_valid_fdb_target(&self) -> bool {
        !self.is_multicast() && !self.is_zero()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}-{:02X}-{:02X}-{:02X}-{:02X}-{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());
        let separator = if s.contains(':') { ':' } else { '-' };

        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.trim().split(separator) {
            if count == 6 || part.len() != 2 {
                return Err(invalid());
            }
            bytes[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            count += 1;
        }

        if count != 6 {
            return Err(invalid());
        }
        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_colon_lowercase() {
        let mac: MacAddress = "52:54:00:25:06:e9".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x52, 0x54, 0x00, 0x25, 0x06, 0xe9]);
    }

    #[test]
    fn test_parse_hyphen_uppercase() {
        let mac: MacAddress = "52-54-00-25-06-E9".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x52, 0x54, 0x00, 0x25, 0x06, 0xe9]);
    }

    #[test]
    fn test_display_is_canonical() {
        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(mac.to_string(), "AA-BB-CC-DD-EE-FF");
    }

    #[test]
    fn test_mixed_case_inputs_normalize_to_same_key() {
        let a: MacAddress = "aa:BB:cc:DD:ee:FF".parse().unwrap();
        let b: MacAddress = "AA-bb-CC-dd-EE-ff".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_fdb_target_validity() {
        assert!(!MacAddress::BROADCAST.is_valid_fdb_target());
        assert!(!MacAddress::ZERO.is_valid_fdb_target());
        let multicast: MacAddress = "01:00:5e:00:00:01".parse().unwrap();
        assert!(!multicast.is_valid_fdb_target());
        let unicast: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        assert!(unicast.is_valid_fdb_target());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"00-11-22-33-44-55\"");
        let back: MacAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }

    #[test]
    fn test_invalid_format() {
        assert!("invalid".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<MacAddress>().is_err());
        assert!("gg:11:22:33:44:55".parse::<MacAddress>().is_err());
        assert!("0:11:22:33:44:55".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }
}
