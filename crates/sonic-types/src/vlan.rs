//! VLAN ID type with validation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of VLAN interface names (`Vlan100`).
pub const VLAN_PREFIX: &str = "Vlan";

/// IEEE 802.1Q VLAN identifier (1-4094).
///
/// # Examples
///
/// ```
/// use sonic_types::VlanId;
///
/// let vlan = VlanId::new(100).unwrap();
/// assert_eq!(vlan.as_u16(), 100);
/// assert_eq!(vlan.alias(), "Vlan100");
///
/// assert!(VlanId::new(0).is_err());
/// assert!(VlanId::new(4095).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Minimum valid VLAN ID.
    pub const MIN: u16 = 1;

    /// Maximum valid VLAN ID.
    pub const MAX: u16 = 4094;

    /// Default VLAN ID (VLAN 1), created by the switch at init.
    pub const DEFAULT: VlanId = VlanId(1);

    /// Creates a new VLAN ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the VLAN ID is not in the valid range (1-4094).
    pub fn new(id: u16) -> Result<Self, ParseError> {
        if (Self::MIN..=Self::MAX).contains(&id) {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id.to_string()))
        }
    }

    /// Parses a VLAN alias such as `Vlan100`.
    ///
    /// Unlike [`FromStr`], the `Vlan` prefix is mandatory: configuration keys
    /// are always aliases, and a bare number there is malformed.
    pub fn from_alias(alias: &str) -> Result<Self, ParseError> {
        let id = alias
            .strip_prefix(VLAN_PREFIX)
            .ok_or_else(|| ParseError::InvalidVlanId(alias.to_string()))?;
        id.parse::<u16>()
            .map_err(|_| ParseError::InvalidVlanId(alias.to_string()))
            .and_then(VlanId::new)
    }

    /// Returns the VLAN ID as a u16.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the interface alias (`Vlan<id>`).
    pub fn alias(&self) -> String {
        format!("{}{}", VLAN_PREFIX, self.0)
    }

    /// Returns true if this is the default VLAN (VLAN 1).
    pub const fn is_default(&self) -> bool {
        self.0 == 1
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    /// Accepts either a bare number (`100`, the `vlanid` field) or an alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(VLAN_PREFIX) {
            return VlanId::from_alias(s);
        }
        let id: u16 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidVlanId(s.to_string()))?;
        VlanId::new(id)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_vlan_ids() {
        assert!(VlanId::new(1).is_ok());
        assert!(VlanId::new(100).is_ok());
        assert!(VlanId::new(4094).is_ok());
    }

    #[test]
    fn test_invalid_vlan_ids() {
        assert!(VlanId::new(0).is_err());
        assert!(VlanId::new(4095).is_err());
        assert!(VlanId::new(65535).is_err());
    }

    #[test]
    fn test_parse_numeric_field() {
        let vlan: VlanId = "2".parse().unwrap();
        assert_eq!(vlan.as_u16(), 2);
    }

    #[test]
    fn test_from_alias() {
        assert_eq!(VlanId::from_alias("Vlan2").unwrap().as_u16(), 2);
        assert_eq!("Vlan4094".parse::<VlanId>().unwrap().as_u16(), 4094);
        assert!(VlanId::from_alias("2").is_err());
        assert!(VlanId::from_alias("Vlan").is_err());
        assert!(VlanId::from_alias("Vlan0").is_err());
        assert!(VlanId::from_alias("VlanX").is_err());
    }

    #[test]
    fn test_alias_round_trip() {
        let vlan = VlanId::new(100).unwrap();
        assert_eq!(vlan.alias(), "Vlan100");
        assert_eq!(VlanId::from_alias(&vlan.alias()).unwrap(), vlan);
    }

    #[test]
    fn test_default_vlan() {
        assert!(VlanId::DEFAULT.is_default());
        assert!(!VlanId::new(100).unwrap().is_default());
    }
}
