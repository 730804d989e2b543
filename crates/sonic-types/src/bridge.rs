//! Bridge object attributes carried in VLAN_MEMBER and FDB_TABLE records.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tagging mode of a VLAN member.
///
/// Configuration writes `tagging_mode` as `tagged`, `untagged` or
/// `priority_tagged`. An absent field means untagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlanTaggingMode {
    #[default]
    Untagged,
    Tagged,
    PriorityTagged,
}

impl VlanTaggingMode {
    /// Returns the SAI enum name for `SAI_VLAN_MEMBER_ATTR_VLAN_TAGGING_MODE`.
    pub const fn sai_name(&self) -> &'static str {
        match self {
            VlanTaggingMode::Untagged => "SAI_VLAN_TAGGING_MODE_UNTAGGED",
            VlanTaggingMode::Tagged => "SAI_VLAN_TAGGING_MODE_TAGGED",
            VlanTaggingMode::PriorityTagged => "SAI_VLAN_TAGGING_MODE_PRIORITY_TAGGED",
        }
    }
}

impl fmt::Display for VlanTaggingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VlanTaggingMode::Untagged => "untagged",
            VlanTaggingMode::Tagged => "tagged",
            VlanTaggingMode::PriorityTagged => "priority_tagged",
        };
        f.write_str(s)
    }
}

impl FromStr for VlanTaggingMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "untagged" => Ok(VlanTaggingMode::Untagged),
            "tagged" => Ok(VlanTaggingMode::Tagged),
            "priority_tagged" => Ok(VlanTaggingMode::PriorityTagged),
            _ => Err(ParseError::InvalidTaggingMode(s.to_string())),
        }
    }
}

/// FDB entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FdbEntryType {
    /// Subject to hardware aging and station moves.
    #[default]
    Dynamic,
    /// Never aged.
    Static,
}

impl FdbEntryType {
    /// Returns the SAI enum name for `SAI_FDB_ENTRY_ATTR_TYPE`.
    pub const fn sai_name(&self) -> &'static str {
        match self {
            FdbEntryType::Dynamic => "SAI_FDB_ENTRY_TYPE_DYNAMIC",
            FdbEntryType::Static => "SAI_FDB_ENTRY_TYPE_STATIC",
        }
    }
}

impl fmt::Display for FdbEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FdbEntryType::Dynamic => f.write_str("dynamic"),
            FdbEntryType::Static => f.write_str("static"),
        }
    }
}

impl FromStr for FdbEntryType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dynamic" => Ok(FdbEntryType::Dynamic),
            "static" => Ok(FdbEntryType::Static),
            _ => Err(ParseError::InvalidFdbEntryType(s.to_string())),
        }
    }
}

/// Forwarding action for frames matching an FDB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketAction {
    #[default]
    Forward,
    Drop,
    Trap,
}

impl PacketAction {
    /// Returns the SAI enum name for `SAI_FDB_ENTRY_ATTR_PACKET_ACTION`.
    pub const fn sai_name(&self) -> &'static str {
        match self {
            PacketAction::Forward => "SAI_PACKET_ACTION_FORWARD",
            PacketAction::Drop => "SAI_PACKET_ACTION_DROP",
            PacketAction::Trap => "SAI_PACKET_ACTION_TRAP",
        }
    }
}

impl fmt::Display for PacketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacketAction::Forward => "forward",
            PacketAction::Drop => "drop",
            PacketAction::Trap => "trap",
        };
        f.write_str(s)
    }
}

impl FromStr for PacketAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(PacketAction::Forward),
            "drop" => Ok(PacketAction::Drop),
            "trap" => Ok(PacketAction::Trap),
            _ => Err(ParseError::InvalidPacketAction(s.to_string())),
        }
    }
}
