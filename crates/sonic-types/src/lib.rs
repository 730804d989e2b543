//! Common SONiC types for layer-2 bridge orchestration.
//!
//! Every value that crosses a table boundary as a string is parsed into one
//! of these types before the reconciliation engine acts on it:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC, normalized to `52-54-00-25-06-E9`
//! - [`VlanId`]: IEEE 802.1Q VLAN identifier (1-4094)
//! - [`VlanTaggingMode`], [`FdbEntryType`], [`PacketAction`]: bridge attributes
//! - [`AdminState`]: port administrative state

mod bridge;
mod mac;
mod port;
mod vlan;

pub use bridge::{FdbEntryType, PacketAction, VlanTaggingMode};
pub use mac::MacAddress;
pub use port::AdminState;
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(String),

    #[error("invalid tagging mode: {0}")]
    InvalidTaggingMode(String),

    #[error("invalid FDB entry type: {0}")]
    InvalidFdbEntryType(String),

    #[error("invalid packet action: {0}")]
    InvalidPacketAction(String),

    #[error("invalid admin state: {0}")]
    InvalidAdminState(String),
}
