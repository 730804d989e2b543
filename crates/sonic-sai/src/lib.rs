//! SAI (Switch Abstraction Interface) layer for the bridge orchestration agents.
//!
//! The crate is organized into several modules:
//!
//! - [`types`]: type-safe object IDs carrying their SAI object type
//! - [`error`]: status codes and the [`SaiError`] type
//! - [`api`]: the [`SaiApi`] trait the agents program the switch through,
//!   plus FDB keys, flush filters and notifications
//! - [`virtual_switch`]: [`VirtualSwitch`], an in-process implementation
//!   that records every object in ASIC_DB
//!
//! # Example
//!
//! ```ignore
//! use sonic_sai::{SaiApi, SaiResult, VlanMemberOid};
//!
//! fn add_member(sai: &dyn SaiApi, vlan: VlanId, alias: &str) -> SaiResult<VlanMemberOid> {
//!     let vlan_oid = sai.create_vlan(vlan)?;
//!     let port = sai.port_id(alias).expect("front-panel port");
//!     let bridge_port = sai.create_bridge_port(port)?;
//!     sai.create_vlan_member(vlan_oid, bridge_port, VlanTaggingMode::Untagged)
//! }
//! ```

pub mod api;
pub mod error;
pub mod types;
pub mod virtual_switch;

pub use api::{
    FdbEntryAttrs, FdbEvent, FdbEventType, FdbFlushFilter, SaiApi, SaiFdbEntry,
};
pub use error::{SaiError, SaiResult, SaiStatus};
pub use types::{
    BridgePortKind, BridgePortOid, PortKind, PortOid, RawSaiObjectId, SaiObjectId,
    SaiObjectKind, SwitchKind, SwitchOid, VlanKind, VlanMemberKind, VlanMemberOid, VlanOid,
};
pub use virtual_switch::{VirtualSwitch, VirtualSwitchConfig};
