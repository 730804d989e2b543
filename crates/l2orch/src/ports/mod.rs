//! VLAN, VLAN member and bridge port orchestration.
//!
//! PortsOrch turns CONFIG_DB `VLAN`, `VLAN_MEMBER` and `PORT` records into
//! switch objects:
//!
//! - one VLAN object per `Vlan<id>` key (VLAN 1 exists from switch init)
//! - one bridge port per interface, shared by all of its VLAN memberships
//! - one VLAN member per `Vlan<id>|<iface>` key
//!
//! Creations and removals are announced to FdbOrch as [`PortChange`]s.

mod orch;
mod types;

pub use orch::PortsOrch;
pub use types::{
    BridgePortInfo, PortChange, PortsOrchConfig, PortsOrchStats, VlanInfo, VlanMemberInfo,
    VlanMemberKey,
};
