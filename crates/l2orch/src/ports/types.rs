//! VLAN, VLAN member and bridge port bookkeeping types.

use sonic_orch_common::{schema::CONFIG_DB_SEPARATOR, HasRefCount, TaskError, TaskResult};
use sonic_sai::{BridgePortOid, PortOid, VlanMemberOid, VlanOid};
use sonic_types::{VlanId, VlanTaggingMode};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::AtomicU64;

/// Change PortsOrch announces to the FDB side.
///
/// Creation signals are sent after the object is published in the id maps,
/// removal signals after the hardware object and its FDB entries are gone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortChange {
    VlanCreated(VlanId),
    VlanRemoved(VlanId),
    BridgePortCreated(String),
    BridgePortRemoved(String),
}

impl fmt::Display for PortChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortChange::VlanCreated(vlan_id) => write!(f, "vlan {} created", vlan_id.alias()),
            PortChange::VlanRemoved(vlan_id) => write!(f, "vlan {} removed", vlan_id.alias()),
            PortChange::BridgePortCreated(iface) => write!(f, "bridge port {} created", iface),
            PortChange::BridgePortRemoved(iface) => write!(f, "bridge port {} removed", iface),
        }
    }
}

/// A VLAN known to PortsOrch.
#[derive(Debug, Clone)]
pub struct VlanInfo {
    pub vlan_id: VlanId,
    pub oid: VlanOid,
    /// Interfaces that are members, by alias.
    pub members: BTreeSet<String>,
}

impl VlanInfo {
    pub fn new(vlan_id: VlanId, oid: VlanOid) -> Self {
        Self {
            vlan_id,
            oid,
            members: BTreeSet::new(),
        }
    }

    pub fn has_members(&self) -> bool {
        !self.members.is_empty()
    }
}

/// A programmed VLAN member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanMemberInfo {
    pub member_oid: VlanMemberOid,
    pub bridge_port_oid: BridgePortOid,
    pub tagging_mode: VlanTaggingMode,
}

/// A bridge port, shared by every VLAN the interface is a member of.
#[derive(Debug, Clone)]
pub struct BridgePortInfo {
    pub oid: BridgePortOid,
    pub port_oid: PortOid,
    ref_count: u32,
}

impl BridgePortInfo {
    pub fn new(oid: BridgePortOid, port_oid: PortOid) -> Self {
        Self {
            oid,
            port_oid,
            ref_count: 0,
        }
    }
}

impl HasRefCount for BridgePortInfo {
    fn increment_ref(&mut self) -> u32 {
        self.ref_count += 1;
        self.ref_count
    }

    fn decrement_ref(&mut self) -> Option<u32> {
        self.ref_count = self.ref_count.checked_sub(1)?;
        Some(self.ref_count)
    }

    fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Key of a VLAN_MEMBER record (`Vlan2|Ethernet0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VlanMemberKey {
    pub vlan_id: VlanId,
    pub iface: String,
}

impl VlanMemberKey {
    pub fn parse(key: &str) -> TaskResult<Self> {
        let (vlan, iface) = key.split_once(CONFIG_DB_SEPARATOR).ok_or_else(|| {
            TaskError::malformed(format!("VLAN member key {:?} has no interface", key))
        })?;
        if iface.is_empty() {
            return Err(TaskError::malformed(format!(
                "VLAN member key {:?} has an empty interface",
                key
            )));
        }
        Ok(Self {
            vlan_id: VlanId::from_alias(vlan)?,
            iface: iface.to_string(),
        })
    }
}

impl fmt::Display for VlanMemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.vlan_id.alias(), CONFIG_DB_SEPARATOR, self.iface)
    }
}

/// PortsOrch configuration.
#[derive(Debug, Clone)]
pub struct PortsOrchConfig {
    /// Events pulled per table per pass.
    pub batch_size: usize,
}

impl Default for PortsOrchConfig {
    fn default() -> Self {
        Self { batch_size: 128 }
    }
}

/// PortsOrch counters, readable while the orch runs in its own task.
#[derive(Debug, Default)]
pub struct PortsOrchStats {
    pub vlans_created: AtomicU64,
    pub vlans_removed: AtomicU64,
    pub members_created: AtomicU64,
    pub members_updated: AtomicU64,
    pub members_removed: AtomicU64,
    pub bridge_ports_created: AtomicU64,
    pub bridge_ports_removed: AtomicU64,
    pub fdb_entries_flushed: AtomicU64,
}
