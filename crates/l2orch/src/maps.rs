//! Shared object-id maps.
//!
//! PortsOrch owns the VLAN and bridge port objects and publishes their SAI
//! ids here; FdbOrch and the notification listener only read. Each map is a
//! forward/reverse pair behind its own lock.
//!
//! Lock order is VLAN map, then bridge port map. Writers take one lock at a
//! time.

use parking_lot::RwLock;
use sonic_orch_common::Constraint;
use sonic_sai::{BridgePortOid, VlanOid};
use sonic_types::VlanId;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Constraint table naming a VLAN prerequisite (`VLAN:Vlan2`).
pub const VLAN_OBJECT: &str = "VLAN";

/// Constraint table naming a bridge port prerequisite (`BRIDGE_PORT:Ethernet0`).
pub const BRIDGE_PORT_OBJECT: &str = "BRIDGE_PORT";

/// An object an FDB entry needs before it can be programmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prerequisite {
    Vlan(VlanId),
    BridgePort(String),
}

impl Prerequisite {
    pub fn constraint(&self) -> Constraint {
        match self {
            Prerequisite::Vlan(vlan_id) => Constraint::new(VLAN_OBJECT, vlan_id.alias()),
            Prerequisite::BridgePort(iface) => Constraint::new(BRIDGE_PORT_OBJECT, iface.as_str()),
        }
    }
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::Vlan(vlan_id) => write!(f, "{}:{}", VLAN_OBJECT, vlan_id.alias()),
            Prerequisite::BridgePort(iface) => write!(f, "{}:{}", BRIDGE_PORT_OBJECT, iface),
        }
    }
}

#[derive(Debug)]
struct BiMap<K, V> {
    forward: HashMap<K, V>,
    reverse: HashMap<V, K>,
}

impl<K, V> Default for BiMap<K, V> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }
}

impl<K, V> BiMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Copy,
{
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.forward.insert(key.clone(), value);
        if let Some(old) = previous {
            self.reverse.remove(&old);
        }
        self.reverse.insert(value, key);
        previous
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.forward.remove(key)?;
        self.reverse.remove(&value);
        Some(value)
    }
}

#[derive(Debug, Default)]
struct IdMapsInner {
    vlans: RwLock<BiMap<VlanId, VlanOid>>,
    bridge_ports: RwLock<BiMap<String, BridgePortOid>>,
}

/// VLAN id <-> VLAN object and interface <-> bridge port object maps.
///
/// Clones share the same maps.
#[derive(Debug, Clone, Default)]
pub struct IdMaps {
    inner: Arc<IdMapsInner>,
}

impl IdMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a VLAN object. Returns the id it replaced, if any.
    pub fn insert_vlan(&self, vlan_id: VlanId, oid: VlanOid) -> Option<VlanOid> {
        self.inner.vlans.write().insert(vlan_id, oid)
    }

    pub fn remove_vlan(&self, vlan_id: VlanId) -> Option<VlanOid> {
        self.inner.vlans.write().remove(&vlan_id)
    }

    pub fn vlan_oid(&self, vlan_id: VlanId) -> Option<VlanOid> {
        self.inner.vlans.read().forward.get(&vlan_id).copied()
    }

    pub fn vlan_id_of(&self, oid: VlanOid) -> Option<VlanId> {
        self.inner.vlans.read().reverse.get(&oid).copied()
    }

    pub fn vlan_count(&self) -> usize {
        self.inner.vlans.read().forward.len()
    }

    /// Publishes a bridge port object. Returns the id it replaced, if any.
    pub fn insert_bridge_port(&self, iface: &str, oid: BridgePortOid) -> Option<BridgePortOid> {
        self.inner.bridge_ports.write().insert(iface.to_string(), oid)
    }

    pub fn remove_bridge_port(&self, iface: &str) -> Option<BridgePortOid> {
        self.inner.bridge_ports.write().remove(&iface.to_string())
    }

    pub fn bridge_port(&self, iface: &str) -> Option<BridgePortOid> {
        self.inner.bridge_ports.read().forward.get(iface).copied()
    }

    /// Reverse lookup used when a hardware notification names a bridge port.
    pub fn interface_of(&self, oid: BridgePortOid) -> Option<String> {
        self.inner.bridge_ports.read().reverse.get(&oid).cloned()
    }

    pub fn bridge_port_count(&self) -> usize {
        self.inner.bridge_ports.read().forward.len()
    }

    /// Resolves the VLAN and bridge port of an FDB entry and runs `program`
    /// while both read locks are held.
    ///
    /// A removal publishes its map change before touching hardware, so it
    /// cannot interleave with `program`. Returns every missing prerequisite
    /// when either lookup fails.
    pub fn with_fdb_target<R>(
        &self,
        vlan_id: VlanId,
        iface: &str,
        program: impl FnOnce(VlanOid, BridgePortOid) -> R,
    ) -> Result<R, Vec<Prerequisite>> {
        let vlans = self.inner.vlans.read();
        let bridge_ports = self.inner.bridge_ports.read();

        let vlan_oid = vlans.forward.get(&vlan_id).copied();
        let bridge_port = bridge_ports.forward.get(iface).copied();

        match (vlan_oid, bridge_port) {
            (Some(vlan_oid), Some(bridge_port)) => Ok(program(vlan_oid, bridge_port)),
            (vlan_oid, bridge_port) => {
                let mut missing = Vec::with_capacity(2);
                if vlan_oid.is_none() {
                    missing.push(Prerequisite::Vlan(vlan_id));
                }
                if bridge_port.is_none() {
                    missing.push(Prerequisite::BridgePort(iface.to_string()));
                }
                Err(missing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vlan(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    #[test]
    fn test_vlan_map_is_bidirectional() {
        let maps = IdMaps::new();
        assert_eq!(maps.insert_vlan(vlan(2), VlanOid::new(2)), None);
        assert_eq!(maps.vlan_oid(vlan(2)), Some(VlanOid::new(2)));
        assert_eq!(maps.vlan_id_of(VlanOid::new(2)), Some(vlan(2)));

        assert_eq!(maps.remove_vlan(vlan(2)), Some(VlanOid::new(2)));
        assert_eq!(maps.vlan_id_of(VlanOid::new(2)), None);
        assert_eq!(maps.vlan_count(), 0);
    }

    #[test]
    fn test_replacing_bridge_port_drops_old_reverse_entry() {
        let maps = IdMaps::new();
        maps.insert_bridge_port("Ethernet0", BridgePortOid::new(1));
        assert_eq!(
            maps.insert_bridge_port("Ethernet0", BridgePortOid::new(2)),
            Some(BridgePortOid::new(1))
        );
        assert_eq!(maps.interface_of(BridgePortOid::new(1)), None);
        assert_eq!(maps.interface_of(BridgePortOid::new(2)).as_deref(), Some("Ethernet0"));
        assert_eq!(maps.bridge_port_count(), 1);
    }

    #[test]
    fn test_fdb_target_reports_all_missing_prerequisites() {
        let maps = IdMaps::new();
        let missing = maps
            .with_fdb_target(vlan(2), "Ethernet0", |_, _| ())
            .unwrap_err();
        assert_eq!(
            missing,
            vec![
                Prerequisite::Vlan(vlan(2)),
                Prerequisite::BridgePort("Ethernet0".to_string()),
            ]
        );
        assert_eq!(missing[0].constraint(), Constraint::new("VLAN", "Vlan2"));
        assert_eq!(missing[1].to_string(), "BRIDGE_PORT:Ethernet0");

        maps.insert_vlan(vlan(2), VlanOid::new(2));
        let missing = maps
            .with_fdb_target(vlan(2), "Ethernet0", |_, _| ())
            .unwrap_err();
        assert_eq!(missing, vec![Prerequisite::BridgePort("Ethernet0".to_string())]);

        maps.insert_bridge_port("Ethernet0", BridgePortOid::new(7));
        let resolved = maps.with_fdb_target(vlan(2), "Ethernet0", |v, bp| (v, bp));
        assert_eq!(resolved, Ok((VlanOid::new(2), BridgePortOid::new(7))));
    }
}
