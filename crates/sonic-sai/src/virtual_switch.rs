//! In-process SAI implementation backed by ASIC_DB.
//!
//! `VirtualSwitch` keeps the object graph a real switch would keep (ports,
//! VLANs, bridge ports, VLAN members, FDB entries), enforces the same
//! referential rules a SAI implementation enforces, and mirrors every object
//! into the `ASIC_STATE:SAI_OBJECT_TYPE_*` tables. It also stands in for the
//! dataplane: [`VirtualSwitch::learn_fdb_entry`] and
//! [`VirtualSwitch::age_fdb_entry`] raise the FDB notifications a switch
//! would send after learning or aging a MAC.

use crate::api::{
    attr, FdbEntryAttrs, FdbEvent, FdbEventType, FdbFlushFilter, SaiApi, SaiFdbEntry,
};
use crate::error::{SaiError, SaiResult, SaiStatus};
use crate::types::{BridgePortOid, PortOid, SwitchOid, VlanMemberOid, VlanOid};
use parking_lot::Mutex;
use sonic_orch_common::schema::asic_db;
use sonic_orch_common::{Database, FieldValues, Table, TrackedSender};
use sonic_types::{FdbEntryType, MacAddress, PacketAction, VlanId, VlanTaggingMode};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Front-panel layout of the virtual switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSwitchConfig {
    /// Interface aliases, one port object each.
    pub ports: Vec<String>,
}

impl VirtualSwitchConfig {
    /// `count` ports named `Ethernet0`, `Ethernet<stride>`, ...
    pub fn front_panel(count: usize, stride: usize) -> Self {
        Self {
            ports: (0..count).map(|i| format!("Ethernet{}", i * stride)).collect(),
        }
    }
}

impl Default for VirtualSwitchConfig {
    fn default() -> Self {
        Self::front_panel(32, 4)
    }
}

#[derive(Debug, Clone, Copy)]
struct MemberRecord {
    vlan: VlanOid,
    bridge_port: BridgePortOid,
}

struct AsicTables {
    switch: Table,
    port: Table,
    vlan: Table,
    bridge_port: Table,
    vlan_member: Table,
    fdb_entry: Table,
}

impl AsicTables {
    fn new(asic: &Database) -> Self {
        Self {
            switch: asic.table(asic_db::SWITCH),
            port: asic.table(asic_db::PORT),
            vlan: asic.table(asic_db::VLAN),
            bridge_port: asic.table(asic_db::BRIDGE_PORT),
            vlan_member: asic.table(asic_db::VLAN_MEMBER),
            fdb_entry: asic.table(asic_db::FDB_ENTRY),
        }
    }
}

struct SwitchState {
    asic: AsicTables,
    next_index: u64,
    ports: HashMap<String, PortOid>,
    port_admin: HashMap<PortOid, bool>,
    vlans: HashMap<VlanOid, VlanId>,
    vlan_oids: HashMap<VlanId, VlanOid>,
    bridge_ports: HashMap<BridgePortOid, PortOid>,
    port_bridge_ports: HashMap<PortOid, BridgePortOid>,
    members: HashMap<VlanMemberOid, MemberRecord>,
    fdb: BTreeMap<SaiFdbEntry, FdbEntryAttrs>,
    notifier: Option<TrackedSender<FdbEvent>>,
}

impl SwitchState {
    fn allocate(&mut self) -> u64 {
        self.next_index += 1;
        self.next_index
    }

    fn vlan_in_use(&self, vlan: VlanOid, vlan_id: VlanId) -> bool {
        self.members.values().any(|m| m.vlan == vlan)
            || self.fdb.keys().any(|e| e.vlan_id == vlan_id)
    }

    fn bridge_port_in_use(&self, bridge_port: BridgePortOid) -> bool {
        self.members.values().any(|m| m.bridge_port == bridge_port)
            || self.fdb.values().any(|a| a.bridge_port_id == bridge_port)
    }

    fn is_member(&self, vlan: VlanOid, bridge_port: BridgePortOid) -> bool {
        self.members
            .values()
            .any(|m| m.vlan == vlan && m.bridge_port == bridge_port)
    }

    fn write_fdb(&self, entry: &SaiFdbEntry, attrs: &FdbEntryAttrs) {
        self.asic.fdb_entry.replace(
            &entry.to_asic_key(),
            vec![
                fv(attr::FDB_ENTRY_TYPE, attrs.entry_type.sai_name()),
                fv(attr::FDB_ENTRY_BRIDGE_PORT_ID, &attrs.bridge_port_id.to_oid_string()),
                fv(attr::FDB_ENTRY_PACKET_ACTION, attrs.packet_action.sai_name()),
            ],
        );
    }

    fn notify(&mut self, event_type: FdbEventType, entry: SaiFdbEntry, attrs: &FdbEntryAttrs) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let event = FdbEvent {
            event_type,
            entry,
            bridge_port_id: attrs.bridge_port_id,
            entry_type: attrs.entry_type,
        };
        if notifier.send(event).is_err() {
            warn!("FDB notification receiver dropped, disabling notifications");
            self.notifier = None;
        }
    }
}

fn fv(field: &str, value: &str) -> (String, String) {
    (field.to_string(), value.to_string())
}

fn bool_value(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// A software switch that records its state in ASIC_DB.
pub struct VirtualSwitch {
    switch_id: SwitchOid,
    default_vlan: VlanOid,
    state: Mutex<SwitchState>,
}

impl std::fmt::Debug for VirtualSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualSwitch")
            .field("switch_id", &self.switch_id)
            .field("default_vlan", &self.default_vlan)
            .finish()
    }
}

impl VirtualSwitch {
    /// Initializes the switch: the switch object, one port per configured
    /// interface and the default VLAN 1.
    pub fn new(asic: &Database, config: &VirtualSwitchConfig) -> Self {
        let switch_id = SwitchOid::new(0);
        let mut state = SwitchState {
            asic: AsicTables::new(asic),
            next_index: 0,
            ports: HashMap::new(),
            port_admin: HashMap::new(),
            vlans: HashMap::new(),
            vlan_oids: HashMap::new(),
            bridge_ports: HashMap::new(),
            port_bridge_ports: HashMap::new(),
            members: HashMap::new(),
            fdb: BTreeMap::new(),
            notifier: None,
        };

        let default_vlan = VlanOid::new(state.allocate());
        state.vlans.insert(default_vlan, VlanId::DEFAULT);
        state.vlan_oids.insert(VlanId::DEFAULT, default_vlan);

        state.asic.switch.set(
            &switch_id.to_oid_string(),
            vec![
                fv(attr::SWITCH_INIT_SWITCH, "true"),
                fv(attr::SWITCH_DEFAULT_VLAN_ID, &default_vlan.to_oid_string()),
            ],
        );
        state.asic.vlan.set(
            &default_vlan.to_oid_string(),
            vec![fv(attr::VLAN_VLAN_ID, &VlanId::DEFAULT.to_string())],
        );

        for (lane, alias) in config.ports.iter().enumerate() {
            let port = PortOid::new(state.allocate());
            state.ports.insert(alias.clone(), port);
            state.port_admin.insert(port, false);
            state.asic.port.set(
                &port.to_oid_string(),
                vec![
                    fv(attr::PORT_HW_LANE_LIST, &format!("1:{}", lane)),
                    fv(attr::PORT_ADMIN_STATE, bool_value(false)),
                ],
            );
        }

        info!(
            switch_id = %switch_id,
            ports = config.ports.len(),
            "virtual switch initialized"
        );

        Self {
            switch_id,
            default_vlan,
            state: Mutex::new(state),
        }
    }

    /// Registers the channel FDB notifications are delivered on.
    pub fn set_fdb_notification_sender(&self, sender: TrackedSender<FdbEvent>) {
        self.state.lock().notifier = Some(sender);
    }

    /// Simulates the dataplane learning `mac` on `alias` in `vlan_id`.
    ///
    /// Returns the notification raised, or `None` if the entry was already
    /// learned on that port or is pinned by a static entry.
    pub fn learn_fdb_entry(
        &self,
        vlan_id: VlanId,
        mac: MacAddress,
        alias: &str,
    ) -> SaiResult<Option<FdbEventType>> {
        const OP: &str = "learn_fdb_entry";
        let mut state = self.state.lock();

        let port = *state
            .ports
            .get(alias)
            .ok_or_else(|| SaiError::invalid_object(OP, alias))?;
        let bridge_port = *state
            .port_bridge_ports
            .get(&port)
            .ok_or_else(|| SaiError::invalid_object(OP, alias))?;
        let vlan = *state
            .vlan_oids
            .get(&vlan_id)
            .ok_or_else(|| SaiError::invalid_object(OP, vlan_id.alias()))?;
        if !state.is_member(vlan, bridge_port) {
            return Err(SaiError::status(
                OP,
                SaiStatus::InvalidParameter,
                format!("{} is not a member of {}", alias, vlan_id.alias()),
            ));
        }

        let entry = SaiFdbEntry::new(self.switch_id, vlan_id, mac);
        let attrs = FdbEntryAttrs {
            bridge_port_id: bridge_port,
            entry_type: FdbEntryType::Dynamic,
            packet_action: PacketAction::Forward,
        };

        let event_type = match state.fdb.get(&entry) {
            Some(existing) if existing.entry_type == FdbEntryType::Static => return Ok(None),
            Some(existing) if existing.bridge_port_id == bridge_port => return Ok(None),
            Some(_) => FdbEventType::Moved,
            None => FdbEventType::Learned,
        };

        state.fdb.insert(entry, attrs);
        state.write_fdb(&entry, &attrs);
        debug!(%entry, %event_type, bridge_port = %bridge_port, "dataplane learned MAC");
        state.notify(event_type, entry, &attrs);
        Ok(Some(event_type))
    }

    /// Simulates the dataplane aging out a dynamic entry.
    ///
    /// Returns false if there is no dynamic entry for the key.
    pub fn age_fdb_entry(&self, vlan_id: VlanId, mac: MacAddress) -> bool {
        let mut state = self.state.lock();
        let entry = SaiFdbEntry::new(self.switch_id, vlan_id, mac);
        match state.fdb.get(&entry).copied() {
            Some(attrs) if attrs.entry_type == FdbEntryType::Dynamic => {
                state.fdb.remove(&entry);
                state.asic.fdb_entry.del(&entry.to_asic_key());
                debug!(%entry, "dataplane aged MAC");
                state.notify(FdbEventType::Aged, entry, &attrs);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the FDB in key order.
    pub fn fdb_entries(&self) -> Vec<(SaiFdbEntry, FdbEntryAttrs)> {
        self.state
            .lock()
            .fdb
            .iter()
            .map(|(entry, attrs)| (*entry, *attrs))
            .collect()
    }

    /// Interface aliases of every front-panel port, sorted.
    pub fn port_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.state.lock().ports.keys().cloned().collect();
        aliases.sort();
        aliases
    }
}

impl SaiApi for VirtualSwitch {
    fn switch_id(&self) -> SwitchOid {
        self.switch_id
    }

    fn default_vlan(&self) -> VlanOid {
        self.default_vlan
    }

    fn port_id(&self, alias: &str) -> Option<PortOid> {
        self.state.lock().ports.get(alias).copied()
    }

    fn set_port_admin_state(&self, port_id: PortOid, up: bool) -> SaiResult<()> {
        let mut state = self.state.lock();
        match state.port_admin.get_mut(&port_id) {
            Some(admin) => *admin = up,
            None => return Err(SaiError::invalid_object("set_port_admin_state", port_id.to_oid_string())),
        }
        state
            .asic
            .port
            .hset(&port_id.to_oid_string(), attr::PORT_ADMIN_STATE, bool_value(up));
        Ok(())
    }

    fn create_vlan(&self, vlan_id: VlanId) -> SaiResult<VlanOid> {
        let mut state = self.state.lock();
        if state.vlan_oids.contains_key(&vlan_id) {
            return Err(SaiError::already_exists("create_vlan", vlan_id.alias()));
        }
        let vlan = VlanOid::new(state.allocate());
        state.vlans.insert(vlan, vlan_id);
        state.vlan_oids.insert(vlan_id, vlan);
        state.asic.vlan.set(
            &vlan.to_oid_string(),
            vec![fv(attr::VLAN_VLAN_ID, &vlan_id.to_string())],
        );
        debug!(vlan = %vlan, vlan_id = %vlan_id, "created VLAN");
        Ok(vlan)
    }

    fn remove_vlan(&self, vlan_oid: VlanOid) -> SaiResult<()> {
        const OP: &str = "remove_vlan";
        let mut state = self.state.lock();
        let vlan_id = *state
            .vlans
            .get(&vlan_oid)
            .ok_or_else(|| SaiError::invalid_object(OP, vlan_oid.to_oid_string()))?;
        if vlan_oid == self.default_vlan {
            return Err(SaiError::status(
                OP,
                SaiStatus::InvalidParameter,
                vlan_oid.to_oid_string(),
            ));
        }
        if state.vlan_in_use(vlan_oid, vlan_id) {
            return Err(SaiError::object_in_use(OP, vlan_oid.to_oid_string()));
        }
        state.vlans.remove(&vlan_oid);
        state.vlan_oids.remove(&vlan_id);
        state.asic.vlan.del(&vlan_oid.to_oid_string());
        debug!(vlan = %vlan_oid, vlan_id = %vlan_id, "removed VLAN");
        Ok(())
    }

    fn create_bridge_port(&self, port_id: PortOid) -> SaiResult<BridgePortOid> {
        const OP: &str = "create_bridge_port";
        let mut state = self.state.lock();
        if !state.port_admin.contains_key(&port_id) {
            return Err(SaiError::invalid_object(OP, port_id.to_oid_string()));
        }
        if state.port_bridge_ports.contains_key(&port_id) {
            return Err(SaiError::already_exists(OP, port_id.to_oid_string()));
        }
        let bridge_port = BridgePortOid::new(state.allocate());
        state.bridge_ports.insert(bridge_port, port_id);
        state.port_bridge_ports.insert(port_id, bridge_port);
        state.asic.bridge_port.set(
            &bridge_port.to_oid_string(),
            vec![
                fv(attr::BRIDGE_PORT_TYPE, attr::BRIDGE_PORT_TYPE_PORT),
                fv(attr::BRIDGE_PORT_PORT_ID, &port_id.to_oid_string()),
                fv(attr::BRIDGE_PORT_ADMIN_STATE, bool_value(true)),
            ],
        );
        debug!(bridge_port = %bridge_port, port = %port_id, "created bridge port");
        Ok(bridge_port)
    }

    fn remove_bridge_port(&self, bridge_port_id: BridgePortOid) -> SaiResult<()> {
        const OP: &str = "remove_bridge_port";
        let mut state = self.state.lock();
        let port = *state
            .bridge_ports
            .get(&bridge_port_id)
            .ok_or_else(|| SaiError::invalid_object(OP, bridge_port_id.to_oid_string()))?;
        if state.bridge_port_in_use(bridge_port_id) {
            return Err(SaiError::object_in_use(OP, bridge_port_id.to_oid_string()));
        }
        state.bridge_ports.remove(&bridge_port_id);
        state.port_bridge_ports.remove(&port);
        state.asic.bridge_port.del(&bridge_port_id.to_oid_string());
        debug!(bridge_port = %bridge_port_id, "removed bridge port");
        Ok(())
    }

    fn create_vlan_member(
        &self,
        vlan_oid: VlanOid,
        bridge_port_id: BridgePortOid,
        tagging_mode: VlanTaggingMode,
    ) -> SaiResult<VlanMemberOid> {
        const OP: &str = "create_vlan_member";
        let mut state = self.state.lock();
        if !state.vlans.contains_key(&vlan_oid) {
            return Err(SaiError::invalid_object(OP, vlan_oid.to_oid_string()));
        }
        if !state.bridge_ports.contains_key(&bridge_port_id) {
            return Err(SaiError::invalid_object(OP, bridge_port_id.to_oid_string()));
        }
        if state.is_member(vlan_oid, bridge_port_id) {
            return Err(SaiError::already_exists(
                OP,
                format!("{} in {}", bridge_port_id, vlan_oid),
            ));
        }
        let member = VlanMemberOid::new(state.allocate());
        state.members.insert(
            member,
            MemberRecord {
                vlan: vlan_oid,
                bridge_port: bridge_port_id,
            },
        );
        state.asic.vlan_member.set(
            &member.to_oid_string(),
            vec![
                fv(attr::VLAN_MEMBER_VLAN_ID, &vlan_oid.to_oid_string()),
                fv(attr::VLAN_MEMBER_BRIDGE_PORT_ID, &bridge_port_id.to_oid_string()),
                fv(attr::VLAN_MEMBER_TAGGING_MODE, tagging_mode.sai_name()),
            ],
        );
        debug!(member = %member, vlan = %vlan_oid, bridge_port = %bridge_port_id, "created VLAN member");
        Ok(member)
    }

    fn set_vlan_member_tagging_mode(
        &self,
        member_id: VlanMemberOid,
        tagging_mode: VlanTaggingMode,
    ) -> SaiResult<()> {
        let state = self.state.lock();
        if !state.members.contains_key(&member_id) {
            return Err(SaiError::invalid_object(
                "set_vlan_member_tagging_mode",
                member_id.to_oid_string(),
            ));
        }
        state.asic.vlan_member.hset(
            &member_id.to_oid_string(),
            attr::VLAN_MEMBER_TAGGING_MODE,
            tagging_mode.sai_name(),
        );
        Ok(())
    }

    fn remove_vlan_member(&self, member_id: VlanMemberOid) -> SaiResult<()> {
        let mut state = self.state.lock();
        if state.members.remove(&member_id).is_none() {
            return Err(SaiError::invalid_object(
                "remove_vlan_member",
                member_id.to_oid_string(),
            ));
        }
        state.asic.vlan_member.del(&member_id.to_oid_string());
        debug!(member = %member_id, "removed VLAN member");
        Ok(())
    }

    fn create_fdb_entry(&self, entry: &SaiFdbEntry, attrs: FdbEntryAttrs) -> SaiResult<()> {
        const OP: &str = "create_fdb_entry";
        let mut state = self.state.lock();
        if !state.vlan_oids.contains_key(&entry.vlan_id) {
            return Err(SaiError::invalid_object(OP, entry.vlan_id.alias()));
        }
        if !state.bridge_ports.contains_key(&attrs.bridge_port_id) {
            return Err(SaiError::invalid_object(OP, attrs.bridge_port_id.to_oid_string()));
        }
        if state.fdb.contains_key(entry) {
            return Err(SaiError::already_exists(OP, entry.to_string()));
        }
        state.fdb.insert(*entry, attrs);
        state.write_fdb(entry, &attrs);
        debug!(%entry, bridge_port = %attrs.bridge_port_id, "created FDB entry");
        Ok(())
    }

    fn remove_fdb_entry(&self, entry: &SaiFdbEntry) -> SaiResult<()> {
        let mut state = self.state.lock();
        if state.fdb.remove(entry).is_none() {
            return Err(SaiError::not_found("remove_fdb_entry", entry.to_string()));
        }
        state.asic.fdb_entry.del(&entry.to_asic_key());
        debug!(%entry, "removed FDB entry");
        Ok(())
    }

    fn flush_fdb_entries(&self, filter: FdbFlushFilter) -> SaiResult<usize> {
        let mut state = self.state.lock();
        let flushed: Vec<(SaiFdbEntry, FdbEntryAttrs)> = state
            .fdb
            .iter()
            .filter(|(entry, attrs)| filter.matches(entry, attrs))
            .map(|(entry, attrs)| (*entry, *attrs))
            .collect();

        for (entry, attrs) in &flushed {
            state.fdb.remove(entry);
            state.asic.fdb_entry.del(&entry.to_asic_key());
            state.notify(FdbEventType::Flushed, *entry, attrs);
        }
        if !flushed.is_empty() {
            debug!(count = flushed.len(), ?filter, "flushed FDB entries");
        }
        Ok(flushed.len())
    }
}

/// Reads a single ASIC_DB attribute, for callers holding only a record.
pub fn attr_value<'a>(record: &'a FieldValues, name: &str) -> Option<&'a str> {
    record
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_orch_common::{bus, DbId, SettleTracker};

    fn setup() -> (Database, VirtualSwitch) {
        let asic = Database::new(DbId::AsicDb, SettleTracker::new());
        let sw = VirtualSwitch::new(&asic, &VirtualSwitchConfig::front_panel(4, 4));
        (asic, sw)
    }

    fn vlan(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    fn mac() -> MacAddress {
        "52-54-00-25-06-E9".parse().unwrap()
    }

    fn member_of(sw: &VirtualSwitch, vlan_id: u16, alias: &str) -> (VlanOid, BridgePortOid) {
        let vlan_oid = sw.create_vlan(vlan(vlan_id)).unwrap();
        let port = sw.port_id(alias).unwrap();
        let bridge_port = sw.create_bridge_port(port).unwrap();
        sw.create_vlan_member(vlan_oid, bridge_port, VlanTaggingMode::Untagged)
            .unwrap();
        (vlan_oid, bridge_port)
    }

    #[test]
    fn test_init_creates_switch_ports_and_default_vlan() {
        let (asic, sw) = setup();
        assert_eq!(asic.table(asic_db::SWITCH).len(), 1);
        assert_eq!(asic.table(asic_db::PORT).len(), 4);
        assert_eq!(asic.table(asic_db::VLAN).len(), 1);
        assert_eq!(
            asic.table(asic_db::VLAN)
                .get_field(&sw.default_vlan().to_oid_string(), attr::VLAN_VLAN_ID),
            Some("1".to_string())
        );
        assert_eq!(
            sw.port_aliases(),
            vec!["Ethernet0", "Ethernet12", "Ethernet4", "Ethernet8"]
        );
    }

    #[test]
    fn test_duplicate_vlan_and_bridge_port_rejected() {
        let (_asic, sw) = setup();
        sw.create_vlan(vlan(2)).unwrap();
        assert!(sw.create_vlan(vlan(2)).unwrap_err().is_already_exists());

        let port = sw.port_id("Ethernet0").unwrap();
        sw.create_bridge_port(port).unwrap();
        assert!(sw.create_bridge_port(port).unwrap_err().is_already_exists());
    }

    #[test]
    fn test_remove_vlan_with_member_is_in_use() {
        let (asic, sw) = setup();
        let (vlan_oid, _) = member_of(&sw, 2, "Ethernet0");

        let err = sw.remove_vlan(vlan_oid).unwrap_err();
        assert_eq!(err.sai_status(), SaiStatus::ObjectInUse);
        assert_eq!(asic.table(asic_db::VLAN).len(), 2);
    }

    #[test]
    fn test_default_vlan_cannot_be_removed() {
        let (_asic, sw) = setup();
        let err = sw.remove_vlan(sw.default_vlan()).unwrap_err();
        assert_eq!(err.sai_status(), SaiStatus::InvalidParameter);
    }

    #[test]
    fn test_fdb_entry_record_layout() {
        let (asic, sw) = setup();
        let (_, bridge_port) = member_of(&sw, 2, "Ethernet0");
        let entry = SaiFdbEntry::new(sw.switch_id(), vlan(2), mac());
        sw.create_fdb_entry(
            &entry,
            FdbEntryAttrs {
                bridge_port_id: bridge_port,
                entry_type: FdbEntryType::Dynamic,
                packet_action: PacketAction::Forward,
            },
        )
        .unwrap();

        let record = asic
            .table(asic_db::FDB_ENTRY)
            .get(&entry.to_asic_key())
            .unwrap();
        assert_eq!(
            attr_value(&record, attr::FDB_ENTRY_TYPE),
            Some("SAI_FDB_ENTRY_TYPE_DYNAMIC")
        );
        assert_eq!(
            attr_value(&record, attr::FDB_ENTRY_BRIDGE_PORT_ID),
            Some(bridge_port.to_oid_string().as_str())
        );
        assert_eq!(
            attr_value(&record, attr::FDB_ENTRY_PACKET_ACTION),
            Some("SAI_PACKET_ACTION_FORWARD")
        );

        let err = sw.remove_bridge_port(bridge_port).unwrap_err();
        assert_eq!(err.sai_status(), SaiStatus::ObjectInUse);
    }

    #[test]
    fn test_fdb_entry_requires_existing_objects() {
        let (_asic, sw) = setup();
        let entry = SaiFdbEntry::new(sw.switch_id(), vlan(2), mac());
        let err = sw
            .create_fdb_entry(
                &entry,
                FdbEntryAttrs {
                    bridge_port_id: BridgePortOid::new(999),
                    entry_type: FdbEntryType::Static,
                    packet_action: PacketAction::Drop,
                },
            )
            .unwrap_err();
        assert_eq!(err.sai_status(), SaiStatus::InvalidObjectId);
        assert!(sw.remove_fdb_entry(&entry).unwrap_err().is_not_found());
    }

    #[test]
    fn test_learn_move_and_age_notifications() {
        let (_asic, sw) = setup();
        let (vlan_oid, _) = member_of(&sw, 2, "Ethernet0");
        let port4 = sw.port_id("Ethernet4").unwrap();
        let bp4 = sw.create_bridge_port(port4).unwrap();
        sw.create_vlan_member(vlan_oid, bp4, VlanTaggingMode::Tagged)
            .unwrap();

        let (tx, mut rx) = bus::untracked_channel();
        sw.set_fdb_notification_sender(tx);

        assert_eq!(
            sw.learn_fdb_entry(vlan(2), mac(), "Ethernet0").unwrap(),
            Some(FdbEventType::Learned)
        );
        assert_eq!(sw.learn_fdb_entry(vlan(2), mac(), "Ethernet0").unwrap(), None);
        assert_eq!(
            sw.learn_fdb_entry(vlan(2), mac(), "Ethernet4").unwrap(),
            Some(FdbEventType::Moved)
        );
        assert!(sw.age_fdb_entry(vlan(2), mac()));
        assert!(!sw.age_fdb_entry(vlan(2), mac()));

        let events: Vec<FdbEventType> = std::iter::from_fn(|| rx.try_recv())
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            events,
            vec![FdbEventType::Learned, FdbEventType::Moved, FdbEventType::Aged]
        );
    }

    #[test]
    fn test_learn_requires_membership() {
        let (_asic, sw) = setup();
        member_of(&sw, 2, "Ethernet0");
        assert!(sw.learn_fdb_entry(vlan(2), mac(), "Ethernet4").is_err());
        assert!(sw.learn_fdb_entry(vlan(3), mac(), "Ethernet0").is_err());
    }

    #[test]
    fn test_flush_by_vlan_emits_flushed() {
        let (asic, sw) = setup();
        member_of(&sw, 2, "Ethernet0");
        sw.learn_fdb_entry(vlan(2), mac(), "Ethernet0").unwrap();

        let (tx, mut rx) = bus::untracked_channel();
        sw.set_fdb_notification_sender(tx);

        assert_eq!(sw.flush_fdb_entries(FdbFlushFilter::by_vlan(vlan(3))).unwrap(), 0);
        assert_eq!(sw.flush_fdb_entries(FdbFlushFilter::by_vlan(vlan(2))).unwrap(), 1);
        assert!(asic.table(asic_db::FDB_ENTRY).is_empty());
        assert_eq!(rx.try_recv().unwrap().event_type, FdbEventType::Flushed);
    }

    #[test]
    fn test_tagging_mode_update_in_place() {
        let (asic, sw) = setup();
        let vlan_oid = sw.create_vlan(vlan(2)).unwrap();
        let bp = sw
            .create_bridge_port(sw.port_id("Ethernet8").unwrap())
            .unwrap();
        let member = sw
            .create_vlan_member(vlan_oid, bp, VlanTaggingMode::Untagged)
            .unwrap();
        sw.set_vlan_member_tagging_mode(member, VlanTaggingMode::Tagged)
            .unwrap();

        assert_eq!(
            asic.table(asic_db::VLAN_MEMBER)
                .get_field(&member.to_oid_string(), attr::VLAN_MEMBER_TAGGING_MODE),
            Some("SAI_VLAN_TAGGING_MODE_TAGGED".to_string())
        );
    }

    #[test]
    fn test_port_admin_state() {
        let (asic, sw) = setup();
        let port = sw.port_id("Ethernet12").unwrap();
        sw.set_port_admin_state(port, true).unwrap();
        assert_eq!(
            asic.table(asic_db::PORT)
                .get_field(&port.to_oid_string(), attr::PORT_ADMIN_STATE),
            Some("true".to_string())
        );
        assert!(sw.set_port_admin_state(PortOid::new(999), true).is_err());
    }
}
