//! Switch programming interface used by the orchestration agents.
//!
//! The agents never talk to a switch SDK directly; they drive an
//! implementation of [`SaiApi`]. [`crate::VirtualSwitch`] is the in-process
//! implementation that records every object in ASIC_DB.

use crate::error::SaiResult;
use crate::types::{BridgePortOid, PortOid, SwitchOid, VlanMemberOid, VlanOid};
use sonic_types::{FdbEntryType, MacAddress, PacketAction, VlanId, VlanTaggingMode};
use std::fmt;

/// SAI attribute names as they appear in ASIC_DB records.
pub mod attr {
    pub const SWITCH_INIT_SWITCH: &str = "SAI_SWITCH_ATTR_INIT_SWITCH";
    pub const SWITCH_DEFAULT_VLAN_ID: &str = "SAI_SWITCH_ATTR_DEFAULT_VLAN_ID";

    pub const PORT_ADMIN_STATE: &str = "SAI_PORT_ATTR_ADMIN_STATE";
    pub const PORT_HW_LANE_LIST: &str = "SAI_PORT_ATTR_HW_LANE_LIST";

    pub const VLAN_VLAN_ID: &str = "SAI_VLAN_ATTR_VLAN_ID";

    pub const BRIDGE_PORT_TYPE: &str = "SAI_BRIDGE_PORT_ATTR_TYPE";
    pub const BRIDGE_PORT_PORT_ID: &str = "SAI_BRIDGE_PORT_ATTR_PORT_ID";
    pub const BRIDGE_PORT_ADMIN_STATE: &str = "SAI_BRIDGE_PORT_ATTR_ADMIN_STATE";
    pub const BRIDGE_PORT_TYPE_PORT: &str = "SAI_BRIDGE_PORT_TYPE_PORT";

    pub const VLAN_MEMBER_VLAN_ID: &str = "SAI_VLAN_MEMBER_ATTR_VLAN_ID";
    pub const VLAN_MEMBER_BRIDGE_PORT_ID: &str = "SAI_VLAN_MEMBER_ATTR_BRIDGE_PORT_ID";
    pub const VLAN_MEMBER_TAGGING_MODE: &str = "SAI_VLAN_MEMBER_ATTR_VLAN_TAGGING_MODE";

    pub const FDB_ENTRY_TYPE: &str = "SAI_FDB_ENTRY_ATTR_TYPE";
    pub const FDB_ENTRY_BRIDGE_PORT_ID: &str = "SAI_FDB_ENTRY_ATTR_BRIDGE_PORT_ID";
    pub const FDB_ENTRY_PACKET_ACTION: &str = "SAI_FDB_ENTRY_ATTR_PACKET_ACTION";
}

/// Key of an FDB entry in the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaiFdbEntry {
    pub switch_id: SwitchOid,
    pub vlan_id: VlanId,
    pub mac: MacAddress,
}

impl SaiFdbEntry {
    pub fn new(switch_id: SwitchOid, vlan_id: VlanId, mac: MacAddress) -> Self {
        Self {
            switch_id,
            vlan_id,
            mac,
        }
    }

    /// JSON compound key used for `ASIC_STATE:SAI_OBJECT_TYPE_FDB_ENTRY`.
    pub fn to_asic_key(&self) -> String {
        serde_json::json!({
            "mac": self.mac.to_string(),
            "switch_id": self.switch_id.to_oid_string(),
            "vlan": self.vlan_id.to_string(),
        })
        .to_string()
    }
}

impl fmt::Display for SaiFdbEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vlan_id.alias(), self.mac)
    }
}

/// Attributes of an FDB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdbEntryAttrs {
    pub bridge_port_id: BridgePortOid,
    pub entry_type: FdbEntryType,
    pub packet_action: PacketAction,
}

/// Selects which FDB entries a flush removes.
///
/// Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdbFlushFilter {
    pub bridge_port_id: Option<BridgePortOid>,
    pub vlan_id: Option<VlanId>,
    pub entry_type: Option<FdbEntryType>,
}

impl FdbFlushFilter {
    pub fn by_bridge_port(bridge_port_id: BridgePortOid) -> Self {
        Self {
            bridge_port_id: Some(bridge_port_id),
            ..Self::default()
        }
    }

    pub fn by_vlan(vlan_id: VlanId) -> Self {
        Self {
            vlan_id: Some(vlan_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &SaiFdbEntry, attrs: &FdbEntryAttrs) -> bool {
        self.bridge_port_id.is_none_or(|bp| bp == attrs.bridge_port_id)
            && self.vlan_id.is_none_or(|vlan| vlan == entry.vlan_id)
            && self.entry_type.is_none_or(|t| t == attrs.entry_type)
    }
}

/// Kind of an FDB notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FdbEventType {
    /// `SAI_FDB_EVENT_LEARNED`
    Learned,
    /// `SAI_FDB_EVENT_AGED`
    Aged,
    /// `SAI_FDB_EVENT_MOVE`
    Moved,
    /// `SAI_FDB_EVENT_FLUSHED`
    Flushed,
}

impl fmt::Display for FdbEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FdbEventType::Learned => "SAI_FDB_EVENT_LEARNED",
            FdbEventType::Aged => "SAI_FDB_EVENT_AGED",
            FdbEventType::Moved => "SAI_FDB_EVENT_MOVE",
            FdbEventType::Flushed => "SAI_FDB_EVENT_FLUSHED",
        };
        f.write_str(s)
    }
}

/// Asynchronous FDB notification raised by the switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdbEvent {
    pub event_type: FdbEventType,
    pub entry: SaiFdbEntry,
    pub bridge_port_id: BridgePortOid,
    pub entry_type: FdbEntryType,
}

/// Hardware programming interface.
///
/// Calls are synchronous and return once the switch state has changed.
/// Implementations must be safe to share between orch tasks.
pub trait SaiApi: Send + Sync {
    fn switch_id(&self) -> SwitchOid;

    /// The VLAN object the switch creates for VLAN 1 at init.
    fn default_vlan(&self) -> VlanOid;

    /// Looks up the port object for a front-panel interface.
    fn port_id(&self, alias: &str) -> Option<PortOid>;

    fn set_port_admin_state(&self, port_id: PortOid, up: bool) -> SaiResult<()>;

    fn create_vlan(&self, vlan_id: VlanId) -> SaiResult<VlanOid>;

    fn remove_vlan(&self, vlan_oid: VlanOid) -> SaiResult<()>;

    fn create_bridge_port(&self, port_id: PortOid) -> SaiResult<BridgePortOid>;

    fn remove_bridge_port(&self, bridge_port_id: BridgePortOid) -> SaiResult<()>;

    fn create_vlan_member(
        &self,
        vlan_oid: VlanOid,
        bridge_port_id: BridgePortOid,
        tagging_mode: VlanTaggingMode,
    ) -> SaiResult<VlanMemberOid>;

    fn set_vlan_member_tagging_mode(
        &self,
        member_id: VlanMemberOid,
        tagging_mode: VlanTaggingMode,
    ) -> SaiResult<()>;

    fn remove_vlan_member(&self, member_id: VlanMemberOid) -> SaiResult<()>;

    fn create_fdb_entry(&self, entry: &SaiFdbEntry, attrs: FdbEntryAttrs) -> SaiResult<()>;

    fn remove_fdb_entry(&self, entry: &SaiFdbEntry) -> SaiResult<()>;

    /// Removes every entry matching `filter` and returns how many went.
    fn flush_fdb_entries(&self, filter: FdbFlushFilter) -> SaiResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry() -> SaiFdbEntry {
        SaiFdbEntry::new(
            SwitchOid::new(0),
            VlanId::new(2).unwrap(),
            "52:54:00:25:06:e9".parse().unwrap(),
        )
    }

    #[test]
    fn test_asic_key_is_sorted_json() {
        let key = entry().to_asic_key();
        assert_eq!(
            key,
            r#"{"mac":"52-54-00-25-06-E9","switch_id":"oid:0x21000000000000","vlan":"2"}"#
        );
        let parsed: serde_json::Value = serde_json::from_str(&key).unwrap();
        assert_eq!(parsed["vlan"], "2");
    }

    #[test]
    fn test_entry_display_matches_appl_key() {
        assert_eq!(entry().to_string(), "Vlan2:52-54-00-25-06-E9");
    }

    #[test]
    fn test_flush_filter_matching() {
        let attrs = FdbEntryAttrs {
            bridge_port_id: BridgePortOid::new(1),
            entry_type: FdbEntryType::Dynamic,
            packet_action: PacketAction::Forward,
        };
        assert!(FdbFlushFilter::default().matches(&entry(), &attrs));
        assert!(FdbFlushFilter::by_bridge_port(BridgePortOid::new(1)).matches(&entry(), &attrs));
        assert!(!FdbFlushFilter::by_bridge_port(BridgePortOid::new(2)).matches(&entry(), &attrs));
        assert!(!FdbFlushFilter::by_vlan(VlanId::new(3).unwrap()).matches(&entry(), &attrs));

        let static_only = FdbFlushFilter {
            entry_type: Some(FdbEntryType::Static),
            ..FdbFlushFilter::default()
        };
        assert!(!static_only.matches(&entry(), &attrs));
    }
}
