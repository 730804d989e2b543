//! Table and field name constants.

/// Separator between key components in CONFIG_DB (`Vlan2|Ethernet0`).
pub const CONFIG_DB_SEPARATOR: char = '|';

/// Separator between key components in APPL_DB (`Vlan2:52-54-00-25-06-E9`).
pub const APPL_DB_SEPARATOR: char = ':';

/// CONFIG_DB tables.
pub mod config_db {
    pub const VLAN: &str = "VLAN";
    pub const VLAN_MEMBER: &str = "VLAN_MEMBER";
    pub const PORT: &str = "PORT";
    pub const PORTCHANNEL: &str = "PORTCHANNEL";
    pub const INTERFACE: &str = "INTERFACE";
    pub const VLAN_INTERFACE: &str = "VLAN_INTERFACE";
    pub const PORTCHANNEL_INTERFACE: &str = "PORTCHANNEL_INTERFACE";
}

/// APPL_DB tables.
pub mod appl_db {
    pub const FDB_TABLE: &str = "FDB_TABLE";
    pub const NEIGH_TABLE: &str = "NEIGH_TABLE";
}

/// ASIC_DB tables, one per SAI object type.
pub mod asic_db {
    pub const SWITCH: &str = "ASIC_STATE:SAI_OBJECT_TYPE_SWITCH";
    pub const PORT: &str = "ASIC_STATE:SAI_OBJECT_TYPE_PORT";
    pub const VLAN: &str = "ASIC_STATE:SAI_OBJECT_TYPE_VLAN";
    pub const BRIDGE_PORT: &str = "ASIC_STATE:SAI_OBJECT_TYPE_BRIDGE_PORT";
    pub const VLAN_MEMBER: &str = "ASIC_STATE:SAI_OBJECT_TYPE_VLAN_MEMBER";
    pub const FDB_ENTRY: &str = "ASIC_STATE:SAI_OBJECT_TYPE_FDB_ENTRY";
}

/// Field names
pub mod fields {
    /// VLAN ID field
    pub const VLAN_ID: &str = "vlanid";

    /// Tagging mode field
    pub const TAGGING_MODE: &str = "tagging_mode";

    /// Admin status field
    pub const ADMIN_STATUS: &str = "admin_status";

    /// FDB egress interface
    pub const PORT: &str = "port";

    /// FDB entry type
    pub const TYPE: &str = "type";

    /// FDB packet action
    pub const PACKET_ACTION: &str = "packet_action";

    pub const NEIGH: &str = "neigh";
    pub const FAMILY: &str = "family";
}
