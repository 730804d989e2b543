//! SONiC bridge orchestration agent.
//!
//! Reconciles layer-2 configuration and learned state into switch objects:
//!
//! - [`ports::PortsOrch`]: CONFIG_DB `VLAN`, `VLAN_MEMBER` and `PORT` into
//!   VLANs, bridge ports and VLAN members
//! - [`fdb::FdbOrch`]: APPL_DB `FDB_TABLE` into FDB entries, holding each
//!   entry back until its VLAN and bridge port exist
//! - [`fdb::FdbNotificationListener`]: switch learn/age notifications back
//!   into `FDB_TABLE`, never re-programmed
//! - [`maps::IdMaps`]: the VLAN and bridge port id lookups shared by all
//!   three
//!
//! [`OrchStack`] assembles them under an [`OrchDaemon`], one task per orch.
//!
//! # Example
//!
//! ```ignore
//! let stack = OrchStack::build(&L2OrchConfig::default())?;
//! stack.config_db.table("VLAN").hset("Vlan2", "vlanid", "2");
//! stack.config_db.table("VLAN_MEMBER").hset("Vlan2|Ethernet0", "tagging_mode", "untagged");
//! stack.settled().await;
//! assert_eq!(stack.asic_db.table("ASIC_STATE:SAI_OBJECT_TYPE_VLAN_MEMBER").len(), 1);
//! ```

pub mod config;
pub mod daemon;
pub mod fdb;
pub mod maps;
pub mod ports;
pub mod script;

pub use config::{ConfigError, L2OrchConfig};
pub use daemon::{OrchDaemon, OrchDaemonConfig, OrchStack, OrchStatus};
pub use maps::{IdMaps, Prerequisite};
