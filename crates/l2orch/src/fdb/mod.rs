//! FDB orchestration.
//!
//! Two agents share APPL_DB `FDB_TABLE`:
//!
//! - [`FdbOrch`] programs provisioned entries into the switch, parking the
//!   ones whose VLAN or bridge port does not exist yet
//! - [`FdbNotificationListener`] mirrors what the switch learns and ages
//!   back into the table, tagged as hardware-originated so FdbOrch leaves
//!   the switch alone

mod listener;
mod orch;
mod types;

pub use listener::FdbNotificationListener;
pub use orch::FdbOrch;
pub use types::{
    FdbKey, FdbListenerStats, FdbOrchConfig, FdbOrchStats, FdbOrigin, FdbRecord, FdbSpec,
    LearnedEntry, LearnedFdbTable, PendingFdb,
};
