//! FDB (Forwarding Database) types.

use dashmap::DashMap;
use sonic_orch_common::{schema::APPL_DB_SEPARATOR, TaskError, TaskResult};
use sonic_types::{FdbEntryType, MacAddress, PacketAction, VlanId};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

/// Normalized FDB_TABLE key.
///
/// `Vlan2:52:54:00:25:06:e9` and `Vlan2:52-54-00-25-06-E9` are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FdbKey {
    pub vlan_id: VlanId,
    pub mac: MacAddress,
}

impl FdbKey {
    pub fn new(vlan_id: VlanId, mac: MacAddress) -> Self {
        Self { vlan_id, mac }
    }

    /// Parses `Vlan<id>:<mac>`, splitting at the first separator so the MAC
    /// may itself use colons.
    pub fn parse(key: &str) -> TaskResult<Self> {
        let (vlan, mac) = key.split_once(APPL_DB_SEPARATOR).ok_or_else(|| {
            TaskError::malformed(format!("FDB key {:?} has no MAC address", key))
        })?;
        Ok(Self {
            vlan_id: VlanId::from_alias(vlan)?,
            mac: mac.parse()?,
        })
    }

    /// The canonical APPL_DB key.
    pub fn appl_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FdbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.vlan_id.alias(), APPL_DB_SEPARATOR, self.mac)
    }
}

/// Who put an entry into FDB_TABLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FdbOrigin {
    /// Mirrored from a hardware learn notification.
    Learned,
    /// Written by an operator or control-plane process.
    Provisioned,
}

/// What an FDB_TABLE record asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdbSpec {
    pub port: String,
    pub entry_type: FdbEntryType,
    pub packet_action: PacketAction,
}

/// A provisioned entry waiting for its VLAN or bridge port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFdb {
    /// FDB_TABLE key as written, for diagnostics.
    pub appl_key: String,
    pub spec: FdbSpec,
}

/// A provisioned entry FdbOrch has programmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdbRecord {
    pub appl_key: String,
    pub spec: FdbSpec,
    pub bridge_port: sonic_sai::BridgePortOid,
}

/// A hardware-learned entry mirrored into FDB_TABLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedEntry {
    pub port: String,
    pub bridge_port: sonic_sai::BridgePortOid,
}

/// Keys the notification listener mirrored from hardware, plus the
/// FDB_TABLE row each provisioned key was written under.
///
/// Shared by the listener (which fills it) and FdbOrch (which takes a key
/// out when a provisioned write overrides it). Clones share the table.
///
/// A row may spell its MAC any way the parser accepts, so hardware writes
/// for a provisioned key must target the row as written, not the canonical
/// form.
#[derive(Debug, Clone, Default)]
pub struct LearnedFdbTable {
    entries: Arc<DashMap<FdbKey, LearnedEntry>>,
    rows: Arc<DashMap<FdbKey, String>>,
}

impl LearnedFdbTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: FdbKey, entry: LearnedEntry) -> Option<LearnedEntry> {
        self.entries.insert(key, entry)
    }

    pub fn remove(&self, key: &FdbKey) -> Option<LearnedEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    pub fn get(&self, key: &FdbKey) -> Option<LearnedEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn contains(&self, key: &FdbKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records the FDB_TABLE row a provisioned key lives under.
    pub fn record_row(&self, key: FdbKey, appl_key: &str) -> Option<String> {
        self.rows.insert(key, appl_key.to_string())
    }

    pub fn forget_row(&self, key: &FdbKey) -> Option<String> {
        self.rows.remove(key).map(|(_, row)| row)
    }

    /// The FDB_TABLE row for `key`: as provisioned, else canonical.
    pub fn row_key(&self, key: &FdbKey) -> String {
        self.rows
            .get(key)
            .map(|row| row.clone())
            .unwrap_or_else(|| key.appl_key())
    }

    /// True if `appl_key` is the row currently standing for `key`.
    pub fn is_row(&self, key: &FdbKey, appl_key: &str) -> bool {
        self.rows
            .get(key)
            .map_or(appl_key == key.appl_key(), |row| row.as_str() == appl_key)
    }

    /// Learned keys in order.
    pub fn keys(&self) -> Vec<FdbKey> {
        let mut keys: Vec<FdbKey> = self.entries.iter().map(|e| *e.key()).collect();
        keys.sort();
        keys
    }
}

/// FdbOrch configuration.
#[derive(Debug, Clone)]
pub struct FdbOrchConfig {
    /// Most entries parked waiting for a VLAN or bridge port.
    pub max_pending: usize,
    /// How long an entry may wait before it is reported.
    pub pending_timeout: Duration,
    /// Events pulled from FDB_TABLE per pass.
    pub batch_size: usize,
}

impl Default for FdbOrchConfig {
    fn default() -> Self {
        Self {
            max_pending: 4096,
            pending_timeout: Duration::from_secs(300),
            batch_size: 128,
        }
    }
}

/// FdbOrch counters.
#[derive(Debug, Default)]
pub struct FdbOrchStats {
    pub entries_added: AtomicU64,
    pub entries_removed: AtomicU64,
    pub entries_updated: AtomicU64,
    pub entries_parked: AtomicU64,
    pub entries_rejected: AtomicU64,
    pub hardware_events_ignored: AtomicU64,
}

/// Notification listener counters.
#[derive(Debug, Default)]
pub struct FdbListenerStats {
    pub learned: AtomicU64,
    pub moved: AtomicU64,
    pub aged: AtomicU64,
    pub flushed: AtomicU64,
    pub unresolved: AtomicU64,
}
