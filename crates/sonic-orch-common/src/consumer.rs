//! Consumer for table change events.

use crate::bus::{Inbox, TrackedReceiver};
use std::collections::{BTreeMap, VecDeque};

/// Operation type of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Set operation (add or update)
    Set,
    /// Delete operation
    Del,
}

impl Operation {
    /// Returns true if this is a Set operation.
    pub fn is_set(&self) -> bool {
        matches!(self, Operation::Set)
    }

    /// Returns true if this is a Del operation.
    pub fn is_del(&self) -> bool {
        matches!(self, Operation::Del)
    }
}

/// Where a change originated.
///
/// Changes mirrored up from hardware notifications are tagged `Hardware` so
/// the FDB path never pushes them back down to the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventOrigin {
    #[default]
    Local,
    Hardware,
}

/// A field-value pair of a table record.
pub type FieldValue = (String, String);

/// Key, operation, and field-values tuple.
///
/// This is the fundamental unit delivered by a table subscription. SET
/// events carry the full record after the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOpFieldsValues {
    /// The key (e.g., "Vlan2|Ethernet0", "Vlan2:52-54-00-25-06-E9")
    pub key: String,
    /// The operation (Set or Del)
    pub op: Operation,
    /// Field-value pairs (empty for Del operations)
    pub fvs: Vec<FieldValue>,
    /// Origin of the write
    pub origin: EventOrigin,
}

impl KeyOpFieldsValues {
    /// Creates a new locally originated entry.
    pub fn new(key: impl Into<String>, op: Operation, fvs: Vec<FieldValue>) -> Self {
        Self {
            key: key.into(),
            op,
            fvs,
            origin: EventOrigin::Local,
        }
    }

    /// Creates a Set entry.
    pub fn set(key: impl Into<String>, fvs: Vec<FieldValue>) -> Self {
        Self::new(key, Operation::Set, fvs)
    }

    /// Creates a Del entry.
    pub fn del(key: impl Into<String>) -> Self {
        Self::new(key, Operation::Del, vec![])
    }

    /// Tags the entry with an origin.
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Returns the value for a field, if present.
    pub fn get_field(&self, field: &str) -> Option<&str> {
        self.fvs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if this entry has the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.fvs.iter().any(|(f, _)| f == field)
    }

    /// Returns true if the change came from a hardware notification.
    pub fn is_hardware_origin(&self) -> bool {
        self.origin == EventOrigin::Hardware
    }
}

/// Configuration for a Consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Table name (e.g., "VLAN_MEMBER", "FDB_TABLE")
    pub table_name: String,
    /// Priority (lower = higher priority)
    pub priority: i32,
    /// Maximum events pulled from the channel per pop
    pub batch_size: usize,
}

impl ConsumerConfig {
    /// Creates a new consumer config.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            priority: 0,
            batch_size: 128,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Consumer for table change events.
///
/// A Consumer pulls events from a table subscription and queues them for
/// its Orch. It handles:
///
/// - Batched reading from the change feed
/// - Deduplication of operations on the same key
/// - Re-queueing of entries that must wait
///
/// # Deduplication Logic
///
/// When multiple operations arrive for the same key:
/// - DEL: clears everything queued for the key, including parked retries
/// - SET after SET from the same origin: merge field-values (newer
///   overwrites older)
/// - SET after a SET from the other origin, or after DEL: keep both
///   (maintain ordering)
pub struct Consumer {
    config: ConsumerConfig,
    source: Option<Inbox<KeyOpFieldsValues>>,
    /// Pending tasks indexed by key for deduplication
    to_sync: BTreeMap<String, VecDeque<KeyOpFieldsValues>>,
    /// Total count of pending entries
    pending_count: usize,
}

impl Consumer {
    /// Creates a consumer with no change feed; entries are added by hand.
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            config,
            source: None,
            to_sync: BTreeMap::new(),
            pending_count: 0,
        }
    }

    /// Creates a consumer fed by a table subscription.
    pub fn with_source(config: ConsumerConfig, rx: TrackedReceiver<KeyOpFieldsValues>) -> Self {
        Self {
            source: Some(Inbox::new(rx)),
            ..Self::new(config)
        }
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    /// Returns the priority.
    pub fn priority(&self) -> i32 {
        self.config.priority
    }

    /// Returns true if there are pending entries.
    pub fn has_pending(&self) -> bool {
        self.pending_count > 0
    }

    /// Returns the number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    /// Returns true while the change feed can still deliver events.
    pub fn is_open(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_open())
    }

    /// Waits for the next event from the change feed.
    ///
    /// Returns false if there is no feed or it has closed. Cancel safe.
    pub async fn wait(&mut self) -> bool {
        match self.source.as_mut() {
            Some(source) => source.wait().await,
            None => false,
        }
    }

    /// Moves available events from the change feed into the sync queue.
    ///
    /// Returns the number of events moved.
    pub fn pops(&mut self) -> usize {
        let batch_size = self.config.batch_size;
        let entries = match self.source.as_mut() {
            Some(source) => source.drain(batch_size),
            None => return 0,
        };
        let count = entries.len();
        self.add_to_sync(entries);
        count
    }

    /// Marks every popped event as processed.
    ///
    /// Call once the Orch has finished the pass that handled them.
    pub fn ack(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.ack();
        }
    }

    /// Adds entries to the sync queue with deduplication.
    pub fn add_to_sync(&mut self, entries: Vec<KeyOpFieldsValues>) {
        for entry in entries {
            self.add_single_entry(entry);
        }
    }

    fn add_single_entry(&mut self, entry: KeyOpFieldsValues) {
        let queue = self.to_sync.entry(entry.key.clone()).or_default();

        match entry.op {
            Operation::Del => {
                if !queue.is_empty() {
                    self.pending_count -= queue.len();
                    queue.clear();
                }
                queue.push_back(entry);
                self.pending_count += 1;
            }
            Operation::Set => {
                if let Some(last) = queue.back_mut() {
                    // A hardware echo must not take over a local write.
                    if last.op == Operation::Set && last.origin == entry.origin {
                        for (field, value) in entry.fvs {
                            if let Some(existing) = last.fvs.iter_mut().find(|(f, _)| *f == field) {
                                existing.1 = value;
                            } else {
                                last.fvs.push((field, value));
                            }
                        }
                        return;
                    }
                }
                queue.push_back(entry);
                self.pending_count += 1;
            }
        }
    }

    /// Drains all pending entries, grouped by key in operation order.
    pub fn drain(&mut self) -> Vec<KeyOpFieldsValues> {
        let mut result = Vec::with_capacity(self.pending_count);

        for (_key, mut queue) in std::mem::take(&mut self.to_sync) {
            while let Some(entry) = queue.pop_front() {
                result.push(entry);
            }
        }

        self.pending_count = 0;
        result
    }

    /// Peeks at pending entries without removing them.
    pub fn peek(&self) -> impl Iterator<Item = &KeyOpFieldsValues> {
        self.to_sync.values().flat_map(|q| q.iter())
    }

    /// Parks a drained entry so the next pass sees it again.
    ///
    /// Entries are appended without merging, so re-queueing a drained batch
    /// in its original order keeps per-key FIFO. A later DEL for the key
    /// still cancels it.
    pub fn retry(&mut self, entry: KeyOpFieldsValues) {
        let queue = self.to_sync.entry(entry.key.clone()).or_default();
        queue.push_back(entry);
        self.pending_count += 1;
    }

    /// Clears all pending entries.
    pub fn clear(&mut self) {
        self.to_sync.clear();
        self.pending_count = 0;
    }

    /// Dumps pending entries for debugging.
    pub fn dump(&self) -> Vec<String> {
        self.to_sync
            .iter()
            .flat_map(|(key, queue)| {
                queue.iter().map(move |e| {
                    format!(
                        "{}:{}: {} {:?}",
                        self.config.table_name,
                        key,
                        if e.op.is_set() { "SET" } else { "DEL" },
                        e.fvs
                    )
                })
            })
            .collect()
    }
}
