//! In-process state store.
//!
//! Three databases mirror the SONiC Redis layout: CONFIG_DB holds operator
//! intent, APPL_DB holds runtime state such as FDB entries, and ASIC_DB holds
//! what the switch has actually been programmed with. Each database is a set
//! of named tables; each table maps a string key to an ordered list of
//! field/value pairs.
//!
//! Every mutation is published to the table's subscribers while the table
//! lock is held, so subscribers observe writes in commit order.

use crate::bus::{self, SettleTracker, TrackedReceiver, TrackedSender};
use crate::consumer::{EventOrigin, FieldValue, KeyOpFieldsValues};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Ordered field/value record.
pub type FieldValues = Vec<FieldValue>;

/// Database identifiers, numbered as in the SONiC Redis instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DbId {
    ApplDb = 0,
    AsicDb = 1,
    ConfigDb = 4,
}

impl DbId {
    pub const fn name(&self) -> &'static str {
        match self {
            DbId::ApplDb => "APPL_DB",
            DbId::AsicDb => "ASIC_DB",
            DbId::ConfigDb => "CONFIG_DB",
        }
    }
}

impl fmt::Display for DbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Default)]
struct TableState {
    rows: BTreeMap<String, FieldValues>,
    subscribers: Vec<TrackedSender<KeyOpFieldsValues>>,
}

impl TableState {
    fn publish(&mut self, event: &KeyOpFieldsValues) {
        self.subscribers.retain(|s| s.send(event.clone()).is_ok());
    }
}

struct DatabaseInner {
    id: DbId,
    tracker: SettleTracker,
    tables: Mutex<BTreeMap<String, TableState>>,
}

/// One database of the state store.
///
/// Cloning yields another handle to the same data.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("id", &self.inner.id).finish()
    }
}

impl Database {
    /// Creates an empty database whose subscriptions report to `tracker`.
    pub fn new(id: DbId, tracker: SettleTracker) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                id,
                tracker,
                tables: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn id(&self) -> DbId {
        self.inner.id
    }

    /// Returns a handle to a table. Tables exist implicitly.
    pub fn table(&self, name: &str) -> Table {
        Table {
            db: self.clone(),
            name: name.to_string(),
        }
    }

    /// Names of tables that currently hold at least one row.
    pub fn table_names(&self) -> Vec<String> {
        self.inner
            .tables
            .lock()
            .iter()
            .filter(|(_, t)| !t.rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Snapshot of every non-empty table.
    pub fn dump(&self) -> BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>> {
        self.inner
            .tables
            .lock()
            .iter()
            .filter(|(_, t)| !t.rows.is_empty())
            .map(|(name, t)| {
                let rows = t
                    .rows
                    .iter()
                    .map(|(key, fvs)| (key.clone(), fvs.iter().cloned().collect()))
                    .collect();
                (name.clone(), rows)
            })
            .collect()
    }

    fn with_table<R>(&self, name: &str, f: impl FnOnce(&mut TableState) -> R) -> R {
        let mut tables = self.inner.tables.lock();
        let state = tables.entry(name.to_string()).or_default();
        f(state)
    }
}

/// Handle to one table of a [`Database`].
#[derive(Clone, Debug)]
pub struct Table {
    db: Database,
    name: String,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db_id(&self) -> DbId {
        self.db.id()
    }

    /// Writes fields into `key`, merging with any existing record.
    pub fn set(&self, key: &str, fvs: FieldValues) {
        self.set_with_origin(key, fvs, EventOrigin::Local);
    }

    /// Writes fields into `key` and tags the published event with `origin`.
    ///
    /// Fields already present are overwritten in place; new fields are
    /// appended. Subscribers receive the full record after the merge.
    pub fn set_with_origin(&self, key: &str, fvs: FieldValues, origin: EventOrigin) {
        self.db.with_table(&self.name, |state| {
            let record = state.rows.entry(key.to_string()).or_default();
            for (field, value) in fvs {
                match record.iter_mut().find(|(f, _)| *f == field) {
                    Some(existing) => existing.1 = value,
                    None => record.push((field, value)),
                }
            }
            let event = KeyOpFieldsValues::set(key, record.clone()).with_origin(origin);
            trace!(db = %self.db.id(), table = %self.name, key, "SET");
            state.publish(&event);
        });
    }

    /// Writes a single field.
    pub fn hset(&self, key: &str, field: &str, value: &str) {
        self.set(key, vec![(field.to_string(), value.to_string())]);
    }

    /// Replaces the whole record of `key`, dropping fields not in `fvs`.
    pub fn replace(&self, key: &str, fvs: FieldValues) {
        self.db.with_table(&self.name, |state| {
            state.rows.insert(key.to_string(), fvs.clone());
            let event = KeyOpFieldsValues::set(key, fvs);
            state.publish(&event);
        });
    }

    /// Deletes `key`. Returns false (and publishes nothing) if it was absent.
    pub fn del(&self, key: &str) -> bool {
        self.del_with_origin(key, EventOrigin::Local)
    }

    pub fn del_with_origin(&self, key: &str, origin: EventOrigin) -> bool {
        self.db.with_table(&self.name, |state| {
            if state.rows.remove(key).is_none() {
                return false;
            }
            trace!(db = %self.db.id(), table = %self.name, key, "DEL");
            state.publish(&KeyOpFieldsValues::del(key).with_origin(origin));
            true
        })
    }

    pub fn get(&self, key: &str) -> Option<FieldValues> {
        self.db.with_table(&self.name, |state| state.rows.get(key).cloned())
    }

    pub fn get_field(&self, key: &str, field: &str) -> Option<String> {
        self.get(key)?
            .into_iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.db.with_table(&self.name, |state| state.rows.contains_key(key))
    }

    /// Keys in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.db
            .with_table(&self.name, |state| state.rows.keys().cloned().collect())
    }

    /// Full scan in key order.
    pub fn scan(&self) -> Vec<(String, FieldValues)> {
        self.db.with_table(&self.name, |state| {
            state
                .rows
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.db.with_table(&self.name, |state| state.rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to this table's change feed.
    ///
    /// The existing rows are delivered first as SET events, then every later
    /// mutation in commit order. Deliveries count against the database's
    /// settle tracker until the subscriber acknowledges them.
    pub fn subscribe(&self) -> TrackedReceiver<KeyOpFieldsValues> {
        let (tx, rx) = bus::channel(&self.db.inner.tracker);
        self.attach(tx);
        rx
    }

    /// Subscribes without participating in settle tracking.
    pub fn watch(&self) -> TrackedReceiver<KeyOpFieldsValues> {
        let (tx, rx) = bus::untracked_channel();
        self.attach(tx);
        rx
    }

    fn attach(&self, tx: TrackedSender<KeyOpFieldsValues>) {
        self.db.with_table(&self.name, |state| {
            for (key, fvs) in &state.rows {
                // A fresh receiver cannot be closed; ignore the result.
                let _ = tx.send(KeyOpFieldsValues::set(key.clone(), fvs.clone()));
            }
            state.subscribers.push(tx);
        });
    }
}
