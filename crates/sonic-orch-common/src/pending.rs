//! Pending cache for jobs blocked on a prerequisite.
//!
//! A job that cannot be realized yet (an FDB entry whose VLAN or bridge port
//! does not exist) is parked here with the constraints it waits on. When a
//! prerequisite appears the owning Orch calls [`PendingCache::satisfy`] and
//! re-attempts whatever became ready. A DEL for the key removes the job
//! before it can be realized.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A dependency on another table/key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint {
    /// The table containing the dependency
    pub table: String,
    /// The key within the table
    pub key: String,
}

impl Constraint {
    /// Creates a new constraint.
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table, self.key)
    }
}

/// Error type for pending cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingError {
    #[error("pending queue full ({capacity} entries)")]
    Full { capacity: usize },
}

#[derive(Debug)]
struct PendingEntry<T> {
    job: T,
    constraints: HashSet<Constraint>,
    enqueued_at: Instant,
    reported_overdue: bool,
}

/// Bounded cache of jobs waiting on constraints.
///
/// Jobs are indexed both by key and by each constraint they wait on, so
/// resolving a prerequisite touches only the jobs that care about it.
#[derive(Debug)]
pub struct PendingCache<K, T> {
    entries: HashMap<K, PendingEntry<T>>,
    /// Reverse index: constraint -> keys waiting on it
    waiters: BTreeMap<Constraint, HashSet<K>>,
    capacity: usize,
}

impl<K, T> PendingCache<K, T>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache holding at most `capacity` jobs.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            waiters: BTreeMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Parks a job. Replaces any job already parked under `key`.
    ///
    /// Replacing does not count against capacity; a new key beyond capacity
    /// is refused.
    pub fn insert(
        &mut self,
        key: K,
        job: T,
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Result<(), PendingError> {
        let previous = self.unlink(&key);
        if previous.is_none() && self.entries.len() >= self.capacity {
            return Err(PendingError::Full {
                capacity: self.capacity,
            });
        }

        let constraints: HashSet<Constraint> = constraints.into_iter().collect();
        for constraint in &constraints {
            self.waiters
                .entry(constraint.clone())
                .or_default()
                .insert(key.clone());
        }

        // A re-parked job keeps its original age so the overdue window is
        // measured from when it first blocked.
        let enqueued_at = previous
            .as_ref()
            .map(|p| p.enqueued_at)
            .unwrap_or_else(Instant::now);
        let reported_overdue = previous.map(|p| p.reported_overdue).unwrap_or(false);

        self.entries.insert(
            key,
            PendingEntry {
                job,
                constraints,
                enqueued_at,
                reported_overdue,
            },
        );
        Ok(())
    }

    /// Removes a job (cancellation).
    pub fn remove(&mut self, key: &K) -> Option<T> {
        self.unlink(key).map(|entry| entry.job)
    }

    fn unlink(&mut self, key: &K) -> Option<PendingEntry<T>> {
        let entry = self.entries.remove(key)?;
        for constraint in &entry.constraints {
            if let Some(waiters) = self.waiters.get_mut(constraint) {
                waiters.remove(key);
                if waiters.is_empty() {
                    self.waiters.remove(constraint);
                }
            }
        }
        Some(entry)
    }

    /// Returns the job parked under `key`.
    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.get(key).map(|e| &e.job)
    }

    /// Marks a constraint satisfied and takes every job left with none.
    pub fn satisfy(&mut self, constraint: &Constraint) -> Vec<(K, T)> {
        let mut ready = Vec::new();

        if let Some(waiting_keys) = self.waiters.remove(constraint) {
            for key in waiting_keys {
                let now_ready = match self.entries.get_mut(&key) {
                    Some(entry) => {
                        entry.constraints.remove(constraint);
                        entry.constraints.is_empty()
                    }
                    None => false,
                };
                if now_ready {
                    if let Some(entry) = self.entries.remove(&key) {
                        ready.push((key, entry.job));
                    }
                }
            }
        }

        ready
    }

    /// Returns the constraints a job still waits on.
    pub fn constraints(&self, key: &K) -> Option<&HashSet<Constraint>> {
        self.entries.get(key).map(|e| &e.constraints)
    }

    /// Number of jobs waiting on a constraint.
    pub fn waiting_on(&self, constraint: &Constraint) -> usize {
        self.waiters.get(constraint).map_or(0, |w| w.len())
    }

    /// Returns keys parked longer than `timeout` that have not been reported
    /// yet, and marks them reported.
    ///
    /// Overdue jobs stay parked; they are surfaced once so the caller can
    /// raise a diagnostic.
    pub fn take_overdue(&mut self, now: Instant, timeout: Duration) -> Vec<(K, Duration)> {
        let mut overdue = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            let age = now.saturating_duration_since(entry.enqueued_at);
            if !entry.reported_overdue && age >= timeout {
                entry.reported_overdue = true;
                overdue.push((key.clone(), age));
            }
        }
        overdue
    }

    /// Iterates over parked jobs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries.iter().map(|(k, e)| (k, &e.job))
    }

    /// Clears all entries from the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.waiters.clear();
    }
}
