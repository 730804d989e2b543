//! Structured per-key diagnostics.
//!
//! Handler errors never abort an Orch. They are recorded here against the
//! `(table, key)` that caused them, so operators and tests can ask why a key
//! has not converged.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Delete refused while dependents exist.
    ReferentialViolation,
    /// Prerequisite has not appeared within the pending window.
    UnresolvedPrerequisite,
    /// Entry dropped because a key or field could not be parsed.
    Malformed,
    /// Entry rejected because the pending queue is full.
    PendingOverflow,
    /// The switch rejected an operation.
    HardwareFailure,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::ReferentialViolation => "referential_violation",
            DiagnosticKind::UnresolvedPrerequisite => "unresolved_prerequisite",
            DiagnosticKind::Malformed => "malformed",
            DiagnosticKind::PendingOverflow => "pending_overflow",
            DiagnosticKind::HardwareFailure => "hardware_failure",
        };
        f.write_str(s)
    }
}

/// A diagnostic attached to one table key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub table: String,
    pub key: String,
    pub kind: DiagnosticKind,
    pub message: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrences: u32,
}

/// Shared diagnostic registry.
///
/// Clones share the same registry; every Orch task holds one.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Arc<DashMap<(String, String), Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic for `(table, key)` and returns its occurrence count.
    ///
    /// The first report for a key (or a change of kind) is logged at warn,
    /// repeats at debug.
    pub fn report(
        &self,
        table: &str,
        key: &str,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> u32 {
        let message = message.into();
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry((table.to_string(), key.to_string()))
            .or_insert_with(|| Diagnostic {
                table: table.to_string(),
                key: key.to_string(),
                kind,
                message: message.clone(),
                first_seen: now,
                last_seen: now,
                occurrences: 0,
            });

        if entry.kind != kind {
            entry.kind = kind;
            entry.first_seen = now;
            entry.occurrences = 0;
        }
        entry.message = message;
        entry.last_seen = now;
        entry.occurrences += 1;

        let occurrences = entry.occurrences;
        if occurrences == 1 {
            match kind {
                DiagnosticKind::HardwareFailure => {
                    error!(table, key, %kind, detail = %entry.message, "diagnostic")
                }
                _ => warn!(table, key, %kind, detail = %entry.message, "diagnostic"),
            }
        } else {
            debug!(table, key, %kind, occurrences, "diagnostic repeated");
        }
        occurrences
    }

    /// Clears the diagnostic for `(table, key)`, e.g. after it converged.
    pub fn clear(&self, table: &str, key: &str) -> bool {
        self.entries
            .remove(&(table.to_string(), key.to_string()))
            .is_some()
    }

    pub fn get(&self, table: &str, key: &str) -> Option<Diagnostic> {
        self.entries
            .get(&(table.to_string(), key.to_string()))
            .map(|d| d.clone())
    }

    /// Returns every diagnostic ordered by table and key.
    pub fn all(&self) -> Vec<Diagnostic> {
        let mut all: Vec<Diagnostic> = self.entries.iter().map(|d| d.value().clone()).collect();
        all.sort_by(|a, b| (&a.table, &a.key).cmp(&(&b.table, &b.key)));
        all
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
        self.all().into_iter().filter(|d| d.kind == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
