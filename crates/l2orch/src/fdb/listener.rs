//! Hardware FDB notification listener.
//!
//! Mirrors switch learn/move/age/flush notifications into APPL_DB
//! `FDB_TABLE`. Every write is tagged [`EventOrigin::Hardware`] so FdbOrch
//! treats it as bookkeeping and never pushes it back to the switch.

use super::types::{FdbKey, FdbListenerStats, LearnedEntry, LearnedFdbTable};
use crate::maps::IdMaps;
use async_trait::async_trait;
use sonic_orch_common::schema::{appl_db, fields};
use sonic_orch_common::{
    Database, DiagnosticKind, Diagnostics, EventOrigin, Inbox, Orch, Table, TrackedReceiver,
};
use sonic_sai::{FdbEvent, FdbEventType};
use sonic_types::FdbEntryType;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns [`FdbEvent`]s into APPL_DB FDB_TABLE writes.
pub struct FdbNotificationListener {
    inbox: Inbox<FdbEvent>,
    maps: IdMaps,
    diagnostics: Diagnostics,
    fdb_table: Table,
    learned: LearnedFdbTable,
    stats: Arc<FdbListenerStats>,
}

impl FdbNotificationListener {
    pub fn new(
        notifications: TrackedReceiver<FdbEvent>,
        maps: IdMaps,
        diagnostics: Diagnostics,
        appl_db: &Database,
        learned: LearnedFdbTable,
    ) -> Self {
        Self {
            inbox: Inbox::new(notifications),
            maps,
            diagnostics,
            fdb_table: appl_db.table(appl_db::FDB_TABLE),
            learned,
            stats: Arc::new(FdbListenerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<FdbListenerStats> {
        Arc::clone(&self.stats)
    }

    fn handle_event(&mut self, event: FdbEvent) {
        let key = FdbKey::new(event.entry.vlan_id, event.entry.mac);
        let appl_key = self.learned.row_key(&key);

        match event.event_type {
            FdbEventType::Learned | FdbEventType::Moved => {
                let Some(port) = self.maps.interface_of(event.bridge_port_id) else {
                    // The bridge port went away between the learn and now.
                    self.stats.unresolved.fetch_add(1, Ordering::Relaxed);
                    self.diagnostics.report(
                        appl_db::FDB_TABLE,
                        &appl_key,
                        DiagnosticKind::UnresolvedPrerequisite,
                        format!(
                            "{} names unknown bridge port {}",
                            event.event_type, event.bridge_port_id
                        ),
                    );
                    return;
                };

                let counter = if event.event_type == FdbEventType::Learned {
                    &self.stats.learned
                } else {
                    &self.stats.moved
                };
                counter.fetch_add(1, Ordering::Relaxed);

                self.learned.insert(
                    key,
                    LearnedEntry {
                        port: port.clone(),
                        bridge_port: event.bridge_port_id,
                    },
                );
                info!(key = %appl_key, %port, event = %event.event_type, "mirroring learned MAC");
                self.fdb_table.set_with_origin(
                    &appl_key,
                    vec![
                        (fields::PORT.to_string(), port),
                        (fields::TYPE.to_string(), FdbEntryType::Dynamic.to_string()),
                    ],
                    EventOrigin::Hardware,
                );
            }
            FdbEventType::Aged => {
                self.stats.aged.fetch_add(1, Ordering::Relaxed);
                self.learned.remove(&key);
                info!(key = %appl_key, "mirroring aged MAC");
                self.fdb_table
                    .del_with_origin(&appl_key, EventOrigin::Hardware);
            }
            FdbEventType::Flushed => {
                // Provisioned entries outlive a flush in FDB_TABLE; FdbOrch
                // re-parks them.
                if self.learned.remove(&key).is_some() {
                    self.stats.flushed.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %appl_key, "mirroring flushed MAC");
                    self.fdb_table
                        .del_with_origin(&appl_key, EventOrigin::Hardware);
                }
            }
        }
    }
}

#[async_trait]
impl Orch for FdbNotificationListener {
    fn name(&self) -> &str {
        "FdbNotificationListener"
    }

    async fn wait_for_work(&mut self) -> bool {
        self.inbox.wait().await
    }

    async fn do_task(&mut self) {
        for event in self.inbox.drain(usize::MAX) {
            self.handle_event(event);
        }
        self.inbox.ack();
    }

    fn priority(&self) -> i32 {
        2
    }
}
