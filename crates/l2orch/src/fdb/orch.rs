//! FdbOrch: APPL_DB `FDB_TABLE` to switch FDB entries.
//!
//! Per key the entry moves `absent -> pending -> programmed -> absent`. An
//! entry is only programmed while the id maps hold both its VLAN and its
//! interface's bridge port; otherwise it is parked in a [`PendingCache`]
//! indexed by the missing prerequisites and resumed by PortsOrch signals.

use super::types::{
    FdbKey, FdbOrchConfig, FdbOrchStats, FdbOrigin, FdbRecord, FdbSpec, LearnedEntry,
    LearnedFdbTable, PendingFdb,
};
use crate::maps::{IdMaps, Prerequisite};
use crate::ports::PortChange;
use async_trait::async_trait;
use sonic_orch_common::schema::{appl_db, fields};
use sonic_orch_common::{
    Constraint, Consumer, ConsumerConfig, Database, DiagnosticKind, Diagnostics, Inbox,
    EventOrigin, KeyOpFieldsValues, Operation, Orch, PendingCache, Table, TaskError, TaskResult,
    TaskStatus, TrackedReceiver,
};
use sonic_sai::{FdbEntryAttrs, SaiApi, SaiError, SaiFdbEntry};
use sonic_types::{FdbEntryType, PacketAction};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

fn sai_error(err: SaiError) -> TaskError {
    TaskError::sai(err.to_string())
}

fn parse_spec(entry: &KeyOpFieldsValues) -> TaskResult<FdbSpec> {
    let port = entry
        .get_field(fields::PORT)
        .filter(|port| !port.is_empty())
        .ok_or_else(|| TaskError::malformed(format!("{} has no port", entry.key)))?;
    let entry_type = entry
        .get_field(fields::TYPE)
        .map(str::parse::<FdbEntryType>)
        .transpose()?
        .unwrap_or_default();
    let packet_action = entry
        .get_field(fields::PACKET_ACTION)
        .map(str::parse::<PacketAction>)
        .transpose()?
        .unwrap_or_default();
    Ok(FdbSpec {
        port: port.to_string(),
        entry_type,
        packet_action,
    })
}

/// Programs provisioned FDB entries once their VLAN and bridge port exist.
pub struct FdbOrch {
    config: FdbOrchConfig,
    sai: Arc<dyn SaiApi>,
    maps: IdMaps,
    diagnostics: Diagnostics,
    consumer: Consumer,
    fdb_table: Table,
    signals: Option<Inbox<PortChange>>,
    learned: LearnedFdbTable,
    programmed: BTreeMap<FdbKey, FdbRecord>,
    pending: PendingCache<FdbKey, PendingFdb>,
    stats: Arc<FdbOrchStats>,
}

impl FdbOrch {
    pub fn new(
        config: FdbOrchConfig,
        sai: Arc<dyn SaiApi>,
        maps: IdMaps,
        diagnostics: Diagnostics,
        appl_db: &Database,
        learned: LearnedFdbTable,
    ) -> Self {
        let consumer = Consumer::with_source(
            ConsumerConfig::new(appl_db::FDB_TABLE).with_batch_size(config.batch_size),
            appl_db.table(appl_db::FDB_TABLE).subscribe(),
        );
        let pending = PendingCache::new(config.max_pending);
        Self {
            config,
            sai,
            maps,
            diagnostics,
            consumer,
            fdb_table: appl_db.table(appl_db::FDB_TABLE),
            signals: None,
            learned,
            programmed: BTreeMap::new(),
            pending,
            stats: Arc::new(FdbOrchStats::default()),
        }
    }

    /// Listens for PortsOrch VLAN and bridge port changes.
    pub fn with_signals(mut self, signals: TrackedReceiver<PortChange>) -> Self {
        self.signals = Some(Inbox::new(signals));
        self
    }

    pub fn stats(&self) -> Arc<FdbOrchStats> {
        Arc::clone(&self.stats)
    }

    pub fn programmed(&self, key: &FdbKey) -> Option<&FdbRecord> {
        self.programmed.get(key)
    }

    pub fn is_pending(&self, key: &FdbKey) -> bool {
        self.pending.contains(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn origin_of(&self, key: &FdbKey) -> Option<FdbOrigin> {
        if self.programmed.contains_key(key) || self.pending.contains(key) {
            Some(FdbOrigin::Provisioned)
        } else if self.learned.contains(key) {
            Some(FdbOrigin::Learned)
        } else {
            None
        }
    }

    fn process_entry(&mut self, entry: KeyOpFieldsValues) {
        let result = match entry.op {
            Operation::Set => self.handle_set(&entry),
            Operation::Del => self.handle_del(&entry),
        };
        match result {
            Ok(status) => {
                debug!(key = %entry.key, ?status, origin = ?entry.origin, "processed");
                if status.is_success() {
                    self.diagnostics.clear(appl_db::FDB_TABLE, &entry.key);
                }
            }
            Err(err) => {
                self.diagnostics.report(
                    appl_db::FDB_TABLE,
                    &entry.key,
                    err.diagnostic_kind(),
                    err.to_string(),
                );
            }
        }
    }

    fn handle_set(&mut self, entry: &KeyOpFieldsValues) -> TaskResult<TaskStatus> {
        let key = FdbKey::parse(&entry.key)?;
        if !key.mac.is_valid_fdb_target() {
            return Err(TaskError::malformed(format!(
                "{} is not a unicast MAC address",
                key.mac
            )));
        }
        let spec = parse_spec(entry)?;

        if entry.is_hardware_origin() {
            return Ok(self.record_learned(key, spec));
        }
        self.provision(key, entry.key.clone(), spec)
    }

    /// Hardware already holds a mirrored entry; only the bookkeeping moves.
    fn record_learned(&mut self, key: FdbKey, spec: FdbSpec) -> TaskStatus {
        self.stats
            .hardware_events_ignored
            .fetch_add(1, Ordering::Relaxed);

        if let Some(record) = self.programmed.get(&key) {
            if record.spec.entry_type == FdbEntryType::Static {
                return TaskStatus::Ignore;
            }
            // A station move took over a provisioned dynamic entry.
            self.programmed.remove(&key);
        }
        if !self.learned.contains(&key) {
            let bridge_port = self.maps.bridge_port(&spec.port).unwrap_or_default();
            self.learned.insert(
                key,
                LearnedEntry {
                    port: spec.port,
                    bridge_port,
                },
            );
        }
        TaskStatus::Ignore
    }

    #[instrument(skip(self, spec), fields(port = %spec.port))]
    fn provision(&mut self, key: FdbKey, appl_key: String, spec: FdbSpec) -> TaskResult<TaskStatus> {
        if self.learned.remove(&key).is_some() {
            debug!("provisioned entry overrides learned entry");
            // The mirrored row may be spelled differently from this one.
            let learned_row = self.learned.row_key(&key);
            if learned_row != appl_key {
                self.fdb_table
                    .del_with_origin(&learned_row, EventOrigin::Hardware);
            }
        }
        self.learned.record_row(key, &appl_key);

        if let Some(record) = self.programmed.get(&key) {
            if record.spec == spec {
                return Ok(TaskStatus::Duplicated);
            }
            let sai_entry = SaiFdbEntry::new(self.sai.switch_id(), key.vlan_id, key.mac);
            match self.sai.remove_fdb_entry(&sai_entry) {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(sai_error(err)),
            }
            self.programmed.remove(&key);
            self.stats.entries_updated.fetch_add(1, Ordering::Relaxed);
        }

        self.try_program(key, PendingFdb { appl_key, spec })
    }

    /// Programs the entry if both prerequisites resolve, else parks it.
    fn try_program(&mut self, key: FdbKey, job: PendingFdb) -> TaskResult<TaskStatus> {
        let sai = &self.sai;
        let sai_entry = SaiFdbEntry::new(sai.switch_id(), key.vlan_id, key.mac);
        let spec = &job.spec;

        let outcome = self
            .maps
            .with_fdb_target(key.vlan_id, &spec.port, |_vlan_oid, bridge_port| {
                let attrs = FdbEntryAttrs {
                    bridge_port_id: bridge_port,
                    entry_type: spec.entry_type,
                    packet_action: spec.packet_action,
                };
                // A learned entry for the same key gives way to the
                // provisioned one.
                let created = match sai.create_fdb_entry(&sai_entry, attrs) {
                    Err(err) if err.is_already_exists() => sai
                        .remove_fdb_entry(&sai_entry)
                        .and_then(|()| sai.create_fdb_entry(&sai_entry, attrs)),
                    other => other,
                };
                created.map(|()| bridge_port)
            });

        match outcome {
            Ok(Ok(bridge_port)) => {
                self.pending.remove(&key);
                info!(
                    %key,
                    port = %job.spec.port,
                    %bridge_port,
                    entry_type = %job.spec.entry_type,
                    "programmed FDB entry"
                );
                self.programmed.insert(
                    key,
                    FdbRecord {
                        appl_key: job.appl_key,
                        spec: job.spec,
                        bridge_port,
                    },
                );
                self.stats.entries_added.fetch_add(1, Ordering::Relaxed);
                Ok(TaskStatus::Success)
            }
            Ok(Err(err)) => {
                self.pending.remove(&key);
                Err(sai_error(err))
            }
            Err(missing) => Ok(self.park(key, job, &missing)),
        }
    }

    fn park(&mut self, key: FdbKey, job: PendingFdb, missing: &[Prerequisite]) -> TaskStatus {
        let waiting: Vec<String> = missing.iter().map(ToString::to_string).collect();
        let appl_key = job.appl_key.clone();
        let constraints: Vec<Constraint> = missing.iter().map(Prerequisite::constraint).collect();

        match self.pending.insert(key, job, constraints) {
            Ok(()) => {
                self.stats.entries_parked.fetch_add(1, Ordering::Relaxed);
                debug!(%key, waiting = %waiting.join(", "), "parked FDB entry");
                TaskStatus::WaitingForDependency
            }
            Err(err) => {
                self.stats.entries_rejected.fetch_add(1, Ordering::Relaxed);
                self.diagnostics.report(
                    appl_db::FDB_TABLE,
                    &appl_key,
                    DiagnosticKind::PendingOverflow,
                    format!("waiting for {}: {}", waiting.join(", "), err),
                );
                TaskStatus::Failed
            }
        }
    }

    fn handle_del(&mut self, entry: &KeyOpFieldsValues) -> TaskResult<TaskStatus> {
        let key = FdbKey::parse(&entry.key)?;

        if entry.is_hardware_origin() {
            self.stats
                .hardware_events_ignored
                .fetch_add(1, Ordering::Relaxed);
            // A superseded row of the same key says nothing about the entry.
            if !self.learned.is_row(&key, &entry.key) {
                return Ok(TaskStatus::Ignore);
            }
            // Aged or flushed: the switch already dropped it.
            self.learned.forget_row(&key);
            self.learned.remove(&key);
            self.pending.remove(&key);
            if self.programmed.remove(&key).is_some() {
                debug!(%key, "hardware dropped programmed FDB entry");
            }
            return Ok(TaskStatus::Ignore);
        }

        self.learned.forget_row(&key);
        let cancelled = self.pending.remove(&key).is_some();
        if cancelled {
            debug!(%key, "cancelled pending FDB entry");
        }
        let record = self.programmed.remove(&key);
        let learned = self.learned.remove(&key);

        if record.is_none() && learned.is_none() {
            return Ok(if cancelled {
                TaskStatus::Success
            } else {
                TaskStatus::Ignore
            });
        }

        let sai_entry = SaiFdbEntry::new(self.sai.switch_id(), key.vlan_id, key.mac);
        match self.sai.remove_fdb_entry(&sai_entry) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(sai_error(err)),
        }
        self.stats.entries_removed.fetch_add(1, Ordering::Relaxed);
        info!(%key, "removed FDB entry");
        Ok(TaskStatus::Success)
    }

    fn handle_port_change(&mut self, change: PortChange) {
        debug!(%change, "handling port change");
        match change {
            PortChange::VlanCreated(vlan_id) => {
                self.resume(&Prerequisite::Vlan(vlan_id).constraint());
            }
            PortChange::BridgePortCreated(iface) => {
                self.resume(&Prerequisite::BridgePort(iface).constraint());
            }
            PortChange::VlanRemoved(vlan_id) => {
                self.requeue(|key, _| key.vlan_id == vlan_id);
            }
            PortChange::BridgePortRemoved(iface) => {
                self.requeue(|_, record| record.spec.port == iface);
            }
        }
    }

    /// Re-attempts every parked entry the constraint was the last blocker of.
    fn resume(&mut self, constraint: &Constraint) {
        for (key, job) in self.pending.satisfy(constraint) {
            let appl_key = job.appl_key.clone();
            match self.try_program(key, job) {
                Ok(status) if status.is_success() => {
                    self.diagnostics.clear(appl_db::FDB_TABLE, &appl_key);
                }
                Ok(_) => {}
                Err(err) => {
                    self.diagnostics.report(
                        appl_db::FDB_TABLE,
                        &appl_key,
                        err.diagnostic_kind(),
                        err.to_string(),
                    );
                }
            }
        }
    }

    /// Sends programmed entries whose prerequisite went away back to pending.
    ///
    /// The switch flushed them before the signal was sent.
    fn requeue(&mut self, affected: impl Fn(&FdbKey, &FdbRecord) -> bool) {
        let keys: Vec<FdbKey> = self
            .programmed
            .iter()
            .filter(|(key, record)| affected(*key, *record))
            .map(|(key, _)| *key)
            .collect();

        for key in keys {
            let Some(record) = self.programmed.remove(&key) else {
                continue;
            };
            info!(%key, port = %record.spec.port, "FDB entry back to pending");
            let job = PendingFdb {
                appl_key: record.appl_key,
                spec: record.spec,
            };
            let appl_key = job.appl_key.clone();
            if let Err(err) = self.try_program(key, job) {
                self.diagnostics.report(
                    appl_db::FDB_TABLE,
                    &appl_key,
                    err.diagnostic_kind(),
                    err.to_string(),
                );
            }
        }
    }
}

#[async_trait]
impl Orch for FdbOrch {
    fn name(&self) -> &str {
        "FdbOrch"
    }

    async fn wait_for_work(&mut self) -> bool {
        match self.signals.as_mut() {
            Some(signals) => tokio::select! {
                true = self.consumer.wait() => true,
                true = signals.wait() => true,
                else => false,
            },
            None => self.consumer.wait().await,
        }
    }

    async fn do_task(&mut self) {
        self.consumer.pops();

        let changes = match self.signals.as_mut() {
            Some(signals) => signals.drain(usize::MAX),
            None => Vec::new(),
        };
        for change in changes {
            self.handle_port_change(change);
        }

        for entry in self.consumer.drain() {
            self.process_entry(entry);
        }

        self.consumer.ack();
        if let Some(signals) = self.signals.as_mut() {
            signals.ack();
        }
    }

    fn priority(&self) -> i32 {
        1
    }

    fn has_pending_tasks(&self) -> bool {
        self.consumer.has_pending() || !self.pending.is_empty()
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        let mut dump: Vec<String> = self
            .pending
            .iter()
            .map(|(key, job)| {
                let mut waiting: Vec<String> = self
                    .pending
                    .constraints(key)
                    .map(|c| c.iter().map(ToString::to_string).collect())
                    .unwrap_or_default();
                waiting.sort();
                format!(
                    "{}:{} port={} waiting on {}",
                    appl_db::FDB_TABLE,
                    key,
                    job.spec.port,
                    waiting.join(", ")
                )
            })
            .collect();
        dump.sort();
        dump
    }

    /// Reports entries parked longer than the pending timeout. They stay
    /// parked.
    fn on_timer(&mut self) {
        let overdue = self
            .pending
            .take_overdue(Instant::now(), self.config.pending_timeout);
        for (key, age) in overdue {
            let Some(job) = self.pending.get(&key) else {
                continue;
            };
            let mut waiting: Vec<String> = self
                .pending
                .constraints(&key)
                .map(|c| c.iter().map(ToString::to_string).collect())
                .unwrap_or_default();
            waiting.sort();
            self.diagnostics.report(
                appl_db::FDB_TABLE,
                &job.appl_key,
                DiagnosticKind::UnresolvedPrerequisite,
                format!("waiting {}s for {}", age.as_secs(), waiting.join(", ")),
            );
        }
    }
}
