//! PortsOrch: VLAN, VLAN member and bridge port reconciliation.
//!
//! Consumes CONFIG_DB `VLAN`, `VLAN_MEMBER` and `PORT`. Every object it
//! creates is published in [`IdMaps`] before FdbOrch is told about it, and
//! every object it removes is unpublished before its FDB entries are flushed.

use super::types::{
    BridgePortInfo, PortChange, PortsOrchConfig, PortsOrchStats, VlanInfo, VlanMemberInfo,
    VlanMemberKey,
};
use crate::maps::{IdMaps, Prerequisite};
use async_trait::async_trait;
use sonic_orch_common::schema::{config_db, fields};
use sonic_orch_common::{
    Consumer, ConsumerConfig, Database, Diagnostics, KeyOpFieldsValues, Operation, Orch, SyncMap,
    TaskError, TaskResult, TaskStatus, TrackedSender,
};
use sonic_sai::{FdbFlushFilter, SaiApi, SaiError};
use sonic_types::{AdminState, VlanId, VlanTaggingMode};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Consumer priorities: VLANs before their members, ports last.
const VLAN_PRIORITY: i32 = 0;
const VLAN_MEMBER_PRIORITY: i32 = 1;
const PORT_PRIORITY: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortsTable {
    Vlan,
    VlanMember,
    Port,
}

fn sai_error(err: SaiError) -> TaskError {
    TaskError::sai(err.to_string())
}

/// Owner of the VLAN, VLAN member and bridge port objects.
pub struct PortsOrch {
    config: PortsOrchConfig,
    sai: Arc<dyn SaiApi>,
    maps: IdMaps,
    diagnostics: Diagnostics,
    signals: Option<TrackedSender<PortChange>>,
    vlan_consumer: Consumer,
    member_consumer: Consumer,
    port_consumer: Consumer,
    vlans: BTreeMap<VlanId, VlanInfo>,
    members: BTreeMap<VlanMemberKey, VlanMemberInfo>,
    bridge_ports: SyncMap<String, BridgePortInfo>,
    stats: Arc<PortsOrchStats>,
}

impl PortsOrch {
    /// Subscribes to the CONFIG_DB tables and registers the default VLAN.
    pub fn new(
        config: PortsOrchConfig,
        sai: Arc<dyn SaiApi>,
        maps: IdMaps,
        diagnostics: Diagnostics,
        config_db: &Database,
    ) -> Self {
        let consumer = |table: &str, priority: i32| {
            Consumer::with_source(
                ConsumerConfig::new(table)
                    .with_priority(priority)
                    .with_batch_size(config.batch_size),
                config_db.table(table).subscribe(),
            )
        };
        let vlan_consumer = consumer(config_db::VLAN, VLAN_PRIORITY);
        let member_consumer = consumer(config_db::VLAN_MEMBER, VLAN_MEMBER_PRIORITY);
        let port_consumer = consumer(config_db::PORT, PORT_PRIORITY);

        let default_vlan = sai.default_vlan();
        maps.insert_vlan(VlanId::DEFAULT, default_vlan);
        let mut vlans = BTreeMap::new();
        vlans.insert(VlanId::DEFAULT, VlanInfo::new(VlanId::DEFAULT, default_vlan));

        Self {
            config,
            sai,
            maps,
            diagnostics,
            signals: None,
            vlan_consumer,
            member_consumer,
            port_consumer,
            vlans,
            members: BTreeMap::new(),
            bridge_ports: SyncMap::new(),
            stats: Arc::new(PortsOrchStats::default()),
        }
    }

    /// Routes VLAN and bridge port changes to the FDB side.
    pub fn with_signals(mut self, signals: TrackedSender<PortChange>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn config(&self) -> &PortsOrchConfig {
        &self.config
    }

    /// Shared handle to the counters.
    pub fn stats(&self) -> Arc<PortsOrchStats> {
        Arc::clone(&self.stats)
    }

    pub fn vlan(&self, vlan_id: VlanId) -> Option<&VlanInfo> {
        self.vlans.get(&vlan_id)
    }

    pub fn member(&self, vlan_id: VlanId, iface: &str) -> Option<&VlanMemberInfo> {
        self.members.get(&VlanMemberKey {
            vlan_id,
            iface: iface.to_string(),
        })
    }

    pub fn bridge_port(&self, iface: &str) -> Option<&BridgePortInfo> {
        self.bridge_ports.get(&iface.to_string())
    }

    fn signal(&self, change: PortChange) {
        debug!(%change, "port change");
        if let Some(signals) = &self.signals {
            if signals.send(change).is_err() {
                warn!("FDB signal receiver dropped");
            }
        }
    }

    fn consumer_mut(&mut self, table: PortsTable) -> &mut Consumer {
        match table {
            PortsTable::Vlan => &mut self.vlan_consumer,
            PortsTable::VlanMember => &mut self.member_consumer,
            PortsTable::Port => &mut self.port_consumer,
        }
    }

    /// Runs every queued entry of one table once.
    ///
    /// A key whose entry must wait keeps its later entries queued behind it.
    /// Returns the number of entries that left the queue.
    fn process_table(&mut self, table: PortsTable) -> usize {
        let entries = self.consumer_mut(table).drain();
        let mut blocked: HashSet<String> = HashSet::new();
        let mut completed = 0;

        for entry in entries {
            if blocked.contains(&entry.key) {
                self.consumer_mut(table).retry(entry);
                continue;
            }

            let result = match table {
                PortsTable::Vlan => self.handle_vlan(&entry),
                PortsTable::VlanMember => self.handle_vlan_member(&entry),
                PortsTable::Port => self.handle_port(&entry),
            };
            let table_name = self.consumer_mut(table).table_name().to_string();

            match result {
                Ok(status) => {
                    debug!(table = %table_name, key = %entry.key, ?status, "processed");
                    self.diagnostics.clear(&table_name, &entry.key);
                    completed += 1;
                }
                Err(err) => {
                    self.diagnostics.report(
                        &table_name,
                        &entry.key,
                        err.diagnostic_kind(),
                        err.to_string(),
                    );
                    if err.is_retryable() {
                        blocked.insert(entry.key.clone());
                        self.consumer_mut(table).retry(entry);
                    } else {
                        completed += 1;
                    }
                }
            }
        }
        completed
    }

    // ------------------------------------------------------------------
    // VLAN
    // ------------------------------------------------------------------

    fn handle_vlan(&mut self, entry: &KeyOpFieldsValues) -> TaskResult<TaskStatus> {
        let vlan_id = VlanId::from_alias(&entry.key)?;
        match entry.op {
            Operation::Set => {
                if let Some(value) = entry.get_field(fields::VLAN_ID) {
                    let field_id: VlanId = value.parse()?;
                    if field_id != vlan_id {
                        return Err(TaskError::malformed(format!(
                            "vlanid {} does not match key {}",
                            value, entry.key
                        )));
                    }
                }
                if let Some(value) = entry.get_field(fields::ADMIN_STATUS) {
                    value.parse::<AdminState>()?;
                }
                self.add_vlan(vlan_id)
            }
            Operation::Del => self.remove_vlan(vlan_id),
        }
    }

    #[instrument(skip(self), fields(vlan = %vlan_id.alias()))]
    fn add_vlan(&mut self, vlan_id: VlanId) -> TaskResult<TaskStatus> {
        if self.vlans.contains_key(&vlan_id) {
            return Ok(TaskStatus::Duplicated);
        }

        let oid = self.sai.create_vlan(vlan_id).map_err(sai_error)?;
        self.maps.insert_vlan(vlan_id, oid);
        self.vlans.insert(vlan_id, VlanInfo::new(vlan_id, oid));
        self.stats.vlans_created.fetch_add(1, Ordering::Relaxed);
        info!(%oid, "created VLAN");

        self.signal(PortChange::VlanCreated(vlan_id));
        Ok(TaskStatus::Success)
    }

    #[instrument(skip(self), fields(vlan = %vlan_id.alias()))]
    fn remove_vlan(&mut self, vlan_id: VlanId) -> TaskResult<TaskStatus> {
        let Some(vlan) = self.vlans.get(&vlan_id) else {
            return Ok(TaskStatus::Ignore);
        };
        if vlan.has_members() {
            let members: Vec<&str> = vlan.members.iter().map(String::as_str).collect();
            return Err(TaskError::referential(format!(
                "{} still has members: {}",
                vlan_id.alias(),
                members.join(", ")
            )));
        }
        if vlan_id.is_default() {
            info!("default VLAN stays in hardware");
            return Ok(TaskStatus::Ignore);
        }
        let oid = vlan.oid;

        self.maps.remove_vlan(vlan_id);
        let flushed = match self.sai.flush_fdb_entries(FdbFlushFilter::by_vlan(vlan_id)) {
            Ok(flushed) => flushed,
            Err(err) => {
                self.maps.insert_vlan(vlan_id, oid);
                return Err(sai_error(err));
            }
        };
        if let Err(err) = self.sai.remove_vlan(oid) {
            self.maps.insert_vlan(vlan_id, oid);
            // Flushed provisioned entries come back through the pending path.
            if flushed > 0 {
                self.signal(PortChange::VlanRemoved(vlan_id));
                self.signal(PortChange::VlanCreated(vlan_id));
            }
            return Err(sai_error(err));
        }

        self.vlans.remove(&vlan_id);
        self.stats.vlans_removed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .fdb_entries_flushed
            .fetch_add(flushed as u64, Ordering::Relaxed);
        info!(%oid, flushed, "removed VLAN");

        self.signal(PortChange::VlanRemoved(vlan_id));
        Ok(TaskStatus::Success)
    }

    // ------------------------------------------------------------------
    // VLAN member / bridge port
    // ------------------------------------------------------------------

    fn handle_vlan_member(&mut self, entry: &KeyOpFieldsValues) -> TaskResult<TaskStatus> {
        let key = VlanMemberKey::parse(&entry.key)?;
        match entry.op {
            Operation::Set => {
                let tagging_mode = entry
                    .get_field(fields::TAGGING_MODE)
                    .map(str::parse::<VlanTaggingMode>)
                    .transpose()?
                    .unwrap_or_default();
                self.add_vlan_member(key, tagging_mode)
            }
            Operation::Del => self.remove_vlan_member(key),
        }
    }

    #[instrument(skip(self), fields(member = %key))]
    fn add_vlan_member(
        &mut self,
        key: VlanMemberKey,
        tagging_mode: VlanTaggingMode,
    ) -> TaskResult<TaskStatus> {
        let vlan_oid = self
            .vlans
            .get(&key.vlan_id)
            .map(|vlan| vlan.oid)
            .ok_or_else(|| TaskError::waiting_for(Prerequisite::Vlan(key.vlan_id).to_string()))?;

        if let Some(member) = self.members.get_mut(&key) {
            if member.tagging_mode == tagging_mode {
                return Ok(TaskStatus::Duplicated);
            }
            self.sai
                .set_vlan_member_tagging_mode(member.member_oid, tagging_mode)
                .map_err(sai_error)?;
            info!(from = %member.tagging_mode, to = %tagging_mode, "updated tagging mode");
            member.tagging_mode = tagging_mode;
            self.stats.members_updated.fetch_add(1, Ordering::Relaxed);
            return Ok(TaskStatus::Success);
        }

        let port_oid = self
            .sai
            .port_id(&key.iface)
            .ok_or_else(|| TaskError::waiting_for(format!("{}:{}", config_db::PORT, key.iface)))?;

        let (bridge_port_oid, created) = match self.bridge_ports.get(&key.iface) {
            Some(bridge_port) => (bridge_port.oid, false),
            None => {
                let oid = self.sai.create_bridge_port(port_oid).map_err(sai_error)?;
                self.bridge_ports
                    .insert(key.iface.clone(), BridgePortInfo::new(oid, port_oid));
                self.stats.bridge_ports_created.fetch_add(1, Ordering::Relaxed);
                info!(iface = %key.iface, %oid, "created bridge port");
                (oid, true)
            }
        };

        let member_oid = match self
            .sai
            .create_vlan_member(vlan_oid, bridge_port_oid, tagging_mode)
        {
            Ok(oid) => oid,
            Err(err) => {
                if created {
                    self.bridge_ports.remove(&key.iface);
                    if let Err(cleanup) = self.sai.remove_bridge_port(bridge_port_oid) {
                        warn!(iface = %key.iface, error = %cleanup, "failed to roll back bridge port");
                    }
                }
                return Err(sai_error(err));
            }
        };

        self.bridge_ports
            .increment_ref(&key.iface)
            .map_err(|e| TaskError::internal(format!("bridge port {}: {}", key.iface, e)))?;
        if let Some(vlan) = self.vlans.get_mut(&key.vlan_id) {
            vlan.members.insert(key.iface.clone());
        }
        self.members.insert(
            key.clone(),
            VlanMemberInfo {
                member_oid,
                bridge_port_oid,
                tagging_mode,
            },
        );
        self.stats.members_created.fetch_add(1, Ordering::Relaxed);
        info!(%member_oid, %tagging_mode, "created VLAN member");

        // The interface becomes resolvable for FDB entries only once it is a
        // member somewhere.
        if self.maps.bridge_port(&key.iface).is_none() {
            self.maps.insert_bridge_port(&key.iface, bridge_port_oid);
            self.signal(PortChange::BridgePortCreated(key.iface.clone()));
        }
        Ok(TaskStatus::Success)
    }

    #[instrument(skip(self), fields(member = %key))]
    fn remove_vlan_member(&mut self, key: VlanMemberKey) -> TaskResult<TaskStatus> {
        let Some(member) = self.members.get(&key).copied() else {
            return Ok(TaskStatus::Ignore);
        };

        self.sai
            .remove_vlan_member(member.member_oid)
            .map_err(sai_error)?;
        self.members.remove(&key);
        if let Some(vlan) = self.vlans.get_mut(&key.vlan_id) {
            vlan.members.remove(&key.iface);
        }
        self.stats.members_removed.fetch_add(1, Ordering::Relaxed);
        info!(member_oid = %member.member_oid, "removed VLAN member");

        let remaining = self
            .bridge_ports
            .decrement_ref(&key.iface)
            .map_err(|e| TaskError::internal(format!("bridge port {}: {}", key.iface, e)))?;
        if remaining == 0 {
            self.remove_bridge_port(&key.iface)?;
        }
        Ok(TaskStatus::Success)
    }

    /// Tears down an unreferenced bridge port: unpublish, flush, remove, signal.
    ///
    /// If the switch refuses, the port is published again and stays in
    /// `bridge_ports` with no references, ready for the next member.
    fn remove_bridge_port(&mut self, iface: &str) -> TaskResult<()> {
        let Some(oid) = self.bridge_ports.get(&iface.to_string()).map(|bp| bp.oid) else {
            return Ok(());
        };

        self.maps.remove_bridge_port(iface);
        let flushed = match self.sai.flush_fdb_entries(FdbFlushFilter::by_bridge_port(oid)) {
            Ok(flushed) => flushed,
            Err(err) => {
                self.maps.insert_bridge_port(iface, oid);
                return Err(sai_error(err));
            }
        };
        self.stats
            .fdb_entries_flushed
            .fetch_add(flushed as u64, Ordering::Relaxed);
        if let Err(err) = self.sai.remove_bridge_port(oid) {
            self.maps.insert_bridge_port(iface, oid);
            // Flushed provisioned entries come back through the pending path.
            if flushed > 0 {
                self.signal(PortChange::BridgePortRemoved(iface.to_string()));
                self.signal(PortChange::BridgePortCreated(iface.to_string()));
            }
            return Err(sai_error(err));
        }

        self.bridge_ports.remove(&iface.to_string());
        self.stats.bridge_ports_removed.fetch_add(1, Ordering::Relaxed);
        info!(iface, %oid, flushed, "removed bridge port");

        self.signal(PortChange::BridgePortRemoved(iface.to_string()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // PORT
    // ------------------------------------------------------------------

    fn handle_port(&mut self, entry: &KeyOpFieldsValues) -> TaskResult<TaskStatus> {
        if entry.op.is_del() {
            // Front-panel ports belong to the switch; a DEL only drops config.
            return Ok(TaskStatus::Ignore);
        }
        let Some(value) = entry.get_field(fields::ADMIN_STATUS) else {
            return Ok(TaskStatus::Ignore);
        };
        let admin_state: AdminState = value.parse()?;
        let port_oid = self
            .sai
            .port_id(&entry.key)
            .ok_or_else(|| TaskError::waiting_for(format!("{}:{}", config_db::PORT, entry.key)))?;

        self.sai
            .set_port_admin_state(port_oid, admin_state.is_up())
            .map_err(sai_error)?;
        info!(port = %entry.key, %admin_state, "set admin status");
        Ok(TaskStatus::Success)
    }
}

#[async_trait]
impl Orch for PortsOrch {
    fn name(&self) -> &str {
        "PortsOrch"
    }

    async fn wait_for_work(&mut self) -> bool {
        tokio::select! {
            true = self.vlan_consumer.wait() => true,
            true = self.member_consumer.wait() => true,
            true = self.port_consumer.wait() => true,
            else => false,
        }
    }

    async fn do_task(&mut self) {
        self.vlan_consumer.pops();
        self.member_consumer.pops();
        self.port_consumer.pops();

        // Entries parked behind another table (a member waiting for its VLAN,
        // a VLAN DEL waiting for its members) get another pass as long as
        // something moved.
        loop {
            let completed = self.process_table(PortsTable::Vlan)
                + self.process_table(PortsTable::VlanMember)
                + self.process_table(PortsTable::Port);
            if completed == 0 || !self.has_pending_tasks() {
                break;
            }
        }

        self.vlan_consumer.ack();
        self.member_consumer.ack();
        self.port_consumer.ack();
    }

    fn priority(&self) -> i32 {
        0
    }

    fn has_pending_tasks(&self) -> bool {
        self.vlan_consumer.has_pending()
            || self.member_consumer.has_pending()
            || self.port_consumer.has_pending()
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        let mut pending = self.vlan_consumer.dump();
        pending.extend(self.member_consumer.dump());
        pending.extend(self.port_consumer.dump());
        pending
    }
}
