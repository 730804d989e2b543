//! The assembled bridge stack.
//!
//! [`OrchStack::build`] creates the three stores, the virtual switch and
//! the shared id maps, wires PortsOrch, FdbOrch and the notification
//! listener together and starts them under an [`OrchDaemon`]. Every store
//! and channel shares one settle tracker, so [`OrchStack::settled`] covers
//! the whole pipeline from a CONFIG_DB write to the resulting ASIC_DB rows.

use super::orchdaemon::{OrchDaemon, OrchStatus};
use crate::config::{L2OrchConfig, Result};
use crate::fdb::{
    FdbListenerStats, FdbNotificationListener, FdbOrch, FdbOrchStats, LearnedFdbTable,
};
use crate::maps::IdMaps;
use crate::ports::{PortsOrch, PortsOrchStats};
use sonic_orch_common::{bus, Database, DbId, Diagnostics, SettleTracker};
use sonic_sai::{SaiApi, VirtualSwitch};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// ASIC_DB contents as nested maps: table, key, field, value.
pub type StoreDump = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Running stack plus the handles needed to drive and inspect it.
pub struct OrchStack {
    pub config_db: Database,
    pub appl_db: Database,
    pub asic_db: Database,
    pub switch: Arc<VirtualSwitch>,
    pub maps: IdMaps,
    pub diagnostics: Diagnostics,
    pub learned: LearnedFdbTable,
    pub ports_stats: Arc<PortsOrchStats>,
    pub fdb_stats: Arc<FdbOrchStats>,
    pub listener_stats: Arc<FdbListenerStats>,
    daemon: OrchDaemon,
}

impl OrchStack {
    /// Validates `config`, builds every component and starts the orch tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(config: &L2OrchConfig) -> Result<Self> {
        config.validate()?;

        let tracker = SettleTracker::new();
        let config_db = Database::new(DbId::ConfigDb, tracker.clone());
        let appl_db = Database::new(DbId::ApplDb, tracker.clone());
        let asic_db = Database::new(DbId::AsicDb, tracker.clone());

        let switch = Arc::new(VirtualSwitch::new(&asic_db, &config.switch_config()));
        let (notification_tx, notification_rx) = bus::channel(&tracker);
        switch.set_fdb_notification_sender(notification_tx);
        let sai: Arc<dyn SaiApi> = switch.clone();

        let maps = IdMaps::new();
        let diagnostics = Diagnostics::new();
        let learned = LearnedFdbTable::new();
        let (change_tx, change_rx) = bus::channel(&tracker);

        let ports = PortsOrch::new(
            config.ports_config(),
            Arc::clone(&sai),
            maps.clone(),
            diagnostics.clone(),
            &config_db,
        )
        .with_signals(change_tx);
        let fdb = FdbOrch::new(
            config.fdb_config(),
            Arc::clone(&sai),
            maps.clone(),
            diagnostics.clone(),
            &appl_db,
            learned.clone(),
        )
        .with_signals(change_rx);
        let listener = FdbNotificationListener::new(
            notification_rx,
            maps.clone(),
            diagnostics.clone(),
            &appl_db,
            learned.clone(),
        );

        let ports_stats = ports.stats();
        let fdb_stats = fdb.stats();
        let listener_stats = listener.stats();

        let mut daemon = OrchDaemon::new(config.daemon_config(), tracker);
        daemon.register_orch(Box::new(ports));
        daemon.register_orch(Box::new(fdb));
        daemon.register_orch(Box::new(listener));
        daemon.start();

        info!(ports = switch.port_aliases().len(), "bridge stack started");

        Ok(Self {
            config_db,
            appl_db,
            asic_db,
            switch,
            maps,
            diagnostics,
            learned,
            ports_stats,
            fdb_stats,
            listener_stats,
            daemon,
        })
    }

    /// Resolves once every write made so far has fully propagated.
    pub async fn settled(&self) {
        self.daemon.settled().await;
    }

    /// Runs every orch timer now; follow with [`OrchStack::settled`].
    pub fn fire_timers(&self) {
        self.daemon.fire_timers();
    }

    pub fn status(&self) -> Vec<OrchStatus> {
        self.daemon.status()
    }

    pub fn dump(&self) -> Vec<String> {
        self.daemon.dump()
    }

    /// Everything programmed into the switch.
    pub fn asic_state(&self) -> StoreDump {
        self.asic_db.dump()
    }

    /// Stops the orch tasks.
    pub async fn shutdown(self) {
        self.daemon.stop().await;
        info!("bridge stack stopped");
    }
}
