//! OrchDaemon implementation.
//!
//! The OrchDaemon is the central coordinator for the Orch modules.
//! It manages:
//! - Orch registration and priority ordering
//! - one tokio task per Orch, woken by its inputs or the timer
//! - the settle signal callers wait on instead of sleeping
//! - shutdown through a cancellation token

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sonic_orch_common::{bus, Orch, SettleTracker, TrackedReceiver, TrackedSender};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the OrchDaemon.
#[derive(Debug, Clone)]
pub struct OrchDaemonConfig {
    /// Period of the Orch timer (`on_timer` plus a retry pass).
    pub timer_interval: Duration,
    /// Batch size for consumer operations
    pub batch_size: usize,
}

impl Default for OrchDaemonConfig {
    fn default() -> Self {
        Self {
            timer_interval: Duration::from_millis(1000),
            batch_size: 128,
        }
    }
}

/// Runtime view of one Orch task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchStatus {
    pub name: String,
    pub priority: i32,
    /// `do_task` passes run so far.
    pub runs: u64,
    /// Timer firings handled so far.
    pub timer_runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    /// `dump_pending_tasks` as of the last pass.
    pub pending: Vec<String>,
}

impl OrchStatus {
    fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            runs: 0,
            timer_runs: 0,
            last_run: None,
            pending: Vec::new(),
        }
    }
}

struct RunningOrch {
    status: Arc<Mutex<OrchStatus>>,
    timer_tx: TrackedSender<()>,
    handle: JoinHandle<()>,
}

/// The orchestration daemon.
///
/// Orchs are registered before [`OrchDaemon::start`]; after that each one
/// runs in its own task until [`OrchDaemon::stop`].
pub struct OrchDaemon {
    config: OrchDaemonConfig,
    /// Registered Orchs sorted by priority, waiting to be started
    orchs: BTreeMap<i32, Vec<Box<dyn Orch>>>,
    tracker: SettleTracker,
    cancel: CancellationToken,
    running: Vec<RunningOrch>,
}

impl OrchDaemon {
    /// Creates a daemon whose settle signal follows `tracker`.
    ///
    /// `tracker` should be the one the stores and channels feeding the Orchs
    /// were built with.
    pub fn new(config: OrchDaemonConfig, tracker: SettleTracker) -> Self {
        Self {
            config,
            orchs: BTreeMap::new(),
            tracker,
            cancel: CancellationToken::new(),
            running: Vec::new(),
        }
    }

    pub fn config(&self) -> &OrchDaemonConfig {
        &self.config
    }

    /// Registers an Orch with the daemon.
    ///
    /// Orchs are ordered by priority (lower = higher priority).
    pub fn register_orch(&mut self, orch: Box<dyn Orch>) {
        let priority = orch.priority();
        info!(orch = orch.name(), priority, "registering orch");
        self.orchs.entry(priority).or_default().push(orch);
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// Spawns one task per registered Orch, highest priority first.
    pub fn start(&mut self) {
        let orchs = std::mem::take(&mut self.orchs);
        info!(
            orchs = orchs.values().map(Vec::len).sum::<usize>(),
            timer_ms = self.config.timer_interval.as_millis() as u64,
            "starting OrchDaemon"
        );

        for (priority, group) in orchs {
            for orch in group {
                let status = Arc::new(Mutex::new(OrchStatus::new(orch.name(), priority)));
                let (timer_tx, timer_rx) = bus::channel(&self.tracker);
                let handle = tokio::spawn(run_orch(
                    orch,
                    Arc::clone(&status),
                    timer_rx,
                    self.tracker.clone(),
                    self.config.timer_interval,
                    self.cancel.child_token(),
                ));
                self.running.push(RunningOrch {
                    status,
                    timer_tx,
                    handle,
                });
            }
        }
    }

    /// Resolves once every delivered change has been processed.
    pub async fn settled(&self) {
        self.tracker.settled().await;
    }

    /// Runs the timer of every Orch now instead of waiting for the period.
    ///
    /// Tracked like any other input, so a following [`OrchDaemon::settled`]
    /// covers the timer passes.
    pub fn fire_timers(&self) {
        for orch in &self.running {
            if orch.timer_tx.send(()).is_err() {
                warn!(orch = %orch.status.lock().name, "orch task has exited, timer not fired");
            }
        }
    }

    /// Snapshot of every running Orch, in priority order.
    pub fn status(&self) -> Vec<OrchStatus> {
        self.running.iter().map(|o| o.status.lock().clone()).collect()
    }

    /// Dumps state for debugging.
    pub fn dump(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("OrchDaemon running: {}", self.is_running()));

        for status in self.status() {
            lines.push(format!(
                "  [{:3}] {} - {} pending",
                status.priority,
                status.name,
                status.pending.len()
            ));
            for task in &status.pending {
                lines.push(format!("        {}", task));
            }
        }

        lines
    }

    /// Cancels every Orch task and waits for them to exit.
    pub async fn stop(self) {
        info!("Stopping OrchDaemon");
        self.cancel.cancel();
        for orch in self.running {
            if let Err(e) = orch.handle.await {
                error!(error = %e, "orch task ended abnormally");
            }
        }
    }
}

async fn run_orch(
    mut orch: Box<dyn Orch>,
    status: Arc<Mutex<OrchStatus>>,
    mut timer_rx: TrackedReceiver<()>,
    tracker: SettleTracker,
    timer_interval: Duration,
    cancel: CancellationToken,
) {
    let name = orch.name().to_string();
    let mut ticker = interval_at(Instant::now() + timer_interval, timer_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut inputs_open = true;

    debug!(orch = %name, "orch task started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(()) = timer_rx.recv() => {
                run_timer(orch.as_mut(), &status, &tracker).await;
                timer_rx.complete(1);
            }
            _ = ticker.tick() => run_timer(orch.as_mut(), &status, &tracker).await,
            ready = orch.wait_for_work(), if inputs_open => {
                if ready {
                    run_pass(orch.as_mut(), &status, &tracker).await;
                } else {
                    // Only the timer can produce work from here on.
                    info!(orch = %name, "all inputs closed");
                    inputs_open = false;
                }
            }
        }
    }
    debug!(orch = %name, "orch task stopped");
}

async fn run_timer(orch: &mut dyn Orch, status: &Mutex<OrchStatus>, tracker: &SettleTracker) {
    orch.on_timer();
    status.lock().timer_runs += 1;
    if orch.has_pending_tasks() {
        run_pass(orch, status, tracker).await;
    }
}

/// The pass itself counts as outstanding work until its status is recorded,
/// so a caller woken by `settled` sees the post-pass snapshot.
async fn run_pass(orch: &mut dyn Orch, status: &Mutex<OrchStatus>, tracker: &SettleTracker) {
    tracker.enqueue(1);
    orch.do_task().await;
    let pending = orch.dump_pending_tasks();
    {
        let mut status = status.lock();
        status.runs += 1;
        status.last_run = Some(Utc::now());
        status.pending = pending;
    }
    tracker.complete(1);
}
