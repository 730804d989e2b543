//! Base Orch trait.

use async_trait::async_trait;

/// Base trait for all orchestration agents.
///
/// Each Orch runs as its own task under the OrchDaemon. The task waits on
/// [`Orch::wait_for_work`], then calls [`Orch::do_task`] to drain its
/// consumers. A periodic timer calls [`Orch::on_timer`] and, if the Orch
/// still reports pending work, runs another `do_task` pass so parked
/// entries are retried without new input.
///
/// # Lifecycle
///
/// 1. Construction: Orch is created with its table subscriptions
/// 2. Registration: the daemon orders Orchs by priority and spawns them
/// 3. Event Loop: `wait_for_work()` / `do_task()` until cancelled
/// 4. Shutdown: the task is cancelled and the Orch dropped
#[async_trait]
pub trait Orch: Send + Sync {
    /// Returns the name of this Orch (for logging and debugging).
    fn name(&self) -> &str;

    /// Waits until at least one input is ready.
    ///
    /// Returns false once every input has closed and nothing remains to do.
    /// Must be cancel safe: the daemon drops this future on timer ticks and
    /// shutdown.
    async fn wait_for_work(&mut self) -> bool;

    /// Processes pending tasks from all consumers.
    ///
    /// Implementations should:
    /// 1. Pop newly delivered entries from consumers
    /// 2. Process each entry (translate to SAI calls)
    /// 3. Park or report failures, never abort
    /// 4. Acknowledge popped entries
    async fn do_task(&mut self);

    /// Returns the priority of this Orch (lower = higher priority).
    fn priority(&self) -> i32 {
        0
    }

    /// Returns true if this Orch has parked work worth retrying.
    fn has_pending_tasks(&self) -> bool {
        false
    }

    /// Dumps pending tasks for debugging.
    fn dump_pending_tasks(&self) -> Vec<String> {
        vec![]
    }

    /// Called periodically by the daemon's timer.
    fn on_timer(&mut self) {}
}
