//! Daemon wiring: the per-orch task runner and the assembled stack.

mod orchdaemon;
mod stack;

pub use orchdaemon::{OrchDaemon, OrchDaemonConfig, OrchStatus};
pub use stack::OrchStack;
