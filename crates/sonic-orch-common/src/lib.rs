//! Common orchestration abstractions for SONiC.
//!
//! This crate provides the core traits and types shared by the bridge
//! reconciliation agents:
//!
//! - [`Database`] / [`Table`]: the three-tier key/value state store
//!   (CONFIG_DB, APPL_DB, ASIC_DB) with a per-table change feed
//! - [`bus`]: tracked channels and the [`SettleTracker`] that tells callers
//!   when every delivered change has been fully processed
//! - [`Consumer`]: per-key FIFO queue with SET merge and DEL cancellation
//! - [`Orch`]: base trait for orchestration agents
//! - [`TaskError`] / [`Diagnostics`]: per-key error reporting
//! - [`PendingCache`]: bounded store of jobs waiting on a prerequisite
//! - [`SyncMap`]: map that never creates entries implicitly
//!
//! # Architecture
//!
//! 1. Configuration and application writes land in a [`Table`]
//! 2. Each write is published to the table's subscribers in write order
//! 3. Every Orch runs as its own task and drains its Consumers in `do_task`
//! 4. Orchs drive the switch through the SAI layer, which records objects
//!    in ASIC_DB
//! 5. Callers await [`SettleTracker::settled`] instead of sleeping
//!
//! # Example
//!
//! ```ignore
//! use sonic_orch_common::{Consumer, Orch};
//!
//! struct MyOrch {
//!     consumer: Consumer,
//! }
//!
//! #[async_trait]
//! impl Orch for MyOrch {
//!     fn name(&self) -> &str { "MyOrch" }
//!
//!     async fn wait_for_work(&mut self) -> bool {
//!         self.consumer.wait().await
//!     }
//!
//!     async fn do_task(&mut self) {
//!         self.consumer.pops();
//!         for entry in self.consumer.drain() {
//!             // translate into SAI calls
//!         }
//!         self.consumer.ack();
//!     }
//! }
//! ```

pub mod bus;
mod consumer;
mod diagnostics;
mod orch;
mod pending;
pub mod schema;
mod store;
mod sync_map;
mod task;

pub use bus::{BusError, Inbox, SettleTracker, TrackedReceiver, TrackedSender};
pub use consumer::{Consumer, ConsumerConfig, EventOrigin, FieldValue, KeyOpFieldsValues, Operation};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use orch::Orch;
pub use pending::{Constraint, PendingCache, PendingError};
pub use store::{Database, DbId, FieldValues, Table};
pub use sync_map::{HasRefCount, SyncMap, SyncMapError};
pub use task::{TaskError, TaskResult, TaskStatus};
