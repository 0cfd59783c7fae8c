//! # CrossCal Core
//!
//! Reconciliation engine for CrossCal: port interfaces to the three
//! external stores and the durable state store, plus the services that
//! keep event records consistent across them.
//!
//! ## Architecture
//! - Depends only on `crosscal-domain`
//! - Declares ports (traits) implemented by `crosscal-infra`
//! - Contains no I/O of its own

pub mod sync;

// Re-export the service surface used by the application crate
pub use sync::coordinator::{RunCoordinator, RunOutcome};
pub use sync::inbound::{InboundConfig, InboundSync};
pub use sync::poller::{ChangePoller, PollBatch, PollerConfig};
pub use sync::ports::{CalendarGateway, ChatGateway, DocumentGateway, StateStore};
pub use sync::reconciler::{Reconciler, ReconcilerConfig};
pub use sync::retention::{RetentionSweeper, SweepSummary};
pub use sync::service::{PassSummary, SyncService};
