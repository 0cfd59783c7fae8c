//! # CrossCal App
//!
//! Process surface of the synchronisation service: the axum HTTP trigger
//! endpoints, the background schedulers and the application context that
//! wires gateways, state store and reconciliation services together.

pub mod context;
pub mod routes;
pub mod scheduler;

pub use context::AppContext;
pub use routes::router;
pub use scheduler::{BackgroundScheduler, SchedulerConfig};
