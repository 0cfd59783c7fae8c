//! Durable cross-store synchronisation state
//!
//! Four independent JSON files: correlation map, chat-calendar id map, sync
//! cursor and the duplicate-notification recency set. Each can be lost
//! independently at the cost of extra duplicate work, never incorrect
//! writes.

pub mod file_store;
pub mod recency;

pub use file_store::FileStateStore;
pub use recency::RecencySet;
