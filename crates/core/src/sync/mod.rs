//! Event reconciliation engine
//!
//! Data flow, calendar-origin direction: change notification or poll tick
//! -> duplicate guard (state store) -> run coordinator -> change poller ->
//! reconciler -> downstream gateways, with every discovered identity
//! persisted back into the state store. The chat-origin direction runs per
//! callback through [`inbound::InboundSync`], guarded by the origin filter.

pub mod coordinator;
pub mod inbound;
pub mod poller;
pub mod ports;
pub mod reconciler;
pub mod retention;
pub mod service;

#[cfg(test)]
pub(crate) mod support;
