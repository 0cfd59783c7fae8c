//! Shared HTTP plumbing for the gateway clients

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
