//! # Sensor Relay Library
//!
//! Delivers sensor measurements to one or more cloud message brokers over an
//! unreliable network, queuing anything that fails to publish and replaying it
//! on a later cycle.
//!
//! Modules:
//! - `config` — service configuration (device identity, broker table)
//! - `cache` — generic TTL cache used for credential memoization
//! - `credentials` — device JWT issue/verify and federated credential exchange
//! - `measurement` — the measurement record, validation and content digest
//! - `broker` — broker connection variants and the publish transport seam
//! - `pending` — content-addressed durable queue of undelivered measurements
//! - `publish` — concurrent fan-out orchestrator and the replay driver
//! - `cycle` — one delivery cycle: publish, queue on failure, drain on success

pub mod broker;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod cycle;
pub mod measurement;
pub mod pending;
pub mod publish;
pub mod tests;
pub mod utils;

pub use crate::config::settings::ServiceConfig;
pub use crate::measurement::Measurement;
