//! Shared infrastructure for the resilient request orchestration core.
//!
//! This crate provides the pieces every other `orchestrator-*` crate builds
//! on: the request/provider/cache/queue data model, the unified event bus,
//! the unified error type, and the external-collaborator contracts (provider
//! action, browser manager, selector discovery, config manager, persistence
//! backend) that keep the core decoupled from its runtime environment.

pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod model;
pub mod ports;
pub mod time;

pub use error::OrchestratorError;
pub use events::{EventBus, OrchestratorEvent};
pub use model::{
    HealthLevel, Priority, ProviderHealth, ProviderResponse, ProviderSpec, RawFailure, Request,
    RequestId,
};
