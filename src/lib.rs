//! Compose Charm - reconcile a templated docker compose file
//!
//! The charm glues an orchestrator's lifecycle events to the docker compose
//! CLI. It provides:
//!
//! - Template rendering with host identity facts
//! - Change detection against the compose file on disk
//! - Explicit apply via `docker compose up`
//! - Status and published port reporting

pub mod compose;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod runner;
pub mod state;
pub mod status;

pub use error::{CharmError, Result};
