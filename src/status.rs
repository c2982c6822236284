//! Unit status reporting
//!
//! The orchestrator understands four coarse states plus a free text message,
//! a declaration of published ports and a workload version string.

use crate::error::Result;
use crate::runner::{PortSet, PublishedPort};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Externally visible unit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Installing,
    Blocked,
    Maintenance,
    Active,
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitState::Installing => write!(f, "installing"),
            UnitState::Blocked => write!(f, "blocked"),
            UnitState::Maintenance => write!(f, "maintenance"),
            UnitState::Active => write!(f, "active"),
        }
    }
}

/// A unit state with its message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub state: UnitState,
    pub message: String,
}

impl UnitStatus {
    pub fn new(state: UnitState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.state, self.message)
    }
}

/// Mutation point for status, ports and workload version
pub trait StatusReporter: Send {
    /// Replace the unit status
    fn set_status(&mut self, status: &UnitStatus) -> Result<()>;

    /// Replace the whole published port declaration
    fn set_ports(&mut self, ports: &PortSet) -> Result<()>;

    /// Record the workload version
    fn set_workload_version(&mut self, version: &str) -> Result<()>;
}

/// What the orchestrator would see, persisted as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedStatus {
    pub status: Option<UnitStatus>,
    #[serde(default)]
    pub ports: Vec<PublishedPort>,
    #[serde(default)]
    pub workload_version: Option<String>,
}

/// Status reporter writing to a JSON file
pub struct JsonStatusReporter {
    path: PathBuf,
    current: PublishedStatus,
}

impl JsonStatusReporter {
    /// Open the status file, starting from its previous contents if any
    pub fn open(path: &Path) -> Result<Self> {
        let current = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            PublishedStatus::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            current,
        })
    }

    pub fn current(&self) -> &PublishedStatus {
        &self.current
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.current)?)?;
        Ok(())
    }
}

impl StatusReporter for JsonStatusReporter {
    fn set_status(&mut self, status: &UnitStatus) -> Result<()> {
        tracing::info!("unit status: {}", status);
        self.current.status = Some(status.clone());
        self.flush()
    }

    fn set_ports(&mut self, ports: &PortSet) -> Result<()> {
        tracing::info!(
            "published ports: [{}]",
            ports.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
        self.current.ports = ports.iter().copied().collect();
        self.flush()
    }

    fn set_workload_version(&mut self, version: &str) -> Result<()> {
        tracing::info!("workload version: {}", version);
        self.current.workload_version = Some(version.to_string());
        self.flush()
    }
}
