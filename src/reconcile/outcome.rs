//! Reconciliation outcomes

use crate::runner::PortSet;
use crate::status::{UnitState, UnitStatus};

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The install phase finished
    Installed,
    /// Nothing changed, no status transition
    Unchanged,
    /// An operator has to act
    Blocked(String),
    /// Declared and running state diverge until the next apply
    Maintenance(String),
    /// Containers are running with the given published ports
    Active { summary: String, ports: PortSet },
}

impl ReconcileOutcome {
    pub fn blocked(reason: impl Into<String>) -> Self {
        ReconcileOutcome::Blocked(reason.into())
    }

    pub fn maintenance(reason: impl Into<String>) -> Self {
        ReconcileOutcome::Maintenance(reason.into())
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, ReconcileOutcome::Blocked(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReconcileOutcome::Active { .. })
    }

    /// Status to publish, `None` when the outcome is not a transition
    pub fn unit_status(&self) -> Option<UnitStatus> {
        match self {
            ReconcileOutcome::Installed => {
                Some(UnitStatus::new(UnitState::Active, "Docker engine available"))
            }
            ReconcileOutcome::Unchanged => None,
            ReconcileOutcome::Blocked(reason) => Some(UnitStatus::new(UnitState::Blocked, reason)),
            ReconcileOutcome::Maintenance(reason) => {
                Some(UnitStatus::new(UnitState::Maintenance, reason))
            }
            ReconcileOutcome::Active { summary, .. } => {
                Some(UnitStatus::new(UnitState::Active, summary))
            }
        }
    }

    /// Live port set, present only for outcomes backed by a fresh snapshot
    pub fn ports(&self) -> Option<&PortSet> {
        match self {
            ReconcileOutcome::Active { ports, .. } => Some(ports),
            _ => None,
        }
    }
}
