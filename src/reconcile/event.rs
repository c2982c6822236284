//! Lifecycle events and their dispatch

use super::outcome::ReconcileOutcome;
use super::reconciler::Reconciler;
use crate::config::DesiredConfig;
use crate::error::Result;
use crate::status::{StatusReporter, UnitState, UnitStatus};

/// Events delivered by the host integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Unit installation
    Install,
    /// Unit start, applies the compose file to prevent drift
    Start,
    /// New configuration mapping
    ConfigChanged(DesiredConfig),
    /// Periodic status check
    UpdateStatus,
    /// Operator triggered re-apply
    Recompose,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::Start => "start",
            Event::ConfigChanged(_) => "config-changed",
            Event::UpdateStatus => "update-status",
            Event::Recompose => "recompose",
        }
    }
}

/// Publish an outcome: status if it is a transition, ports if they are live
pub fn publish(reporter: &mut dyn StatusReporter, outcome: &ReconcileOutcome) -> Result<()> {
    if let Some(status) = outcome.unit_status() {
        reporter.set_status(&status)?;
    }
    if let Some(ports) = outcome.ports() {
        reporter.set_ports(ports)?;
    }
    Ok(())
}

impl Reconciler {
    /// Handle one event to completion and publish its outcome
    ///
    /// Fails with [`crate::CharmError::Busy`] if another event is in flight.
    pub async fn handle(
        &self,
        event: Event,
        reporter: &mut dyn StatusReporter,
    ) -> Result<ReconcileOutcome> {
        let mut inner = self.guard()?;
        tracing::info!("handling {} event", event.name());

        let outcome = match event {
            Event::Install => {
                reporter.set_status(&UnitStatus::new(
                    UnitState::Installing,
                    "Checking the Docker engine",
                ))?;
                let version = self.check_engine().await?;
                reporter.set_workload_version(&version)?;
                ReconcileOutcome::Installed
            }
            Event::Start => {
                // Containers may be up already, publish before a strict
                // version failure ends the event
                let outcome = self.apply_locked(&inner).await;
                publish(reporter, &outcome)?;
                if let Some(version) = self.version_locked().await? {
                    reporter.set_workload_version(&version)?;
                }
                return Ok(outcome);
            }
            Event::ConfigChanged(cfg) => self.config_changed(&mut inner, cfg)?,
            Event::UpdateStatus => self.refresh_locked().await,
            Event::Recompose => self.apply_locked(&inner).await,
        };

        publish(reporter, &outcome)?;
        Ok(outcome)
    }
}
