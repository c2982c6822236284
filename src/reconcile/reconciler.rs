//! Desired-state reconciler
//!
//! Writing the compose file and bringing it up are separate steps: a config
//! change only materializes the file and reports maintenance, an explicit
//! apply starts the containers.

use super::outcome::ReconcileOutcome;
use crate::compose::{compose_path, render, ComposeParser, HostFacts};
use crate::config::DesiredConfig;
use crate::error::{CharmError, Result};
use crate::runner::{port_set, ComposeRunner};
use crate::state::{CharmState, StateStore};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};

/// Message shown when no template is configured
pub const TEMPLATE_NOT_SET: &str = "docker_compose_yml is not set";

/// Message shown after the compose file changed on disk
pub const COMPOSE_CHANGED: &str = "docker_compose_yml changed, run recompose action";

/// Tunables for the reconciler
#[derive(Debug, Clone, Default)]
pub struct ReconcilerSettings {
    /// Fail the event when the engine version cannot be queried
    pub strict_version_query: bool,
}

/// State only touched while an event is being handled
pub(crate) struct Inner {
    pub(crate) desired: DesiredConfig,
    state: CharmState,
    store: Box<dyn StateStore>,
}

/// Converges the compose file and containers towards the declared config
pub struct Reconciler {
    runner: Box<dyn ComposeRunner>,
    facts: HostFacts,
    settings: ReconcilerSettings,
    inner: Mutex<Inner>,
}

impl Reconciler {
    /// Create a reconciler, loading persisted state from the store
    pub fn new(
        desired: DesiredConfig,
        runner: Box<dyn ComposeRunner>,
        store: Box<dyn StateStore>,
        facts: HostFacts,
    ) -> Result<Self> {
        let state = store.load()?;
        Ok(Self {
            runner,
            facts,
            settings: ReconcilerSettings::default(),
            inner: Mutex::new(Inner {
                desired,
                state,
                store,
            }),
        })
    }

    pub fn with_settings(mut self, settings: ReconcilerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Acquire the single-flight guard without waiting
    ///
    /// This only covers events within one process. Separate hook processes
    /// are serialised by [`crate::state::EventLock`].
    pub(crate) fn guard(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.try_lock().map_err(|_| CharmError::Busy)
    }

    /// Materialize a new configuration on disk
    pub async fn on_config_changed(&self, cfg: DesiredConfig) -> Result<ReconcileOutcome> {
        let mut inner = self.guard()?;
        self.config_changed(&mut inner, cfg)
    }

    /// Bring the compose file up and report live status
    pub async fn apply(&self) -> Result<ReconcileOutcome> {
        let inner = self.guard()?;
        Ok(self.apply_locked(&inner).await)
    }

    /// Report live status without touching running containers
    pub async fn refresh_status(&self) -> Result<ReconcileOutcome> {
        let _inner = self.guard()?;
        Ok(self.refresh_locked().await)
    }

    /// Engine version, degraded to `None` unless strict
    pub async fn workload_version(&self) -> Result<Option<String>> {
        let _inner = self.guard()?;
        self.version_locked().await
    }

    pub(crate) fn config_changed(
        &self,
        inner: &mut Inner,
        cfg: DesiredConfig,
    ) -> Result<ReconcileOutcome> {
        inner.desired = cfg.clone();

        if !cfg.has_template() {
            tracing::info!("config-changed: no compose template configured");
            return Ok(ReconcileOutcome::blocked(TEMPLATE_NOT_SET));
        }

        if inner.state.docker_root.as_deref() != Some(cfg.root_dir.as_path()) {
            tracing::info!(
                "config-changed: docker_root changed, stored: {:?}, new: {}",
                inner.state.docker_root,
                cfg.root_dir.display()
            );
            inner.state.docker_root = Some(cfg.root_dir.clone());
            inner.store.save(&inner.state)?;
        } else {
            tracing::debug!("config-changed: docker_root not changed");
        }
        create_root_dir(&cfg.root_dir)?;

        let rendered = match render(&cfg.compose_template, &self.facts) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!("config-changed: template rejected: {}", e);
                return Ok(ReconcileOutcome::blocked(format!(
                    "invalid docker_compose_yml template: {}",
                    e
                )));
            }
        };

        for warning in ComposeParser::lint(&rendered) {
            tracing::warn!("config-changed: {}", warning);
        }

        let path = compose_path(&cfg.root_dir);
        let on_disk = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        if on_disk == rendered.as_bytes() {
            tracing::info!("config-changed: {} is up to date", path.display());
            return Ok(ReconcileOutcome::Unchanged);
        }

        tracing::info!("config-changed: writing {}", path.display());
        std::fs::write(&path, rendered.as_bytes())?;
        Ok(ReconcileOutcome::maintenance(COMPOSE_CHANGED))
    }

    pub(crate) async fn apply_locked(&self, inner: &Inner) -> ReconcileOutcome {
        let path = compose_path(&inner.desired.root_dir);
        tracing::info!("applying {}", path.display());

        if let Err(e) = self.runner.up(&path).await {
            tracing::error!("docker compose failed: {}", e);
            return ReconcileOutcome::blocked(format!(
                "docker compose failed: {}, examine and run recompose action",
                e
            ));
        }

        self.refresh_locked().await
    }

    pub(crate) async fn refresh_locked(&self) -> ReconcileOutcome {
        match self.runner.list_containers().await {
            Ok(containers) => {
                let names: Vec<&str> = containers.iter().map(|c| c.name.as_str()).collect();
                let now = chrono::Local::now().format("%H:%M:%S");
                let summary = format!("Running [{}] ({})", names.join(", "), now);
                tracing::info!("{}", summary);
                ReconcileOutcome::Active {
                    summary,
                    ports: port_set(&containers),
                }
            }
            Err(e) => {
                tracing::error!("container status query failed: {}", e);
                ReconcileOutcome::blocked(format!("container status query failed: {}", e))
            }
        }
    }

    pub(crate) async fn version_locked(&self) -> Result<Option<String>> {
        match self.runner.version().await {
            Ok(version) => Ok(Some(version)),
            Err(e) if self.settings.strict_version_query => Err(CharmError::VersionQuery(e)),
            Err(e) => {
                tracing::warn!("version query failed, workload version unknown: {}", e);
                Ok(None)
            }
        }
    }

    /// Confirm the engine answers; failure is fatal so the install is retried
    pub(crate) async fn check_engine(&self) -> Result<String> {
        self.runner
            .version()
            .await
            .map_err(|e| CharmError::Install(format!("compose engine unavailable: {}", e)))
    }
}

#[cfg(unix)]
fn create_root_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
}

#[cfg(not(unix))]
fn create_root_dir(path: &Path) -> std::io::Result<()> {
    std::fs::DirBuilder::new().recursive(true).create(path)
}
