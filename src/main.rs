//! Compose Charm - hook and action entry point
//!
//! Each subcommand corresponds to one lifecycle event or action.

use anyhow::Context;
use clap::{Parser, Subcommand};
use compose_charm::compose::HostFacts;
use compose_charm::config::CharmConfig;
use compose_charm::reconcile::{Event, Reconciler, ReconcilerSettings};
use compose_charm::runner::DockerCli;
use compose_charm::state::{EventLock, JsonStateStore};
use compose_charm::status::JsonStatusReporter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Compose Charm - reconcile a templated docker compose file
#[derive(Parser)]
#[command(name = "compose-charm")]
#[command(version)]
#[command(about = "Reconciles a templated docker compose file and reports its status", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Charm configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory for charm state and published status
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install hook
    Install,
    /// Start hook, applies the compose file
    Start,
    /// Config-changed hook, writes the compose file
    ConfigChanged,
    /// Update-status hook
    UpdateStatus,
    /// Recompose action, applies the compose file
    Recompose,
    /// Print the published status
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state_dir = cli.state_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/var/lib"))
            .join("compose-charm")
    });

    let mut reporter = JsonStatusReporter::open(&state_dir.join("status.json"))
        .context("failed to open status file")?;

    let config = CharmConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let event = match cli.command {
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(reporter.current())?);
            return Ok(());
        }
        Commands::Install => Event::Install,
        Commands::Start => Event::Start,
        Commands::ConfigChanged => Event::ConfigChanged(config.desired()),
        Commands::UpdateStatus => Event::UpdateStatus,
        Commands::Recompose => Event::Recompose,
    };

    // Other hook processes share the state directory
    let _lock = EventLock::acquire(&state_dir).context("failed to take the event lock")?;

    let reconciler = Reconciler::new(
        config.desired(),
        Box::new(DockerCli::new(config.docker_bin.clone())),
        Box::new(JsonStateStore::new(&state_dir.join("state.json"))),
        HostFacts::detect().await,
    )?
    .with_settings(ReconcilerSettings {
        strict_version_query: config.strict_version_query,
    });

    let name = event.name();
    let outcome = reconciler
        .handle(event, &mut reporter)
        .await
        .with_context(|| format!("{} failed", name))?;
    tracing::debug!("{} finished with {:?}", name, outcome);

    Ok(())
}
