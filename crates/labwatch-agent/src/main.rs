//! Labwatch agent binary.
//!
//! Runs the supervising agent by default. The hidden `monitor`
//! subcommand is how the agent re-executes itself to tail one system's
//! console; it is not meant to be invoked by hand.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use labwatch_agent::{
    signals, AgentConfig, ChunkedUploader, ConsoleTailer, MonitorSupervisor, ProcessLauncher,
    Reconciler,
};
use labwatch_hub::HubClient;

#[derive(Parser)]
#[command(name = "labwatch-agent")]
#[command(about = "Watchdog enforcement and console capture for lab systems")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervising agent
    Run {
        /// Configuration file (defaults to labwatch.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Tail one system's console (spawned by the agent, not by hand)
    #[command(hide = true)]
    Monitor {
        /// Fully qualified name of the system to monitor
        #[arg(long)]
        system: String,

        /// Recipe the console log belongs to
        #[arg(long)]
        recipe_id: u64,

        /// Task currently holding the watchdog
        #[arg(long)]
        task_id: u64,

        /// Configuration file (defaults to labwatch.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("labwatch_agent=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_agent(config).await,
        Commands::Monitor {
            system,
            recipe_id,
            task_id,
            config,
        } => run_monitor(system, recipe_id, task_id, config).await,
    }
}

async fn run_agent(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Labwatch agent starting");

    // Load configuration
    let config = load_config(config_path.as_deref())?;
    info!(
        hub_url = %config.hub.url,
        poll_interval_secs = config.watchdog.poll_interval_secs,
        "Configuration loaded"
    );

    let hub = Arc::new(HubClient::new(&config.hub)?);

    // An unreachable hub at startup is a deployment problem, not
    // something to poll through quietly.
    if let Err(e) = hub.active_watchdogs().await {
        error!(url = %config.hub.url, error = %e, "Cannot reach the hub");
        std::process::exit(1);
    }
    info!(url = %config.hub.url, "Hub reachable");

    let launcher = Arc::new(ProcessLauncher::new(config_path));
    let supervisor = MonitorSupervisor::new(launcher);
    let mut reconciler = Reconciler::new(hub, supervisor, &config.watchdog);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        signal_cancel.cancel();
    });

    reconciler.run(cancel).await;

    info!("Labwatch agent stopped");
    Ok(())
}

async fn run_monitor(
    system: String,
    recipe_id: u64,
    task_id: u64,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    // The agent may run with SIGTERM ignored; the monitor must die on it.
    signals::reset_term_signal();

    let config = load_config(config_path.as_deref())?;
    info!(system = %system, recipe_id, task_id, "Monitor starting");

    let hub = Arc::new(HubClient::new(&config.hub)?);
    let uploader = ChunkedUploader::new(hub, recipe_id, "/".to_owned(), "console.log".to_owned());
    let mut tailer = ConsoleTailer::new(system.clone(), uploader, &config.console);

    // SIGUSR2 interrupts an idle wait so new output ships immediately
    let waker = tailer.waker();
    let mut wake = signals::wake_signal()?;
    tokio::spawn(async move {
        while wake.recv().await.is_some() {
            waker.notify_one();
        }
    });

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
        signal_cancel.cancel();
    });

    tailer.run(cancel).await;

    info!(system = %system, "Monitor stopped");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AgentConfig::from_file(path)?,
        None => AgentConfig::load()?,
    };
    Ok(config)
}
