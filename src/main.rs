//! ECG Session Client CLI
//!
//! Drives collection sessions on a remote ECG acquisition service and prints
//! the recorded trace as chart segments.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use ecg_session_client::{
    session::DeadlineFired,
    stream::{self, DetachedChannel},
    AnalysisClient, Config, Services, SessionController, SessionRuntime, SessionSettings,
    SessionSnapshot, SessionState, StreamSettings, Summary, VERSION,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ecg-session")]
#[command(version = VERSION)]
#[command(about = "Collect, segment and summarize ECG recordings", long_about = None)]
struct Cli {
    /// Service host (overrides the configuration file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Service port (overrides the configuration file)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a live collection session
    Collect {
        /// Stop automatically after this many seconds (default from config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Write the final snapshot to the export directory
        #[arg(long)]
        export: bool,
    },

    /// Load the recorded dataset and print its chart segments
    Visualize {
        /// Samples per segment (default from config)
        #[arg(long)]
        window_size: Option<usize>,

        /// Write the snapshot to the export directory
        #[arg(long)]
        export: bool,
    },

    /// Print summary metrics for the recorded dataset
    Summarize,

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Config { init } = cli.command {
        return cmd_config(init);
    }

    let mut config = Config::load().context("could not load configuration")?;
    if let Some(host) = cli.host {
        config.service.host = host;
    }
    if let Some(port) = cli.port {
        config.service.port = port;
    }
    config.validate()?;

    match cli.command {
        Commands::Collect { timeout, export } => cmd_collect(config, timeout, export).await,
        Commands::Visualize {
            window_size,
            export,
        } => cmd_visualize(config, window_size, export).await,
        Commands::Summarize => cmd_summarize(config).await,
        Commands::Config { .. } => unreachable!("handled above"),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn cmd_collect(config: Config, timeout: Option<u64>, export: bool) -> anyhow::Result<()> {
    println!("ECG Session Client v{VERSION}");
    println!();

    let client = stream::shared(&StreamSettings::from_config(&config));
    let analysis = Arc::new(AnalysisClient::new(config.service.clone())?);
    let services = Services {
        channel: client.clone(),
        datasets: analysis.clone(),
        summaries: analysis,
    };

    let mut settings = SessionSettings::from_config(&config);
    if let Some(secs) = timeout {
        if secs == 0 {
            bail!("--timeout must be greater than zero");
        }
        settings.collection_timeout = Duration::from_secs(secs);
    }
    let timeout_secs = settings.collection_timeout.as_secs();

    let (controller, deadlines) = SessionController::new(services, settings);
    let (runtime, handle) = SessionRuntime::new(controller, deadlines, client.take_events());
    let task = tokio::spawn(runtime.run());

    let (interrupt_tx, mut interrupt_rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })
    .context("could not install Ctrl+C handler")?;

    handle.start().await?;
    println!("Collecting from {}", client.url());
    println!("  Auto-stop after: {timeout_secs}s");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interrupt_rx.recv() => {
                println!();
                println!("Stopping collection...");
                handle.stop().await?;
                break;
            }
            _ = ticker.tick() => {
                let snapshot = handle.snapshot().await?;
                if snapshot.state != SessionState::Collecting {
                    println!();
                    println!("Collection time limit reached.");
                    break;
                }
                println!(
                    "[{}] {} samples, {} segments, stream {}",
                    Utc::now().format("%H:%M:%S"),
                    snapshot.sample_count,
                    snapshot.segments.len(),
                    if snapshot.connection.is_connected() { "connected" } else { "waiting" }
                );
            }
        }
    }

    let snapshot = handle.snapshot().await?;
    print_segments(&snapshot);
    if export {
        export_snapshot(&config, &snapshot)?;
    }

    drop(handle);
    let _ = task.await;
    stream::shutdown_shared().await;
    Ok(())
}

async fn cmd_visualize(
    config: Config,
    window_size: Option<usize>,
    export: bool,
) -> anyhow::Result<()> {
    let mut settings = SessionSettings::from_config(&config);
    if let Some(size) = window_size {
        if size == 0 {
            bail!("--window-size must be at least 1");
        }
        settings.window_size = size;
    }

    let (mut controller, _deadlines) = detached_controller(&config, settings)?;
    controller
        .visualize()
        .await
        .with_context(|| format!("could not load {}", config.service.dataset_url()))?;

    let snapshot = controller.snapshot();
    print_segments(&snapshot);
    if export {
        export_snapshot(&config, &snapshot)?;
    }
    Ok(())
}

async fn cmd_summarize(config: Config) -> anyhow::Result<()> {
    let settings = SessionSettings::from_config(&config);
    let (mut controller, _deadlines) = detached_controller(&config, settings)?;

    controller
        .visualize()
        .await
        .with_context(|| format!("could not load {}", config.service.dataset_url()))?;
    if controller.samples().is_empty() {
        println!("No recorded data to summarize.");
        return Ok(());
    }

    controller
        .summarize()
        .await
        .with_context(|| format!("could not load {}", config.service.summary_url()))?;

    if let Some(summary) = controller.summary() {
        print_summary(summary);
    }
    Ok(())
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    if init {
        Config::default().save()?;
        println!("Wrote default configuration to {:?}", Config::config_path());
        return Ok(());
    }

    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
    Ok(())
}

/// Controller wired to the HTTP endpoints only.
fn detached_controller(
    config: &Config,
    settings: SessionSettings,
) -> anyhow::Result<(
    SessionController,
    mpsc::UnboundedReceiver<DeadlineFired>,
)> {
    let analysis = Arc::new(AnalysisClient::new(config.service.clone())?);
    let services = Services {
        channel: Arc::new(DetachedChannel::new()),
        datasets: analysis.clone(),
        summaries: analysis,
    };
    Ok(SessionController::new(services, settings))
}

fn print_segments(snapshot: &SessionSnapshot) {
    if let Some(error) = &snapshot.last_error {
        eprintln!("Warning: {error}");
    }

    if snapshot.segments.is_empty() {
        println!("No samples to plot.");
        return;
    }

    println!(
        "{} samples in {} segments ({})",
        snapshot.sample_count,
        snapshot.segments.len(),
        snapshot.state
    );
    for segment in &snapshot.segments {
        let time = segment
            .time_range()
            .map(|(start, end)| format!("t={start:.2}..{end:.2}s"))
            .unwrap_or_default();
        let value = segment
            .value_range()
            .map(|(lo, hi)| format!("ecg={lo:.0}..{hi:.0}"))
            .unwrap_or_else(|| "ecg=n/a".to_string());
        println!(
            "  Segment {:>3}: {:>4} points  {}  {}",
            segment.index + 1,
            segment.len(),
            time,
            value
        );
    }
}

fn print_summary(summary: &Summary) {
    println!("ECG Summary");
    println!("===========");
    if summary.is_empty() {
        println!("(no metrics reported)");
        return;
    }

    let rows = summary.rows();
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(6).max(6);
    println!("{:<width$}  Value", "Metric");
    for (label, value) in &rows {
        println!("{label:<width$}  {value}");
    }
}

fn export_snapshot(config: &Config, snapshot: &SessionSnapshot) -> anyhow::Result<PathBuf> {
    config.ensure_directories()?;
    let path = config.export_path.join(format!(
        "session_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));

    let json = serde_json::to_string_pretty(snapshot).context("could not serialize snapshot")?;
    std::fs::write(&path, json).with_context(|| format!("could not write {path:?}"))?;
    println!("Exported snapshot to {path:?}");
    Ok(path)
}
