use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filedrop_core::{
    load_config, validate_config, FileHandle, HttpTransport, UploadHandle, UploadOrchestrator,
    UploadSnapshot, UploadState, UploadTransport,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upload files one at a time to an upload server.
#[derive(Debug, Parser)]
#[command(name = "filedrop", version)]
struct Cli {
    /// Path to the configuration file (defaults to $FILEDROP_CONFIG, then config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How many times to retry a failed batch
    #[arg(short, long, default_value_t = 0)]
    retries: u32,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Files to upload, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(cli).await {
        Ok(()) => {}
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("filedrop {}", VERSION);

    // Determine config path
    let config_path = cli
        .config
        .or_else(|| std::env::var("FILEDROP_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Uploading to {}", config.transport.base_url);

    let transport: Arc<dyn UploadTransport> = Arc::new(
        HttpTransport::new(config.transport.clone()).context("Failed to create HTTP transport")?,
    );

    let files: Vec<FileHandle> = cli.files.iter().map(FileHandle::from_path).collect();
    let handle = UploadOrchestrator::spawn(config.orchestrator.clone(), transport);

    let outcome = tokio::select! {
        result = drive(&handle, files, cli.retries) => result,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, cancelling upload");
            // Already settled is fine: nothing left to cancel.
            if let Err(e) = handle.cancel().await {
                warn!("Cancel not applied: {}", e);
            }
            Ok(handle.snapshot())
        }
    };

    handle.shutdown().await;

    let snapshot = outcome?;
    match snapshot.state {
        UploadState::Completed => {
            info!("{} ({} files)", snapshot.state.status_message(), snapshot.files.len());
            Ok(())
        }
        UploadState::Failed => {
            let reason = snapshot
                .last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("{} {}", snapshot.state.status_message(), reason)
        }
        state => bail!("{}", state.status_message()),
    }
}

/// Run the batch to a settled state, retrying failures up to `retries` times.
async fn drive(handle: &UploadHandle, files: Vec<FileHandle>, retries: u32) -> Result<UploadSnapshot> {
    let mut updates = handle.subscribe();
    handle
        .start_batch(files)
        .await
        .context("Failed to start upload batch")?;

    let mut retries_left = retries;
    loop {
        let snapshot = updates.borrow_and_update().clone();
        report(&snapshot);

        if snapshot.state == UploadState::Failed && retries_left > 0 {
            retries_left -= 1;
            warn!(
                "Retrying batch ({} of {} retries used)",
                retries - retries_left,
                retries
            );
            handle.retry().await.context("Failed to retry batch")?;
            continue;
        }
        if snapshot.state.is_settled() {
            return Ok(snapshot);
        }

        if updates.changed().await.is_err() {
            bail!("upload orchestrator stopped unexpectedly");
        }
    }
}

fn report(snapshot: &UploadSnapshot) {
    match snapshot.label() {
        Some(label) => info!("{} ({:.0}%)", label, snapshot.progress),
        None if snapshot.state == UploadState::Failed => {
            if let (Some(idx), Some(err)) = (snapshot.current_file_index, &snapshot.last_error) {
                let name = snapshot
                    .files
                    .get(idx)
                    .map(|f| f.name.as_str())
                    .unwrap_or("?");
                warn!("Upload of {} failed: {}", name, err);
            }
        }
        None => info!("{}", snapshot.state.status_message()),
    }
}
