//! Game automation bot
//!
//! Reads observations as JSON lines on stdin and writes the chosen actions
//! as JSON lines on stdout. Logs go to stderr.
//!
//! Usage: `ga-bot [config.yaml]`

use anyhow::{Context, Result};
use ga_bot::{run_live, DecisionCore, JsonLinesDispatcher};
use ga_config::BotConfig;
use ga_core::{Clock, SystemClock};
use ga_recorder::OperationRecorder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG: &str = "bot.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from).or_else(|| {
        let path = PathBuf::from(DEFAULT_CONFIG);
        path.exists().then_some(path)
    });

    let config = match &config_path {
        Some(path) => BotConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => BotConfig::default(),
    };

    init_tracing(&config.log_level)?;
    info!(config = ?config_path, engine = ?config.engine, "Starting game automation bot");

    if let Some(path) = &config.replay_path {
        return replay(path).await;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut core = DecisionCore::from_config(&config, clock.clone());
    let mut dispatcher = JsonLinesDispatcher::new(std::io::stdout());

    run_live(
        &mut core,
        BufReader::new(tokio::io::stdin()),
        &mut dispatcher,
        config.tick_interval(),
        clock,
        shutdown_signal(),
    )
    .await;

    if config.recording.enabled {
        if let Err(e) = core.save_recording(&config.recording.path) {
            warn!(error = %e, "Failed to save recording");
        }
    }

    info!("Shut down");
    Ok(())
}

fn init_tracing(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn replay(path: &Path) -> Result<()> {
    let mut recorder = OperationRecorder::new();
    if recorder.load(path) == 0 {
        warn!(path = %path.display(), "Nothing to replay");
        return Ok(());
    }

    let count = tokio::task::spawn_blocking(move || {
        let mut dispatcher = JsonLinesDispatcher::new(std::io::stdout());
        recorder.replay(&mut dispatcher)
    })
    .await??;

    info!(count, "Replay finished");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
