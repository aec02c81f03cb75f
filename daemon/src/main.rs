mod artifact;
mod backend;
mod capture;
mod classifier;
mod config;
mod coordinator;
mod debounce;
mod engine;
mod error;
mod event;
mod feedback;
mod foreground;
mod hotkey;
mod matcher;
mod orchestrator;
mod paths;
mod phase;
mod profile;
#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::backend::obs::ObsBackend;
use crate::capture::ScreenGrabber;
use crate::coordinator::RecordingCoordinator;
use crate::engine::TransitionEngine;
use crate::feedback::SoundPlayer;
use crate::foreground::ForegroundWindowProbe;
use crate::hotkey::SaveKey;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Parser)]
#[command(name = "phaserec", version, about = "Records game attempts by watching the screen for phase changes")]
struct Cli {
    /// Config file to load instead of the one in the app data directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = match paths::app_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        eprintln!("Failed to create app data directory {}: {e}", app_dir.display());
        std::process::exit(1);
    }

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(|| app_dir.join(paths::CONFIG_FILE_NAME));
    let config = match config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[config] {e:#}");
            std::process::exit(1);
        }
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    let _log_guard = init_logging(&app_dir, cli.debug || config.global.debug);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "phaserec started"
    );

    // ── Collaborators ─────────────────────────────────────────────────────────
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let sounds = feedback::resolve_sounds(&config.sounds, config_dir);
    let save_key = SaveKey::new(&config.global.save_key);
    if save_key.is_enabled() {
        info!(key = %config.global.save_key, "Save key armed");
    }

    let recorder = RecordingCoordinator::new(Box::new(ObsBackend::new(&config.recorder)), &config.recorder);
    let engine = TransitionEngine::new(
        &config.global,
        recorder,
        Box::new(SoundPlayer::new(&sounds)),
        Box::new(save_key),
        Some(Box::new(ScreenGrabber)),
    );
    let mut orchestrator = Orchestrator::new(
        &config,
        engine,
        Box::new(ForegroundWindowProbe::new()),
        Box::new(ScreenGrabber),
    );

    let stats = orchestrator.registry().stats();
    info!(
        games = stats.games,
        phases = stats.phases,
        signature_groups = stats.signature_groups,
        "Loaded game profiles"
    );
    if stats.games == 0 {
        warn!(config = %config_path.display(), "No games configured, nothing will be detected");
    }

    // Graceful shutdown on Ctrl+C.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "Could not listen for Ctrl+C");
                // Keep the sender alive so the loop is not told to stop.
                std::future::pending::<()>().await;
            }
        }
    });

    orchestrator.run(shutdown_rx).await;
}

/// Console plus `<app dir>/phaserec.log`. `RUST_LOG` overrides the level.
fn init_logging(log_dir: &Path, debug: bool) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "info,phaserec=debug" } else { "info" })
    });

    let file_appender = tracing_appender::rolling::never(log_dir, paths::LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    guard
}
