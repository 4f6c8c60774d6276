mod assign;
mod backoff;
mod bridge;
mod cli;
mod config;
mod event;
mod gpio;
mod obs;
mod protocol;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::assign::AssignmentTable;
use crate::bridge::Bridge;
use crate::event::DaemonEvent;
use crate::gpio::PinController;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    // ── Settings ──────────────────────────────────────────────────────────────
    let file = match &args.config {
        Some(path) => config::load(path)?,
        None => config::FileConfig::default(),
    };
    let settings = config::Settings::resolve(args, file)?;

    // ── Assignment table ──────────────────────────────────────────────────────
    let table =
        AssignmentTable::new(settings.assignments.clone()).context("invalid pin assignments")?;
    if table.is_empty() {
        tracing::warn!("no pin assignments configured; events will drive nothing");
    }
    let sources = table.sources();

    // ── Tally bridge ──────────────────────────────────────────────────────────
    let pins = PinController::open(&table.pins());
    let mut bridge = Bridge::new(table, pins);

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    let obs_config = obs::ObsConfig {
        host: settings.host.clone(),
        port: settings.port,
        password: settings.password.clone(),
        unbounded_retry: settings.daemon,
    };
    tokio::spawn(obs::run(obs_config, sources, event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %settings.host,
        port = settings.port,
        "tally-daemon started"
    );

    // ── Event loop ────────────────────────────────────────────────────────────
    let mut outcome = Ok(());
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::Connected => {
                tracing::info!("connected to OBS");
            }

            DaemonEvent::SourceActiveChanged { source, active } => {
                bridge.apply(&source, active);
            }

            DaemonEvent::Disconnected => {
                tracing::warn!("disconnected, clearing tally lights");
                bridge.clear_all();
            }

            DaemonEvent::RetriesExhausted => {
                outcome = Err(anyhow!("gave up reconnecting to OBS"));
                break;
            }

            DaemonEvent::Shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    // Leave the header dark no matter how the loop ended.
    bridge.clear_all();
    outcome
}

fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
