// src/main.rs
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use truck_loader::config::AppConfig;
use truck_loader::{GreedyLargestFirst, PackEvent, PackingEngine, PackingService, ServiceError};

const EXIT_INCOMPLETE: u8 = 1;
const EXIT_STATE_ERROR: u8 = 2;

#[derive(Debug, Error)]
enum RunError {
    #[error("no usable state at {}", .0.display())]
    NoState(PathBuf),
    #[error("could not save state to {}", .0.display())]
    SaveFailed(PathBuf),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env must be applied before the filter reads RUST_LOG.
    let dotenv_result = dotenvy::dotenv();
    init_tracing();
    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    info!("🚚 Truck loader starting...");

    match run(&app_config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_INCOMPLETE),
        Err(err) => {
            error!("❌ {}", err);
            ExitCode::from(EXIT_STATE_ERROR)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: &AppConfig) -> Result<bool, RunError> {
    let service = PackingService::spawn(PackingEngine::new());

    let state_file = config.io.state_file();
    if !service.load_state(state_file).await? {
        return Err(RunError::NoState(state_file.to_path_buf()));
    }

    if config.strategy.reset_before_pack() {
        service.reset().await?;
        info!("🔄 Placed items moved back to the pool");
    }

    let (tx, mut rx) = mpsc::channel::<PackEvent>(32);
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_event(&event);
        }
    });

    let strategy = GreedyLargestFirst::with_config(config.strategy.packing_config());
    let complete = service.pack_with_progress(strategy, tx).await?;
    finish_progress(progress).await;

    let summary = service.summary().await?;
    info!(
        placed = summary.placed_items,
        unplaced = summary.unplaced_items,
        packed_volume = summary.packed_volume,
        packed_weight = summary.packed_weight,
        average_utilization = summary.average_utilization(),
        "📊 Packing summary"
    );
    if !complete {
        warn!(
            "⚠️ {} item(s) did not fit into the available trucks",
            summary.unplaced_items
        );
    }

    if let Some(output) = config.io.output_file() {
        if !service.save_state(output).await? {
            return Err(RunError::SaveFailed(output.to_path_buf()));
        }
    }

    Ok(complete)
}

/// Waits for the progress logger; a panic there is reported, not propagated.
async fn finish_progress(progress: JoinHandle<()>) -> bool {
    match progress.await {
        Ok(()) => true,
        Err(err) => {
            warn!("⚠️ Progress reporting stopped early: {}", err);
            false
        }
    }
}

fn log_event(event: &PackEvent) {
    match event {
        PackEvent::ItemPlaced {
            item,
            container,
            position,
        } => info!(%item, %container, position = ?position.as_array(), "✅ Item placed"),
        PackEvent::ContainerExhausted {
            container,
            blocking_item,
        } => info!(%container, %blocking_item, "➡️ Truck full, moving on"),
        PackEvent::Finished { placed, unplaced } => {
            info!(placed, unplaced, "🏁 Packing run finished")
        }
    }
}
