//! Grid tile API server.
//!
//! Serves 256x256 PNG map tiles rendered on demand from NetCDF grid files.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geogrid::NetcdfSource;
use tile_api::{build_router, indexing, metrics, AppState, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "tile-api")]
#[command(about = "Map tile server for time-stamped grid datasets")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Optional YAML configuration file
    #[arg(short, long, env = "TILE_API_CONFIG")]
    config: Option<PathBuf>,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long, env = "TOKIO_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()?;
    metrics::describe();
    info!("Prometheus metrics exporter initialized");

    let config = ServiceConfig::load(args.config.as_deref())?;
    info!(config = ?config, "Starting tile API server");

    let state = Arc::new(
        AppState::new(config, Arc::new(NetcdfSource::new()))
            .await?
            .with_prometheus(prometheus_handle),
    );

    // Catalog lookups fail for types that are not indexed yet, so sweep first
    if let Err(e) = indexing::run_sweep(&state).await {
        warn!(error = %e, "Startup indexing failed; starting with the existing catalog");
    }
    indexing::spawn_periodic_reindex(state.clone());

    let app = build_router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
