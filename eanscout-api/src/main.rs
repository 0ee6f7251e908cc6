//! eanscout-api - EAN product metadata service
//!
//! Resolves EAN-13 barcodes against configured retail and price-comparison
//! sites, caches the outcome in SQLite and serves it over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eanscout_api::AppState;
use eanscout_common::config::{self, ROOT_FOLDER_ENV};

/// Command-line arguments for eanscout-api
#[derive(Parser, Debug)]
#[command(name = "eanscout-api")]
#[command(about = "EAN product metadata resolution service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "EANSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "EANSCOUT_PORT")]
    port: Option<u16>,

    /// Root folder holding the database and image store
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let mut toml_config = config::load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    toml_config.apply_env_overrides();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("eanscout_api={0},eanscout_common={0},tower_http=info", toml_config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting eanscout-api {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = toml_config.database_path(&root_folder);
    let pool = eanscout_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database: {}", db_path.display());

    let image_dir = toml_config.image_storage_path(&root_folder);
    std::fs::create_dir_all(&image_dir)
        .with_context(|| format!("Failed to create image directory {}", image_dir.display()))?;
    info!("Image storage: {}", image_dir.display());

    let state = AppState::from_config(pool, &toml_config, image_dir)
        .context("Failed to initialize services")?;
    info!(
        adapters = state.pipeline.adapter_names().len(),
        max_concurrent_tasks = toml_config.tasks.max_concurrent,
        "Services initialized"
    );

    let shutdown = CancellationToken::new();
    let sweeper = state.tasks.spawn_sweeper(
        Duration::from_secs(toml_config.tasks.sweep_interval_secs.max(1)),
        shutdown.clone(),
    );

    let app = eanscout_api::build_router(state);

    let port = args.port.unwrap_or(toml_config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    let _ = sweeper.await;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
