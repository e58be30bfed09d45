//! breakwater read gateway - serves object bytes by bucket and key.
//!
//! Unauthenticated GET/HEAD over the same storage driver the hub writes
//! through.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use drivers::{DriverConfig, ObjectDriver, StorageDriver, DEFAULT_PAGE_SIZE};
use gateway::{router, GatewayState};

/// breakwater read gateway - public read surface for stored objects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for HTTP requests
    #[arg(short, long, default_value = "8008")]
    port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = DriverKind::Memory)]
    driver: DriverKind,

    /// Root directory for the disk backend
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Bucket name (s3 and gcs backends)
    #[arg(long)]
    bucket: Option<String>,

    /// Region (s3 backend)
    #[arg(long)]
    region: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[arg(long)]
    endpoint: Option<String>,

    /// Storage account (azure backend)
    #[arg(long)]
    azure_account: Option<String>,

    /// Blob container (azure backend)
    #[arg(long)]
    azure_container: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DriverKind {
    Memory,
    Disk,
    S3,
    Azure,
    Gcs,
}

fn driver_config(args: &Args) -> Result<DriverConfig> {
    let config = match args.driver {
        DriverKind::Memory => DriverConfig::Memory,
        DriverKind::Disk => DriverConfig::Disk {
            path: args
                .storage_root
                .clone()
                .context("--storage-root is required for the disk backend")?,
            read_url: None,
        },
        DriverKind::S3 => DriverConfig::S3 {
            bucket: args
                .bucket
                .clone()
                .context("--bucket is required for the s3 backend")?,
            region: args.region.clone(),
            endpoint: args.endpoint.clone(),
            read_url: None,
        },
        DriverKind::Azure => DriverConfig::Azure {
            account: args
                .azure_account
                .clone()
                .context("--azure-account is required for the azure backend")?,
            container: args
                .azure_container
                .clone()
                .context("--azure-container is required for the azure backend")?,
            read_url: None,
        },
        DriverKind::Gcs => DriverConfig::Gcs {
            bucket: args
                .bucket
                .clone()
                .context("--bucket is required for the gcs backend")?,
            read_url: None,
        },
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!("Starting breakwater read gateway");

    let driver = ObjectDriver::new(driver_config(&args)?, DEFAULT_PAGE_SIZE)?;
    if let Err(e) = driver.ensure_initialized().await {
        tracing::error!("Failed to initialize storage driver: {}", e);
        std::process::exit(1);
    }

    let state = GatewayState::new(Arc::new(driver));
    let app = router(state.clone()).layer(TraceLayer::new_for_http());

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    let listen_addr = SocketAddr::from_str(&format!("0.0.0.0:{}", args.port))?;
    tracing::info!(addr = ?listen_addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    let mut server_rx = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_rx.changed().await;
        })
        .await?;

    state.driver.dispose().await;
    tracing::info!("Gateway shutdown complete");
    Ok(())
}
