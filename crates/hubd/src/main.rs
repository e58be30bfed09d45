//! breakwater hub daemon - the authenticated write surface.
//!
//! Accepts uploads, deletes, listings, and revocation bumps beneath
//! per-principal namespaces, backed by a pluggable storage driver.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use common::config::DEFAULT_MAX_UPLOAD_BYTES;
use common::prelude::{AllowAllProofs, Hub, HubConfig};
use drivers::{DriverConfig, ObjectDriver, StorageDriver, DEFAULT_PAGE_SIZE};
use hubd::{http, AppState};

/// breakwater hub - authenticated multi-tenant storage gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for HTTP requests
    #[arg(short, long, default_value = "4000")]
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

    /// Public URL prefix returned for stored objects
    #[arg(long)]
    read_url: Option<String>,

    /// Name this hub answers to; pinned by token challenges
    #[arg(long, default_value = "localhost:4000")]
    server_name: String,

    /// Require tokens to pin one of this hub's URLs
    #[arg(long)]
    require_correct_hub_url: bool,

    /// Additional hub URLs accepted in token claims
    #[arg(long = "valid-hub-url")]
    valid_hub_urls: Vec<String>,

    /// Upload size ceiling in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,

    /// Listing page size
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Writer whitelist entries; when present, only these principals may write
    #[arg(long = "whitelist")]
    whitelist: Vec<String>,
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
            read_url: args.read_url.clone(),
        },
        DriverKind::S3 => DriverConfig::S3 {
            bucket: args
                .bucket
                .clone()
                .context("--bucket is required for the s3 backend")?,
            region: args.region.clone(),
            endpoint: args.endpoint.clone(),
            read_url: args.read_url.clone(),
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
            read_url: args.read_url.clone(),
        },
        DriverKind::Gcs => DriverConfig::Gcs {
            bucket: args
                .bucket
                .clone()
                .context("--bucket is required for the gcs backend")?,
            read_url: args.read_url.clone(),
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

    tracing::info!("Starting breakwater hub");

    let driver = ObjectDriver::new(driver_config(&args)?, args.page_size)?;
    if let Err(e) = driver.ensure_initialized().await {
        tracing::error!("Failed to initialize storage driver: {}", e);
        std::process::exit(1);
    }

    let config = HubConfig {
        server_name: args.server_name.clone(),
        valid_hub_urls: args.valid_hub_urls.clone(),
        require_correct_hub_url: args.require_correct_hub_url,
        read_url: args.read_url.clone(),
        max_file_upload_size_bytes: args.max_upload_bytes,
        whitelist: (!args.whitelist.is_empty()).then(|| args.whitelist.clone()),
        ..Default::default()
    };
    let hub = Hub::new(config, Arc::new(driver), Arc::new(AllowAllProofs));
    let state = AppState::new(hub);

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
    http::run(listen_addr, state.clone(), shutdown_rx).await?;

    state.hub.driver().dispose().await;
    tracing::info!("Hub shutdown complete");
    Ok(())
}
