//! Provider registry server

use camino::Utf8PathBuf;
use clap::Parser;
use provider_registry::RegistryConfig;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// A Terraform provider registry serving release archives from object storage.
#[derive(Debug, Parser)]
#[command(name = "provider-registry", version, about)]
struct Args {
    /// Path to a TOML configuration file. It must name a storage backend.
    #[arg(short, long)]
    config: Utf8PathBuf,

    /// Address to listen on, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<std::net::SocketAddr>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = RegistryConfig::from_file(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let app = config
        .registry()?
        .build()
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind).await?;

    tracing::info!(
        bucket = %config.bucket,
        prefix = %config.prefix,
        "Provider registry listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
