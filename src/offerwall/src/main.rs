//! Offerwall admin server.
//!
//! Serves the offer management API over the configured MongoDB collection.

use clap::Parser;
use offerwall_core::config::AppConfig;
use offerwall_offers::{offer_router, MemoryOfferRepository, OfferRepository};
use offerwall_store::MongoStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "offerwall")]
#[command(about = "Offer management API with schedules and smart redirect rules")]
#[command(version)]
struct Cli {
    /// MongoDB connection string (overrides config)
    #[arg(long, env = "MONGODB_URI")]
    uri: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "OFFERWALL__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Keep offers in process memory instead of MongoDB (development only)
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offerwall=info,offerwall_offers=info,offerwall_store=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();
    info!("Offerwall starting up");

    let mut config = AppConfig::load_or_default();
    if let Some(uri) = cli.uri {
        config.store.uri = uri;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        database = %config.store.database,
        collection = %config.store.collection,
        http_port = config.api.http_port,
        "Configuration loaded"
    );

    let repo: Arc<dyn OfferRepository> = if cli.in_memory {
        warn!("Running with an in-memory offer repository, data is lost on exit");
        Arc::new(MemoryOfferRepository::new())
    } else {
        let store = MongoStore::connect(&config.store).await?;
        store.ensure_offer_indexes().await?;
        Arc::new(store)
    };

    if let Err(e) = start_metrics(&config) {
        error!(error = %e, "Failed to start metrics exporter");
    }

    let app = offer_router(repo)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.api.host.parse()?, config.api.http_port);
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Expose the Prometheus scrape endpoint on its own port.
fn start_metrics(config: &AppConfig) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(config.api.host.parse()?, config.metrics.port))
        .install()?;
    info!(port = config.metrics.port, "Metrics exporter started");
    Ok(())
}
