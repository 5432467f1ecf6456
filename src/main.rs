use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use rssagg::rss::{FetcherSettings, HttpFeedSource, IngestSettings};
use rssagg::{start_ingestor, Config, Database};

#[tokio::main]
async fn main() {
    // Pick up RSSAGG_* variables from a local .env file, if any
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = rssagg::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        rssagg::logging::init_console_only(&config.logging.level);
    }

    info!("rssagg - RSS/Atom feed aggregator");

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let db = match Database::connect(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if !config.ingest.enabled {
        info!("Feed ingestion is disabled");
        db.close().await;
        return;
    }

    let source = match HttpFeedSource::new(FetcherSettings::from(&config.ingest)) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let mut handle = match start_ingestor(
        Arc::new(db.clone()),
        Arc::new(source),
        IngestSettings::from(&config.ingest),
    ) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start ingestor: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");

    let grace = Duration::from_secs(config.ingest.shutdown_grace_secs);
    handle.shutdown(grace).await;

    let stats = handle.stats();
    info!(
        "Ingested {} new post(s) over {} tick(s) ({} cycle(s) succeeded, {} failed)",
        stats.posts_created, stats.ticks, stats.cycles_succeeded, stats.cycles_failed
    );
    db.close().await;
}
