//! Community forum backend server.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use forum_backend::config::Config;
use forum_backend::search::SearchIndex;
use forum_backend::store::{Repository, StoreOptions};
use forum_backend::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Starting forum backend");
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Max reply depth: {}, rate limit: {} per {:?}",
        config.max_reply_depth,
        config.rate_limit_max,
        config.rate_limit_window
    );

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (FORUM_API_PSK). Authentication is disabled!");
    }

    let repo = Arc::new(Repository::new(StoreOptions::from(&config)));
    if config.seed_demo {
        repo.seed_demo().await?;
    }

    // Expired rate-limit windows and timed bans are swept once per window.
    let purge_repo = repo.clone();
    let purge_every = config.rate_limit_window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            purge_repo.purge_rate_limits();
            purge_repo.lift_expired_bans().await;
        }
    });

    // Build initial search index from the forum state
    tracing::info!("Building search index...");
    let search = Arc::new(SearchIndex::in_memory()?);
    let documents = repo.search_documents().await;
    search.rebuild(&documents).await?;

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
