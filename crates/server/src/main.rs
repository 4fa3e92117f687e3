//! Opine server entry point.

use std::sync::Arc;

use axum::{Router, middleware};
use opine_api::{middleware::AppState, router as api_router};
use opine_common::{Config, config::DataBackend};
use opine_core::{
    FeedService, PollFeedSource, PollService, PollSummarySource, PollsSource, VotesSource,
};
use opine_db::memory::MemoryStore;
use opine_db::repositories::{FeedRepository, PollRepository, VoteRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The data-source set behind the services, backend-agnostic.
struct Sources {
    polls: Arc<dyn PollsSource>,
    votes: Arc<dyn VotesSource>,
    feed: Arc<dyn PollFeedSource>,
    summaries: Arc<dyn PollSummarySource>,
}

async fn build_sources(config: &Config) -> Result<Sources, Box<dyn std::error::Error>> {
    match config.data.backend {
        DataBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .ok_or("data.backend = \"postgres\" requires a [database] section")?;

            let db = opine_db::init(db_config).await?;
            info!("Connected to database");

            info!("Running database migrations...");
            opine_db::migrate(&db).await?;
            info!("Migrations completed");

            let db = Arc::new(db);
            let feed_repo = FeedRepository::new(Arc::clone(&db));
            Ok(Sources {
                polls: Arc::new(PollRepository::new(Arc::clone(&db))),
                votes: Arc::new(VoteRepository::new(Arc::clone(&db))),
                feed: Arc::new(feed_repo.clone()),
                summaries: Arc::new(feed_repo),
            })
        }
        DataBackend::Memory => {
            warn!("Using the in-memory backend; data will not survive a restart");
            let store = MemoryStore::new();
            store.seed_demo()?;
            Ok(Sources {
                polls: Arc::new(store.clone()),
                votes: Arc::new(store.clone()),
                feed: Arc::new(store.clone()),
                summaries: Arc::new(store),
            })
        }
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opine=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting opine server...");

    // Load configuration
    let config = Config::load()?;

    // Wire the selected backend into the services
    let sources = build_sources(&config).await?;

    let state = AppState {
        feed_service: FeedService::new(Arc::clone(&sources.feed), Arc::clone(&sources.votes))
            .with_max_limit(config.feed.max_limit),
        poll_service: PollService::new(sources.polls, sources.votes, sources.summaries),
    };

    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn(
            opine_api::middleware::identity_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
