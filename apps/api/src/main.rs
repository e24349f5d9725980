mod autosave;
mod config;
mod document;
mod errors;
mod history;
mod models;
mod persistence;
mod routes;
mod session;
mod state;
mod versions;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::persistence::HttpResumeStore;
use crate::routes::build_router;
use crate::session::SessionRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume editor API v{}", env!("CARGO_PKG_VERSION"));

    let store = HttpResumeStore::new(&config.resume_api_url, config.resume_api_token.clone())?;
    info!("Resume API client initialized ({})", config.resume_api_url);

    let session_config = config.session_config();
    info!(
        "Sessions: history {} entries / {:?} debounce, auto-save {} ({:?} debounce, {} retries)",
        session_config.history_max_entries,
        session_config.history_debounce,
        if session_config.autosave.enabled { "on" } else { "off" },
        session_config.autosave.debounce,
        session_config.autosave.max_retries
    );
    let sessions = Arc::new(SessionRegistry::new(Arc::new(store), session_config));

    let state = AppState {
        sessions: sessions.clone(),
    };

    // TODO: restrict origins once the editor frontend has a fixed host
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let dirty = sessions.dirty_sessions().await.len();
    if dirty > 0 {
        warn!("{dirty} session(s) have unsaved changes; attempting final save");
    }
    sessions.close_all().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
