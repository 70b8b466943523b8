//! JSON HTTP API over the result assembler.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::assemble::Assembler;
use crate::error::RepurposeError;

pub mod error;
pub mod handlers;

pub struct AppState {
    pub assembler: Arc<Assembler>,
    pub reports_dir: PathBuf,
}

pub type SharedState = Arc<AppState>;

/// Build the full API router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/search", get(handlers::search))
        .route("/api/drugs/{name}", get(handlers::drug))
        .route("/api/compare", post(handlers::compare))
        .route("/api/report", post(handlers::report))
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/clear_cache", post(handlers::clear_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// Binds `host:port` and serves until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<(), RepurposeError> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
