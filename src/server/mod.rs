mod handlers;
mod twiml;

use crate::agent::MainAgent;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<MainAgent>,
}

impl AppState {
    pub fn new(agent: Arc<MainAgent>) -> Self {
        Self { agent }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/messages", post(handlers::messages))
        .route("/sms", post(handlers::sms))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves, letting in-flight requests finish.
pub async fn serve(
    router: Router,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
