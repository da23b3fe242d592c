//! HTTP routes for the chat service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::ChatStore;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Participant and message storage.
    pub store: Arc<dyn ChatStore>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/participants` - Join (POST) and list (GET)
/// - `/messages` - Post (POST) and list visible (GET)
/// - `/status` - Heartbeat (POST)
/// - `/health` - Store ping
/// - `/metrics` - Prometheus metrics endpoint
/// - Permissive CORS for browser clients
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let chat_routes = Router::new()
        .route(
            "/participants",
            get(handlers::list_participants).post(handlers::join),
        )
        .route(
            "/messages",
            get(handlers::list_messages).post(handlers::post_message),
        )
        .route("/status", post(handlers::heartbeat))
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. CorsLayer - answers preflight before anything else runs
    // 4. http_metrics_middleware - records ALL responses (outermost)
    chat_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(http_metrics_middleware))
}
