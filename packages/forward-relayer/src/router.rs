//! HTTP router setup.

use crate::handlers;
use crate::middleware::inject_request_id;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics))
        .route("/relay", post(handlers::relay))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(inject_request_id))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
