//! REST API module using Axum.
//!
//! All endpoints live under `/api/v1` and share the response envelope
//! from [`envelope`]. A bare `/health` alias is kept at the root for
//! load balancers.

pub mod envelope;
pub mod extract;
pub mod handlers;
mod routes;

pub use handlers::AppState;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Assemble the full service router with middleware layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(handlers::health::health).with_state(state.clone()))
        .nest("/api/v1", routes::api_routes(state))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
