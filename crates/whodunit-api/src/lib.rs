//! Whodunit — HTTP and server-sent-events adapter.
//!
//! Exposes one scenario as many concurrent game sessions. Inbound operations
//! map one-to-one onto the engine's session methods; the live event feed is
//! filtered by audience so private deliveries reach only their recipient.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod providers;
pub mod routes;
pub mod state;

use crate::state::AppState;

/// Builds the full application router.
// TODO: Replace CorsLayer::permissive() with restricted origins for production.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/sessions", routes::sessions::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
