//! LiquiFund web front end.
//!
//! Server-rendered pages over the LiquiFund REST API: public pages, sign-in,
//! the client dashboard with M-Pesa currency rentals, and the admin console.
//! The library exposes the router so integration tests can drive the whole
//! application against a fake backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod filters;
pub mod insights;
pub mod middleware;
pub mod polling;
pub mod routes;
pub mod session;
pub mod state;
pub mod validation;

use std::path::PathBuf;

use axum::{Router, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{create_session_layer, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Directory holding `css/`, `js/` and the derived hashed assets.
fn static_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
async fn health() -> &'static str {
    "ok"
}

/// Build the complete application router.
///
/// Layers are listed innermost first; the Sentry layers wrap everything so
/// panics and failed requests are captured with full context.
pub fn build_router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(static_dir()))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
