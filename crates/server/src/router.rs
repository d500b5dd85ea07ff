//! HTTP router construction.
//!
//! Assembles the per-webhook routes, the built-in listing routes and the
//! middleware stack into a single `Router`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

/// Largest accepted webhook body.
pub const BODY_LIMIT: usize = 1024 * 1024; // 1 MiB

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(api::health))
        .route("/", get(api::webhook_types))
        .route("/webhooks", get(api::webhook_types))
        .route("/adapters", get(api::webhook_types))
        .route("/notifiers", get(api::notifier_types));

    // One POST route per configured webhook; other methods get 405.
    for route in &state.routes {
        tracing::info!(
            webhook = %route.name,
            path = %route.path,
            recipients = route.recipients.len(),
            "route registered"
        );
        app = app.route(
            &route.path,
            post(api::receive_webhook).layer(Extension(Arc::clone(route))),
        );
    }

    app.layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
