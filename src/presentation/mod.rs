// Presentation layer - HTTP surface for rendering clients
pub mod app_state;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::presentation::app_state::AppState;

/// Compression is done per response in the handlers, so no CompressionLayer here
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/dashboard/events", post(handlers::dispatch_event))
        .route("/dashboard/fullscreen/:panel", post(handlers::fullscreen_panel))
        .route("/dashboard/grid", post(handlers::reset_grid))
        .route("/dashboard/error/clear", post(handlers::clear_error))
        .route("/panels/:panel/failure", post(handlers::report_panel_failure))
        .route("/panels/:panel/retry", post(handlers::retry_panel))
        .route("/feed", get(handlers::get_feed))
        .route("/feed/events", delete(handlers::clear_feed))
        .route("/feed/stream", get(handlers::stream_feed))
        .route("/history", get(handlers::get_history))
        .route("/history/refetch", post(handlers::refetch_history))
        .route(
            "/preferences",
            get(handlers::get_preferences).patch(handlers::patch_preferences),
        )
        .route("/samples/validate", post(handlers::validate_sample))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
