use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{api, form, health};
use crate::state::AppState;

/// Creates the application router.
///
/// - `/` and `/history`: server-rendered pages
/// - `/api/*`: JSON equivalents
/// - `/health`: liveness and index size
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(form::index).post(form::submit))
        .route("/history", get(form::history))
        .route("/health", get(health::health))
        .route("/api/answer", post(api::answer))
        .route("/api/questions", post(api::generate_questions))
        .route("/api/history", get(api::history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
