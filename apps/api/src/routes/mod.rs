pub mod frontend;
pub mod health;
pub mod joblens;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// CV uploads above this size are rejected before reaching the handler.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(frontend::index_handler))
        .route("/health", get(health::health_handler))
        .route("/joblens/invoke", post(joblens::handle_invoke))
        .route("/joblens/cv", post(joblens::handle_upload_cv))
        .route("/joblens/improve", post(joblens::handle_improve))
        .route(
            "/joblens/threads/:thread_id/state",
            get(joblens::handle_thread_state),
        )
        .route(
            "/joblens/threads/:thread_id/history",
            get(joblens::handle_thread_history),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
