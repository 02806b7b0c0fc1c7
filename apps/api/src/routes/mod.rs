pub mod events;
pub mod health;
pub mod profile;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::errors::AppError;
use crate::matching::handlers as matching;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {uri}"))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/profile", get(profile::handle_get_profile))
        // Chat API
        .route("/api/v1/chat", post(chat::handle_chat))
        .route("/api/v1/chat/messages", get(chat::handle_get_messages))
        // Match API
        .route("/api/v1/match", post(matching::handle_match))
        .fallback(not_found)
        .with_state(state)
}
