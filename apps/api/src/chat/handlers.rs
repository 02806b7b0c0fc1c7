//! Axum route handlers for the Chat API.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{channel::mpsc, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::chat::conversation::ConversationMessage;
use crate::routes::events::json_event;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<ConversationMessage>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat
///
/// Runs one chat turn and streams it as SSE: a `message` event for every
/// added or changed transcript message, then one `done` event with the outcome.
/// Blank input is not an error: the stream carries only a `skipped` outcome.
/// The turn runs to completion even if the client disconnects, so session
/// history stays consistent.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatMessageRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded::<Event>();

    tokio::spawn(async move {
        let session = state.chat.get_or_create_session();

        let outcome = state
            .conversation
            .send(&state.chat, &session, &request.message, |message| {
                // A closed receiver only means the client went away.
                let _ = tx.unbounded_send(json_event("message", message));
            })
            .await;

        let _ = tx.unbounded_send(json_event("done", &outcome));
    });

    Sse::new(rx.map(Ok::<_, Infallible>)).keep_alive(KeepAlive::default())
}

/// GET /api/v1/chat/messages
pub async fn handle_get_messages(State(state): State<AppState>) -> Json<TranscriptResponse> {
    Json(TranscriptResponse {
        messages: state.conversation.messages().await,
    })
}
