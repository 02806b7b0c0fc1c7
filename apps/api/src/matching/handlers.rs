//! Axum route handlers for the Match API.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{channel::mpsc, Stream, StreamExt};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::matching::analyzer::{run_analysis, MatchOutcome};
use crate::routes::events::json_event;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub job_description: String,
}

/// POST /api/v1/match
///
/// Streams a job-match analysis as SSE: an `update` event per fragment
/// (score so far, tier, display text), then either `result` or `error`.
/// A blank job description is rejected before any LLM call.
pub async fn handle_match(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("job_description cannot be empty".to_string()));
    }

    info!(
        "Starting match analysis ({} chars of JD)",
        request.job_description.chars().count()
    );

    let (tx, rx) = mpsc::unbounded::<Event>();

    tokio::spawn(async move {
        let outcome = run_analysis(
            &state.analyzer,
            &state.profile,
            &request.job_description,
            |update| {
                let _ = tx.unbounded_send(json_event("update", update));
            },
        )
        .await;

        let event = match &outcome {
            MatchOutcome::Completed(result) => json_event("result", result),
            MatchOutcome::Failed { .. } => json_event("error", &outcome),
        };
        let _ = tx.unbounded_send(event);
    });

    Ok(Sse::new(rx.map(Ok::<_, Infallible>)).keep_alive(KeepAlive::default()))
}
