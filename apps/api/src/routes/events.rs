use axum::response::sse::Event;
use serde::Serialize;
use tracing::error;

/// Builds a named SSE event carrying `data` as JSON.
pub fn json_event<T: Serialize>(name: &str, data: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| {
            error!("Failed to encode SSE event '{name}': {e}");
            Event::default().event("error").data("event encoding failed")
        })
}
