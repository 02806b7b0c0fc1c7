/// LLM Client: the single point of entry for all generative-language calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// Feature modules talk to a `CompletionGateway`; `GeminiClient` is the only
/// production implementation.
///
/// Model: gemini-3-pro-preview (hardcoded, not configurable)
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
#[cfg(test)]
pub mod scripted;
mod sse;

use sse::SseDecoder;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// The model used for every call, chat and analysis alike.
pub const MODEL: &str = "gemini-3-pro-preview";
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Anything that prevents a streamed completion from starting or finishing.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One incremental text delta. May be empty (e.g. a metadata-only chunk).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextFragment {
    pub delta: String,
}

/// Lazy, finite, non-restartable sequence of fragments. After an `Err` item
/// the stream ends.
pub type FragmentStream =
    Pin<Box<dyn Stream<Item = Result<TextFragment, TransportError>> + Send>>;

/// Sampling parameters bound to a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One entry of a session's dialogue history as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A session-based chat request: configuration, prior history and the new user text.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_instruction: String,
    pub sampling: SamplingParams,
    pub history: Vec<Turn>,
    pub message: String,
}

/// The two-mode streaming capability both feature clients depend on.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Streams the reply to `request.message` given the prior history.
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, TransportError>;

    /// Streams a single-shot completion of `prompt` with no history.
    async fn stream_generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<FragmentStream, TransportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    role: TurnRole,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ChunkContent>,
}

#[derive(Debug, Deserialize)]
struct ChunkContent {
    #[serde(default)]
    parts: Vec<ChunkPart>,
}

#[derive(Debug, Deserialize)]
struct ChunkPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    code: u16,
    message: String,
}

impl<'a> WireContent<'a> {
    fn from_turn(turn: &'a Turn) -> Self {
        Self {
            role: turn.role,
            parts: vec![WirePart { text: &turn.text }],
        }
    }
}

/// Decodes one SSE `data:` payload into a fragment, concatenating every text
/// part of the first candidate.
fn decode_chunk(payload: &str) -> Result<TextFragment, TransportError> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;

    if let Some(error) = chunk.error {
        return Err(TransportError::Api {
            status: error.code,
            message: error.message,
        });
    }

    let delta = chunk
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(TextFragment { delta })
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiClient
// ────────────────────────────────────────────────────────────────────────────

/// Streams completions from the Gemini `streamGenerateContent` endpoint.
/// Stateless: chat history is supplied by the caller on every request.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    /// Sends the request and turns the SSE body into a `FragmentStream`.
    /// Never retries: a failed call is reported to the caller as-is.
    async fn open_stream(
        &self,
        model: &str,
        body: &GenerateRequest<'_>,
    ) -> Result<FragmentStream, TransportError> {
        let response = self
            .client
            .post(self.stream_url(model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("Gemini API returned {}: {}", status, message);
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Gemini stream opened (model: {model})");
        Ok(fragments_from_bytes(response.bytes_stream()))
    }
}

#[async_trait]
impl CompletionGateway for GeminiClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, TransportError> {
        let new_turn = Turn::user(request.message.as_str());
        let contents = request
            .history
            .iter()
            .chain(std::iter::once(&new_turn))
            .map(WireContent::from_turn)
            .collect();

        let body = GenerateRequest {
            contents,
            system_instruction: Some(SystemInstruction {
                parts: vec![WirePart {
                    text: &request.system_instruction,
                }],
            }),
            generation_config: Some(GenerationConfig {
                temperature: request.sampling.temperature,
                top_k: request.sampling.top_k,
                top_p: request.sampling.top_p,
            }),
        };

        self.open_stream(&request.model, &body).await
    }

    async fn stream_generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<FragmentStream, TransportError> {
        let body = GenerateRequest {
            contents: vec![WireContent {
                role: TurnRole::User,
                parts: vec![WirePart { text: prompt }],
            }],
            system_instruction: None,
            generation_config: None,
        };

        self.open_stream(model, &body).await
    }
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: std::collections::VecDeque<String>,
    done: bool,
}

/// Adapts a raw SSE byte stream into fragments, preserving arrival order.
/// The first error item terminates the stream.
fn fragments_from_bytes<S>(bytes: S) -> FragmentStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::default(),
        pending: Default::default(),
        done: false,
    };

    let fragments = stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                let item = decode_chunk(&payload);
                if item.is_err() {
                    st.done = true;
                    st.pending.clear();
                }
                return Some((item, st));
            }

            if st.done {
                return None;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.decoder.push(&chunk)),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(TransportError::Interrupted(e.to_string())), st));
                }
                None => {
                    st.done = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    });

    Box::pin(fragments.fuse())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse_body(payloads: &[&str]) -> Vec<reqwest::Result<Bytes>> {
        payloads
            .iter()
            .map(|p| Ok(Bytes::from(format!("data: {p}\r\n\r\n"))))
            .collect()
    }

    #[test]
    fn test_decode_chunk_joins_text_parts() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"你好"},{"text":", world"}],"role":"model"}}]}"#;
        assert_eq!(decode_chunk(payload).unwrap().delta, "你好, world");
    }

    #[test]
    fn test_decode_chunk_without_content_is_empty_delta() {
        let payload = r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":12}}"#;
        assert_eq!(decode_chunk(payload).unwrap().delta, "");
    }

    #[test]
    fn test_decode_chunk_surfaces_in_stream_error() {
        let payload = r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#;
        match decode_chunk(payload) {
            Err(TransportError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_chunk_rejects_garbage() {
        assert!(matches!(decode_chunk("not json"), Err(TransportError::Json(_))));
    }

    #[test]
    fn test_stream_url_trims_trailing_slash() {
        let client =
            GeminiClient::new("key".to_string(), "http://localhost:9000/".to_string()).unwrap();
        assert_eq!(
            client.stream_url(MODEL),
            "http://localhost:9000/v1beta/models/gemini-3-pro-preview:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_chat_body_uses_gemini_field_names() {
        let history = [Turn::user("hi"), Turn::model("hello")];
        let body = GenerateRequest {
            contents: history.iter().map(WireContent::from_turn).collect(),
            system_instruction: Some(SystemInstruction {
                parts: vec![WirePart { text: "persona" }],
            }),
            generation_config: Some(GenerationConfig {
                temperature: 0.5,
                top_k: 40,
                top_p: 0.5,
            }),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "persona");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["topP"], 0.5);
    }

    #[tokio::test]
    async fn test_fragments_preserve_order_across_chunk_boundaries() {
        let first = r#"{"candidates":[{"content":{"parts":[{"text":"SCORE: 9"}]}}]}"#;
        let second = r#"{"candidates":[{"content":{"parts":[{"text":"2\n### 核心优势"}]}}]}"#;
        let raw = format!("data: {first}\n\ndata: {second}\n\n");
        let (a, b) = raw.as_bytes().split_at(17);
        let body = vec![Ok(Bytes::copy_from_slice(a)), Ok(Bytes::copy_from_slice(b))];

        let deltas: Vec<String> = fragments_from_bytes(stream::iter(body))
            .map(|f| f.unwrap().delta)
            .collect()
            .await;

        assert_eq!(deltas, vec!["SCORE: 9", "2\n### 核心优势"]);
    }

    #[tokio::test]
    async fn test_bad_payload_ends_stream_after_error() {
        let good = r#"{"candidates":[{"content":{"parts":[{"text":"A"}]}}]}"#;
        let body = sse_body(&[good, "{oops", good]);

        let items: Vec<_> = fragments_from_bytes(stream::iter(body)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().delta, "A");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_payload_without_trailing_newline_is_flushed() {
        let body = vec![Ok(Bytes::from_static(
            br#"data: {"candidates":[{"content":{"parts":[{"text":"tail"}]}}]}"#,
        ))];
        let items: Vec<_> = fragments_from_bytes(stream::iter(body)).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().delta, "tail");
    }
}
