//! Conversation Client: one lazily created chat session per client, reused
//! for every turn.
//!
//! The gateway is stateless, so the session keeps the running history itself
//! and replays it with each request. A turn is only committed to history once
//! its reply stream completes; failed or interrupted turns leave no trace.

use std::sync::{Arc, OnceLock};

use futures::{stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::prompts::persona_instruction;
use crate::llm_client::{
    ChatRequest, CompletionGateway, FragmentStream, SamplingParams, TransportError, Turn, MODEL,
};
use crate::models::profile::CandidateProfile;

pub const TEMPERATURE: f32 = 0.7;
pub const TOP_K: u32 = 40;
pub const TOP_P: f32 = 0.95;

/// Fixed model configuration a session is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub system_instruction: String,
    pub sampling: SamplingParams,
}

impl SessionConfig {
    /// The persona configuration for `profile`.
    pub fn for_profile(profile: &CandidateProfile) -> Result<Self, serde_json::Error> {
        let profile_json = serde_json::to_string(profile)?;
        Ok(Self {
            model: MODEL.to_string(),
            system_instruction: persona_instruction(profile, &profile_json),
            sampling: SamplingParams {
                temperature: TEMPERATURE,
                top_k: TOP_K,
                top_p: TOP_P,
            },
        })
    }
}

/// A dialogue handle: configuration plus committed history.
#[derive(Debug)]
pub struct ChatSession {
    pub id: Uuid,
    config: SessionConfig,
    history: Mutex<Vec<Turn>>,
}

impl ChatSession {
    fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            history: Mutex::new(Vec::new()),
        }
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.history.lock().await.clone()
    }

    async fn commit_exchange(&self, user_text: String, reply: String) {
        let mut history = self.history.lock().await;
        history.push(Turn::user(user_text));
        history.push(Turn::model(reply));
        debug!("Session {} history now {} turns", self.id, history.len());
    }
}

pub struct ConversationClient {
    gateway: Arc<dyn CompletionGateway>,
    config: SessionConfig,
    session: OnceLock<Arc<ChatSession>>,
}

impl ConversationClient {
    pub fn new(gateway: Arc<dyn CompletionGateway>, config: SessionConfig) -> Self {
        Self {
            gateway,
            config,
            session: OnceLock::new(),
        }
    }

    /// Returns the client's session, creating it on first call. Concurrent
    /// first calls converge on the same session.
    pub fn get_or_create_session(&self) -> Arc<ChatSession> {
        self.session
            .get_or_init(|| {
                let session = ChatSession::new(self.config.clone());
                info!(
                    "Chat session {} created (model: {})",
                    session.id, session.config.model
                );
                Arc::new(session)
            })
            .clone()
    }

    /// Sends `text` as the next user turn and streams the assistant's reply.
    ///
    /// The exchange is appended to the session history only if the returned
    /// stream runs to completion without error. No retries.
    pub async fn send_message(
        &self,
        session: &Arc<ChatSession>,
        text: &str,
    ) -> Result<FragmentStream, TransportError> {
        let request = ChatRequest {
            model: session.config.model.clone(),
            system_instruction: session.config.system_instruction.clone(),
            sampling: session.config.sampling,
            history: session.history().await,
            message: text.to_string(),
        };

        let fragments = self.gateway.stream_chat(request).await.map_err(|e| {
            warn!("Chat turn could not start on session {}: {e}", session.id);
            e
        })?;

        Ok(record_on_completion(
            fragments,
            Arc::clone(session),
            text.to_string(),
        ))
    }
}

struct Recorder {
    inner: FragmentStream,
    session: Arc<ChatSession>,
    user_text: String,
    reply: String,
    failed: bool,
}

/// Passes fragments through unchanged, committing the exchange to the session
/// when the inner stream ends cleanly.
fn record_on_completion(
    inner: FragmentStream,
    session: Arc<ChatSession>,
    user_text: String,
) -> FragmentStream {
    let recorder = Recorder {
        inner,
        session,
        user_text,
        reply: String::new(),
        failed: false,
    };

    let recorded = stream::unfold(Some(recorder), |state| async move {
        let mut rec = state?;
        if rec.failed {
            return None;
        }

        match rec.inner.next().await {
            Some(Ok(fragment)) => {
                rec.reply.push_str(&fragment.delta);
                Some((Ok(fragment), Some(rec)))
            }
            Some(Err(e)) => {
                warn!("Chat stream interrupted on session {}: {e}", rec.session.id);
                rec.failed = true;
                Some((Err(e), Some(rec)))
            }
            None => {
                let Recorder {
                    session,
                    user_text,
                    reply,
                    ..
                } = rec;
                session.commit_exchange(user_text, reply).await;
                None
            }
        }
    });

    Box::pin(recorded.fuse())
}
