//! Conversation transcript: the message list a chat UI renders.
//!
//! Owns the messages and drives one turn at a time: user message, pending
//! assistant placeholder, streamed accumulation, then settle. A failed turn
//! always ends with exactly one system-error message and no pending message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::prompts::INTERRUPTED_MESSAGE;
use crate::chat::session::{ChatSession, ConversationClient};
use crate::llm_client::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
    SystemError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
    /// True only while the assistant reply is still streaming.
    #[serde(default)]
    pub pending: bool,
}

impl ConversationMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            created_at: Utc::now(),
            pending: false,
        }
    }

    fn pending_reply() -> Self {
        Self {
            pending: true,
            ..Self::new(Sender::Assistant, "")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed { reply: String },
    Interrupted,
    Skipped,
}

/// The chat transcript. Readers only wait on short mutations, never on a
/// streaming reply; the separate turn lock keeps turns one at a time.
#[derive(Debug)]
pub struct Conversation {
    messages: Mutex<Vec<ConversationMessage>>,
    turn: Mutex<()>,
}

impl Conversation {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            messages: Mutex::new(vec![ConversationMessage::new(Sender::Assistant, greeting)]),
            turn: Mutex::new(()),
        }
    }

    /// Snapshot of the transcript, including a reply that is still streaming.
    pub async fn messages(&self) -> Vec<ConversationMessage> {
        self.messages.lock().await.clone()
    }

    /// Runs one turn. `on_update` sees every message as it is added or changed,
    /// including each accumulated state of the streaming reply.
    pub async fn send<F>(
        &self,
        client: &ConversationClient,
        session: &Arc<ChatSession>,
        text: &str,
        mut on_update: F,
    ) -> TurnOutcome
    where
        F: FnMut(&ConversationMessage),
    {
        if text.trim().is_empty() {
            return TurnOutcome::Skipped;
        }

        let _turn = self.turn.lock().await;

        self.push(ConversationMessage::new(Sender::User, text), &mut on_update).await;

        let mut fragments = match client.send_message(session, text).await {
            Ok(fragments) => fragments,
            Err(e) => return self.interrupt(e, &mut on_update).await,
        };

        let reply = ConversationMessage::pending_reply();
        let reply_id = reply.id;
        self.push(reply, &mut on_update).await;

        let mut full_text = String::new();
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    full_text.push_str(&fragment.delta);
                    if let Some(message) = self.replace_text(reply_id, &full_text).await {
                        on_update(&message);
                    }
                }
                Err(e) => {
                    self.settle(reply_id, &mut on_update).await;
                    return self.interrupt(e, &mut on_update).await;
                }
            }
        }

        self.settle(reply_id, &mut on_update).await;
        info!("Chat turn completed ({} chars)", full_text.chars().count());
        TurnOutcome::Completed { reply: full_text }
    }

    async fn push<F>(&self, message: ConversationMessage, on_update: &mut F)
    where
        F: FnMut(&ConversationMessage),
    {
        self.messages.lock().await.push(message.clone());
        on_update(&message);
    }

    async fn replace_text(&self, id: Uuid, text: &str) -> Option<ConversationMessage> {
        let mut messages = self.messages.lock().await;
        let message = messages.iter_mut().find(|m| m.id == id)?;
        message.text.clear();
        message.text.push_str(text);
        Some(message.clone())
    }

    /// Ends the in-flight reply: drops it if nothing arrived, otherwise keeps
    /// the partial text as a finished message.
    async fn settle<F>(&self, reply_id: Uuid, on_update: &mut F)
    where
        F: FnMut(&ConversationMessage),
    {
        let settled = {
            let mut messages = self.messages.lock().await;
            let Some(index) = messages.iter().position(|m| m.id == reply_id) else {
                return;
            };

            if messages[index].text.is_empty() {
                messages.remove(index);
                None
            } else {
                messages[index].pending = false;
                Some(messages[index].clone())
            }
        };

        if let Some(message) = settled {
            on_update(&message);
        }
    }

    async fn interrupt<F>(&self, error: TransportError, on_update: &mut F) -> TurnOutcome
    where
        F: FnMut(&ConversationMessage),
    {
        warn!("Chat turn failed: {error}");
        self.push(
            ConversationMessage::new(Sender::SystemError, INTERRUPTED_MESSAGE),
            on_update,
        )
        .await;
        TurnOutcome::Interrupted
    }
}
