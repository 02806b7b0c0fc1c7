use std::sync::Arc;

use crate::chat::conversation::Conversation;
use crate::chat::session::ConversationClient;
use crate::matching::analyzer::MatchAnalyzer;
use crate::models::profile::CandidateProfile;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read-only for the life of the process.
    pub profile: Arc<CandidateProfile>,
    /// Owns the one chat session; created once at startup.
    pub chat: Arc<ConversationClient>,
    /// The transcript the chat UI renders. Turns run one at a time.
    pub conversation: Arc<Conversation>,
    pub analyzer: Arc<MatchAnalyzer>,
}
