// Chat assistant: persona session, conversation transcript and SSE handlers.
// All LLM calls go through llm_client, never Gemini directly.

pub mod conversation;
pub mod handlers;
pub mod prompts;
pub mod session;
