// Job-match analyzer: prompt building, streamed score extraction, SSE handlers.
// All LLM calls go through llm_client, never Gemini directly.

pub mod analyzer;
pub mod handlers;
pub mod prompts;
pub mod score;
