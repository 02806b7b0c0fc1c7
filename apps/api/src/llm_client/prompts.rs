// Shared prompt fragments used by both the chat persona and the match analyzer.
// Each feature module keeps its own prompts.rs for everything else.

/// Every user-facing answer is written in Simplified Chinese.
pub const LANGUAGE_INSTRUCTION: &str = "Please respond in CHINESE - 简体中文.";

/// Keeps the model from inventing experience the profile does not contain.
pub const GROUNDING_INSTRUCTION: &str = "\
    Only state facts that appear in the candidate resume data provided. \
    If the data does not cover a question, say so instead of guessing.";
