// Prompt constants for the chat assistant.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, LANGUAGE_INSTRUCTION};
use crate::models::profile::CandidateProfile;

/// Persona system instruction. Replace `{name}`, `{title}`, `{profile_json}`,
/// `{grounding_instruction}` and `{language_instruction}` before sending.
pub const PERSONA_SYSTEM_TEMPLATE: &str = r#"You are the AI avatar of {name} ({title}), embedded in their personal portfolio website.
Visitors are recruiters and hiring managers. Answer their questions about {name}'s education,
experience, projects, skills and awards in a confident, concise and friendly tone.
Speak about {name} in the third person. Keep answers under 150 words unless asked for detail.

{grounding_instruction}

Candidate Resume Data:
{profile_json}

{language_instruction}"#;

/// Opening line of every conversation. Replace `{name}`.
pub const GREETING_TEMPLATE: &str =
    "你好。我是{name}的AI助手。你可以问我关于{name}在AI Agent、Vibe Coding或产品管理方面的任何经验。";

/// Synthetic system message shown when a turn fails.
pub const INTERRUPTED_MESSAGE: &str = "系统错误：神经网络连接中断。请重试。";

pub fn persona_instruction(profile: &CandidateProfile, profile_json: &str) -> String {
    PERSONA_SYSTEM_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{language_instruction}", LANGUAGE_INSTRUCTION)
        .replace("{name}", &profile.name)
        .replace("{title}", &profile.title)
        .replace("{profile_json}", profile_json)
}

pub fn greeting(profile: &CandidateProfile) -> String {
    GREETING_TEMPLATE.replace("{name}", &profile.name)
}
