// All LLM prompt constants for the Match module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Job-match prompt template. Replace `{profile_json}`, `{job_description}`
/// and `{language_instruction}` before sending.
///
/// The first output line MUST be `SCORE: <n>`; the score extractor depends on it.
pub const MATCH_PROMPT_TEMPLATE: &str = r#"
Task: You are an expert AI Technical Recruiter and Career Coach.
Analyze the following Candidate Resume against the provided Job Description (JD).

Candidate Resume Data:
{profile_json}

Target Job Description:
{job_description}

Output Requirements ({language_instruction}):
1.  **Match Score**: Give a score from 0 to 100.
2.  **核心优势**: One sentence explaining the single biggest reason to hire this candidate.
3.  **深度分析**:
    -   ✅ **核心匹配 (Matching Skills)**: List 3 key skills from the resume that perfectly match the JD.
    -   🚀 **独特价值 (Unique Value)**: How this candidate's specific project experience (e.g., AI Agents, Vibe Coding) adds extra value beyond the JD.
    -   ⚠️ **差距应对 (Gap Strategy)**: If there's a gap, briefly explain how the candidate's learning ability (proven by their projects) covers it.

Format the output as Markdown. Start the response STRICTLY with the line: "SCORE: [Number]" followed by the rest of the analysis.
Example:
SCORE: 88

### 🎯 核心优势
...
"#;

/// Inline error shown in place of the analysis when the stream fails.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Error: Neural link failed. Please try again.";
