//! Match Analyzer: scores a job description against the candidate profile
//! with one stateless, streamed completion.
//!
//! Flow: build prompt (profile JSON + JD + instructions) → stream_generate →
//!       MatchAccumulator per fragment → MatchResult.
//!
//! Never touches the chat session.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::llm_client::prompts::LANGUAGE_INSTRUCTION;
use crate::llm_client::{CompletionGateway, FragmentStream, TransportError, MODEL};
use crate::matching::prompts::{ANALYSIS_FAILED_MESSAGE, MATCH_PROMPT_TEMPLATE};
use crate::matching::score::{MatchAccumulator, MatchResult, MatchUpdate};
use crate::models::profile::CandidateProfile;

pub struct MatchAnalyzer {
    gateway: Arc<dyn CompletionGateway>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Completed(MatchResult),
    Failed { message: String },
}

impl MatchAnalyzer {
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self { gateway }
    }

    /// Streams the analysis of `job_description`.
    ///
    /// Callers must not pass a blank job description. No retries.
    pub async fn analyze(
        &self,
        profile: &CandidateProfile,
        job_description: &str,
    ) -> Result<FragmentStream, TransportError> {
        let prompt = build_match_prompt(profile, job_description)?;
        self.gateway.stream_generate(MODEL, &prompt).await
    }
}

/// Fills the match template. Deterministic for a given profile and JD.
pub fn build_match_prompt(
    profile: &CandidateProfile,
    job_description: &str,
) -> Result<String, serde_json::Error> {
    let profile_json = serde_json::to_string(profile)?;

    Ok(MATCH_PROMPT_TEMPLATE
        .replace("{language_instruction}", LANGUAGE_INSTRUCTION)
        .replace("{profile_json}", &profile_json)
        .replace("{job_description}", job_description))
}

/// Runs one analysis to completion, reporting a `MatchUpdate` after every
/// fragment. Any transport failure yields `Failed` with the inline error text.
pub async fn run_analysis<F>(
    analyzer: &MatchAnalyzer,
    profile: &CandidateProfile,
    job_description: &str,
    mut on_update: F,
) -> MatchOutcome
where
    F: FnMut(&MatchUpdate),
{
    let mut fragments = match analyzer.analyze(profile, job_description).await {
        Ok(fragments) => fragments,
        Err(e) => return failed(e),
    };

    let mut accumulator = MatchAccumulator::new();
    while let Some(item) = fragments.next().await {
        match item {
            Ok(fragment) => on_update(&accumulator.push(&fragment.delta)),
            Err(e) => return failed(e),
        }
    }

    let result = accumulator.finish();
    if !result.score_found {
        warn!("Match analysis finished without a SCORE line; showing {}", result.score);
    }
    info!(
        "Match analysis completed: score={} tier={:?}",
        result.score, result.tier
    );
    MatchOutcome::Completed(result)
}

fn failed(error: TransportError) -> MatchOutcome {
    warn!("Match analysis failed: {error}");
    MatchOutcome::Failed {
        message: ANALYSIS_FAILED_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::scripted::{Recorded, Script, ScriptedGateway, Step};
    use crate::matching::score::MatchTier;
    use crate::profile::load_profile;

    const JD: &str = "招聘大模型应用工程师，要求熟悉 RAG 与 Agent 开发。";

    fn analyzer_with(scripts: Vec<Script>) -> (Arc<ScriptedGateway>, MatchAnalyzer) {
        let gateway = Arc::new(ScriptedGateway::new(scripts));
        (gateway.clone(), MatchAnalyzer::new(gateway))
    }

    #[test]
    fn test_prompt_contains_profile_jd_and_score_instruction() {
        let profile = load_profile(None).unwrap();
        let prompt = build_match_prompt(&profile, JD).unwrap();
        assert!(prompt.contains(&serde_json::to_string(&profile).unwrap()));
        assert!(prompt.contains(JD));
        assert!(prompt.contains("SCORE: [Number]"));
        assert!(prompt.contains("简体中文"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let profile = load_profile(None).unwrap();
        assert_eq!(
            build_match_prompt(&profile, JD).unwrap(),
            build_match_prompt(&profile, JD).unwrap()
        );
    }

    #[tokio::test]
    async fn test_split_score_scenario() {
        let profile = load_profile(None).unwrap();
        let (gateway, analyzer) =
            analyzer_with(vec![Script::fragments(&["SCORE: 9", "2\n### 核心优势\nA", "B"])]);

        let mut updates = Vec::new();
        let outcome = run_analysis(&analyzer, &profile, JD, |u| updates.push(u.clone())).await;

        let MatchOutcome::Completed(result) = outcome else {
            panic!("expected completed outcome");
        };
        assert_eq!(result.score, 92);
        assert_eq!(result.analysis, "### 核心优势\nAB");
        assert_eq!(result.tier, MatchTier::VeryHigh);

        assert_eq!(updates.len(), 3);
        assert!(!updates[0].score_found);
        assert_eq!(updates[1].score, 92);

        match &gateway.requests()[0] {
            Recorded::Generate { model, prompt } => {
                assert_eq!(model, MODEL);
                assert!(prompt.contains(JD));
            }
            other => panic!("expected generate request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mid_stream_failure_reports_inline_error() {
        let profile = load_profile(None).unwrap();
        let (_, analyzer) = analyzer_with(vec![Script::Stream(vec![
            Step::Fragment("SCORE: 70\n".to_string()),
            Step::Interrupt("eof".to_string()),
        ])]);

        let outcome = run_analysis(&analyzer, &profile, JD, |_| {}).await;
        assert_eq!(
            outcome,
            MatchOutcome::Failed {
                message: ANALYSIS_FAILED_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failure_to_start_reports_inline_error() {
        let profile = load_profile(None).unwrap();
        let (_, analyzer) = analyzer_with(vec![Script::FailToStart {
            status: 429,
            message: "quota".to_string(),
        }]);

        let outcome = run_analysis(&analyzer, &profile, JD, |_| {}).await;
        assert!(matches!(outcome, MatchOutcome::Failed { .. }));
    }
}
