//! Score extraction from a streamed analysis.
//!
//! The model is asked to open with `SCORE: <n>`. As fragments arrive the whole
//! buffer is re-scanned until the first match is latched; later matches are
//! ignored. Scanning only the newest delta would miss a score split across a
//! fragment boundary, so the full re-scan is kept.
//!
//! A digit run that touches the end of the buffer is not latched while the
//! stream is open: `"SCORE: 9"` may still become `"SCORE: 92"`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Score shown when the buffer never contains a score line.
pub const DEFAULT_SCORE: u64 = 0;

fn score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"SCORE:\s*([0-9]+)").expect("score pattern compiles"))
}

fn score_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"SCORE:\s*[0-9]+\n?").expect("score line pattern compiles"))
}

/// Finds the first score in `buffer`. With `stream_finished = false` a match
/// whose digits reach the end of the buffer is treated as incomplete.
/// Values are taken verbatim; digit runs beyond `u64` saturate.
pub fn find_score(buffer: &str, stream_finished: bool) -> Option<u64> {
    let digits = score_pattern().captures(buffer)?.get(1)?;
    if !stream_finished && digits.end() == buffer.len() {
        return None;
    }
    Some(digits.as_str().parse().unwrap_or(u64::MAX))
}

/// The buffer with the first score line (and one trailing newline) removed.
pub fn display_text(buffer: &str) -> String {
    score_line_pattern().replacen(buffer, 1, "").into_owned()
}

/// One `###` subsection of the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: Option<String>,
    pub body: String,
}

/// Splits display text on the literal `###`. Text before the first delimiter
/// becomes a heading-less section (dropped when blank); every later piece uses
/// its first line as heading. Text without `###` is one heading-less section.
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut pieces = text.split("###");
    let preamble = pieces.next().unwrap_or_default();

    if !text.contains("###") {
        return vec![Section {
            heading: None,
            body: text.to_string(),
        }];
    }

    let mut sections = Vec::new();
    if !preamble.trim().is_empty() {
        sections.push(Section {
            heading: None,
            body: preamble.to_string(),
        });
    }

    for piece in pieces {
        if piece.trim().is_empty() {
            continue;
        }
        let (heading, body) = piece.split_once('\n').unwrap_or((piece, ""));
        sections.push(Section {
            heading: Some(heading.trim().to_string()),
            body: body.to_string(),
        });
    }

    sections
}

/// Presentation band for a score. Thresholds are exclusive: 85 is moderate,
/// 60 is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    VeryHigh,
    Moderate,
    Low,
}

impl MatchTier {
    pub fn from_score(score: u64) -> Self {
        if score > 85 {
            MatchTier::VeryHigh
        } else if score > 60 {
            MatchTier::Moderate
        } else {
            MatchTier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchTier::VeryHigh => "极高匹配度。建议立即安排面试。",
            MatchTier::Moderate => "具备核心能力，部分技能需确认。",
            MatchTier::Low => "匹配度较低，但具备转型潜力。",
        }
    }
}

/// Snapshot reported after every fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchUpdate {
    pub score: u64,
    pub score_found: bool,
    pub tier: MatchTier,
    pub display_text: String,
}

/// Final outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub score: u64,
    pub score_found: bool,
    pub tier: MatchTier,
    pub tier_label: &'static str,
    pub analysis: String,
    pub sections: Vec<Section>,
}

/// Accumulates fragments of one analysis stream and latches the score.
#[derive(Debug, Default)]
pub struct MatchAccumulator {
    buffer: String,
    score: Option<u64>,
}

impl MatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &str) -> MatchUpdate {
        self.buffer.push_str(delta);
        if self.score.is_none() {
            self.score = find_score(&self.buffer, false);
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> MatchUpdate {
        let score = self.score.unwrap_or(DEFAULT_SCORE);
        MatchUpdate {
            score,
            score_found: self.score.is_some(),
            tier: MatchTier::from_score(score),
            display_text: display_text(&self.buffer),
        }
    }

    /// Closes the stream: a score pending at the end of the buffer is latched now.
    pub fn finish(mut self) -> MatchResult {
        if self.score.is_none() {
            self.score = find_score(&self.buffer, true);
        }

        let score = self.score.unwrap_or(DEFAULT_SCORE);
        let tier = MatchTier::from_score(score);
        let analysis = display_text(&self.buffer);
        let sections = split_sections(&analysis);

        MatchResult {
            score,
            score_found: self.score.is_some(),
            tier,
            tier_label: tier.label(),
            analysis,
            sections,
        }
    }
}
