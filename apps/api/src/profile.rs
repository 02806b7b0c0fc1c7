//! Candidate profile loading. Read once at startup, shared read-only afterwards.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::models::profile::CandidateProfile;

/// Profile shipped with the binary, used when `PROFILE_PATH` is not set.
const EMBEDDED_PROFILE: &str = include_str!("../data/profile.json");

/// Loads the profile from `path`, or the embedded default when `None`.
/// Fails if the file is unreadable, malformed, or missing required fields.
pub fn load_profile(path: Option<&Path>) -> Result<CandidateProfile> {
    let profile: CandidateProfile = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile at {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Profile at {} is not valid JSON", path.display()))?
        }
        None => serde_json::from_str(EMBEDDED_PROFILE).context("Embedded profile is invalid")?,
    };

    let problems = validate_profile(&profile);
    if !problems.is_empty() {
        bail!("Profile failed validation: {}", problems.join("; "));
    }

    info!(
        "Loaded profile for {} ({} experiences, {} projects)",
        profile.name,
        profile.experiences.len(),
        profile.projects.len()
    );
    Ok(profile)
}

/// Returns one message per structural problem. Empty means valid.
pub fn validate_profile(profile: &CandidateProfile) -> Vec<String> {
    let mut problems = Vec::new();

    if profile.name.trim().is_empty() {
        problems.push("name is empty".to_string());
    }
    if profile.title.trim().is_empty() {
        problems.push("title is empty".to_string());
    }

    for (i, exp) in profile.experiences.iter().enumerate() {
        if exp.company.trim().is_empty() {
            problems.push(format!("experience #{} has no company", i + 1));
        }
        for project in &exp.projects {
            if project.name.trim().is_empty() {
                problems.push(format!("experience '{}' has an unnamed project", exp.company));
            }
        }
    }

    for (i, project) in profile.projects.iter().enumerate() {
        if project.name.trim().is_empty() {
            problems.push(format!("project #{} has no name", i + 1));
        }
    }

    problems
}
