//! Scoring of a finished exercise session.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::joint::JointId;
use crate::session::ExerciseSession;
use crate::validator::DeviationRecord;

/// Report handed to whoever persists results. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSummary {
    /// Completion time, RFC 3339.
    pub date: String,
    pub exercise_duration_minutes: f64,
    pub score_percentage: f64,
    pub joint_scores: BTreeMap<String, f64>,
}

/// Number of deviation records per joint.
pub fn error_counts(deviations: &[DeviationRecord]) -> BTreeMap<JointId, u64> {
    deviations.iter().fold(BTreeMap::new(), |mut counts, record| {
        *counts.entry(record.joint).or_insert(0) += 1;
        counts
    })
}

fn score(total_frames: u64, errors: u64) -> f64 {
    let raw = 100.0 * (total_frames as f64 - errors as f64) / total_frames as f64;
    raw.clamp(0.0, 100.0)
}

/// Builds the summary from the session log as it stands at `ended_at`.
///
/// A frame with several flagged joints counts once per joint toward the overall
/// score, which is floored at 0.
pub fn summarize(
    session: &ExerciseSession,
    ended_at: DateTime<Utc>,
) -> Result<ExerciseSummary, SessionError> {
    let total_frames = session.frames_processed();
    if total_frames == 0 {
        return Err(SessionError::EmptySession);
    }

    let counts = error_counts(session.deviations());
    let total_errors: u64 = counts.values().sum();

    let joint_scores = counts
        .iter()
        .map(|(joint, &errors)| (joint.to_string(), score(total_frames, errors)))
        .collect();

    let elapsed_ms = (ended_at - session.started_at()).num_milliseconds().max(0);

    Ok(ExerciseSummary {
        date: ended_at.to_rfc3339(),
        exercise_duration_minutes: elapsed_ms as f64 / 60_000.0,
        score_percentage: score(total_frames, total_errors),
        joint_scores,
    })
}

/// One line per deviation, replacing whatever the file held before.
pub fn write_deviation_report(path: impl AsRef<Path>, deviations: &[DeviationRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut body = deviations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(path, body)
        .with_context(|| format!("failed to write deviation report to {}", path.display()))
}
