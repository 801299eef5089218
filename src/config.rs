use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::playback::PlaybackMode;
use crate::validator::DEFAULT_TOLERANCE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CoachConfig {
    pub pattern_path: PathBuf,
    pub deviation_report_path: PathBuf,
    /// SQLite file for completed summaries; no archiving when unset.
    pub archive_path: Option<PathBuf>,
    pub tolerance: f32,
    pub countdown_secs: u64,
    /// Recording stops by itself after this long. 0 records until stopped.
    pub recording_secs: u64,
    pub normalize_scale: bool,
    pub playback: PlaybackMode,
    /// Countdown frames kept for scale estimation.
    pub calibration_frames: usize,
    /// Pacing used when replaying a recorded log as a live source.
    pub frame_interval_ms: u64,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            pattern_path: PathBuf::from("recordedJoints.csv"),
            deviation_report_path: PathBuf::from("ValidationResults.txt"),
            archive_path: None,
            tolerance: DEFAULT_TOLERANCE,
            countdown_secs: 5,
            recording_secs: 15,
            normalize_scale: true,
            playback: PlaybackMode::Sequential,
            calibration_frames: 90,
            frame_interval_ms: 33,
        }
    }
}

impl CoachConfig {
    /// Reads `path`, falling back to defaults when it is missing or unreadable JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        match serde_json::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!("Ignoring malformed config {}: {err}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
