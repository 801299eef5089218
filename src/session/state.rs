use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CoachPhase {
    Idle,
    Countdown,
    Recording,
    Exercising,
}

impl Default for CoachPhase {
    fn default() -> Self {
        CoachPhase::Idle
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Activity {
    Recording,
    Exercise,
}

impl Activity {
    fn active_phase(self) -> CoachPhase {
        match self {
            Activity::Recording => CoachPhase::Recording,
            Activity::Exercise => CoachPhase::Exercising,
        }
    }
}

/// Observable state of the coach; the runtime pieces live in the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachState {
    pub phase: CoachPhase,
    pub activity: Option<Activity>,
    pub countdown_remaining_secs: u64,
    pub session_id: Option<String>,
    /// When the current phase was entered.
    pub phase_started_at: Option<DateTime<Utc>>,
    pub frames_recorded: u64,
    pub frames_processed: u64,
    pub deviation_count: u64,
    /// Scale applied to the pattern, once estimated.
    pub scale: Option<f32>,
}

impl CoachState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.phase == CoachPhase::Idle
    }

    pub fn begin_countdown(&mut self, activity: Activity, secs: u64, now: DateTime<Utc>) {
        *self = Self {
            phase: CoachPhase::Countdown,
            activity: Some(activity),
            countdown_remaining_secs: secs,
            phase_started_at: Some(now),
            ..Self::default()
        };
    }

    /// One countdown second elapsed; returns what is left.
    pub fn tick_countdown(&mut self) -> u64 {
        self.countdown_remaining_secs = self.countdown_remaining_secs.saturating_sub(1);
        self.countdown_remaining_secs
    }

    /// Leaves the countdown for the activity's working phase.
    pub fn activate(&mut self, session_id: Option<String>, now: DateTime<Utc>) {
        if let Some(activity) = self.activity {
            self.phase = activity.active_phase();
            self.countdown_remaining_secs = 0;
            self.session_id = session_id;
            self.phase_started_at = Some(now);
        }
    }

    pub fn is_in(&self, activity: Activity) -> bool {
        self.activity == Some(activity) && !self.is_idle()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
