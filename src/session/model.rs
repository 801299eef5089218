use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::frame::Frame;
use crate::pattern::Pattern;
use crate::playback::{PlaybackCursor, PlaybackMode};
use crate::validator::{DeviationRecord, FrameCheck, VectorValidator};

/// Everything one exercise run accumulates. Owned by whoever drives the run;
/// the summary aggregator only reads it.
#[derive(Debug, Clone)]
pub struct ExerciseSession {
    id: String,
    started_at: DateTime<Utc>,
    frames_processed: u64,
    deviations: Vec<DeviationRecord>,
    cursor: PlaybackCursor,
}

impl ExerciseSession {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self::restore(Uuid::new_v4().to_string(), started_at, 0, Vec::new())
    }

    /// Rebuilds a session from stored parts, cursor at the start.
    pub(crate) fn restore(
        id: String,
        started_at: DateTime<Utc>,
        frames_processed: u64,
        deviations: Vec<DeviationRecord>,
    ) -> Self {
        Self {
            id,
            started_at,
            frames_processed,
            deviations,
            cursor: PlaybackCursor::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn deviations(&self) -> &[DeviationRecord] {
        &self.deviations
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    /// Counts the live frame, compares it with the selected pattern frame and
    /// appends any deviations. `None` when the pattern has nothing to offer.
    pub fn process_frame(
        &mut self,
        live: &Frame,
        pattern: &Pattern,
        validator: &VectorValidator,
        mode: PlaybackMode,
        now: DateTime<Utc>,
    ) -> Option<FrameCheck> {
        let frame_index = self.frames_processed;
        self.frames_processed += 1;

        let elapsed = now - self.started_at;
        let pattern_frame = self.cursor.select(mode, pattern, elapsed)?;
        let check = validator.check(live, pattern_frame, frame_index);
        self.deviations.extend(check.deviations.iter().cloned());
        Some(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::JointPositions;
    use crate::joint::{JointId, Position3};

    fn arm(elbow_x: f32) -> Frame {
        Frame::new(
            JointPositions::from([
                (JointId::ShoulderRight, Position3::new(0.0, 0.0, 0.0)),
                (JointId::ElbowRight, Position3::new(elbow_x, 0.0, 0.0)),
            ]),
            Utc::now(),
        )
    }

    #[test]
    fn accumulates_deviations_and_counts_frames() {
        let pattern = Pattern::new(vec![arm(0.3), arm(0.5)]);
        let validator = VectorValidator::default();
        let mut session = ExerciseSession::new(Utc::now());

        for _ in 0..4 {
            session.process_frame(&arm(0.3), &pattern, &validator, PlaybackMode::Sequential, Utc::now());
        }

        assert_eq!(session.frames_processed(), 4);
        // frames 1 and 3 are compared against the 0.5 pattern frame
        let flagged: Vec<u64> = session.deviations().iter().map(|d| d.frame_index).collect();
        assert_eq!(flagged, vec![1, 3]);
        assert_eq!(session.cursor().index(), 0);
    }

    #[test]
    fn empty_pattern_still_counts_the_frame() {
        let mut session = ExerciseSession::new(Utc::now());
        let check = session.process_frame(
            &arm(0.3),
            &Pattern::default(),
            &VectorValidator::default(),
            PlaybackMode::Sequential,
            Utc::now(),
        );
        assert!(check.is_none());
        assert_eq!(session.frames_processed(), 1);
        assert!(session.deviations().is_empty());
    }
}
