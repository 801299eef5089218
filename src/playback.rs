use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::pattern::Pattern;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackMode {
    /// Lock-step round robin, one pattern frame per live frame.
    #[default]
    Sequential,
    /// Pattern frame nearest to the time elapsed since the session started.
    Elapsed,
}

/// Chooses which pattern frame each live frame is compared against.
#[derive(Debug, Clone, Default)]
pub struct PlaybackCursor {
    index: usize,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `pattern[index]`, then advances cyclically. Empty pattern: `None`, no advance.
    pub fn next_frame<'p>(&mut self, pattern: &'p Pattern) -> Option<&'p Frame> {
        if pattern.is_empty() {
            return None;
        }
        // the pattern may have been swapped for a shorter one
        let index = self.index % pattern.len();
        self.index = (index + 1) % pattern.len();
        pattern.get(index)
    }

    /// Frame whose offset from the first pattern timestamp is closest to `elapsed`.
    /// Ties go to the earlier frame. Does not move the cursor.
    pub fn frame_at_elapsed<'p>(&self, pattern: &'p Pattern, elapsed: Duration) -> Option<&'p Frame> {
        let start = pattern.start_time()?;
        pattern
            .frames()
            .iter()
            .min_by_key(|frame| ((frame.timestamp() - start) - elapsed).abs())
    }

    pub fn select<'p>(
        &mut self,
        mode: PlaybackMode,
        pattern: &'p Pattern,
        elapsed: Duration,
    ) -> Option<&'p Frame> {
        match mode {
            PlaybackMode::Sequential => self.next_frame(pattern),
            PlaybackMode::Elapsed => self.frame_at_elapsed(pattern, elapsed),
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::JointPositions;
    use crate::joint::{JointId, Position3};
    use chrono::{TimeZone, Utc};

    fn pattern(len: usize) -> Pattern {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        Pattern::new(
            (0..len)
                .map(|i| {
                    Frame::new(
                        JointPositions::from([(JointId::Head, Position3::new(i as f32, 0.0, 0.0))]),
                        t0 + Duration::milliseconds(100 * i as i64),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn wraps_after_last_frame() {
        let pattern = pattern(3);
        let mut cursor = PlaybackCursor::new();
        let picked: Vec<&Frame> = (0..4).map(|_| cursor.next_frame(&pattern).unwrap()).collect();
        assert_eq!(picked[0], &pattern.frames()[0]);
        assert_eq!(picked[1], &pattern.frames()[1]);
        assert_eq!(picked[2], &pattern.frames()[2]);
        assert_eq!(picked[3], &pattern.frames()[0]);
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn empty_pattern_yields_nothing_and_stays_put() {
        let mut cursor = PlaybackCursor::new();
        assert!(cursor.next_frame(&Pattern::default()).is_none());
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn elapsed_mode_picks_nearest_offset() {
        let pattern = pattern(5);
        let mut cursor = PlaybackCursor::new();
        let frame = cursor
            .select(PlaybackMode::Elapsed, &pattern, Duration::milliseconds(240))
            .unwrap();
        assert_eq!(frame, &pattern.frames()[2]);
        let last = cursor
            .select(PlaybackMode::Elapsed, &pattern, Duration::seconds(30))
            .unwrap();
        assert_eq!(last, &pattern.frames()[4]);
        assert_eq!(cursor.index(), 0);
    }
}
