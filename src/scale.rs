//! Anatomical scale between the recorded subject and the live one.
//!
//! Uses the upper right arm (ShoulderRight → ElbowRight) as the reference segment.

use crate::frame::Frame;
use crate::joint::JointId;
use crate::pattern::Pattern;

pub const REFERENCE_SEGMENT: (JointId, JointId) = (JointId::ShoulderRight, JointId::ElbowRight);

/// `average(live) / average(pattern)` over the reference segment.
///
/// Returns 1.0 when the pattern average is zero (nothing to normalize against).
/// Returns 0.0 when the pattern has a segment but no live frame does; callers
/// read that as "normalization unavailable".
pub fn estimate_scale(pattern: &Pattern, live: &[Frame]) -> f32 {
    let pattern_avg = average_segment_length(pattern.frames());
    if pattern_avg == 0.0 {
        return 1.0;
    }
    let live_avg = average_segment_length(live);
    (live_avg / pattern_avg) as f32
}

/// Whether a scale can be applied as a multiplier.
pub fn is_usable(scale: f32) -> bool {
    scale.is_finite() && scale > 0.0
}

/// Mean reference segment length over frames holding both joints, 0.0 if none do.
pub fn average_segment_length(frames: &[Frame]) -> f64 {
    let (origin, distal) = REFERENCE_SEGMENT;
    // f64 accumulation keeps the mean of identical f32 lengths exact
    let (sum, count) = frames
        .iter()
        .filter_map(|frame| Some(frame.position(origin)?.distance(frame.position(distal)?)))
        .fold((0.0f64, 0usize), |(sum, count), len| (sum + f64::from(len), count + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
