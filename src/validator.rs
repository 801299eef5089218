//! Per-frame comparison of live bone vectors against the pattern.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::joint::{bone_of, BoneVector, JointId, Position3};

/// Per-axis allowance, in meters.
pub const DEFAULT_TOLERANCE: f32 = 0.05;

/// One flagged mismatch between the live and the pattern bone of a joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationRecord {
    pub joint: JointId,
    pub user_vector: BoneVector,
    pub pattern_vector: BoneVector,
    /// Index of the live frame within the session, starting at 0.
    pub frame_index: u64,
    pub captured_at: DateTime<Utc>,
}

impl fmt::Display for DeviationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let u = self.user_vector;
        let p = self.pattern_vector;
        write!(
            f,
            "JointType: {}, UserVector: ({}, {}, {}), PatternVector: ({}, {}, {})",
            self.joint, u.x, u.y, u.z, p.x, p.y, p.z
        )
    }
}

/// Direction the live bone should move toward, anchored at the live distal joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guidance {
    pub joint: JointId,
    pub anchor: Position3,
    /// `pattern - live`.
    pub correction: BoneVector,
}

/// Outcome of comparing one live frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameCheck {
    pub compared: Vec<JointId>,
    pub deviations: Vec<DeviationRecord>,
    pub guidance: Vec<Guidance>,
}

impl FrameCheck {
    pub fn is_clean(&self) -> bool {
        self.deviations.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VectorValidator {
    tolerance: f32,
}

impl Default for VectorValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl VectorValidator {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Compares every bone of `pattern_frame` the live frame can also form.
    /// Joints the live body lacks are skipped silently.
    pub fn check(&self, live: &Frame, pattern_frame: &Frame, frame_index: u64) -> FrameCheck {
        let mut result = FrameCheck::default();

        for (&joint, &pattern_vector) in pattern_frame.bones() {
            let Some(distal) = bone_of(joint) else {
                continue;
            };
            let (Some(origin_pos), Some(distal_pos)) = (live.position(joint), live.position(distal))
            else {
                continue;
            };

            let user_vector = distal_pos - origin_pos;
            result.compared.push(joint);

            if user_vector.exceeds(pattern_vector, self.tolerance) {
                result.deviations.push(DeviationRecord {
                    joint,
                    user_vector,
                    pattern_vector,
                    frame_index,
                    captured_at: live.timestamp(),
                });
            }

            result.guidance.push(Guidance {
                joint,
                anchor: distal_pos,
                correction: pattern_vector - user_vector,
            });
        }

        result
    }
}
