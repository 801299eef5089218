use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::joint::{bone_of, BoneVector, JointId, Position3, TrackingState};

pub type JointPositions = BTreeMap<JointId, Position3>;
pub type BoneVectors = BTreeMap<JointId, BoneVector>;

/// Bone vector for every defined bone whose two joints are both present.
pub fn derive_bone_vectors(joints: &JointPositions) -> BoneVectors {
    joints
        .iter()
        .filter_map(|(&origin, &origin_pos)| {
            let distal = bone_of(origin)?;
            let distal_pos = joints.get(&distal)?;
            Some((origin, *distal_pos - origin_pos))
        })
        .collect()
}

/// One sampled instant. Bone vectors are derived at construction and never
/// touched afterwards; rescaling produces a new frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    joints: JointPositions,
    timestamp: DateTime<Utc>,
    bones: BoneVectors,
}

impl Frame {
    pub fn new(joints: JointPositions, timestamp: DateTime<Utc>) -> Self {
        let bones = derive_bone_vectors(&joints);
        Self {
            joints,
            timestamp,
            bones,
        }
    }

    /// Live frame from a body snapshot. `NotTracked` joints and joints with
    /// non-finite coordinates are left out.
    pub fn from_body(body: &BodySnapshot) -> Self {
        let joints = body
            .joints
            .iter()
            .filter(|(_, joint)| joint.state.participates() && joint.position.is_finite())
            .map(|(&id, joint)| (id, joint.position))
            .collect();
        Self::new(joints, body.captured_at)
    }

    pub fn joints(&self) -> &JointPositions {
        &self.joints
    }

    pub fn position(&self, joint: JointId) -> Option<Position3> {
        self.joints.get(&joint).copied()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn bones(&self) -> &BoneVectors {
        &self.bones
    }

    pub fn bone(&self, joint: JointId) -> Option<BoneVector> {
        self.bones.get(&joint).copied()
    }

    /// Copy with every position (and so every bone vector) multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        let joints = self
            .joints
            .iter()
            .map(|(&id, &pos)| (id, pos * factor))
            .collect();
        Self::new(joints, self.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedJoint {
    pub position: Position3,
    pub state: TrackingState,
}

/// What the external capture source hands over for one body on one sensor frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySnapshot {
    pub is_tracked: bool,
    pub captured_at: DateTime<Utc>,
    pub joints: BTreeMap<JointId, TrackedJoint>,
}

impl BodySnapshot {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            is_tracked: true,
            captured_at,
            joints: BTreeMap::new(),
        }
    }

    pub fn with_joint(mut self, joint: JointId, position: Position3, state: TrackingState) -> Self {
        self.joints.insert(joint, TrackedJoint { position, state });
        self
    }

    /// Snapshot with every joint of `frame` marked as tracked.
    pub fn from_frame(frame: &Frame) -> Self {
        frame
            .joints()
            .iter()
            .fold(Self::new(frame.timestamp()), |body, (&id, &pos)| {
                body.with_joint(id, pos, TrackingState::Tracked)
            })
    }
}
