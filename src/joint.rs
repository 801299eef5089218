//! Skeletal joints, camera-space points and the bone table.
//!
//! A bone is the directed segment from an origin joint to the joint distal to it.
//! The table below is the only place that knows which joints are linked; everything
//! else goes through [`distal_joint`].

use std::ops::{Mul, Sub};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Joints reported by the motion-capture source (Kinect v2 body layout).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum JointId {
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    SpineShoulder,
    HandTipLeft,
    ThumbLeft,
    HandTipRight,
    ThumbRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackingState {
    NotTracked,
    Inferred,
    Tracked,
}

impl TrackingState {
    /// Whether a joint in this state takes part in bone vector computation.
    pub fn participates(self) -> bool {
        !matches!(self, TrackingState::NotTracked)
    }
}

/// Point (or displacement) in camera space, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Bone vectors share the point representation; they are displacements.
pub type BoneVector = Position3;

impl Position3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// True when any axis differs from `other` by more than `tolerance`.
    pub fn exceeds(self, other: Self, tolerance: f32) -> bool {
        (self.x - other.x).abs() > tolerance
            || (self.y - other.y).abs() > tolerance
            || (self.z - other.z).abs() > tolerance
    }
}

impl Sub for Position3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Position3 {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

/// Origin → distal pairs defining the tracked bones.
pub const BONE_SEGMENTS: [(JointId, JointId); 12] = [
    (JointId::ShoulderRight, JointId::ElbowRight),
    (JointId::ElbowRight, JointId::WristRight),
    (JointId::WristRight, JointId::HandRight),
    (JointId::ShoulderLeft, JointId::ElbowLeft),
    (JointId::ElbowLeft, JointId::WristLeft),
    (JointId::WristLeft, JointId::HandLeft),
    (JointId::HipRight, JointId::KneeRight),
    (JointId::KneeRight, JointId::AnkleRight),
    (JointId::AnkleRight, JointId::FootRight),
    (JointId::HipLeft, JointId::KneeLeft),
    (JointId::KneeLeft, JointId::AnkleLeft),
    (JointId::AnkleLeft, JointId::FootLeft),
];

/// Joint distal to `joint`, or `joint` itself when no bone starts there.
///
/// Callers treat the identity result as "skip", never as a zero-length bone.
pub fn distal_joint(joint: JointId) -> JointId {
    BONE_SEGMENTS
        .iter()
        .find(|(origin, _)| *origin == joint)
        .map(|(_, distal)| *distal)
        .unwrap_or(joint)
}

/// The distal joint when a bone is defined for `joint`.
pub fn bone_of(joint: JointId) -> Option<JointId> {
    let distal = distal_joint(joint);
    (distal != joint).then_some(distal)
}
