//! Recorded reference movements and their line-oriented log format.
//!
//! ```text
//! ShoulderRight;0.12;0.41;1.9;2024-05-02T10:15:30.125+00:00
//! ElbowRight;0.31;0.22;1.88;2024-05-02T10:15:30.125+00:00
//! #
//! ```
//!
//! One record per joint, `#` after each frame. The log is only ever appended to.

pub mod reader;
pub mod writer;

pub use reader::{load_pattern, read_pattern};
pub use writer::PatternWriter;

use chrono::{DateTime, Utc};

use crate::frame::Frame;

pub const FRAME_SENTINEL: &str = "#";

/// Ordered frames of one reference movement, in capture order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    frames: Vec<Frame>,
}

impl Pattern {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Earliest capture timestamp; used as playback time zero.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.frames.iter().map(Frame::timestamp).min()
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.frames.iter().map(Frame::timestamp).max()
    }

    /// New pattern with every frame rescaled; `self` is left as is.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            frames: self.frames.iter().map(|f| f.scaled(factor)).collect(),
        }
    }
}
