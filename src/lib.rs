//! Exercise form coaching from skeletal joint streams.
//!
//! A reference movement is recorded into a pattern log, then live frames are
//! compared against it bone by bone and the session is scored.

pub mod archive;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod joint;
pub mod pattern;
pub mod playback;
pub mod scale;
pub mod session;
pub mod summary;
pub mod utils;
pub mod validator;

pub use archive::{ArchivedSummary, SummaryArchive};
pub use capture::CaptureController;
pub use config::CoachConfig;
pub use error::{ParseError, PatternStoreError, SessionError};
pub use frame::{BodySnapshot, Frame};
pub use joint::{JointId, Position3, TrackingState};
pub use pattern::{load_pattern, Pattern, PatternWriter};
pub use session::{CoachController, CoachPhase, CoachState};
pub use summary::ExerciseSummary;
pub use utils::init_logging;
pub use validator::{DeviationRecord, VectorValidator};
