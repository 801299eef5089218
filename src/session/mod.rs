pub mod controller;
pub mod model;
pub mod state;

pub use controller::{CoachController, CoachSnapshot};
pub use model::ExerciseSession;
pub use state::{Activity, CoachPhase, CoachState};
