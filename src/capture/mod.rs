pub mod controller;
pub mod pump;

pub use controller::CaptureController;
