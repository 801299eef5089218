use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::frame::BodySnapshot;
use crate::session::CoachController;

use super::pump::{frame_pump, PumpStats};

/// Owns the task that feeds externally captured bodies to the coach.
pub struct CaptureController {
    handle: Option<JoinHandle<PumpStats>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, coach: CoachController, frames: mpsc::Receiver<BodySnapshot>) -> Result<()> {
        if self.handle.is_some() {
            bail!("capture already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(frame_pump(coach, frames, cancel_token.clone()));

        info!("Capture pump started");
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Waits for the pump to drain its channel (sender dropped) without cancelling it.
    pub async fn join(&mut self) -> Result<PumpStats> {
        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => handle.await.context("capture pump task failed to join"),
            None => Ok(PumpStats::default()),
        }
    }

    /// Cancels the pump; frames still queued are dropped.
    pub async fn stop(&mut self) -> Result<PumpStats> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.join().await
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}
