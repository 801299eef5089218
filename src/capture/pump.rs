use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::frame::BodySnapshot;
use crate::session::CoachController;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub received: u64,
    pub compared: u64,
    pub failed: u64,
}

/// Hands frames to the coach one at a time, in arrival order. Exits when the
/// channel closes or the token is cancelled.
pub async fn frame_pump(
    coach: CoachController,
    mut frames: mpsc::Receiver<BodySnapshot>,
    cancel_token: CancellationToken,
) -> PumpStats {
    let mut stats = PumpStats::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("capture pump cancelled after {} frames", stats.received);
                break;
            }
            next = frames.recv() => {
                let Some(body) = next else {
                    log_info!("capture source closed after {} frames", stats.received);
                    break;
                };
                stats.received += 1;

                match coach.submit_frame(&body).await {
                    Ok(Some(check)) => {
                        stats.compared += 1;
                        if !check.is_clean() {
                            log_debug!("{} joints off pattern at {}", check.deviations.len(), body.captured_at);
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        stats.failed += 1;
                        log_error!("frame at {} rejected: {err:?}", body.captured_at);
                    }
                }
            }
        }
    }

    stats
}
