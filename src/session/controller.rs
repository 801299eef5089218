use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    archive::SummaryArchive,
    config::CoachConfig,
    error::SessionError,
    frame::{BodySnapshot, Frame},
    pattern::{load_pattern, Pattern, PatternWriter},
    scale::{estimate_scale, is_usable},
    summary::{summarize, write_deviation_report, ExerciseSummary},
    validator::{FrameCheck, VectorValidator},
};

use super::{Activity, CoachPhase, CoachState, ExerciseSession};

// Set to true to enable per-frame logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CoachSnapshot {
    pub state: CoachState,
    pub pattern_frames: usize,
}

/// Runtime pieces behind the observable [`CoachState`].
#[derive(Default)]
struct Runtime {
    state: CoachState,
    recorder: Option<PatternWriter>,
    /// Pattern as loaded, waiting for scale estimation.
    loaded_pattern: Option<Pattern>,
    /// Pattern the validator compares against.
    active_pattern: Option<Pattern>,
    session: Option<ExerciseSession>,
    calibration: Vec<Frame>,
}

impl Runtime {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn pattern_frames(&self) -> usize {
        self.active_pattern
            .as_ref()
            .or(self.loaded_pattern.as_ref())
            .map_or(0, Pattern::len)
    }
}

struct PhaseTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Drives recording and exercise runs. Frames come in through
/// [`submit_frame`](Self::submit_frame); countdowns and timed stops run on a
/// background task and never hold up frame delivery.
#[derive(Clone)]
pub struct CoachController {
    runtime: Arc<Mutex<Runtime>>,
    config: Arc<CoachConfig>,
    validator: VectorValidator,
    archive: Option<SummaryArchive>,
    phase_task: Arc<Mutex<Option<PhaseTask>>>,
}

impl CoachController {
    pub fn new(config: CoachConfig, archive: Option<SummaryArchive>) -> Self {
        Self {
            validator: VectorValidator::new(config.tolerance),
            runtime: Arc::new(Mutex::new(Runtime::default())),
            config: Arc::new(config),
            archive,
            phase_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    pub async fn get_state(&self) -> CoachState {
        self.runtime.lock().await.state.clone()
    }

    pub async fn get_snapshot(&self) -> CoachSnapshot {
        let rt = self.runtime.lock().await;
        CoachSnapshot {
            state: rt.state.clone(),
            pattern_frames: rt.pattern_frames(),
        }
    }

    /// Opens the pattern log for appending and starts the recording countdown.
    pub async fn start_recording(&self) -> Result<CoachState> {
        self.cancel_phase_task().await;
        {
            let mut rt = self.runtime.lock().await;
            if !rt.state.is_idle() {
                bail!("coach already active");
            }

            let writer = PatternWriter::open(&self.config.pattern_path).with_context(|| {
                format!(
                    "failed to open pattern log {}",
                    self.config.pattern_path.display()
                )
            })?;
            rt.reset();
            rt.recorder = Some(writer);
            rt.state
                .begin_countdown(Activity::Recording, self.config.countdown_secs, Utc::now());
            if self.config.countdown_secs == 0 {
                activate(&mut rt);
            }
        }

        if self.config.countdown_secs > 0 || self.config.recording_secs > 0 {
            self.spawn_phase_task(Activity::Recording).await;
        }

        Ok(self.get_state().await)
    }

    /// Stops recording; returns how many frames went to the log.
    pub async fn stop_recording(&self) -> Result<u64> {
        self.cancel_phase_task().await;
        let mut rt = self.runtime.lock().await;
        if !rt.state.is_in(Activity::Recording) {
            return Ok(0);
        }
        Ok(finish_recording(&mut rt))
    }

    /// Loads the pattern log named in the config and starts an exercise countdown.
    pub async fn start_exercise(&self) -> Result<CoachState> {
        let path = &self.config.pattern_path;
        let pattern = load_pattern(path)
            .with_context(|| format!("failed to load pattern {}", path.display()))?;
        self.start_exercise_with(pattern).await
    }

    pub async fn start_exercise_with(&self, pattern: Pattern) -> Result<CoachState> {
        self.cancel_phase_task().await;
        {
            let mut rt = self.runtime.lock().await;
            if !rt.state.is_idle() {
                bail!("coach already active");
            }

            if pattern.is_empty() {
                warn!("Exercise pattern has no frames; live frames will be counted but not compared");
            }

            rt.reset();
            rt.loaded_pattern = Some(pattern);
            rt.state
                .begin_countdown(Activity::Exercise, self.config.countdown_secs, Utc::now());
            if self.config.countdown_secs == 0 {
                activate(&mut rt);
            }
        }

        if self.config.countdown_secs > 0 {
            self.spawn_phase_task(Activity::Exercise).await;
        }

        Ok(self.get_state().await)
    }

    /// Hands one body snapshot to whatever the current phase does with frames.
    pub async fn submit_frame(&self, body: &BodySnapshot) -> Result<Option<FrameCheck>> {
        if !body.is_tracked {
            return Ok(None);
        }

        let frame = Frame::from_body(body);
        let mut guard = self.runtime.lock().await;
        let rt = &mut *guard;

        match rt.state.phase {
            CoachPhase::Idle => Ok(None),
            CoachPhase::Countdown => {
                if rt.state.activity == Some(Activity::Exercise)
                    && rt.calibration.len() < self.config.calibration_frames
                {
                    rt.calibration.push(frame);
                }
                Ok(None)
            }
            CoachPhase::Recording => {
                let writer = rt
                    .recorder
                    .as_mut()
                    .ok_or_else(|| anyhow!("recording without an open pattern log"))?;
                writer
                    .append_frame(&frame)
                    .context("failed to append frame to pattern log")?;
                rt.state.frames_recorded += 1;
                Ok(None)
            }
            CoachPhase::Exercising => {
                if rt.active_pattern.is_none() {
                    self.prepare_pattern(rt, &frame);
                }

                let (Some(session), Some(pattern)) = (rt.session.as_mut(), rt.active_pattern.as_ref())
                else {
                    bail!("exercise running without a session");
                };

                let check = session.process_frame(
                    &frame,
                    pattern,
                    &self.validator,
                    self.config.playback,
                    Utc::now(),
                );
                rt.state.frames_processed = session.frames_processed();
                rt.state.deviation_count = session.deviations().len() as u64;

                if let Some(check) = &check {
                    for deviation in &check.deviations {
                        log_debug!("Frame {}: {}", deviation.frame_index, deviation);
                    }
                }
                Ok(check)
            }
        }
    }

    /// Ends the exercise and scores the session as it stands right now.
    pub async fn end_exercise(&self) -> Result<ExerciseSummary> {
        self.cancel_phase_task().await;
        let ended_at = Utc::now();

        let session = {
            let mut rt = self.runtime.lock().await;
            if !rt.state.is_in(Activity::Exercise) {
                bail!("no exercise in progress");
            }
            let session = rt.session.take();
            rt.reset();
            session
        };

        let Some(session) = session else {
            info!("Exercise stopped before the countdown finished");
            return Err(SessionError::EmptySession.into());
        };

        let summary = summarize(&session, ended_at)?;

        if let Err(err) =
            write_deviation_report(&self.config.deviation_report_path, session.deviations())
        {
            error!("Failed to write deviation report: {err:?}");
        }

        info!(
            "Exercise {} finished: {:.1}% over {} frames, {} deviations",
            session.id(),
            summary.score_percentage,
            session.frames_processed(),
            session.deviations().len()
        );

        if let Some(archive) = &self.archive {
            if let Err(err) = archive.insert_summary(session.id(), &summary).await {
                error!("Failed to archive summary for session {}: {err:?}", session.id());
            }
        }

        Ok(summary)
    }

    /// Drops whatever is running without producing a summary.
    pub async fn cancel(&self) {
        self.cancel_phase_task().await;
        let mut rt = self.runtime.lock().await;
        if !rt.state.is_idle() {
            info!("Cancelled {:?} in phase {:?}", rt.state.activity, rt.state.phase);
        }
        rt.reset();
    }

    /// Runs once, on the first exercising frame: estimates the scale from the
    /// countdown frames plus this one and fixes the pattern to compare against.
    fn prepare_pattern(&self, rt: &mut Runtime, frame: &Frame) {
        let base = rt.loaded_pattern.take().unwrap_or_default();
        let mut calibration = std::mem::take(&mut rt.calibration);

        if !self.config.normalize_scale || base.is_empty() {
            rt.active_pattern = Some(base);
            return;
        }

        calibration.push(frame.clone());
        let scale = estimate_scale(&base, &calibration);
        if is_usable(scale) {
            info!(
                "Scaling pattern by {scale:.3} from {} calibration frames",
                calibration.len()
            );
            rt.state.scale = Some(scale);
            rt.active_pattern = Some(base.scaled(scale));
        } else {
            warn!("Scale normalization unavailable (estimated {scale}); using the pattern as recorded");
            rt.active_pattern = Some(base);
        }
    }

    async fn spawn_phase_task(&self, activity: Activity) {
        let mut slot = self.phase_task.lock().await;
        if let Some(stale) = slot.take() {
            stale.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_phase(
            self.runtime.clone(),
            self.config.clone(),
            activity,
            cancel.clone(),
        ));
        *slot = Some(PhaseTask { handle, cancel });
    }

    async fn cancel_phase_task(&self) {
        let task = self.phase_task.lock().await.take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(err) = task.handle.await {
                error!("Phase task failed to join: {err}");
            }
        }
    }
}

/// Countdown, then activation, then (recording only) the timed stop.
async fn run_phase(
    runtime: Arc<Mutex<Runtime>>,
    config: Arc<CoachConfig>,
    activity: Activity,
    cancel: CancellationToken,
) {
    let label = match activity {
        Activity::Recording => "Recording",
        Activity::Exercise => "Exercise",
    };

    loop {
        let remaining = {
            let rt = runtime.lock().await;
            if rt.state.phase != CoachPhase::Countdown {
                break;
            }
            rt.state.countdown_remaining_secs
        };
        if remaining == 0 {
            break;
        }

        log_info!("{label} will start in {remaining} seconds");
        tokio::select! {
            _ = time::sleep(Duration::from_secs(1)) => {}
            _ = cancel.cancelled() => return,
        }
        runtime.lock().await.state.tick_countdown();
    }

    {
        let mut rt = runtime.lock().await;
        if !rt.state.is_in(activity) {
            return;
        }
        if rt.state.phase == CoachPhase::Countdown {
            activate(&mut rt);
        }
    }

    if activity == Activity::Recording && config.recording_secs > 0 {
        tokio::select! {
            _ = time::sleep(Duration::from_secs(config.recording_secs)) => {
                let mut rt = runtime.lock().await;
                if rt.state.is_in(Activity::Recording) {
                    finish_recording(&mut rt);
                }
            }
            _ = cancel.cancelled() => {}
        }
    }
}

fn activate(rt: &mut Runtime) {
    let now = Utc::now();
    match rt.state.activity {
        Some(Activity::Exercise) => {
            let session = ExerciseSession::new(now);
            let session_id = session.id().to_string();
            rt.session = Some(session);
            rt.state.activate(Some(session_id.clone()), now);
            info!("Exercise started, session {session_id}");
        }
        Some(Activity::Recording) => {
            rt.state.activate(None, now);
            info!("Recording started");
        }
        None => {}
    }
}

fn finish_recording(rt: &mut Runtime) -> u64 {
    let frames = rt.state.frames_recorded;
    if let Some(writer) = rt.recorder.take() {
        info!(
            "Recording stopped: {frames} frames appended to {}",
            writer.path().display()
        );
    }
    rt.reset();
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::JointPositions;
    use crate::joint::{JointId, Position3, TrackingState};
    use std::path::Path;

    fn config(dir: &Path, countdown_secs: u64, recording_secs: u64) -> CoachConfig {
        CoachConfig {
            pattern_path: dir.join("pattern.log"),
            deviation_report_path: dir.join("deviations.txt"),
            countdown_secs,
            recording_secs,
            ..CoachConfig::default()
        }
    }

    fn body(elbow_x: f32) -> BodySnapshot {
        BodySnapshot::new(Utc::now())
            .with_joint(JointId::ShoulderRight, Position3::new(0.0, 0.0, 0.0), TrackingState::Tracked)
            .with_joint(JointId::ElbowRight, Position3::new(elbow_x, 0.0, 0.0), TrackingState::Tracked)
    }

    fn pattern(elbow_x: f32, len: usize) -> Pattern {
        let frame = Frame::new(
            JointPositions::from([
                (JointId::ShoulderRight, Position3::new(0.0, 0.0, 0.0)),
                (JointId::ElbowRight, Position3::new(elbow_x, 0.0, 0.0)),
            ]),
            Utc::now(),
        );
        Pattern::new(vec![frame; len])
    }

    #[tokio::test]
    async fn records_frames_to_the_pattern_log() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);

        let state = coach.start_recording().await.unwrap();
        assert_eq!(state.phase, CoachPhase::Recording);
        for _ in 0..3 {
            assert!(coach.submit_frame(&body(0.3)).await.unwrap().is_none());
        }
        assert_eq!(coach.stop_recording().await.unwrap(), 3);
        assert!(coach.get_state().await.is_idle());

        let recorded = load_pattern(dir.path().join("pattern.log")).unwrap();
        assert_eq!(recorded.len(), 3);
        assert_eq!(
            recorded.frames()[0].bone(JointId::ShoulderRight),
            Some(Position3::new(0.3, 0.0, 0.0))
        );
    }

    #[tokio::test]
    async fn non_finite_samples_keep_the_log_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        coach.start_recording().await.unwrap();

        let glitch = body(0.3).with_joint(
            JointId::Head,
            Position3::new(f32::NAN, 0.0, f32::INFINITY),
            TrackingState::Inferred,
        );
        for sample in [body(0.3), glitch, body(0.3)] {
            coach.submit_frame(&sample).await.unwrap();
        }
        assert_eq!(coach.stop_recording().await.unwrap(), 3);

        let recorded = load_pattern(dir.path().join("pattern.log")).unwrap();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded.frames()[1].position(JointId::Head), None);
    }

    #[tokio::test]
    async fn untracked_bodies_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        coach.start_recording().await.unwrap();

        let mut ghost = body(0.3);
        ghost.is_tracked = false;
        coach.submit_frame(&ghost).await.unwrap();
        assert_eq!(coach.stop_recording().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn exercise_scores_matching_and_deviating_frames() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        coach.start_exercise_with(pattern(0.3, 2)).await.unwrap();

        for elbow_x in [0.3, 0.3, 0.3, 0.4] {
            coach.submit_frame(&body(elbow_x)).await.unwrap();
        }
        let snapshot = coach.get_snapshot().await;
        assert_eq!(snapshot.state.frames_processed, 4);
        assert_eq!(snapshot.state.deviation_count, 1);
        assert_eq!(snapshot.pattern_frames, 2);

        let summary = coach.end_exercise().await.unwrap();
        assert_eq!(summary.score_percentage, 75.0);
        assert_eq!(summary.joint_scores["ShoulderRight"], 75.0);
        assert!(coach.get_state().await.is_idle());

        let report = std::fs::read_to_string(dir.path().join("deviations.txt")).unwrap();
        assert_eq!(report.lines().count(), 1);
    }

    #[tokio::test]
    async fn pattern_is_scaled_to_the_live_arm() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        // recorded arm twice as long as the live one
        coach.start_exercise_with(pattern(0.6, 1)).await.unwrap();

        let check = coach.submit_frame(&body(0.3)).await.unwrap().unwrap();
        assert!(check.is_clean());
        assert_eq!(coach.get_state().await.scale, Some(0.5));
    }

    #[tokio::test]
    async fn scaling_can_be_turned_off() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CoachConfig {
            normalize_scale: false,
            ..config(dir.path(), 0, 0)
        };
        let coach = CoachController::new(cfg, None);
        coach.start_exercise_with(pattern(0.6, 1)).await.unwrap();

        let check = coach.submit_frame(&body(0.3)).await.unwrap().unwrap();
        assert_eq!(check.deviations.len(), 1);
        assert_eq!(coach.get_state().await.scale, None);
    }

    #[tokio::test]
    async fn missing_live_segment_leaves_pattern_unscaled() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        coach.start_exercise_with(pattern(0.6, 1)).await.unwrap();

        let shoulder_only = BodySnapshot::new(Utc::now()).with_joint(
            JointId::ShoulderRight,
            Position3::ZERO,
            TrackingState::Tracked,
        );
        coach.submit_frame(&shoulder_only).await.unwrap();
        assert_eq!(coach.get_state().await.scale, None);

        // the unscaled 0.6 pattern still applies afterwards
        let check = coach.submit_frame(&body(0.6)).await.unwrap().unwrap();
        assert!(check.is_clean());
    }

    #[tokio::test]
    async fn ending_an_empty_exercise_fails_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        coach.start_exercise_with(pattern(0.3, 1)).await.unwrap();

        let err = coach.end_exercise().await.unwrap_err();
        assert_eq!(err.downcast_ref::<SessionError>(), Some(&SessionError::EmptySession));
        assert!(coach.get_state().await.is_idle());
        assert!(coach.end_exercise().await.is_err());
    }

    #[tokio::test]
    async fn empty_exercise_leaves_previous_report_alone() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("deviations.txt");
        let previous = "JointType: ShoulderRight, UserVector: (0.4, 0, 0), PatternVector: (0.3, 0, 0)\n";
        std::fs::write(&report, previous).unwrap();

        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        coach.start_exercise_with(Pattern::default()).await.unwrap();
        assert!(coach.end_exercise().await.is_err());

        assert_eq!(std::fs::read_to_string(&report).unwrap(), previous);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), None);
        coach.start_exercise_with(pattern(0.3, 1)).await.unwrap();
        assert!(coach.start_recording().await.is_err());
        assert!(coach.start_exercise_with(pattern(0.3, 1)).await.is_err());
    }

    #[tokio::test]
    async fn missing_pattern_file_fails_before_countdown() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 5, 0), None);
        assert!(coach.start_exercise().await.is_err());
        assert!(coach.get_state().await.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_frames_are_not_validated() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 3, 0), None);
        let state = coach.start_exercise_with(pattern(0.3, 1)).await.unwrap();
        assert_eq!(state.phase, CoachPhase::Countdown);

        // kept for calibration only
        assert!(coach.submit_frame(&body(0.3)).await.unwrap().is_none());
        assert_eq!(coach.get_state().await.frames_processed, 0);

        time::sleep(Duration::from_millis(3500)).await;
        let state = coach.get_state().await;
        assert_eq!(state.phase, CoachPhase::Exercising);
        assert!(state.session_id.is_some());

        assert!(coach.submit_frame(&body(0.3)).await.unwrap().is_some());
        let summary = coach.end_exercise().await.unwrap();
        assert_eq!(summary.score_percentage, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn recording_stops_by_itself() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 1, 2), None);
        coach.start_recording().await.unwrap();

        coach.submit_frame(&body(0.3)).await.unwrap();
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(coach.get_state().await.phase, CoachPhase::Recording);
        coach.submit_frame(&body(0.3)).await.unwrap();

        time::sleep(Duration::from_secs(3)).await;
        assert!(coach.get_state().await.is_idle());
        coach.submit_frame(&body(0.3)).await.unwrap();

        let recorded = load_pattern(dir.path().join("pattern.log")).unwrap();
        assert_eq!(recorded.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_countdown() {
        let dir = tempfile::tempdir().unwrap();
        let coach = CoachController::new(config(dir.path(), 5, 0), None);
        coach.start_exercise_with(pattern(0.3, 1)).await.unwrap();
        coach.cancel().await;
        time::sleep(Duration::from_secs(10)).await;
        assert!(coach.get_state().await.is_idle());
    }

    #[tokio::test]
    async fn summaries_are_archived() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SummaryArchive::open(dir.path().join("archive.sqlite3")).unwrap();
        let coach = CoachController::new(config(dir.path(), 0, 0), Some(archive.clone()));

        let session_id = coach
            .start_exercise_with(pattern(0.3, 1))
            .await
            .unwrap()
            .session_id
            .unwrap();
        coach.submit_frame(&body(0.3)).await.unwrap();
        let summary = coach.end_exercise().await.unwrap();

        let archived = archive.list_summaries().await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].session_id, session_id);
        assert_eq!(archived[0].summary, summary);
    }
}
