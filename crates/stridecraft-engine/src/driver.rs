//! Frame loop and resume hook.
//!
//! Each frame reads the pedometer and the clock, hands the deltas to the
//! controller for the running session's mode, and autosaves on a cadence.
//! Catch-up after time away runs on the blocking pool: the controller and
//! the host are moved into the task and handed back when it finishes, so
//! nothing else can advance the session while the replay runs.

use std::time::Duration;

use stridecraft_activity::{ActivityController, Clock, ReplayReport};
use stridecraft_types::ProgressMode;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::EngineError;
use crate::host::Host;

/// Totals over a run of frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frames executed.
    pub frames: u64,
    /// Ticks and cycles completed.
    pub completed: u64,
    /// Items produced.
    pub produced: u64,
    /// Sessions ended by the engine (starvation, bad definitions).
    pub stops: u64,
    /// Autosaves written.
    pub saves: u64,
}

impl FrameSummary {
    fn record(&mut self, report: &ReplayReport) {
        self.completed = self.completed.saturating_add(report.completed);
        self.produced = self.produced.saturating_add(report.produced);
        if report.stopped.as_ref().is_some_and(|stop| stop.reason.is_forced()) {
            self.stops = self.stops.saturating_add(1);
        }
    }
}

/// Run `config.frames` frames.
///
/// A simulated clock is stepped by the frame interval with no waiting; the
/// system clock is paced by a tokio interval and deltas are measured.
pub async fn run_frames(
    controller: &mut ActivityController,
    host: &mut Host,
    config: &DriverConfig,
) -> Result<FrameSummary, EngineError> {
    let interval_ms = config.frame_interval_ms.max(1);
    let mut pacer = (!host.clock.is_simulated())
        .then(|| tokio::time::interval(Duration::from_millis(interval_ms)));
    let mut summary = FrameSummary::default();
    let mut last_now = host.clock.now_ms();

    info!(
        frames = config.frames,
        interval_ms,
        simulated = host.clock.is_simulated(),
        "Frame loop starting"
    );

    for frame in 1..=config.frames {
        match pacer.as_mut() {
            Some(pacer) => {
                pacer.tick().await;
            }
            None => host.clock.advance(interval_ms),
        }
        let now = host.clock.now_ms();
        let elapsed_ms = now.saturating_sub(last_now);
        last_now = now;
        let steps = host.pedometer.walk();

        if let Some(report) = advance_frame(controller, host, steps, elapsed_ms) {
            summary.record(&report);
        }
        summary.frames = frame;

        if frame.checked_rem(config.autosave_every_frames) == Some(0) && host.autosave(controller)? {
            summary.saves = summary.saves.saturating_add(1);
        }
    }

    info!(
        frames = summary.frames,
        completed = summary.completed,
        produced = summary.produced,
        stops = summary.stops,
        saves = summary.saves,
        "Frame loop finished"
    );
    Ok(summary)
}

/// Feed one frame's deltas to the running session, if there is one.
///
/// Errors are logged and the frame is skipped; the session keeps its last
/// valid state.
fn advance_frame(
    controller: &mut ActivityController,
    host: &mut Host,
    steps: u64,
    elapsed_ms: u64,
) -> Option<ReplayReport> {
    let mode = controller.session()?.mode();
    let result = match mode {
        ProgressMode::StepBased => controller.advance_steps(&mut host.ctx(), steps),
        ProgressMode::TimeBased => controller.advance_time(&mut host.ctx(), elapsed_ms),
    };
    match result {
        Ok(report) => {
            if let Some(stop) = &report.stopped {
                info!(
                    session_id = %stop.session_id,
                    reason = ?stop.reason,
                    "Session ended during frame"
                );
            }
            Some(report)
        }
        Err(err) => {
            warn!(%err, "Frame advancement failed");
            None
        }
    }
}

/// Pretend the player was away for `config.offline_gap_ms`.
///
/// Only meaningful for the simulated clock: it jumps forward and the
/// pedometer records a frame's worth of walking per elapsed interval.
/// Returns the steps recorded.
pub fn simulate_offline_gap(host: &mut Host, config: &DriverConfig) -> u64 {
    if !host.clock.is_simulated() {
        debug!("System clock in use, no simulated offline gap");
        return 0;
    }
    host.clock.advance(config.offline_gap_ms);
    let frames = config
        .offline_gap_ms
        .checked_div(config.frame_interval_ms)
        .unwrap_or(0);
    let steps = host.pedometer.walk_frames(frames);
    info!(
        gap_ms = config.offline_gap_ms,
        steps,
        "Player away, device kept counting"
    );
    steps
}

/// Catch the running session up on the blocking pool.
///
/// Takes ownership of the controller and the host and returns both, with
/// the replay report when a session was running.
pub async fn resume_offline(
    controller: ActivityController,
    host: Host,
) -> Result<(ActivityController, Host, Option<ReplayReport>), EngineError> {
    let (controller, host, result) = tokio::task::spawn_blocking(move || {
        let mut controller = controller;
        let mut host = host;
        let result = controller
            .has_active()
            .then(|| controller.resume(&mut host.ctx()));
        (controller, host, result)
    })
    .await?;

    let report = result.transpose()?;
    match &report {
        Some(report) => info!(
            mode = %report.mode,
            delta = report.delta,
            completed = report.completed,
            produced = report.produced,
            production_failures = report.production_failures,
            discarded_ms = report.discarded_ms,
            progress = %report.progress,
            stopped = ?report.stopped.as_ref().map(|s| s.reason),
            "Offline progress applied"
        ),
        None => debug!("No session to resume"),
    }
    Ok((controller, host, report))
}
