//! Offline catch-up: reconstruct progress made while nothing was advancing
//! the session.
//!
//! Step sessions replay in one call. Step accumulation is linear, so the
//! whole gap since the checkpoint is a single delta and one integer
//! division settles it.
//!
//! Time sessions loop cycle by cycle, because every finished cycle may
//! consume inputs before the next one can begin:
//!
//! 1. `needed = required - accumulated`
//! 2. If the remaining gap covers `needed`, finish the cycle and ask the
//!    [`CycleHandler`] to produce and restart. A starved handler ends the
//!    loop and the rest of the gap is discarded, not banked.
//! 3. Otherwise add the remaining gap to the accumulator and stop.
//!
//! After a restart `needed` equals the (positive) cycle length, so each
//! iteration shrinks the gap and the loop always terminates.

use rust_decimal::Decimal;
use stridecraft_types::VariantDefinition;
use tracing::warn;

use crate::advance::{self, AdvanceOutcome};
use crate::error::ActivityError;
use crate::session::{SessionError, StepProgress, TimeProgress};

/// What happens after a time-based cycle finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Inputs for the next cycle were secured; keep going.
    Restart,
    /// The next cycle cannot begin.
    Starved,
}

/// Reacts to finished cycles during a time replay.
///
/// Implementations apply production for the finished cycle and try to
/// secure the next cycle's inputs.
pub trait CycleHandler {
    /// Called once per finished cycle, in order.
    fn on_cycle_complete(&mut self) -> CycleOutcome;
}

/// Result of replaying a step session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReplay {
    /// Steps folded into the session.
    pub delta: u64,
    /// Ticks completed and residual progress.
    pub outcome: AdvanceOutcome,
}

/// Result of replaying a time session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReplay {
    /// Milliseconds between the checkpoint and the replay target.
    pub delta_ms: u64,
    /// Cycles finished during the replay.
    pub completed: u64,
    /// Milliseconds thrown away after the loop starved.
    pub discarded_ms: u64,
    /// Whether the loop ended because the handler starved.
    pub starved: bool,
    /// Fraction of the current cycle elapsed after the replay.
    pub progress: Decimal,
}

/// Fold every step since the checkpoint into the session.
///
/// A counter reading below the checkpoint (device reset, clock skew in the
/// host) is treated as no new steps.
pub fn replay_steps(
    progress: &mut StepProgress,
    definition: &VariantDefinition,
    current_total_steps: u64,
) -> Result<StepReplay, ActivityError> {
    let delta = if let Some(delta) =
        current_total_steps.checked_sub(progress.last_processed_total_steps)
    {
        delta
    } else {
        warn!(
            current_total_steps,
            checkpoint = progress.last_processed_total_steps,
            "Step counter behind checkpoint, replaying zero steps"
        );
        0
    };

    let outcome = advance::advance_steps(progress, definition, delta)?;
    Ok(StepReplay { delta, outcome })
}

/// Replay a time session from its checkpoint up to `target_ms`.
///
/// The checkpoint moves to `target_ms` unless the loop starved: a stopped
/// session has no checkpoint left to advance. A target before the
/// checkpoint is treated as no elapsed time.
pub fn replay_time(
    progress: &mut TimeProgress,
    target_ms: u64,
    handler: &mut dyn CycleHandler,
) -> Result<TimeReplay, ActivityError> {
    if progress.required_time_ms == 0 {
        return Err(ActivityError::CorruptSession {
            source: SessionError::ZeroRequiredTime,
        });
    }

    let delta_ms = if let Some(delta) = target_ms.checked_sub(progress.last_processed_time_ms) {
        delta
    } else {
        warn!(
            target_ms,
            checkpoint = progress.last_processed_time_ms,
            "Clock behind checkpoint, replaying zero time"
        );
        0
    };

    let mut remaining = delta_ms;
    let mut completed: u64 = 0;
    let mut starved = false;

    loop {
        let needed = progress.time_needed();
        let Some(after) = remaining.checked_sub(needed) else {
            advance::advance_time(progress, remaining)?;
            remaining = 0;
            break;
        };

        advance::advance_time(progress, needed)?;
        remaining = after;
        completed = completed
            .checked_add(1)
            .ok_or_else(|| ActivityError::overflow("completed cycles"))?;

        match handler.on_cycle_complete() {
            CycleOutcome::Restart => progress.reset_cycle(),
            CycleOutcome::Starved => {
                starved = true;
                break;
            }
        }
    }

    if !starved {
        progress.last_processed_time_ms = progress.last_processed_time_ms.max(target_ms);
    }

    Ok(TimeReplay {
        delta_ms,
        completed,
        discarded_ms: remaining,
        starved,
        progress: progress.fraction(),
    })
}
