//! Advancement primitives: fold a step or time delta into session progress.
//!
//! Both functions mutate only the progress record they are given. They do
//! no I/O and make no production or consumption decisions; the controller
//! and the replayer act on the returned [`AdvanceOutcome`].
//!
//! Step progress may complete any number of ticks in one call. Time
//! progress completes at most one cycle per call and never resets its own
//! accumulator -- whether a finished cycle restarts depends on the
//! inventory, which only the caller can see.

use rust_decimal::Decimal;
use stridecraft_types::VariantDefinition;

use crate::error::ActivityError;
use crate::session::{StepProgress, TimeProgress};

/// Result of one advancement call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Ticks (step-based) or cycles (time-based, 0 or 1) completed.
    pub completed: u64,
    /// Fraction of the next tick or current cycle earned, in `[0, 1]`.
    pub progress: Decimal,
}

/// Fold `new_steps` into step progress and split off completed ticks.
///
/// Ticks are counted on the running total, so any split of a delta into
/// smaller deltas yields the same final state. A zero `action_cost` is a
/// definition error: the steps are recorded but no tick ever completes.
pub fn advance_steps(
    progress: &mut StepProgress,
    definition: &VariantDefinition,
    new_steps: u64,
) -> Result<AdvanceOutcome, ActivityError> {
    let checkpoint = progress
        .last_processed_total_steps
        .checked_add(new_steps)
        .ok_or_else(|| ActivityError::overflow("step checkpoint"))?;
    let accumulated = progress
        .accumulated_steps
        .checked_add(new_steps)
        .ok_or_else(|| ActivityError::overflow("accumulated steps"))?;

    let cost = definition.action_cost;
    let completed = accumulated.checked_div(cost).unwrap_or(0);
    let spent = completed
        .checked_mul(cost)
        .ok_or_else(|| ActivityError::overflow("steps spent on ticks"))?;
    let residual = accumulated
        .checked_sub(spent)
        .ok_or_else(|| ActivityError::overflow("residual steps"))?;

    progress.last_processed_total_steps = checkpoint;
    progress.accumulated_steps = residual;

    Ok(AdvanceOutcome {
        completed,
        progress: progress.fraction(cost),
    })
}

/// Fold `elapsed_ms` into the current cycle.
///
/// Reports one completion once the accumulator reaches the cycle length.
/// The accumulator is left as is; callers decide whether to restart.
pub fn advance_time(
    progress: &mut TimeProgress,
    elapsed_ms: u64,
) -> Result<AdvanceOutcome, ActivityError> {
    progress.accumulated_time_ms = progress
        .accumulated_time_ms
        .checked_add(elapsed_ms)
        .ok_or_else(|| ActivityError::overflow("accumulated time"))?;

    let completed = u64::from(progress.is_complete());
    Ok(AdvanceOutcome {
        completed,
        progress: progress.fraction(),
    })
}
