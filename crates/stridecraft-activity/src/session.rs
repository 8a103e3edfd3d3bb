//! The activity session: one player's currently running activity.
//!
//! A session records which variant is running, where it started, and how
//! far it has progressed toward the next completed unit of work. Progress
//! is a tagged union: step-based sessions carry a [`StepProgress`],
//! time-based sessions a [`TimeProgress`], and the mode can never change
//! after creation.
//!
//! All arithmetic here is pure and checked. Nothing in this module talks to
//! an inventory, a clock, or a step counter; callers pass the readings in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stridecraft_types::{ActivityId, LocationId, ProgressMode, SessionId, VariantId};

/// Reasons a persisted or constructed session cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The activity or variant id is empty ("no active session").
    #[error("session has an empty activity or variant id")]
    Sentinel,

    /// The step checkpoint lies before the session's starting step count.
    #[error("step checkpoint {checkpoint} precedes start {start_steps}")]
    CheckpointBeforeStart {
        /// Absolute step count at session start.
        start_steps: u64,
        /// Last processed absolute step count.
        checkpoint: u64,
    },

    /// More steps are banked toward a tick than were walked in the session.
    #[error("{accumulated} accumulated steps exceed {walked} steps walked")]
    AccumulatedExceedsWalked {
        /// Steps banked toward the next tick.
        accumulated: u64,
        /// Steps processed since the session started.
        walked: u64,
    },

    /// A time-based session must have a positive cycle length.
    #[error("time-based session has zero required time")]
    ZeroRequiredTime,
}

/// Step-based progress toward the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    /// Absolute step count when the session started.
    pub start_steps: u64,
    /// Steps counted toward the next tick.
    pub accumulated_steps: u64,
    /// Absolute step count already folded into this session.
    pub last_processed_total_steps: u64,
}

impl StepProgress {
    /// Fresh progress for a session started at `total_steps`.
    pub const fn starting_at(total_steps: u64) -> Self {
        Self {
            start_steps: total_steps,
            accumulated_steps: 0,
            last_processed_total_steps: total_steps,
        }
    }

    /// Steps processed since the session started.
    pub const fn steps_walked(&self) -> u64 {
        self.last_processed_total_steps
            .saturating_sub(self.start_steps)
    }

    /// Fraction of the next tick already earned, for display.
    ///
    /// Zero when `action_cost` is zero.
    pub fn fraction(&self, action_cost: u64) -> Decimal {
        ratio(self.accumulated_steps, action_cost)
    }
}

/// Time-based progress toward the end of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeProgress {
    /// Milliseconds counted toward the current cycle.
    pub accumulated_time_ms: u64,
    /// Length of one cycle in milliseconds.
    pub required_time_ms: u64,
    /// Wall-clock time (UTC epoch ms) already folded into this session.
    pub last_processed_time_ms: u64,
}

impl TimeProgress {
    /// Fresh progress for a cycle of `required_time_ms` starting at `now_ms`.
    pub const fn starting_at(now_ms: u64, required_time_ms: u64) -> Self {
        Self {
            accumulated_time_ms: 0,
            required_time_ms,
            last_processed_time_ms: now_ms,
        }
    }

    /// Milliseconds still needed to finish the current cycle.
    pub const fn time_needed(&self) -> u64 {
        self.required_time_ms
            .saturating_sub(self.accumulated_time_ms)
    }

    /// Whether the current cycle has finished and awaits processing.
    pub const fn is_complete(&self) -> bool {
        self.accumulated_time_ms >= self.required_time_ms
    }

    /// Start the next cycle from zero.
    pub const fn reset_cycle(&mut self) {
        self.accumulated_time_ms = 0;
    }

    /// Fraction of the current cycle elapsed, for display. Capped at one.
    pub fn fraction(&self) -> Decimal {
        ratio(self.accumulated_time_ms, self.required_time_ms)
    }
}

/// Progress record, tagged by mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Progress {
    /// Step-based progress.
    #[serde(rename = "step_based")]
    Steps(StepProgress),
    /// Time-based progress.
    #[serde(rename = "time_based")]
    Time(TimeProgress),
}

impl Progress {
    /// The progression mode this record belongs to.
    pub const fn mode(&self) -> ProgressMode {
        match self {
            Self::Steps(_) => ProgressMode::StepBased,
            Self::Time(_) => ProgressMode::TimeBased,
        }
    }
}

/// A running activity session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySession {
    /// Identifier assigned when the session started.
    pub id: SessionId,
    /// The running activity.
    pub activity_id: ActivityId,
    /// The running variant.
    pub variant_id: VariantId,
    /// Where the session was started.
    pub location_id: LocationId,
    /// Creation time (UTC epoch ms), used only for elapsed-time display.
    pub start_time_ms: u64,
    /// Mode-specific progress.
    pub progress: Progress,
}

impl ActivitySession {
    /// Create a session with a fresh identifier.
    pub fn new(
        activity_id: ActivityId,
        variant_id: VariantId,
        location_id: LocationId,
        start_time_ms: u64,
        progress: Progress,
    ) -> Self {
        Self {
            id: SessionId::new(),
            activity_id,
            variant_id,
            location_id,
            start_time_ms,
            progress,
        }
    }

    /// The session's progression mode.
    pub const fn mode(&self) -> ProgressMode {
        self.progress.mode()
    }

    /// Whether this record is the "no active session" sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.activity_id.is_empty() || self.variant_id.is_empty()
    }

    /// Check the structural invariants of the record.
    ///
    /// A time-based accumulator at or past its requirement is accepted: it
    /// denotes a completion still awaiting processing.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.is_sentinel() {
            return Err(SessionError::Sentinel);
        }
        match self.progress {
            Progress::Steps(steps) => {
                if steps.last_processed_total_steps < steps.start_steps {
                    return Err(SessionError::CheckpointBeforeStart {
                        start_steps: steps.start_steps,
                        checkpoint: steps.last_processed_total_steps,
                    });
                }
                if steps.accumulated_steps > steps.steps_walked() {
                    return Err(SessionError::AccumulatedExceedsWalked {
                        accumulated: steps.accumulated_steps,
                        walked: steps.steps_walked(),
                    });
                }
            }
            Progress::Time(time) => {
                if time.required_time_ms == 0 {
                    return Err(SessionError::ZeroRequiredTime);
                }
            }
        }
        Ok(())
    }

    /// Milliseconds since the session started, saturating at zero.
    pub const fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.start_time_ms)
    }
}

/// `numerator / denominator` clamped to `[0, 1]`; zero for a zero denominator.
fn ratio(numerator: u64, denominator: u64) -> Decimal {
    Decimal::from(numerator)
        .checked_div(Decimal::from(denominator))
        .map_or(Decimal::ZERO, |r| r.min(Decimal::ONE))
}
