//! Enumeration types shared by the engine and its host.

use serde::{Deserialize, Serialize};

/// How an activity converts player effort into completed work.
///
/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Progress accrues from walked steps; one tick per `action_cost` steps.
    StepBased,
    /// Progress accrues from wall-clock time; one cycle per `crafting_time_ms`.
    TimeBased,
}

impl core::fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StepBased => f.write_str("step_based"),
            Self::TimeBased => f.write_str("time_based"),
        }
    }
}

/// Why an activity session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The player stopped the activity.
    Manual,
    /// A new activity was started, forcing the old one to stop.
    Replaced,
    /// A crafting loop could not restart for lack of input materials.
    Starved,
    /// The variant definition became invalid while the session was running.
    InvalidDefinition,
    /// The variant definition no longer resolves in the registry.
    DefinitionMissing,
    /// Advancing would overflow a counter; progress stops at its last valid state.
    ProgressOverflow,
}

impl StopReason {
    /// Whether the stop was forced by the engine rather than requested.
    pub const fn is_forced(self) -> bool {
        !matches!(self, Self::Manual)
    }
}
