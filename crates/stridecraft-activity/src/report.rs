//! Reports returned by the controller.
//!
//! The engine never notifies anyone directly. Every start, stop, and
//! advancement returns one of these values; the host forwards them to its
//! UI or event bus.

use rust_decimal::Decimal;
use serde::Serialize;
use stridecraft_types::{ActivityId, ProgressMode, SessionId, StopReason, VariantId};

use crate::session::ActivitySession;

/// Record of a session ending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopRecord {
    /// The session that ended.
    pub session_id: SessionId,
    /// Its activity.
    pub activity_id: ActivityId,
    /// Its variant.
    pub variant_id: VariantId,
    /// Why it ended.
    pub reason: StopReason,
    /// When it ended (UTC epoch ms).
    pub stopped_at_ms: u64,
    /// How long it ran.
    pub elapsed_ms: u64,
}

impl StopRecord {
    /// Build the record for `session` ending at `now_ms`.
    pub fn new(session: &ActivitySession, reason: StopReason, now_ms: u64) -> Self {
        Self {
            session_id: session.id,
            activity_id: session.activity_id.clone(),
            variant_id: session.variant_id.clone(),
            reason,
            stopped_at_ms: now_ms,
            elapsed_ms: session.elapsed_ms(now_ms),
        }
    }
}

/// Result of a successful start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartReport {
    /// The new session.
    pub session_id: SessionId,
    /// Its progression mode.
    pub mode: ProgressMode,
    /// The session force-stopped to make room, if one was running.
    pub replaced: Option<StopRecord>,
}

/// Aggregated result of one advancement or catch-up call.
///
/// One report covers every tick or cycle completed by the call, however
/// many there were.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Mode of the advanced session.
    pub mode: ProgressMode,
    /// Steps or milliseconds folded into the session.
    pub delta: u64,
    /// Ticks or cycles completed.
    pub completed: u64,
    /// Units of the primary resource accepted by the inventory.
    pub produced: u64,
    /// Completions whose output the inventory refused.
    pub production_failures: u64,
    /// Milliseconds discarded after a crafting loop starved.
    pub discarded_ms: u64,
    /// Progress toward the next tick or through the current cycle.
    pub progress: Decimal,
    /// Set when the call ended the session.
    pub stopped: Option<StopRecord>,
}

impl ReplayReport {
    /// A report for a call that ended the session without advancing it.
    pub const fn stopped_only(mode: ProgressMode, record: StopRecord) -> Self {
        Self {
            mode,
            delta: 0,
            completed: 0,
            produced: 0,
            production_failures: 0,
            discarded_ms: 0,
            progress: Decimal::ZERO,
            stopped: Some(record),
        }
    }
}
