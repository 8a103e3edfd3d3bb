//! Collaborator interfaces the controller talks to.
//!
//! The engine owns none of these services. The host constructs them once at
//! startup and lends them to each controller call through an
//! [`ActivityContext`]. Every call is synchronous and expected to be fast;
//! a host that backs them with I/O must sequence that work itself.

use stridecraft_types::{ItemId, LocationId, MaterialRequirement};

use crate::registry::DefinitionRegistry;

/// Persistence key under which the active session is saved.
pub const ACTIVITY_SESSION_KEY: &str = "activity_session";

/// Item storage used for crafting inputs and production.
pub trait Inventory {
    /// Whether every requirement could be consumed right now.
    fn can_fulfill(&self, materials: &[MaterialRequirement]) -> bool;

    /// Consume every requirement, or nothing at all. Returns `false` if the
    /// materials were not available.
    fn consume(&mut self, materials: &[MaterialRequirement]) -> bool;

    /// Add produced items. Returns `false` if storage could not take them;
    /// the engine treats that as a degraded success.
    fn produce(&mut self, item_id: &ItemId, quantity: u32) -> bool;
}

/// Monotonic, persistent pedometer reading.
pub trait StepCounter {
    /// Total steps ever recorded on this device.
    fn current_total_steps(&self) -> u64;
}

/// Wall clock in UTC epoch milliseconds.
pub trait Clock {
    /// Current time.
    fn now_ms(&self) -> u64;
}

/// Save-cadence owner. The engine only flags state as changed.
pub trait Persistence {
    /// Flag the record stored under `key` as needing a save.
    fn mark_dirty(&mut self, key: &str);
}

/// The player's map state, as far as activities care.
pub trait Whereabouts {
    /// Whether the player is between locations.
    fn is_traveling(&self) -> bool;

    /// Where the player currently is.
    fn current_location(&self) -> LocationId;
}

/// Borrowed handles to every collaborator, passed into controller calls.
pub struct ActivityContext<'a> {
    /// Variant definitions.
    pub registry: &'a dyn DefinitionRegistry,
    /// Item storage.
    pub inventory: &'a mut dyn Inventory,
    /// Pedometer.
    pub steps: &'a dyn StepCounter,
    /// Wall clock.
    pub clock: &'a dyn Clock,
    /// Dirty-flag sink.
    pub persistence: &'a mut dyn Persistence,
    /// Map state.
    pub whereabouts: &'a dyn Whereabouts,
}
