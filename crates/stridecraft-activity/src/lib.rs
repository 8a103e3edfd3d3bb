//! Activity progression and offline catch-up for Stridecraft.
//!
//! A player runs at most one activity session at a time. Step-based
//! sessions (gathering) advance with pedometer steps; time-based sessions
//! (crafting) advance with wall-clock time and consume inputs per cycle.
//! This crate owns the session and the arithmetic; storage, clocks, step
//! counting, and saving belong to the host and are reached through the
//! traits in [`services`].
//!
//! # Modules
//!
//! - [`advance`] -- Per-delta advancement primitives ([`advance_steps`], [`advance_time`])
//! - [`controller`] -- Lifecycle controller ([`ActivityController`])
//! - [`error`] -- Error types ([`ActivityError`], [`DefinitionError`])
//! - [`inventory`] -- Capacity-limited [`ItemStore`] implementing [`Inventory`]
//! - [`registry`] -- Definition lookup and validation ([`InMemoryRegistry`])
//! - [`replay`] -- Offline catch-up loops ([`replay_steps`], [`replay_time`])
//! - [`report`] -- Values returned by controller calls
//! - [`services`] -- Collaborator traits and [`ActivityContext`]
//! - [`session`] -- The persisted [`ActivitySession`] record

pub mod advance;
pub mod controller;
pub mod error;
pub mod inventory;
pub mod registry;
pub mod replay;
pub mod report;
pub mod services;
pub mod session;

// Re-export primary types at crate root for convenience.
pub use advance::{AdvanceOutcome, advance_steps, advance_time};
pub use controller::ActivityController;
pub use error::{ActivityError, DefinitionError};
pub use inventory::{ItemStore, StoreError};
pub use registry::{DefinitionRegistry, InMemoryRegistry, is_valid_variant, validate_variant};
pub use replay::{CycleHandler, CycleOutcome, StepReplay, TimeReplay, replay_steps, replay_time};
pub use report::{ReplayReport, StartReport, StopRecord};
pub use services::{
    ACTIVITY_SESSION_KEY, ActivityContext, Clock, Inventory, Persistence, StepCounter, Whereabouts,
};
pub use session::{ActivitySession, Progress, SessionError, StepProgress, TimeProgress};
