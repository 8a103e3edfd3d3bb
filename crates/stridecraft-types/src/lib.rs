//! Shared type definitions for the Stridecraft activity engine.
//!
//! This crate holds the identifiers, enumerations, and definition records
//! that flow between the engine (`stridecraft-activity`) and the host that
//! authors definitions and persists sessions (`stridecraft-engine`).
//!
//! # Modules
//!
//! - [`ids`] -- Opaque string identifiers and the UUID-backed [`SessionId`]
//! - [`enums`] -- [`ProgressMode`] and [`StopReason`]
//! - [`definition`] -- [`VariantDefinition`] and [`MaterialRequirement`]

pub mod definition;
pub mod enums;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use definition::{MaterialRequirement, VariantDefinition};
pub use enums::{ProgressMode, StopReason};
pub use ids::{ActivityId, ItemId, LocationId, SessionId, VariantId};
