//! Variant definitions: the immutable cost and production parameters of one
//! activity variant.
//!
//! Definitions are authored outside the engine and owned by the registry.
//! The engine only reads them. Step-based variants are costed in steps per
//! tick (`action_cost`), time-based variants in milliseconds per cycle
//! (`crafting_time_ms`); the field that does not match `mode` is ignored.

use serde::{Deserialize, Serialize};

use crate::enums::ProgressMode;
use crate::ids::{ActivityId, ItemId, LocationId, VariantId};

/// One input material consumed per crafting cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    /// The item consumed.
    pub item_id: ItemId,
    /// Units consumed per cycle.
    pub quantity: u32,
}

impl MaterialRequirement {
    /// Build a requirement of `quantity` units of `item_id`.
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// Cost and production parameters for one activity variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDefinition {
    /// The activity this variant belongs to.
    pub activity_id: ActivityId,

    /// The variant's identifier within the activity.
    pub variant_id: VariantId,

    /// Whether the variant progresses by steps or by time.
    pub mode: ProgressMode,

    /// Steps required per tick (step-based variants).
    #[serde(default)]
    pub action_cost: u64,

    /// Milliseconds required per cycle (time-based variants).
    #[serde(default)]
    pub crafting_time_ms: u64,

    /// Item produced per completed tick or cycle.
    pub primary_resource_id: ItemId,

    /// Units of the primary resource produced per tick or cycle.
    #[serde(default = "default_output_quantity")]
    pub output_quantity: u32,

    /// Inputs consumed at the start of every cycle (time-based variants).
    #[serde(default)]
    pub materials: Vec<MaterialRequirement>,

    /// Locations where the variant may be started. Empty means anywhere.
    #[serde(default)]
    pub locations: Vec<LocationId>,
}

impl VariantDefinition {
    /// Whether the variant progresses by wall-clock time.
    pub const fn is_time_based(&self) -> bool {
        matches!(self.mode, ProgressMode::TimeBased)
    }

    /// Whether the variant consumes inputs per cycle.
    pub fn is_crafting(&self) -> bool {
        self.is_time_based() && !self.materials.is_empty()
    }

    /// Whether the variant may be started at `location`.
    pub fn available_at(&self, location: &LocationId) -> bool {
        self.locations.is_empty() || self.locations.contains(location)
    }
}

const fn default_output_quantity() -> u32 {
    1
}
