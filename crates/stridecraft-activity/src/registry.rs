//! Variant lookup and validation.
//!
//! The engine never owns definition data. It asks a [`DefinitionRegistry`]
//! to resolve an `(activity, variant)` pair and validates what comes back
//! before trusting it: a zero action cost would make every step tick
//! undefined, and a zero crafting time would let the replay loop spin
//! forever.

use std::collections::BTreeMap;

use stridecraft_types::{ActivityId, ProgressMode, VariantDefinition, VariantId};
use tracing::warn;

use crate::error::DefinitionError;

/// Read-only source of variant definitions.
pub trait DefinitionRegistry {
    /// Resolve a variant by activity and variant id.
    fn resolve_variant(
        &self,
        activity_id: &ActivityId,
        variant_id: &VariantId,
    ) -> Option<&VariantDefinition>;
}

/// Registry backed by an in-memory map, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    variants: BTreeMap<(ActivityId, VariantId), VariantDefinition>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            variants: BTreeMap::new(),
        }
    }

    /// Build a registry from a list of definitions.
    ///
    /// A later definition for the same pair replaces an earlier one.
    /// Invalid definitions are kept: they are rejected when a session tries
    /// to start, not at load time.
    pub fn from_definitions(definitions: impl IntoIterator<Item = VariantDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.insert(definition);
        }
        registry
    }

    /// Insert or replace a definition. Returns the replaced one, if any.
    pub fn insert(&mut self, definition: VariantDefinition) -> Option<VariantDefinition> {
        let key = (
            definition.activity_id.clone(),
            definition.variant_id.clone(),
        );
        let replaced = self.variants.insert(key, definition);
        if let Some(old) = &replaced {
            warn!(
                activity_id = %old.activity_id,
                variant_id = %old.variant_id,
                "Duplicate variant definition replaced"
            );
        }
        replaced
    }

    /// Remove a definition (e.g. content hot-reload dropped it).
    pub fn remove(
        &mut self,
        activity_id: &ActivityId,
        variant_id: &VariantId,
    ) -> Option<VariantDefinition> {
        self.variants
            .remove(&(activity_id.clone(), variant_id.clone()))
    }

    /// Number of registered variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the registry holds no variants.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl DefinitionRegistry for InMemoryRegistry {
    fn resolve_variant(
        &self,
        activity_id: &ActivityId,
        variant_id: &VariantId,
    ) -> Option<&VariantDefinition> {
        self.variants
            .get(&(activity_id.clone(), variant_id.clone()))
    }
}

/// Check that a definition is internally consistent enough to run.
///
/// Only the cost field matching `mode` is checked; the other is ignored.
pub fn validate_variant(definition: &VariantDefinition) -> Result<(), DefinitionError> {
    if definition.activity_id.is_empty() || definition.variant_id.is_empty() {
        return Err(DefinitionError::EmptyId);
    }
    match definition.mode {
        ProgressMode::StepBased if definition.action_cost == 0 => {
            return Err(DefinitionError::NonPositiveActionCost);
        }
        ProgressMode::TimeBased if definition.crafting_time_ms == 0 => {
            return Err(DefinitionError::NonPositiveCraftingTime);
        }
        ProgressMode::StepBased | ProgressMode::TimeBased => {}
    }
    if definition.primary_resource_id.is_empty() {
        return Err(DefinitionError::MissingPrimaryResource);
    }
    if definition.output_quantity == 0 {
        return Err(DefinitionError::ZeroOutputQuantity);
    }
    if let Some(index) = definition
        .materials
        .iter()
        .position(|m| m.item_id.is_empty() || m.quantity == 0)
    {
        return Err(DefinitionError::EmptyMaterial { index });
    }
    Ok(())
}

/// Boolean form of [`validate_variant`].
pub fn is_valid_variant(definition: &VariantDefinition) -> bool {
    validate_variant(definition).is_ok()
}
