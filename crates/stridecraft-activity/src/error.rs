//! Error types for the stridecraft-activity crate.
//!
//! Every failure is locally recoverable: callers receive a typed error and
//! the session is either unchanged or force-stopped with its last valid
//! progress intact. Nothing here is meant to abort the host.

use stridecraft_types::{ActivityId, LocationId, ProgressMode, VariantId};

use crate::session::SessionError;

/// Why a variant definition cannot drive a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// The activity or variant identifier is empty.
    #[error("definition has an empty activity or variant id")]
    EmptyId,

    /// A step-based variant requires at least one step per tick.
    #[error("step-based variant has non-positive action cost")]
    NonPositiveActionCost,

    /// A time-based variant requires a positive cycle length.
    #[error("time-based variant has non-positive crafting time")]
    NonPositiveCraftingTime,

    /// The variant does not name an item to produce.
    #[error("variant has no primary resource")]
    MissingPrimaryResource,

    /// The variant produces nothing per tick.
    #[error("variant output quantity is zero")]
    ZeroOutputQuantity,

    /// A crafting input names no item or consumes zero units.
    #[error("material requirement {index} is empty")]
    EmptyMaterial {
        /// Position of the offending requirement in the material list.
        index: usize,
    },
}

/// Errors returned by the lifecycle controller and the advancement engine.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    /// The registry has no definition for the requested pair.
    #[error("variant not found: {activity_id}/{variant_id}")]
    VariantNotFound {
        /// The requested activity.
        activity_id: ActivityId,
        /// The requested variant.
        variant_id: VariantId,
    },

    /// The definition exists but fails validation.
    #[error("invalid definition {activity_id}/{variant_id}: {source}")]
    InvalidDefinition {
        /// The activity of the rejected definition.
        activity_id: ActivityId,
        /// The variant of the rejected definition.
        variant_id: VariantId,
        /// What is wrong with the definition.
        source: DefinitionError,
    },

    /// Activities cannot be started while the player is traveling.
    #[error("cannot start an activity while traveling")]
    Traveling,

    /// The variant is not offered at the player's location.
    #[error("{activity_id}/{variant_id} is not available at {location_id}")]
    WrongLocation {
        /// The requested activity.
        activity_id: ActivityId,
        /// The requested variant.
        variant_id: VariantId,
        /// Where the player currently is.
        location_id: LocationId,
    },

    /// There is no running session to stop or advance.
    #[error("no active activity session")]
    NoActiveSession,

    /// The inventory cannot supply the crafting inputs.
    #[error("insufficient materials for {activity_id}/{variant_id}")]
    InsufficientMaterials {
        /// The requested activity.
        activity_id: ActivityId,
        /// The requested variant.
        variant_id: VariantId,
    },

    /// The call does not match the session's progression mode.
    #[error("session is {actual}, operation requires {expected}")]
    ModeMismatch {
        /// Mode the operation works on.
        expected: ProgressMode,
        /// Mode of the running session.
        actual: ProgressMode,
    },

    /// The session record violates its own invariants.
    #[error("corrupt session: {source}")]
    CorruptSession {
        /// The violated invariant.
        source: SessionError,
    },

    /// An arithmetic overflow occurred while advancing progress.
    #[error("arithmetic overflow in progress computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },
}

impl ActivityError {
    /// Shorthand for an [`ActivityError::ArithmeticOverflow`].
    pub(crate) fn overflow(context: &str) -> Self {
        Self::ArithmeticOverflow {
            context: context.to_owned(),
        }
    }
}
