//! Lifecycle controller: start, stop, advance, and resume the player's
//! activity session.
//!
//! The controller exclusively owns the session. It is the only part of the
//! engine that talks to collaborators, and it reaches them solely through
//! the [`ActivityContext`] lent to each call.
//!
//! # States
//!
//! `Idle -> Active -> Idle`. There is no completed state: a finished
//! crafting cycle either restarts (staying Active) or starves (back to
//! Idle). Starting while Active force-stops the running session first.
//!
//! # Advancement
//!
//! Live driver deltas and offline catch-up share one code path per mode.
//! Time deltas always run through the replay loop, so feeding a gap frame
//! by frame or in one resume call gives the same cycles, production, and
//! residual progress.

use rust_decimal::Decimal;
use stridecraft_types::{
    ActivityId, ProgressMode, SessionId, StopReason, VariantDefinition, VariantId,
};
use tracing::{debug, error, info, warn};

use crate::advance;
use crate::error::ActivityError;
use crate::registry::{DefinitionRegistry, validate_variant};
use crate::replay::{self, CycleHandler, CycleOutcome};
use crate::report::{ReplayReport, StartReport, StopRecord};
use crate::services::{ACTIVITY_SESSION_KEY, ActivityContext, Clock, Inventory};
use crate::session::{ActivitySession, Progress, SessionError, StepProgress, TimeProgress};

/// Where a step advancement gets its delta from.
#[derive(Debug, Clone, Copy)]
enum StepSource {
    /// Steps reported by the driver since the last call.
    Delta(u64),
    /// Absolute pedometer reading; the delta is measured from the checkpoint.
    Counter(u64),
}

/// How far a time advancement should run.
#[derive(Debug, Clone, Copy)]
enum TimeTarget {
    /// Milliseconds reported by the driver since the last call.
    Elapsed(u64),
    /// Absolute wall-clock time to replay up to.
    Until(u64),
}

/// Owner of the player's single activity session.
#[derive(Debug, Clone, Default)]
pub struct ActivityController {
    session: Option<ActivitySession>,
}

impl ActivityController {
    /// A controller with no active session.
    pub const fn new() -> Self {
        Self { session: None }
    }

    /// Rebuild the controller from a persisted session.
    ///
    /// Sentinel records and records that violate session invariants are
    /// dropped; the controller starts Idle instead of failing.
    pub fn restore(saved: Option<ActivitySession>) -> Self {
        let Some(session) = saved else {
            return Self::new();
        };
        match session.validate() {
            Ok(()) => {
                info!(
                    session_id = %session.id,
                    activity_id = %session.activity_id,
                    variant_id = %session.variant_id,
                    mode = %session.mode(),
                    "Activity session restored"
                );
                Self {
                    session: Some(session),
                }
            }
            Err(SessionError::Sentinel) => {
                debug!("Persisted session is the idle sentinel");
                Self::new()
            }
            Err(err) => {
                warn!(session_id = %session.id, %err, "Discarding corrupt persisted session");
                Self::new()
            }
        }
    }

    /// The running session, if any.
    pub const fn session(&self) -> Option<&ActivitySession> {
        self.session.as_ref()
    }

    /// Whether a session is running.
    pub const fn has_active(&self) -> bool {
        self.session.is_some()
    }

    /// Consume the controller, yielding the record to persist.
    pub fn into_saved(self) -> Option<ActivitySession> {
        self.session
    }

    /// Whether a new session could start without replacing one.
    pub fn can_start(&self, ctx: &ActivityContext<'_>) -> bool {
        !self.has_active() && !ctx.whereabouts.is_traveling()
    }

    /// Start a session for the given variant.
    ///
    /// Any running session is force-stopped first and reported in
    /// [`StartReport::replaced`]. Time-based variants consume their first
    /// cycle's inputs here. Every rejection happens before the running
    /// session is touched.
    pub fn start(
        &mut self,
        ctx: &mut ActivityContext<'_>,
        activity_id: &ActivityId,
        variant_id: &VariantId,
    ) -> Result<StartReport, ActivityError> {
        if ctx.whereabouts.is_traveling() {
            return Err(ActivityError::Traveling);
        }

        let registry = ctx.registry;
        let definition = registry
            .resolve_variant(activity_id, variant_id)
            .ok_or_else(|| ActivityError::VariantNotFound {
                activity_id: activity_id.clone(),
                variant_id: variant_id.clone(),
            })?;
        validate_variant(definition).map_err(|source| ActivityError::InvalidDefinition {
            activity_id: activity_id.clone(),
            variant_id: variant_id.clone(),
            source,
        })?;

        let location_id = ctx.whereabouts.current_location();
        if !definition.available_at(&location_id) {
            return Err(ActivityError::WrongLocation {
                activity_id: activity_id.clone(),
                variant_id: variant_id.clone(),
                location_id,
            });
        }

        let insufficient = || ActivityError::InsufficientMaterials {
            activity_id: activity_id.clone(),
            variant_id: variant_id.clone(),
        };
        if definition.is_crafting() && !ctx.inventory.can_fulfill(&definition.materials) {
            return Err(insufficient());
        }

        let now = ctx.clock.now_ms();
        let progress = match definition.mode {
            ProgressMode::StepBased => {
                Progress::Steps(StepProgress::starting_at(ctx.steps.current_total_steps()))
            }
            ProgressMode::TimeBased => {
                if !ctx.inventory.consume(&definition.materials) {
                    warn!(
                        activity_id = %activity_id,
                        variant_id = %variant_id,
                        "Inventory refused materials it reported as available"
                    );
                    return Err(insufficient());
                }
                Progress::Time(TimeProgress::starting_at(now, definition.crafting_time_ms))
            }
        };

        let replaced = self.session.take().map(|old| {
            let record = StopRecord::new(&old, StopReason::Replaced, now);
            info!(
                session_id = %record.session_id,
                activity_id = %record.activity_id,
                variant_id = %record.variant_id,
                elapsed_ms = record.elapsed_ms,
                "Activity replaced by new start"
            );
            record
        });

        let session = ActivitySession::new(
            activity_id.clone(),
            variant_id.clone(),
            location_id,
            now,
            progress,
        );
        info!(
            session_id = %session.id,
            activity_id = %session.activity_id,
            variant_id = %session.variant_id,
            location_id = %session.location_id,
            mode = %session.mode(),
            "Activity started"
        );

        let report = StartReport {
            session_id: session.id,
            mode: session.mode(),
            replaced,
        };
        self.session = Some(session);
        ctx.persistence.mark_dirty(ACTIVITY_SESSION_KEY);
        Ok(report)
    }

    /// Stop the running session at the player's request.
    pub fn stop(&mut self, ctx: &mut ActivityContext<'_>) -> Result<StopRecord, ActivityError> {
        let session = self.session.take().ok_or(ActivityError::NoActiveSession)?;
        let record = StopRecord::new(&session, StopReason::Manual, ctx.clock.now_ms());
        info!(
            session_id = %record.session_id,
            activity_id = %record.activity_id,
            variant_id = %record.variant_id,
            elapsed_ms = record.elapsed_ms,
            "Activity stopped"
        );
        ctx.persistence.mark_dirty(ACTIVITY_SESSION_KEY);
        Ok(record)
    }

    /// Fold steps walked since the last call into a step-based session.
    pub fn advance_steps(
        &mut self,
        ctx: &mut ActivityContext<'_>,
        new_steps: u64,
    ) -> Result<ReplayReport, ActivityError> {
        self.run_steps(ctx, StepSource::Delta(new_steps))
    }

    /// Fold elapsed milliseconds into a time-based session.
    pub fn advance_time(
        &mut self,
        ctx: &mut ActivityContext<'_>,
        elapsed_ms: u64,
    ) -> Result<ReplayReport, ActivityError> {
        self.run_time(ctx, TimeTarget::Elapsed(elapsed_ms))
    }

    /// Catch up on everything since the session's checkpoint.
    ///
    /// Reads the pedometer for step sessions and the clock for time
    /// sessions. Intended for the host's resume hook.
    pub fn resume(&mut self, ctx: &mut ActivityContext<'_>) -> Result<ReplayReport, ActivityError> {
        let mode = self
            .session
            .as_ref()
            .map(ActivitySession::mode)
            .ok_or(ActivityError::NoActiveSession)?;
        match mode {
            ProgressMode::StepBased => {
                let total = ctx.steps.current_total_steps();
                self.run_steps(ctx, StepSource::Counter(total))
            }
            ProgressMode::TimeBased => {
                let now = ctx.clock.now_ms();
                self.run_time(ctx, TimeTarget::Until(now))
            }
        }
    }

    /// Progress toward the next tick or through the current cycle, for UI.
    pub fn progress_fraction(&self, registry: &dyn DefinitionRegistry) -> Option<Decimal> {
        let session = self.session.as_ref()?;
        let fraction = match &session.progress {
            Progress::Steps(steps) => registry
                .resolve_variant(&session.activity_id, &session.variant_id)
                .map_or(Decimal::ZERO, |def| steps.fraction(def.action_cost)),
            Progress::Time(time) => time.fraction(),
        };
        Some(fraction)
    }

    /// How long the running session has been going, for display.
    pub fn elapsed_ms(&self, clock: &dyn Clock) -> Option<u64> {
        self.session
            .as_ref()
            .map(|session| session.elapsed_ms(clock.now_ms()))
    }

    fn run_steps(
        &mut self,
        ctx: &mut ActivityContext<'_>,
        source: StepSource,
    ) -> Result<ReplayReport, ActivityError> {
        let registry = ctx.registry;
        let definition = match self.running_definition(registry, ProgressMode::StepBased)? {
            Ok(definition) => definition,
            Err(reason) => return self.force_stop(ctx, reason),
        };
        let Some(session) = self.session.as_mut() else {
            return Err(ActivityError::NoActiveSession);
        };
        let session_id = session.id;
        let actual = session.mode();
        let Progress::Steps(progress) = &mut session.progress else {
            return Err(mode_mismatch(ProgressMode::StepBased, actual));
        };

        let stepped = match source {
            StepSource::Delta(steps) => {
                advance::advance_steps(progress, definition, steps).map(|outcome| (steps, outcome))
            }
            StepSource::Counter(total) => replay::replay_steps(progress, definition, total)
                .map(|replay| (replay.delta, replay.outcome)),
        };
        let (delta, outcome) = match stepped {
            Ok(stepped) => stepped,
            Err(err @ ActivityError::ArithmeticOverflow { .. }) => {
                return self.overflow_stop(ctx, &err);
            }
            Err(err) => return Err(err),
        };

        let mut output = Production::new(definition);
        for _ in 0..outcome.completed {
            if !output.produce(&mut *ctx.inventory) {
                output.skip_remaining(outcome.completed);
                break;
            }
        }
        output.log_failures(session_id);

        if outcome.completed > 0 {
            info!(
                session_id = %session_id,
                delta,
                completed = outcome.completed,
                produced = output.produced,
                "Step ticks completed"
            );
        } else {
            debug!(session_id = %session_id, delta, "Steps accumulated");
        }

        ctx.persistence.mark_dirty(ACTIVITY_SESSION_KEY);
        Ok(ReplayReport {
            mode: ProgressMode::StepBased,
            delta,
            completed: outcome.completed,
            produced: output.produced,
            production_failures: output.failures,
            discarded_ms: 0,
            progress: outcome.progress,
            stopped: None,
        })
    }

    fn run_time(
        &mut self,
        ctx: &mut ActivityContext<'_>,
        target: TimeTarget,
    ) -> Result<ReplayReport, ActivityError> {
        let registry = ctx.registry;
        let definition = match self.running_definition(registry, ProgressMode::TimeBased)? {
            Ok(definition) => definition,
            Err(reason) => return self.force_stop(ctx, reason),
        };
        let Some(session) = self.session.as_mut() else {
            return Err(ActivityError::NoActiveSession);
        };
        let session_id = session.id;
        let actual = session.mode();
        let Progress::Time(progress) = &mut session.progress else {
            return Err(mode_mismatch(ProgressMode::TimeBased, actual));
        };

        let target_ms = match target {
            TimeTarget::Elapsed(elapsed) => progress.last_processed_time_ms.checked_add(elapsed),
            TimeTarget::Until(now) => Some(now),
        };
        let Some(target_ms) = target_ms else {
            return self.overflow_stop(ctx, &ActivityError::overflow("time checkpoint"));
        };

        let mut crafting = CraftingLoop {
            inventory: &mut *ctx.inventory,
            output: Production::new(definition),
        };
        let replay = match replay::replay_time(progress, target_ms, &mut crafting) {
            Ok(replay) => replay,
            Err(err @ ActivityError::ArithmeticOverflow { .. }) => {
                return self.overflow_stop(ctx, &err);
            }
            Err(err) => return Err(err),
        };
        let output = crafting.output;
        output.log_failures(session_id);

        if replay.completed > 0 {
            info!(
                session_id = %session_id,
                delta_ms = replay.delta_ms,
                completed = replay.completed,
                produced = output.produced,
                "Crafting cycles completed"
            );
        } else {
            debug!(session_id = %session_id, delta_ms = replay.delta_ms, "Time accumulated");
        }

        let stopped = if replay.starved {
            self.session.take().map(|session| {
                let record = StopRecord::new(&session, StopReason::Starved, ctx.clock.now_ms());
                info!(
                    session_id = %record.session_id,
                    completed = replay.completed,
                    discarded_ms = replay.discarded_ms,
                    "Crafting stopped: out of materials"
                );
                record
            })
        } else {
            None
        };

        ctx.persistence.mark_dirty(ACTIVITY_SESSION_KEY);
        Ok(ReplayReport {
            mode: ProgressMode::TimeBased,
            delta: replay.delta_ms,
            completed: replay.completed,
            produced: output.produced,
            production_failures: output.failures,
            discarded_ms: replay.discarded_ms,
            progress: replay.progress,
            stopped,
        })
    }

    /// Resolve and re-validate the running session's definition.
    ///
    /// The outer `Result` rejects the call outright (no session, wrong
    /// mode). The inner one carries the stop reason when the definition can
    /// no longer drive the session.
    fn running_definition<'r>(
        &self,
        registry: &'r dyn DefinitionRegistry,
        expected: ProgressMode,
    ) -> Result<Result<&'r VariantDefinition, StopReason>, ActivityError> {
        let session = self.session.as_ref().ok_or(ActivityError::NoActiveSession)?;
        if session.mode() != expected {
            return Err(mode_mismatch(expected, session.mode()));
        }

        let Some(definition) = registry.resolve_variant(&session.activity_id, &session.variant_id)
        else {
            error!(
                session_id = %session.id,
                activity_id = %session.activity_id,
                variant_id = %session.variant_id,
                "Running variant no longer resolves"
            );
            return Ok(Err(StopReason::DefinitionMissing));
        };

        if let Err(err) = validate_variant(definition) {
            error!(session_id = %session.id, %err, "Running variant became invalid");
            return Ok(Err(StopReason::InvalidDefinition));
        }
        if definition.mode != expected {
            error!(
                session_id = %session.id,
                definition_mode = %definition.mode,
                session_mode = %expected,
                "Running variant changed progression mode"
            );
            return Ok(Err(StopReason::InvalidDefinition));
        }
        Ok(Ok(definition))
    }

    fn force_stop(
        &mut self,
        ctx: &mut ActivityContext<'_>,
        reason: StopReason,
    ) -> Result<ReplayReport, ActivityError> {
        let session = self.session.take().ok_or(ActivityError::NoActiveSession)?;
        let record = StopRecord::new(&session, reason, ctx.clock.now_ms());
        warn!(
            session_id = %record.session_id,
            reason = ?reason,
            forced = reason.is_forced(),
            "Activity force-stopped"
        );
        ctx.persistence.mark_dirty(ACTIVITY_SESSION_KEY);
        Ok(ReplayReport::stopped_only(session.mode(), record))
    }

    /// Stop a session whose counters can no longer advance.
    ///
    /// The overflowing operation left progress where the last successful
    /// step put it; the stopped session keeps that state.
    fn overflow_stop(
        &mut self,
        ctx: &mut ActivityContext<'_>,
        err: &ActivityError,
    ) -> Result<ReplayReport, ActivityError> {
        if let Some(session) = &self.session {
            error!(session_id = %session.id, %err, "Progress overflowed");
        }
        self.force_stop(ctx, StopReason::ProgressOverflow)
    }
}

const fn mode_mismatch(expected: ProgressMode, actual: ProgressMode) -> ActivityError {
    ActivityError::ModeMismatch { expected, actual }
}

/// Production tally for one advancement call.
struct Production<'d> {
    definition: &'d VariantDefinition,
    produced: u64,
    failures: u64,
    attempts: u64,
}

impl<'d> Production<'d> {
    const fn new(definition: &'d VariantDefinition) -> Self {
        Self {
            definition,
            produced: 0,
            failures: 0,
            attempts: 0,
        }
    }

    /// Produce one completion's output. Returns `false` if it was refused.
    fn produce(&mut self, inventory: &mut dyn Inventory) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        let quantity = self.definition.output_quantity;
        if inventory.produce(&self.definition.primary_resource_id, quantity) {
            self.produced = self.produced.saturating_add(u64::from(quantity));
            true
        } else {
            self.failures = self.failures.saturating_add(1);
            false
        }
    }

    /// Count the rest of `total` completions as refused without asking the
    /// inventory again; storage that refused once stays full this call.
    const fn skip_remaining(&mut self, total: u64) {
        let skipped = total.saturating_sub(self.attempts);
        self.failures = self.failures.saturating_add(skipped);
        self.attempts = total;
    }

    fn log_failures(&self, session_id: SessionId) {
        if self.failures > 0 {
            warn!(
                session_id = %session_id,
                item_id = %self.definition.primary_resource_id,
                failures = self.failures,
                "Inventory full, output lost for completed work"
            );
        }
    }
}

/// Cycle handler that pays out each finished cycle and buys the next one.
struct CraftingLoop<'i, 'd> {
    inventory: &'i mut dyn Inventory,
    output: Production<'d>,
}

impl CycleHandler for CraftingLoop<'_, '_> {
    fn on_cycle_complete(&mut self) -> CycleOutcome {
        self.output.produce(&mut *self.inventory);
        if self.inventory.consume(&self.output.definition.materials) {
            CycleOutcome::Restart
        } else {
            CycleOutcome::Starved
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use stridecraft_types::{ItemId, LocationId, MaterialRequirement};

    use super::*;
    use crate::inventory::ItemStore;
    use crate::registry::InMemoryRegistry;
    use crate::services::{Persistence, StepCounter, Whereabouts};

    struct Counter(u64);
    impl StepCounter for Counter {
        fn current_total_steps(&self) -> u64 {
            self.0
        }
    }

    struct FixedClock(u64);
    impl Clock for FixedClock {
        fn now_ms(&self) -> u64 {
            self.0
        }
    }

    #[derive(Default)]
    struct DirtyLog(Vec<String>);
    impl Persistence for DirtyLog {
        fn mark_dirty(&mut self, key: &str) {
            self.0.push(key.to_owned());
        }
    }

    struct Place {
        traveling: bool,
        location: LocationId,
    }
    impl Whereabouts for Place {
        fn is_traveling(&self) -> bool {
            self.traveling
        }
        fn current_location(&self) -> LocationId {
            self.location.clone()
        }
    }

    struct Harness {
        registry: InMemoryRegistry,
        store: ItemStore,
        steps: Counter,
        clock: FixedClock,
        saves: DirtyLog,
        place: Place,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                registry: InMemoryRegistry::from_definitions([mining(), smelting()]),
                store: ItemStore::new(100),
                steps: Counter(0),
                clock: FixedClock(0),
                saves: DirtyLog::default(),
                place: Place {
                    traveling: false,
                    location: LocationId::new("quarry_town"),
                },
            }
        }

        fn with_ore(mut self, ore: u32) -> Self {
            self.store = ItemStore::from_items(
                100,
                BTreeMap::from([(ItemId::new("copper_ore"), ore)]),
            );
            self
        }

        fn ctx(&mut self) -> ActivityContext<'_> {
            ActivityContext {
                registry: &self.registry,
                inventory: &mut self.store,
                steps: &self.steps,
                clock: &self.clock,
                persistence: &mut self.saves,
                whereabouts: &self.place,
            }
        }
    }

    fn mining() -> VariantDefinition {
        VariantDefinition {
            activity_id: ActivityId::new("mining"),
            variant_id: VariantId::new("copper_vein"),
            mode: ProgressMode::StepBased,
            action_cost: 10,
            crafting_time_ms: 0,
            primary_resource_id: ItemId::new("copper_ore"),
            output_quantity: 1,
            materials: Vec::new(),
            locations: vec![LocationId::new("quarry_town")],
        }
    }

    fn smelting() -> VariantDefinition {
        VariantDefinition {
            activity_id: ActivityId::new("smithing"),
            variant_id: VariantId::new("copper_bar"),
            mode: ProgressMode::TimeBased,
            action_cost: 0,
            crafting_time_ms: 30_000,
            primary_resource_id: ItemId::new("copper_bar"),
            output_quantity: 1,
            materials: vec![MaterialRequirement::new("copper_ore", 1)],
            locations: Vec::new(),
        }
    }

    fn start_mining(c: &mut ActivityController, h: &mut Harness) -> StartReport {
        c.start(
            &mut h.ctx(),
            &ActivityId::new("mining"),
            &VariantId::new("copper_vein"),
        )
        .unwrap()
    }

    fn start_smelting(c: &mut ActivityController, h: &mut Harness) -> StartReport {
        c.start(
            &mut h.ctx(),
            &ActivityId::new("smithing"),
            &VariantId::new("copper_bar"),
        )
        .unwrap()
    }

    #[test]
    fn step_start_checkpoints_counter() {
        let mut h = Harness::new();
        h.steps.0 = 5_000;
        let mut c = ActivityController::new();
        assert!(c.can_start(&h.ctx()));

        let report = start_mining(&mut c, &mut h);
        assert_eq!(report.mode, ProgressMode::StepBased);
        assert!(report.replaced.is_none());
        let Progress::Steps(p) = c.session().unwrap().progress else {
            panic!("expected step progress");
        };
        assert_eq!(p.start_steps, 5_000);
        assert_eq!(p.last_processed_total_steps, 5_000);
        assert_eq!(h.saves.0, vec![ACTIVITY_SESSION_KEY.to_owned()]);
        assert!(!c.can_start(&h.ctx()));
    }

    #[test]
    fn mining_feeds_ticks_in_order() {
        let mut h = Harness::new();
        let mut c = ActivityController::new();
        start_mining(&mut c, &mut h);

        let ticks: Vec<u64> = [4, 4, 4]
            .into_iter()
            .map(|steps| c.advance_steps(&mut h.ctx(), steps).unwrap().completed)
            .collect();
        assert_eq!(ticks, vec![0, 0, 1]);
        let Progress::Steps(p) = c.session().unwrap().progress else {
            panic!("expected step progress");
        };
        assert_eq!(p.accumulated_steps, 2);
        assert_eq!(h.store.quantity_of(&ItemId::new("copper_ore")), 1);
        assert_eq!(
            c.progress_fraction(&h.registry),
            Some(Decimal::new(2, 1))
        );
    }

    #[test]
    fn traveling_blocks_start() {
        let mut h = Harness::new();
        h.place.traveling = true;
        let mut c = ActivityController::new();
        assert!(!c.can_start(&h.ctx()));
        let err = c
            .start(
                &mut h.ctx(),
                &ActivityId::new("mining"),
                &VariantId::new("copper_vein"),
            )
            .unwrap_err();
        assert!(matches!(err, ActivityError::Traveling));
        assert!(!c.has_active());
        assert!(h.saves.0.is_empty());
    }

    #[test]
    fn wrong_location_is_rejected() {
        let mut h = Harness::new();
        h.place.location = LocationId::new("harbor");
        let mut c = ActivityController::new();
        let err = c
            .start(
                &mut h.ctx(),
                &ActivityId::new("mining"),
                &VariantId::new("copper_vein"),
            )
            .unwrap_err();
        assert!(matches!(err, ActivityError::WrongLocation { .. }));
    }

    #[test]
    fn unknown_variant_is_rejected() {
        let mut h = Harness::new();
        let mut c = ActivityController::new();
        let err = c
            .start(
                &mut h.ctx(),
                &ActivityId::new("mining"),
                &VariantId::new("mithril_vein"),
            )
            .unwrap_err();
        assert!(matches!(err, ActivityError::VariantNotFound { .. }));
    }

    #[test]
    fn starting_again_replaces_running_session() {
        let mut h = Harness::new().with_ore(3);
        let mut c = ActivityController::new();
        let first = start_mining(&mut c, &mut h);

        h.clock.0 = 9_000;
        let second = start_smelting(&mut c, &mut h);
        let replaced = second.replaced.unwrap();
        assert_eq!(replaced.session_id, first.session_id);
        assert_eq!(replaced.reason, StopReason::Replaced);
        assert_eq!(replaced.elapsed_ms, 9_000);
        assert_eq!(c.session().unwrap().id, second.session_id);
        // Start consumed the first cycle's inputs.
        assert_eq!(h.store.quantity_of(&ItemId::new("copper_ore")), 2);
    }

    #[test]
    fn insufficient_materials_keep_running_session() {
        let mut h = Harness::new();
        let mut c = ActivityController::new();
        let first = start_mining(&mut c, &mut h);

        let err = c
            .start(
                &mut h.ctx(),
                &ActivityId::new("smithing"),
                &VariantId::new("copper_bar"),
            )
            .unwrap_err();
        assert!(matches!(err, ActivityError::InsufficientMaterials { .. }));
        assert_eq!(c.session().unwrap().id, first.session_id);
    }

    #[test]
    fn crafting_starves_after_last_input() {
        // Inputs for two cycles: one consumed at start, one at the restart.
        let mut h = Harness::new().with_ore(2);
        let mut c = ActivityController::new();
        start_smelting(&mut c, &mut h);

        h.clock.0 = 75_000;
        let report = c.advance_time(&mut h.ctx(), 75_000).unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(report.produced, 2);
        assert_eq!(report.discarded_ms, 15_000);
        let stopped = report.stopped.unwrap();
        assert_eq!(stopped.reason, StopReason::Starved);
        assert!(!c.has_active());
        assert_eq!(h.store.quantity_of(&ItemId::new("copper_bar")), 2);
        assert_eq!(h.store.quantity_of(&ItemId::new("copper_ore")), 0);
    }

    #[test]
    fn live_frames_match_single_resume() {
        let mut live = Harness::new().with_ore(10);
        let mut live_c = ActivityController::new();
        start_smelting(&mut live_c, &mut live);
        for _ in 0..100 {
            live_c.advance_time(&mut live.ctx(), 1_000).unwrap();
        }

        let mut offline = Harness::new().with_ore(10);
        let mut offline_c = ActivityController::new();
        start_smelting(&mut offline_c, &mut offline);
        offline.clock.0 = 100_000;
        let report = offline_c.resume(&mut offline.ctx()).unwrap();
        assert_eq!(report.completed, 3);

        let (Progress::Time(a), Progress::Time(b)) = (
            live_c.session().unwrap().progress,
            offline_c.session().unwrap().progress,
        ) else {
            panic!("expected time progress");
        };
        assert_eq!(a.accumulated_time_ms, b.accumulated_time_ms);
        assert_eq!(a.last_processed_time_ms, b.last_processed_time_ms);
        assert_eq!(live.store, offline.store);
    }

    #[test]
    fn resume_reads_pedometer_for_step_sessions() {
        let mut h = Harness::new();
        h.steps.0 = 1_000;
        let mut c = ActivityController::new();
        start_mining(&mut c, &mut h);

        h.steps.0 = 1_047;
        let report = c.resume(&mut h.ctx()).unwrap();
        assert_eq!(report.delta, 47);
        assert_eq!(report.completed, 4);
        assert_eq!(h.store.quantity_of(&ItemId::new("copper_ore")), 4);
    }

    #[test]
    fn full_inventory_still_counts_ticks() {
        let mut h = Harness::new();
        h.store = ItemStore::new(2);
        let mut c = ActivityController::new();
        start_mining(&mut c, &mut h);

        let report = c.advance_steps(&mut h.ctx(), 50).unwrap();
        assert_eq!(report.completed, 5);
        assert_eq!(report.produced, 2);
        assert_eq!(report.production_failures, 3);
        assert!(c.has_active());
    }

    #[test]
    fn missing_definition_force_stops() {
        let mut h = Harness::new();
        let mut c = ActivityController::new();
        start_mining(&mut c, &mut h);
        h.registry
            .remove(&ActivityId::new("mining"), &VariantId::new("copper_vein"));

        let report = c.advance_steps(&mut h.ctx(), 100).unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(report.stopped.unwrap().reason, StopReason::DefinitionMissing);
        assert!(!c.has_active());
    }

    #[test]
    fn invalidated_definition_force_stops() {
        let mut h = Harness::new();
        let mut c = ActivityController::new();
        start_mining(&mut c, &mut h);
        h.registry.insert(VariantDefinition {
            action_cost: 0,
            ..mining()
        });

        let report = c.advance_steps(&mut h.ctx(), 100).unwrap();
        assert_eq!(report.stopped.unwrap().reason, StopReason::InvalidDefinition);
    }

    #[test]
    fn start_rejects_invalid_definitions_untouched() {
        for broken in [
            VariantDefinition {
                action_cost: 0,
                ..mining()
            },
            VariantDefinition {
                crafting_time_ms: 0,
                ..smelting()
            },
        ] {
            let mut h = Harness::new().with_ore(5);
            let activity_id = broken.activity_id.clone();
            let variant_id = broken.variant_id.clone();
            h.registry.insert(broken);
            let before = h.store.clone();
            let mut c = ActivityController::new();

            let err = c.start(&mut h.ctx(), &activity_id, &variant_id).unwrap_err();
            assert!(matches!(err, ActivityError::InvalidDefinition { .. }));
            assert!(!c.has_active());
            assert_eq!(h.store, before);
            assert!(h.saves.0.is_empty());
        }
    }

    #[test]
    fn step_overflow_force_stops_once() {
        let mut h = Harness::new();
        h.steps.0 = u64::MAX - 2;
        let mut c = ActivityController::new();
        let started = start_mining(&mut c, &mut h);
        c.advance_steps(&mut h.ctx(), 2).unwrap();

        let report = c.advance_steps(&mut h.ctx(), 5).unwrap();
        assert_eq!(report.completed, 0);
        let stopped = report.stopped.unwrap();
        assert_eq!(stopped.session_id, started.session_id);
        assert_eq!(stopped.reason, StopReason::ProgressOverflow);
        assert!(!c.has_active());
        // start, the good advance, the stop
        assert_eq!(h.saves.0.len(), 3);
        assert!(matches!(
            c.advance_steps(&mut h.ctx(), 5),
            Err(ActivityError::NoActiveSession)
        ));
    }

    #[test]
    fn time_checkpoint_overflow_force_stops() {
        let mut h = Harness::new().with_ore(3);
        h.clock.0 = 10;
        let mut c = ActivityController::new();
        start_smelting(&mut c, &mut h);

        let report = c.advance_time(&mut h.ctx(), u64::MAX).unwrap();
        assert_eq!(report.stopped.unwrap().reason, StopReason::ProgressOverflow);
        assert!(!c.has_active());
        assert_eq!(h.store.quantity_of(&ItemId::new("copper_ore")), 2);
        assert_eq!(h.saves.0.len(), 2);
    }

    #[test]
    fn wrong_primitive_is_a_mode_mismatch() {
        let mut h = Harness::new();
        let mut c = ActivityController::new();
        start_mining(&mut c, &mut h);
        let err = c.advance_time(&mut h.ctx(), 1_000).unwrap_err();
        assert!(matches!(
            err,
            ActivityError::ModeMismatch {
                expected: ProgressMode::TimeBased,
                actual: ProgressMode::StepBased,
            }
        ));
        assert!(c.has_active());
    }

    #[test]
    fn stop_without_session_fails() {
        let mut h = Harness::new();
        let mut c = ActivityController::new();
        assert!(matches!(
            c.stop(&mut h.ctx()),
            Err(ActivityError::NoActiveSession)
        ));
        assert!(matches!(
            c.resume(&mut h.ctx()),
            Err(ActivityError::NoActiveSession)
        ));
    }

    #[test]
    fn manual_stop_reports_elapsed() {
        let mut h = Harness::new();
        h.clock.0 = 1_000;
        let mut c = ActivityController::new();
        start_mining(&mut c, &mut h);
        h.clock.0 = 61_000;
        let record = c.stop(&mut h.ctx()).unwrap();
        assert_eq!(record.reason, StopReason::Manual);
        assert_eq!(record.elapsed_ms, 60_000);
        assert_eq!(c.elapsed_ms(&h.clock), None);
    }

    #[test]
    fn restore_drops_sentinel_and_keeps_valid() {
        let sentinel = ActivitySession::new(
            ActivityId::new(""),
            VariantId::new(""),
            LocationId::new(""),
            0,
            Progress::Steps(StepProgress::starting_at(0)),
        );
        assert!(!ActivityController::restore(Some(sentinel)).has_active());

        let valid = ActivitySession::new(
            ActivityId::new("mining"),
            VariantId::new("copper_vein"),
            LocationId::new("quarry_town"),
            0,
            Progress::Steps(StepProgress::starting_at(10)),
        );
        let restored = ActivityController::restore(Some(valid.clone()));
        assert_eq!(restored.into_saved(), Some(valid));
    }
}
