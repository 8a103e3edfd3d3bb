//! Host-side collaborators: clocks, the simulated pedometer, the player's
//! whereabouts, and the JSON save file.
//!
//! The activity engine reaches all of these through the traits in
//! `stridecraft_activity::services`. [`Host`] bundles them with the
//! definition registry and item store and lends them out as an
//! [`ActivityContext`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use stridecraft_activity::{
    ActivityContext, ActivityController, ActivitySession, Clock, InMemoryRegistry, ItemStore,
    Persistence, StepCounter, Whereabouts,
};
use stridecraft_types::{ItemId, LocationId};
use tracing::{debug, info, warn};

use crate::config::{ClockMode, EngineConfig};

/// Errors reading or writing the save file.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Failed to read, write, or rename the file.
    #[error("save file I/O failed for {}: {source}", .path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a valid save record.
    #[error("save file {} is malformed: {source}", .path.display())]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    /// The running session, if any.
    #[serde(default)]
    pub session: Option<ActivitySession>,
    /// Inventory quantities.
    #[serde(default)]
    pub items: BTreeMap<ItemId, u32>,
    /// Lifetime pedometer reading of the simulated device.
    #[serde(default)]
    pub pedometer_total: u64,
    /// Host clock reading when the save was taken (UTC epoch ms).
    #[serde(default)]
    pub saved_at_ms: u64,
}

/// Wall clock backed by `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Virtual clock moved forward explicitly by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedClock {
    now_ms: u64,
}

impl SimulatedClock {
    /// A clock reading `now_ms`.
    pub const fn starting_at(now_ms: u64) -> Self {
        Self { now_ms }
    }

    /// Move the clock forward.
    pub const fn advance(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }
}

impl Clock for SimulatedClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

/// The clock selected by `driver.clock`.
#[derive(Debug, Clone, Copy)]
pub enum HostClock {
    /// Real time.
    System(SystemClock),
    /// Virtual time.
    Simulated(SimulatedClock),
}

impl HostClock {
    /// Move a simulated clock forward. Real time moves on its own.
    pub const fn advance(&mut self, ms: u64) {
        if let Self::Simulated(clock) = self {
            clock.advance(ms);
        }
    }

    /// Whether the clock is virtual.
    pub const fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        match self {
            Self::System(clock) => clock.now_ms(),
            Self::Simulated(clock) => clock.now_ms(),
        }
    }
}

/// Simulated pedometer: a monotonic counter fed random steps.
#[derive(Debug, Clone)]
pub struct Pedometer {
    total: u64,
    min_steps: u64,
    max_steps: u64,
    rng: SmallRng,
}

impl Pedometer {
    /// A pedometer at `total` that records between `min_steps` and
    /// `max_steps` per walk. The bounds are swapped if given in reverse.
    pub fn new(total: u64, min_steps: u64, max_steps: u64, seed: u64) -> Self {
        Self {
            total,
            min_steps: min_steps.min(max_steps),
            max_steps: max_steps.max(min_steps),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Record one frame's worth of steps and return how many were taken.
    pub fn walk(&mut self) -> u64 {
        let steps = self.rng.random_range(self.min_steps..=self.max_steps);
        self.total = self.total.saturating_add(steps);
        steps
    }

    /// Record `frames` frames of walking and return the total taken.
    pub fn walk_frames(&mut self, frames: u64) -> u64 {
        let mut taken: u64 = 0;
        for _ in 0..frames {
            taken = taken.saturating_add(self.walk());
        }
        taken
    }
}

impl StepCounter for Pedometer {
    fn current_total_steps(&self) -> u64 {
        self.total
    }
}

/// A player standing still at one location.
#[derive(Debug, Clone)]
pub struct FixedWhereabouts {
    location: LocationId,
}

impl FixedWhereabouts {
    /// Stand at `location`.
    pub const fn new(location: LocationId) -> Self {
        Self { location }
    }
}

impl Whereabouts for FixedWhereabouts {
    fn is_traveling(&self) -> bool {
        false
    }

    fn current_location(&self) -> LocationId {
        self.location.clone()
    }
}

/// JSON save file that collects dirty keys and writes on flush.
#[derive(Debug, Clone)]
pub struct SaveFile {
    path: PathBuf,
    dirty: BTreeSet<String>,
    writes: u64,
}

impl SaveFile {
    /// A save file at `path`. Nothing is read or written yet.
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            dirty: BTreeSet::new(),
            writes: 0,
        }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any record changed since the last write.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Number of completed writes.
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    /// Read the save, or `None` if there is no file yet.
    pub fn load(&self) -> Result<Option<SaveData>, SaveError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SaveError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| SaveError::Json {
                path: self.path.clone(),
                source,
            })
    }

    /// Write `data` if anything is dirty. Returns whether a write happened.
    pub fn flush(&mut self, data: &SaveData) -> Result<bool, SaveError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.write(data)?;
        Ok(true)
    }

    /// Write `data` unconditionally, through a temp file and rename.
    pub fn write(&mut self, data: &SaveData) -> Result<(), SaveError> {
        let io_err = |source| SaveError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(data).map_err(|source| SaveError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), keys = ?self.dirty, "Save written");
        self.dirty.clear();
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }
}

impl Persistence for SaveFile {
    fn mark_dirty(&mut self, key: &str) {
        if !self.dirty.contains(key) {
            self.dirty.insert(key.to_owned());
        }
    }
}

/// Every collaborator the controller needs, owned by the host.
#[derive(Debug)]
pub struct Host {
    /// Variant definitions.
    pub registry: InMemoryRegistry,
    /// The player's items.
    pub store: ItemStore,
    /// Simulated device step counter.
    pub pedometer: Pedometer,
    /// Clock driving the loop.
    pub clock: HostClock,
    /// Save file.
    pub save: SaveFile,
    /// Where the player is.
    pub whereabouts: FixedWhereabouts,
}

impl Host {
    /// Build the host from configuration and whatever save exists.
    ///
    /// Returns the persisted session alongside; the caller restores it into
    /// a controller. A fresh save starts from `player.starting_items`.
    pub fn open(config: &EngineConfig) -> Result<(Self, Option<ActivitySession>), SaveError> {
        let save = SaveFile::new(config.save.path.clone());
        let saved = save.load()?;
        match &saved {
            Some(data) => info!(
                path = %save.path().display(),
                has_session = data.session.is_some(),
                item_kinds = data.items.len(),
                "Save loaded"
            ),
            None => info!(path = %save.path().display(), "No save found, starting fresh"),
        }
        let data = saved.unwrap_or_else(|| SaveData {
            items: config.player.starting_items.clone(),
            ..SaveData::default()
        });

        let registry = InMemoryRegistry::from_definitions(config.definitions.iter().cloned());
        for definition in &config.definitions {
            if let Err(err) = stridecraft_activity::validate_variant(definition) {
                warn!(
                    activity_id = %definition.activity_id,
                    variant_id = %definition.variant_id,
                    %err,
                    "Configured definition is invalid and cannot be started"
                );
            }
        }

        let clock = match config.driver.clock {
            ClockMode::System => HostClock::System(SystemClock),
            // Never start a virtual clock behind the last save.
            ClockMode::Simulated => HostClock::Simulated(SimulatedClock::starting_at(
                SystemClock.now_ms().max(data.saved_at_ms),
            )),
        };

        let host = Self {
            registry,
            store: ItemStore::from_items(config.player.carry_capacity, data.items),
            pedometer: Pedometer::new(
                data.pedometer_total,
                config.driver.min_steps_per_frame,
                config.driver.max_steps_per_frame,
                config.driver.seed,
            ),
            clock,
            save,
            whereabouts: FixedWhereabouts::new(config.player.location.clone()),
        };
        Ok((host, data.session))
    }

    /// Lend every collaborator to one controller call.
    pub fn ctx(&mut self) -> ActivityContext<'_> {
        ActivityContext {
            registry: &self.registry,
            inventory: &mut self.store,
            steps: &self.pedometer,
            clock: &self.clock,
            persistence: &mut self.save,
            whereabouts: &self.whereabouts,
        }
    }

    /// Snapshot the persisted state.
    pub fn snapshot(&self, controller: &ActivityController) -> SaveData {
        SaveData {
            session: controller.session().cloned(),
            items: self.store.items().clone(),
            pedometer_total: self.pedometer.current_total_steps(),
            saved_at_ms: self.clock.now_ms(),
        }
    }

    /// Flush the save file if anything is dirty.
    pub fn autosave(&mut self, controller: &ActivityController) -> Result<bool, SaveError> {
        let data = self.snapshot(controller);
        self.save.flush(&data)
    }

    /// Write the save file regardless of dirty state.
    pub fn force_save(&mut self, controller: &ActivityController) -> Result<(), SaveError> {
        let data = self.snapshot(controller);
        self.save.write(&data)?;
        info!(path = %self.save.path().display(), "Final save written");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stridecraft_activity::ACTIVITY_SESSION_KEY;

    use super::*;

    #[test]
    fn simulated_clock_only_moves_when_told() {
        let mut clock = HostClock::Simulated(SimulatedClock::starting_at(1_000));
        assert!(clock.is_simulated());
        clock.advance(250);
        assert_eq!(clock.now_ms(), 1_250);
        clock.advance(u64::MAX);
        assert_eq!(clock.now_ms(), u64::MAX);
    }

    #[test]
    fn system_clock_reads_wall_time() {
        let clock = HostClock::System(SystemClock);
        // Any time after 2020-01-01.
        assert!(clock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn pedometer_is_monotonic_and_seeded() {
        let mut a = Pedometer::new(100, 2, 5, 7);
        let mut b = Pedometer::new(100, 5, 2, 7);
        let mut last = a.current_total_steps();
        for _ in 0..50 {
            let steps = a.walk();
            assert!((2..=5).contains(&steps));
            assert!(a.current_total_steps() >= last);
            last = a.current_total_steps();
            assert_eq!(b.walk(), steps);
        }
        assert_eq!(a.current_total_steps(), b.current_total_steps());
    }

    #[test]
    fn walk_frames_sums_walks() {
        let mut p = Pedometer::new(0, 3, 3, 1);
        assert_eq!(p.walk_frames(4), 12);
        assert_eq!(p.current_total_steps(), 12);
    }

    #[test]
    fn missing_save_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let save = SaveFile::new(dir.path().join("save.json"));
        assert!(save.load().unwrap().is_none());
    }

    #[test]
    fn flush_writes_only_when_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let mut save = SaveFile::new(dir.path().join("save.json"));
        let data = SaveData {
            session: None,
            items: BTreeMap::from([(ItemId::new("copper_ore"), 3)]),
            pedometer_total: 77,
            saved_at_ms: 1_700_000_000_000,
        };

        assert!(!save.flush(&data).unwrap());
        save.mark_dirty(ACTIVITY_SESSION_KEY);
        save.mark_dirty(ACTIVITY_SESSION_KEY);
        assert!(save.flush(&data).unwrap());
        assert!(!save.is_dirty());
        assert_eq!(save.writes(), 1);

        assert_eq!(save.load().unwrap(), Some(data));
        assert!(!dir.path().join("save.json.tmp").exists());
    }

    #[test]
    fn malformed_save_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        fs::write(&path, "{ not json").unwrap();
        let save = SaveFile::new(path);
        assert!(matches!(save.load(), Err(SaveError::Json { .. })));
    }

    #[test]
    fn older_saves_without_pedometer_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        fs::write(&path, r#"{"session": null, "items": {"tin_ore": 2}}"#).unwrap();
        let loaded = SaveFile::new(path).load().unwrap().unwrap();
        assert_eq!(loaded.pedometer_total, 0);
        assert_eq!(loaded.items.get(&ItemId::new("tin_ore")), Some(&2));
    }

    fn config_in(dir: &Path) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.save.path = dir.join("save.json");
        config
    }

    #[test]
    fn fresh_host_uses_starting_items() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let (host, session) = Host::open(&config).unwrap();
        assert!(session.is_none());
        assert_eq!(host.store.quantity_of(&ItemId::new("copper_ore")), 10);
        assert_eq!(host.registry.len(), 2);
        assert_eq!(host.pedometer.current_total_steps(), 0);
    }

    #[test]
    fn reopened_host_restores_save_and_clock() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let far_future = u64::MAX / 2;
        let data = SaveData {
            session: None,
            items: BTreeMap::from([(ItemId::new("bronze_bar"), 4)]),
            pedometer_total: 12_345,
            saved_at_ms: far_future,
        };
        SaveFile::new(config.save.path.clone()).write(&data).unwrap();

        let (host, _) = Host::open(&config).unwrap();
        assert_eq!(host.store.quantity_of(&ItemId::new("bronze_bar")), 4);
        assert_eq!(host.store.quantity_of(&ItemId::new("copper_ore")), 0);
        assert_eq!(host.pedometer.current_total_steps(), 12_345);
        assert_eq!(host.clock.now_ms(), far_future);
    }
}
