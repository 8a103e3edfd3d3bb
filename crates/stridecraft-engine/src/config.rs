//! Configuration loading and typed config structures for the headless host.
//!
//! The configuration lives in `stridecraft.yaml` next to the working
//! directory (or at the path given as the first CLI argument). Every field
//! has a default, so a missing file, an empty file, or a partial file all
//! load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stridecraft_types::{
    ActivityId, ItemId, LocationId, MaterialRequirement, ProgressMode, VariantDefinition,
    VariantId,
};

/// Environment variable overriding `save.path`.
pub const SAVE_PATH_ENV: &str = "STRIDECRAFT_SAVE_PATH";

/// Environment variable overriding `driver.clock`.
pub const CLOCK_ENV: &str = "STRIDECRAFT_CLOCK";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override holds a value the setting cannot take.
    #[error("invalid value {value:?} for {variable}")]
    InvalidOverride {
        /// The environment variable.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level host configuration. Mirrors `stridecraft.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Log level and format.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Frame loop and simulated device settings.
    #[serde(default)]
    pub driver: DriverConfig,

    /// Where the save file lives.
    #[serde(default)]
    pub save: SaveConfig,

    /// Starting player state for a fresh save.
    #[serde(default)]
    pub player: PlayerConfig,

    /// Activity to start when the save has none running.
    #[serde(default = "default_start")]
    pub start: Option<StartConfig>,

    /// Variant definitions forming the registry.
    #[serde(default = "default_definitions")]
    pub definitions: Vec<VariantDefinition>,
}

impl EngineConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override settings from `STRIDECRAFT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for an unknown clock mode.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override settings from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for an unknown clock mode.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup(SAVE_PATH_ENV) {
            self.save.path = PathBuf::from(path);
        }
        if let Some(value) = lookup(CLOCK_ENV) {
            self.driver.clock =
                ClockMode::from_name(&value).ok_or(ConfigError::InvalidOverride {
                    variable: CLOCK_ENV,
                    value,
                })?;
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            driver: DriverConfig::default(),
            save: SaveConfig::default(),
            player: PlayerConfig::default(),
            start: default_start(),
            definitions: default_definitions(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Which clock drives the frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Virtual time: frames run back to back and each advances the clock by
    /// the frame interval.
    #[default]
    Simulated,
    /// Real wall-clock time paced by a tokio interval.
    System,
}

impl ClockMode {
    /// Parse a mode name as written in YAML or the environment.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simulated" => Some(Self::Simulated),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Frame loop and simulated device settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriverConfig {
    /// Clock driving the loop.
    #[serde(default)]
    pub clock: ClockMode,

    /// Milliseconds per frame.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Frames to run before the simulated offline gap.
    #[serde(default = "default_frames")]
    pub frames: u64,

    /// Simulated time away after the frame loop (simulated clock only).
    #[serde(default = "default_offline_gap_ms")]
    pub offline_gap_ms: u64,

    /// Fewest steps the simulated pedometer records per frame.
    #[serde(default)]
    pub min_steps_per_frame: u64,

    /// Most steps the simulated pedometer records per frame.
    #[serde(default = "default_max_steps_per_frame")]
    pub max_steps_per_frame: u64,

    /// Seed for the simulated pedometer.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Flush the save file every N frames (0 disables autosave).
    #[serde(default = "default_autosave_every_frames")]
    pub autosave_every_frames: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            clock: ClockMode::default(),
            frame_interval_ms: default_frame_interval_ms(),
            frames: default_frames(),
            offline_gap_ms: default_offline_gap_ms(),
            min_steps_per_frame: 0,
            max_steps_per_frame: default_max_steps_per_frame(),
            seed: default_seed(),
            autosave_every_frames: default_autosave_every_frames(),
        }
    }
}

/// Save file settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaveConfig {
    /// Path of the JSON save file.
    #[serde(default = "default_save_path")]
    pub path: PathBuf,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            path: default_save_path(),
        }
    }
}

/// Starting player state, used when no save exists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerConfig {
    /// Where the player stands.
    #[serde(default = "default_location")]
    pub location: LocationId,

    /// Maximum total items carried.
    #[serde(default = "default_carry_capacity")]
    pub carry_capacity: u32,

    /// Items in a fresh inventory.
    #[serde(default = "default_starting_items")]
    pub starting_items: BTreeMap<ItemId, u32>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
            carry_capacity: default_carry_capacity(),
            starting_items: default_starting_items(),
        }
    }
}

/// An activity variant to start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartConfig {
    /// Activity to start.
    pub activity: ActivityId,
    /// Variant to start.
    pub variant: VariantId,
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_frame_interval_ms() -> u64 {
    1_000
}

const fn default_frames() -> u64 {
    120
}

const fn default_offline_gap_ms() -> u64 {
    // Eight hours away.
    28_800_000
}

const fn default_max_steps_per_frame() -> u64 {
    3
}

const fn default_seed() -> u64 {
    42
}

const fn default_autosave_every_frames() -> u64 {
    30
}

fn default_save_path() -> PathBuf {
    PathBuf::from("stridecraft-save.json")
}

fn default_location() -> LocationId {
    LocationId::new("lumbridge")
}

const fn default_carry_capacity() -> u32 {
    500
}

fn default_starting_items() -> BTreeMap<ItemId, u32> {
    BTreeMap::from([(ItemId::new("copper_ore"), 10), (ItemId::new("tin_ore"), 10)])
}

fn default_start() -> Option<StartConfig> {
    Some(StartConfig {
        activity: ActivityId::new("mining"),
        variant: VariantId::new("copper_vein"),
    })
}

fn default_definitions() -> Vec<VariantDefinition> {
    vec![
        VariantDefinition {
            activity_id: ActivityId::new("mining"),
            variant_id: VariantId::new("copper_vein"),
            mode: ProgressMode::StepBased,
            action_cost: 10,
            crafting_time_ms: 0,
            primary_resource_id: ItemId::new("copper_ore"),
            output_quantity: 1,
            materials: Vec::new(),
            locations: Vec::new(),
        },
        VariantDefinition {
            activity_id: ActivityId::new("smithing"),
            variant_id: VariantId::new("bronze_bar"),
            mode: ProgressMode::TimeBased,
            action_cost: 0,
            crafting_time_ms: 30_000,
            primary_resource_id: ItemId::new("bronze_bar"),
            output_quantity: 1,
            materials: vec![
                MaterialRequirement::new("copper_ore", 1),
                MaterialRequirement::new("tin_ore", 1),
            ],
            locations: Vec::new(),
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_usable() {
        let config = EngineConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.driver.clock, ClockMode::Simulated);
        assert_eq!(config.save.path, PathBuf::from("stridecraft-save.json"));
        assert_eq!(config.definitions.len(), 2);
        assert!(config.start.is_some());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn parse_minimal_yaml_fills_defaults() {
        let config = EngineConfig::parse("driver:\n  seed: 7\n").unwrap();
        assert_eq!(config.driver.seed, 7);
        assert_eq!(config.driver.frames, 120);
        assert_eq!(config.definitions.len(), 2);
        assert_eq!(
            config.start.unwrap().activity,
            ActivityId::new("mining")
        );
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
logging:
  level: "debug"
  json: true

driver:
  clock: system
  frame_interval_ms: 250
  frames: 10
  offline_gap_ms: 60000
  min_steps_per_frame: 1
  max_steps_per_frame: 4
  seed: 99
  autosave_every_frames: 0

save:
  path: "/tmp/player.json"

player:
  location: "varrock"
  carry_capacity: 28
  starting_items:
    logs: 5

start:
  activity: "firemaking"
  variant: "logs"

definitions:
  - activity_id: "firemaking"
    variant_id: "logs"
    mode: "time_based"
    crafting_time_ms: 3000
    primary_resource_id: "ashes"
    materials:
      - item_id: "logs"
        quantity: 1
    locations: ["varrock"]
"#;
        let config = EngineConfig::parse(yaml).unwrap();
        assert!(config.logging.json);
        assert_eq!(config.driver.clock, ClockMode::System);
        assert_eq!(config.driver.frame_interval_ms, 250);
        assert_eq!(config.save.path, PathBuf::from("/tmp/player.json"));
        assert_eq!(config.player.carry_capacity, 28);
        assert_eq!(config.player.starting_items.get(&ItemId::new("logs")), Some(&5));
        assert_eq!(config.definitions.len(), 1);
        let def = &config.definitions[0];
        assert_eq!(def.mode, ProgressMode::TimeBased);
        assert_eq!(def.output_quantity, 1);
        assert_eq!(def.materials.len(), 1);
    }

    #[test]
    fn null_start_disables_autostart() {
        let config = EngineConfig::parse("start: null\n").unwrap();
        assert!(config.start.is_none());
    }

    #[test]
    fn overrides_replace_save_path_and_clock() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| match key {
                SAVE_PATH_ENV => Some("/var/lib/stride/save.json".to_owned()),
                CLOCK_ENV => Some("System".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.save.path, PathBuf::from("/var/lib/stride/save.json"));
        assert_eq!(config.driver.clock, ClockMode::System);
    }

    #[test]
    fn unknown_clock_override_is_rejected() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides(|key| (key == CLOCK_ENV).then(|| "sundial".to_owned()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride { variable: CLOCK_ENV, .. })
        ));
        assert_eq!(config.driver.clock, ClockMode::Simulated);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("stridecraft.yaml");
        if path.exists() {
            let config = EngineConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
