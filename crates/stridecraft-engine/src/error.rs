//! Error types for the headless host binary.
//!
//! [`EngineError`] wraps every failure mode during startup, the frame loop,
//! and shutdown so `main` can propagate with `?`.

use stridecraft_activity::ActivityError;

use crate::config::ConfigError;
use crate::host::SaveError;

/// Top-level error for the host binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Reading or writing the save file failed.
    #[error("save error: {source}")]
    Save {
        /// The underlying save error.
        #[from]
        source: SaveError,
    },

    /// The activity engine rejected an operation the host cannot skip.
    #[error("activity error: {source}")]
    Activity {
        /// The underlying activity error.
        #[from]
        source: ActivityError,
    },

    /// The blocking resume task panicked or was cancelled.
    #[error("resume task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
