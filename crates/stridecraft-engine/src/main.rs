//! Headless Stridecraft host.
//!
//! Wires the activity engine to a simulated device: it loads
//! configuration, restores the save, catches the running session up on
//! time spent away, drives live frames, simulates another stretch away,
//! and saves on the way out.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `stridecraft.yaml` (or the first CLI argument)
//! 2. Initialize structured logging (tracing)
//! 3. Build the host: registry, item store, clock, pedometer, save file
//! 4. Restore the saved session and catch it up (resume hook)
//! 5. Start the configured activity if nothing is running
//! 6. Run the frame loop
//! 7. Simulate time away and run the resume hook again
//! 8. Write the final save and log a summary

mod config;
mod driver;
mod error;
mod host;

use std::path::{Path, PathBuf};

use stridecraft_activity::ActivityController;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{EngineConfig, LoggingConfig, StartConfig};
use crate::error::EngineError;
use crate::host::Host;

/// Config file read when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "stridecraft.yaml";

/// Application entry point for the headless host.
///
/// # Errors
///
/// Returns an error if configuration, the save file, or the resume task
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("stridecraft-engine starting");
    info!(
        path = %config_path.display(),
        from_file,
        clock = ?config.driver.clock,
        definitions = config.definitions.len(),
        save_path = %config.save.path.display(),
        "Configuration loaded"
    );

    // 3. Build the host.
    let (host, saved_session) = Host::open(&config).map_err(EngineError::from)?;

    // 4. Restore and catch up.
    let controller = ActivityController::restore(saved_session);
    let (mut controller, mut host, _) = driver::resume_offline(controller, host).await?;

    // 5. Start the configured activity.
    if let Some(start) = &config.start {
        start_configured(&mut controller, &mut host, start);
    }

    // 6. Run frames.
    let summary = driver::run_frames(&mut controller, &mut host, &config.driver).await?;

    // 7. Time away, then catch up again.
    driver::simulate_offline_gap(&mut host, &config.driver);
    let (controller, mut host, _) = driver::resume_offline(controller, host).await?;

    // 8. Final save and summary.
    host.force_save(&controller).map_err(EngineError::from)?;

    info!(
        frames = summary.frames,
        live_completed = summary.completed,
        live_produced = summary.produced,
        active = controller.has_active(),
        progress = ?controller.progress_fraction(&host.registry),
        elapsed_ms = ?controller.elapsed_ms(&host.clock),
        items = ?host.store.items(),
        save_writes = host.save.writes(),
        "stridecraft-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `path`, falling back to defaults if it is
/// missing. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(EngineConfig, bool), EngineError> {
    if path.exists() {
        Ok((EngineConfig::from_file(path)?, true))
    } else {
        let mut config = EngineConfig::default();
        config.apply_env_overrides()?;
        Ok((config, false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Start the configured variant unless a restored session is still running.
///
/// A rejected start is logged; the host keeps running idle.
fn start_configured(controller: &mut ActivityController, host: &mut Host, start: &StartConfig) {
    if controller.has_active() {
        info!("Restored session still running, not starting configured activity");
        return;
    }
    match controller.start(&mut host.ctx(), &start.activity, &start.variant) {
        Ok(report) => info!(
            session_id = %report.session_id,
            mode = %report.mode,
            "Configured activity started"
        ),
        Err(err) => warn!(
            activity_id = %start.activity,
            variant_id = %start.variant,
            %err,
            "Configured activity could not start"
        ),
    }
}
