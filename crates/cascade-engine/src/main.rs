//! Run driver for the Cascade pipeline.
//!
//! Loads configuration, installs logging, and runs the toy cascade source
//! through the analysis pass and the configured sinks.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or from
//!    `cascade-config.yaml` in the working directory (defaults when absent)
//! 2. Initialize structured logging (tracing)
//! 3. Create the output directory and build the seeded toy event source
//! 4. Run the event loop
//! 5. Log the end-of-run report

mod error;
mod toy;

use std::path::{Path, PathBuf};

use cascade_core::config::LoggingConfig;
use cascade_core::{CascadeConfig, runner};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::toy::ToyCascadeSource;

/// Configuration file looked up in the working directory.
const DEFAULT_CONFIG: &str = "cascade-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the run fails.
fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging is configured from it, so nothing is
    //    logged until it is known.
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, loaded_from) = load_config(explicit)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("cascade-engine starting");
    if loaded_from.is_none() {
        info!("Config file not found, using defaults");
    }
    info!(
        path = ?loaded_from,
        events = config.run.events,
        seed = config.run.seed,
        a1_mass = config.run.a1_mass,
        energy_tev = config.run.energy_tev,
        accumulate = config.output.accumulate,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.output.directory).map_err(|source| EngineError::OutputDir {
        path: config.output.directory.clone(),
        source,
    })?;
    let plan = config.sink_plan();
    info!(
        hepmc = ?plan.hepmc,
        lhe = ?plan.lhe,
        accumulator = ?plan.accumulator,
        "Output sinks"
    );

    // 3. Build the event source.
    let mut source = ToyCascadeSource::new(&config.run);

    // 4. Run.
    let summary = runner::run(&config, &mut source)?;

    // 5. Report.
    runner::log_run_end(&summary);
    Ok(())
}

/// Load the configuration. An explicit path must exist; the default file is
/// optional.
fn load_config(explicit: Option<PathBuf>) -> Result<(CascadeConfig, Option<PathBuf>), EngineError> {
    if let Some(path) = explicit {
        let config = CascadeConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }
    let config_path = Path::new(DEFAULT_CONFIG);
    if config_path.exists() {
        let config = CascadeConfig::from_file(config_path)?;
        Ok((config, Some(config_path.to_path_buf())))
    } else {
        // Parsing an empty document applies the environment overrides.
        Ok((CascadeConfig::parse("")?, None))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
