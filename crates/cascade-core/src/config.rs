//! Configuration loading and typed config structures for a Cascade run.
//!
//! The canonical configuration lives in `cascade-config.yaml` at the project
//! root. Every field has a default, so an empty document (or a missing file,
//! at the binary's discretion) describes a valid run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cascade_accumulator::{Binning, FillMode};
use cascade_sinks::SinkPlan;
use serde::Deserialize;

/// Environment variable that overrides `output.directory`.
pub const OUTPUT_DIR_ENV: &str = "CASCADE_OUTPUT_DIR";

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

    /// The document parsed but describes an unusable run.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CascadeConfig {
    /// Generation parameters (event count, seed, card, masses).
    #[serde(default)]
    pub run: RunConfig,

    /// Selection parameters for the analysis pass.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Per-collection binning overrides, keyed by collection name. Axes of a
    /// two-dimensional collection are addressed as `<name>.x` and `<name>.y`.
    #[serde(default)]
    pub histograms: BTreeMap<String, Binning>,

    /// Output sinks and accumulation switch.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CascadeConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CASCADE_OUTPUT_DIR` overrides `output.directory` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.output.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.progress_every == 0 {
            return Err(ConfigError::Invalid {
                message: "logging.progress_every must be at least 1".to_owned(),
            });
        }
        if self.analysis.same_sign_expansion && self.analysis.same_sign_species.is_empty() {
            return Err(ConfigError::Invalid {
                message: "analysis.same_sign_species is empty but same_sign_expansion is on"
                    .to_owned(),
            });
        }
        if !(self.run.energy_tev.is_finite() && self.run.energy_tev > 0.0) {
            return Err(ConfigError::Invalid {
                message: format!("run.energy_tev must be positive, got {}", self.run.energy_tev),
            });
        }
        Ok(())
    }

    /// Output file stem used when a sink has no explicit name:
    /// `<card-stem>_ma1_<mass>_<energy>TeV_n<events>_seed<seed>`.
    pub fn default_stem(&self) -> String {
        let card = Path::new(&self.run.card)
            .file_stem()
            .map_or_else(|| "cascade".to_owned(), |s| s.to_string_lossy().into_owned());
        format!(
            "{card}_ma1_{}_{}TeV_n{}_seed{}",
            self.run.a1_mass, self.run.energy_tev, self.run.events, self.run.seed
        )
    }

    /// Resolve the enabled sinks into destination paths.
    pub fn sink_plan(&self) -> SinkPlan {
        let stem = self.default_stem();
        let out = &self.output;
        let resolve = |name: Option<&String>, extension: &str| {
            let name = name.map_or_else(|| stem.clone(), Clone::clone);
            out.directory.join(with_extension(name, extension))
        };
        SinkPlan {
            hepmc: out.hepmc.then(|| resolve(out.hepmc_name.as_ref(), "hepmc")),
            lhe: out.lhe.then(|| resolve(out.lhe_name.as_ref(), "lhe")),
            accumulator: out
                .accumulator
                .then(|| resolve(out.accumulator_name.as_ref(), "json")),
        }
    }

    /// Fill mode of the accumulator registry.
    pub const fn fill_mode(&self) -> FillMode {
        if self.output.accumulate {
            FillMode::Enabled
        } else {
            FillMode::Disabled
        }
    }
}

/// Append `.<extension>` unless `name` already ends with it (case-insensitive).
fn with_extension(name: String, extension: &str) -> String {
    let suffix = format!(".{extension}");
    if name.to_lowercase().ends_with(&suffix) {
        name
    } else {
        name + &suffix
    }
}

/// Generation parameters. Also used to build the default output names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Number of events to request from the source.
    #[serde(default = "default_events")]
    pub events: u64,

    /// Random seed for the event source.
    #[serde(default)]
    pub seed: u64,

    /// Generator card; its file stem names the output files.
    #[serde(default = "default_card")]
    pub card: String,

    /// Mass of the mediator in GeV.
    #[serde(default = "default_a1_mass")]
    pub a1_mass: f64,

    /// Centre-of-mass energy in TeV.
    #[serde(default = "default_energy_tev")]
    pub energy_tev: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            events: default_events(),
            seed: 0,
            card: default_card(),
            a1_mass: default_a1_mass(),
            energy_tev: default_energy_tev(),
        }
    }
}

/// Selection parameters for the analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisConfig {
    /// Species of the anchor, matched on absolute value.
    #[serde(default = "default_anchor_pdg_id")]
    pub anchor_pdg_id: i32,

    /// Generator status the anchor must carry.
    #[serde(default = "default_anchor_status")]
    pub anchor_status: i32,

    /// Species of the mediators among the anchor's children (exact match).
    #[serde(default = "default_mediator_pdg_id")]
    pub mediator_pdg_id: i32,

    /// Whether to run the same-sign group expansion.
    #[serde(default)]
    pub same_sign_expansion: bool,

    /// Species (absolute PDG id) eligible for the same-sign groups.
    #[serde(default = "default_same_sign_species")]
    pub same_sign_species: Vec<i32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            anchor_pdg_id: default_anchor_pdg_id(),
            anchor_status: default_anchor_status(),
            mediator_pdg_id: default_mediator_pdg_id(),
            same_sign_expansion: false,
            same_sign_species: default_same_sign_species(),
        }
    }
}

/// Output sinks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct OutputConfig {
    /// Directory that relative output names are resolved against.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Stream events as HepMC text.
    #[serde(default)]
    pub hepmc: bool,

    /// HepMC file name; defaults to the run stem.
    #[serde(default)]
    pub hepmc_name: Option<String>,

    /// Stream events as an LHE file.
    #[serde(default)]
    pub lhe: bool,

    /// LHE file name; defaults to the run stem.
    #[serde(default)]
    pub lhe_name: Option<String>,

    /// Persist the accumulator registry at the end of the run.
    #[serde(default = "default_true")]
    pub accumulator: bool,

    /// Accumulator file name; defaults to the run stem.
    #[serde(default)]
    pub accumulator_name: Option<String>,

    /// Whether the registry records fills at all.
    #[serde(default = "default_true")]
    pub accumulate: bool,
}

impl OutputConfig {
    /// Override the output directory from `CASCADE_OUTPUT_DIR` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(OUTPUT_DIR_ENV) {
            self.directory = PathBuf::from(val);
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            hepmc: false,
            hepmc_name: None,
            lhe: false,
            lhe_name: None,
            accumulator: true,
            accumulator_name: None,
            accumulate: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log a progress line every N events.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,

    /// Dump the full listing of the first N events at debug level.
    #[serde(default = "default_print_events")]
    pub print_events: u64,

    /// Emit log lines as JSON objects instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            progress_every: default_progress_every(),
            print_events: default_print_events(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_events() -> u64 {
    1
}

fn default_card() -> String {
    "cards/hToAA.cmnd".to_owned()
}

const fn default_a1_mass() -> f64 {
    15.0
}

const fn default_energy_tev() -> f64 {
    13.0
}

const fn default_anchor_pdg_id() -> i32 {
    25
}

const fn default_anchor_status() -> i32 {
    -62
}

const fn default_mediator_pdg_id() -> i32 {
    36
}

fn default_same_sign_species() -> Vec<i32> {
    vec![13]
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_progress_every() -> u64 {
    50
}

const fn default_print_events() -> u64 {
    2
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CascadeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.anchor_pdg_id, 25);
        assert_eq!(config.analysis.anchor_status, -62);
        assert_eq!(config.analysis.mediator_pdg_id, 36);
        assert_eq!(config.analysis.same_sign_species, vec![13]);
        assert_eq!(config.logging.progress_every, 50);
        assert_eq!(config.fill_mode(), FillMode::Enabled);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
run:
  events: 500
  seed: 7
  card: cards/hToAA_mutau.cmnd
  a1_mass: 9
  energy_tev: 8

analysis:
  same_sign_expansion: true
  same_sign_species: [11, 13]

histograms:
  hPt: { bins: 50, low: 0.0, high: 250.0 }
  a1DecayDrVsPt.x: { bins: 10, low: 0.0, high: 1.0 }

output:
  directory: /tmp/cascade
  hepmc: true
  lhe: true
  lhe_name: sample.LHE
  accumulate: false

logging:
  level: debug
  progress_every: 10
  print_events: 0
  json: true
";
        let config = CascadeConfig::parse(yaml).unwrap();
        assert_eq!(config.run.events, 500);
        assert!(config.analysis.same_sign_expansion);
        assert_eq!(config.histograms.get("hPt"), Some(&Binning::new(50, 0.0, 250.0)));
        assert!(config.histograms.contains_key("a1DecayDrVsPt.x"));
        assert_eq!(config.fill_mode(), FillMode::Disabled);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(CascadeConfig::parse("").is_ok());
    }

    #[test]
    fn zero_progress_interval_is_rejected() {
        let err = CascadeConfig::parse("logging:\n  progress_every: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn default_stem_follows_run_parameters() {
        let config = CascadeConfig::parse(
            "run:\n  events: 1000\n  seed: 3\n  card: cards/hToAA_mumu.cmnd\n  a1_mass: 15\n",
        )
        .unwrap();
        assert_eq!(config.default_stem(), "hToAA_mumu_ma1_15_13TeV_n1000_seed3");
    }

    #[test]
    fn sink_plan_adds_missing_extensions_only() {
        let mut config = CascadeConfig::default();
        config.output.directory = PathBuf::from("/data");
        config.output.hepmc = true;
        config.output.hepmc_name = Some("events".to_owned());
        config.output.lhe = true;
        config.output.lhe_name = Some("events.LHE".to_owned());

        let plan = config.sink_plan();
        assert_eq!(plan.hepmc, Some(PathBuf::from("/data/events.hepmc")));
        assert_eq!(plan.lhe, Some(PathBuf::from("/data/events.LHE")));
        let stem = config.default_stem();
        assert_eq!(plan.accumulator, Some(PathBuf::from(format!("/data/{stem}.json"))));
    }

    #[test]
    fn disabled_sinks_are_absent_from_the_plan() {
        let mut config = CascadeConfig::default();
        config.output.accumulator = false;
        assert_eq!(config.sink_plan(), SinkPlan::default());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("cascade-config.yaml");
        if path.exists() {
            let config = CascadeConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
