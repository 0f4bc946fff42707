//! Configuration loading and typed config structures for the Township
//! simulation.
//!
//! The canonical configuration lives in `township-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every section and field has a default, so an empty file is a valid
//! configuration for the built-in sample town.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;
use township_agents::{AgentProfile, CognitiveConfig};
use township_types::TilePos;
use township_types::time::parse_sim_time;
use township_world::SAMPLE_FALLBACK_ADDRESS;

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

    /// A value parsed but is out of range or inconsistent.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `township-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run identity and timing.
    #[serde(default)]
    pub simulation: SimulationSection,

    /// World definition source.
    #[serde(default)]
    pub world: WorldSection,

    /// Cognitive parameters shared by every agent.
    #[serde(default)]
    pub agent: CognitiveConfig,

    /// Oracle call policy.
    #[serde(default)]
    pub oracle: OracleSection,

    /// Where movement records and snapshots are written.
    #[serde(default)]
    pub output: OutputSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Agents to spawn at simulation start.
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.seconds_per_step == 0 {
            return Err(ConfigError::invalid(
                "simulation.seconds_per_step",
                "must be at least 1",
            ));
        }
        self.simulation.parsed_start_time()?;
        let decay = self.agent.recency_decay;
        if decay.is_nan() || decay <= 0.0 || decay >= 1.0 {
            return Err(ConfigError::invalid(
                "agent.recency_decay",
                format!("{decay} is outside (0, 1)"),
            ));
        }
        if self.oracle.max_retries == 0 {
            return Err(ConfigError::invalid("oracle.max_retries", "must be at least 1"));
        }
        let mut names = BTreeSet::new();
        for seed in &self.agents {
            if seed.profile.name.trim().is_empty() {
                return Err(ConfigError::invalid("agents.name", "must not be empty"));
            }
            if !names.insert(seed.profile.name.as_str()) {
                return Err(ConfigError::invalid(
                    "agents.name",
                    format!("duplicate agent {}", seed.profile.name),
                ));
            }
        }
        Ok(())
    }
}

/// Run identity and timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSection {
    /// Human-readable simulation name.
    #[serde(default = "default_simulation_name")]
    pub name: String,

    /// Random seed for target sampling and focus selection.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Simulation time of step 0, e.g. `"February 13, 2023, 00:00:00"`.
    #[serde(default = "default_start_time")]
    pub start_time: String,

    /// Simulated seconds per step.
    #[serde(default = "default_seconds_per_step")]
    pub seconds_per_step: u32,

    /// Steps to run before stopping (0 = unbounded).
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Real-time milliseconds to sleep between steps.
    #[serde(default)]
    pub tick_interval_ms: u64,
}

impl SimulationSection {
    /// The start time as a timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `start_time` does not match the
    /// simulation time format.
    pub fn parsed_start_time(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_sim_time(&self.start_time)
            .map_err(|e| ConfigError::invalid("simulation.start_time", e.to_string()))
    }
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            name: default_simulation_name(),
            seed: default_seed(),
            start_time: default_start_time(),
            seconds_per_step: default_seconds_per_step(),
            max_steps: default_max_steps(),
            tick_interval_ms: 0,
        }
    }
}

/// World definition source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldSection {
    /// JSON world definition; the built-in sample town when absent.
    #[serde(default)]
    pub definition_path: Option<PathBuf>,

    /// Address walked to when an action address is not in the world.
    #[serde(default = "default_fallback_address")]
    pub fallback_address: String,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            definition_path: None,
            fallback_address: default_fallback_address(),
        }
    }
}

/// Oracle call policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OracleSection {
    /// Attempts per request before the fallback answer is used.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Length of vectors produced by the offline hash embedding.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputSection {
    /// Directory for per-step movement files and the compressed log.
    #[serde(default = "default_movement_dir")]
    pub movement_dir: PathBuf,

    /// Snapshot written when the run ends.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Whether to write one movement file per step in addition to the
    /// compressed log.
    #[serde(default)]
    pub per_step_files: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            movement_dir: default_movement_dir(),
            snapshot_path: default_snapshot_path(),
            per_step_files: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSection {
    /// Default filter directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

/// One agent to spawn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentSeed {
    /// Identity sheet; `name` is required.
    #[serde(flatten)]
    pub profile: AgentProfile,

    /// Spawn location name, looked up under the spawn prefix.
    #[serde(default)]
    pub spawn_location: Option<String>,

    /// Explicit starting tile; wins over `spawn_location`.
    #[serde(default)]
    pub tile: Option<TilePos>,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_simulation_name() -> String {
    "township".to_owned()
}

const fn default_seed() -> u64 {
    42
}

fn default_start_time() -> String {
    "February 13, 2023, 00:00:00".to_owned()
}

const fn default_seconds_per_step() -> u32 {
    10
}

const fn default_max_steps() -> u64 {
    360
}

fn default_fallback_address() -> String {
    SAMPLE_FALLBACK_ADDRESS.to_owned()
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_embedding_dimensions() -> usize {
    64
}

fn default_movement_dir() -> PathBuf {
    PathBuf::from("output/movement")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("output/snapshot.json")
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.seconds_per_step, 10);
        assert_eq!(config.agent.vision_radius, 4);
        assert_eq!(config.world.fallback_address, SAMPLE_FALLBACK_ADDRESS);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
simulation:
  name: "cafe day"
  seed: 7
  start_time: "February 13, 2023, 07:00:00"
  seconds_per_step: 60
  max_steps: 120
  tick_interval_ms: 0

world:
  definition_path: "worlds/oakhaven.json"
  fallback_address: "oakhaven:main street:street"

agent:
  vision_radius: 6
  attention_bandwidth: 2
  recency_decay: 0.95

oracle:
  max_retries: 2

output:
  movement_dir: "out/moves"
  per_step_files: true

logging:
  level: "debug"
  format: json

agents:
  - name: "Isabella Rodriguez"
    age: 34
    innate: "friendly, outgoing"
    spawn_location: "hobbs cafe"
  - name: "Klaus Mueller"
    tile: { x: 20, y: 3 }
"#;
        let config = SimulationConfig::parse(yaml).unwrap();

        assert_eq!(config.simulation.name, "cafe day");
        assert_eq!(config.simulation.seconds_per_step, 60);
        assert_eq!(
            config.world.definition_path,
            Some(PathBuf::from("worlds/oakhaven.json"))
        );
        assert_eq!(config.agent.vision_radius, 6);
        assert_eq!(config.agent.retention, 5);
        assert_eq!(config.oracle.max_retries, 2);
        assert!(config.output.per_step_files);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.agents.len(), 2);
        let isabella = config.agents.first().unwrap();
        assert_eq!(isabella.profile.age, 34);
        assert_eq!(isabella.spawn_location.as_deref(), Some("hobbs cafe"));
        assert_eq!(config.agents.get(1).unwrap().tile, Some(TilePos::new(20, 3)));
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("simulation:\n  seed: 9\n").unwrap();
        assert_eq!(config.simulation.seed, 9);
        assert_eq!(config.simulation.max_steps, 360);
        assert!(config.agents.is_empty());
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let bad_time = "simulation:\n  start_time: \"yesterday\"\n";
        assert!(matches!(
            SimulationConfig::parse(bad_time),
            Err(ConfigError::Invalid { .. })
        ));
        let bad_decay = "agent:\n  recency_decay: 1.5\n";
        assert!(SimulationConfig::parse(bad_decay).is_err());
        let duplicate = "agents:\n  - name: A\n  - name: A\n";
        assert!(SimulationConfig::parse(duplicate).is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("township-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
