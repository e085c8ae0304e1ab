//! Run configuration loaded from TOML.
//!
//! Every table is optional; missing tables and keys fall back to their
//! defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [run]
//! seed = 42
//! generations = 200
//!
//! [population]
//! size = 100
//! crossover_rate = 0.7
//!
//! [population.shape]
//! sensors = 1
//! rows = 4
//! columns = 8
//!
//! [islands]
//! islands = 8
//! migration_interval = 20
//! ```

use crate::cgp::InstructionSet;
use crate::evolution::{EnvironmentConfig, IslandConfig, PopulationConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Failure while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    /// File is not valid TOML for [`Config`].
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Function shape has no sensors to feed the first column.
    #[error("invalid config: population.shape.sensors must be at least 1")]
    NoSensors,
}

/// Which instruction set a run evolves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionSetKind {
    /// Pure arithmetic opcodes.
    #[default]
    Arithmetic,
    /// Pure arithmetic plus ADF calls.
    ArithmeticWithAdf,
    /// Every opcode except ADF calls.
    Full,
    /// Every opcode.
    WithAdf,
}

impl InstructionSetKind {
    /// Build the set.
    #[must_use]
    pub fn build(self) -> InstructionSet {
        match self {
            Self::Arithmetic => InstructionSet::arithmetic(),
            Self::ArithmeticWithAdf => InstructionSet::arithmetic_with_adf(),
            Self::Full => InstructionSet::full(),
            Self::WithAdf => InstructionSet::with_adf(),
        }
    }
}

/// Parameters of one evolutionary run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Master seed.
    pub seed: u32,
    /// Generations to evolve.
    pub generations: usize,
    /// Interpreter steps per fitness case.
    pub time_steps: usize,
    /// Opcodes available to evolution.
    pub instruction_set: InstructionSetKind,
    /// Generations between checkpoints. Zero saves only at the end.
    pub save_interval: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            generations: 100,
            time_steps: 1,
            instruction_set: InstructionSetKind::default(),
            save_interval: 0,
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run parameters.
    pub run: RunConfig,
    /// Per-island population parameters.
    pub population: PopulationConfig,
    /// Island system parameters.
    pub islands: IslandConfig,
    /// Steady-state environment parameters.
    pub environment: EnvironmentConfig,
}

impl Config {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this structure or
    /// the function shape has no sensors.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.population.shape.sensors == 0 {
            return Err(ConfigError::NoSensors);
        }
        log::debug!("loaded config: {config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = Config::parse(
            r#"
            [run]
            seed = 7
            instruction_set = "with_adf"

            [population]
            size = 20

            [population.shape]
            rows = 3
            adf_modules = 2

            [islands]
            migrants = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.run.seed, 7);
        assert_eq!(config.run.generations, RunConfig::default().generations);
        assert_eq!(config.run.instruction_set, InstructionSetKind::WithAdf);
        assert_eq!(config.population.size, 20);
        assert_eq!(config.population.shape.rows, 3);
        assert_eq!(config.population.shape.adf_modules, 2);
        assert_eq!(
            config.population.shape.columns,
            PopulationConfig::default().shape.columns
        );
        assert_eq!(config.islands.migrants, 3);
        assert_eq!(config.islands.islands, IslandConfig::default().islands);
        assert!(config.run.instruction_set.build().supports_adf());
    }

    #[test]
    fn test_unknown_set_is_error() {
        let err = Config::parse("[run]\ninstruction_set = \"bogus\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_sensorless_shape_is_error() {
        let err = Config::parse("[population.shape]\nsensors = 0").unwrap_err();
        assert!(matches!(err, ConfigError::NoSensors));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\ngenerations = 3").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.run.generations, 3);
        assert!(Config::load(Path::new("/nonexistent/cgpevo.toml")).is_err());
    }
}
