//! CLI command implementations for cgpevo.

pub(crate) mod evolve;
pub(crate) mod inspect;
pub(crate) mod run;
pub(crate) mod validate;

use cgpevo::config::{ConfigError, InstructionSetKind};
use cgpevo::evolution::{Environment, IslandSystem, Population};
use cgpevo::persistence::{self, RecordKind};
use cgpevo::{Function, InstructionSet, LoadError};
use clap::ValueEnum;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

/// Instruction set for records that do not carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SetArg {
    /// Pure arithmetic opcodes.
    Arithmetic,
    /// Pure arithmetic plus ADF calls.
    ArithmeticWithAdf,
    /// Every opcode except ADF calls.
    Full,
    /// Every opcode.
    WithAdf,
}

impl SetArg {
    pub(crate) fn build(self) -> InstructionSet {
        let kind = match self {
            Self::Arithmetic => InstructionSetKind::Arithmetic,
            Self::ArithmeticWithAdf => InstructionSetKind::ArithmeticWithAdf,
            Self::Full => InstructionSetKind::Full,
            Self::WithAdf => InstructionSetKind::WithAdf,
        };
        kind.build()
    }
}

/// Any structure read from a saved file.
#[derive(Debug)]
pub(crate) enum Loaded {
    Function(Function),
    Population(Box<Population>),
    Environment(Box<Environment>),
    Islands(IslandSystem),
}

impl Loaded {
    /// Read a saved file of any kind.
    pub(crate) fn read(path: &Path) -> Result<Self, CliError> {
        let bytes = fs::read(path)
            .map_err(|e| CliError::new(format!("Failed to read {}: {e}", path.display())))?;
        let loaded = match persistence::record_kind(bytes.as_slice())? {
            RecordKind::Function => Self::Function(persistence::load_function(bytes.as_slice())?),
            RecordKind::Population => {
                Self::Population(Box::new(persistence::load_population(bytes.as_slice())?))
            }
            RecordKind::Environment => {
                Self::Environment(Box::new(persistence::load_environment(bytes.as_slice())?))
            }
            RecordKind::Islands => Self::Islands(persistence::load_islands(bytes.as_slice())?),
        };
        Ok(loaded)
    }

    /// Populations held by the record, in order.
    pub(crate) fn populations(&self) -> Vec<&Population> {
        match self {
            Self::Function(_) => Vec::new(),
            Self::Population(p) => vec![p.as_ref()],
            Self::Environment(e) => vec![e.population()],
            Self::Islands(s) => s.islands().iter().collect(),
        }
    }

    /// The function to run: the record itself, or the fittest individual,
    /// with the instruction set it evolved under.
    pub(crate) fn champion(&self, fallback: SetArg) -> Option<(Function, InstructionSet)> {
        if let Self::Function(f) = self {
            return Some((f.clone(), fallback.build()));
        }
        self.populations()
            .into_iter()
            .filter_map(|p| p.best().map(|b| (p, b)))
            .reduce(|a, b| if b.1.fitness > a.1.fitness { b } else { a })
            .map(|(p, b)| (b.function.clone(), p.set().as_ref().clone()))
    }
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        Self::new(format!("load failed (code {}): {e}", e.code()))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(e.to_string())
    }
}
