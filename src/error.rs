//! Error types for validation, ADF compression and loading.
//!
//! None of these are fatal to the engine. Each one is a value the caller
//! branches on: discard or repair an invalid genome, skip a failed
//! compression, or drop a partially loaded structure.

use thiserror::Error;

/// Structural defect found by [`Function::validate`](crate::cgp::Function::validate).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    /// Opcode not in the instruction set.
    #[error("module {module} cell {cell}: opcode {code} is not in the instruction set")]
    InvalidOpcode {
        /// Module index.
        module: usize,
        /// Cell index.
        cell: usize,
        /// Offending opcode code.
        code: i32,
    },
    /// ADF call inside a submodule.
    #[error("module {module} cell {cell}: ADF call inside a submodule")]
    NestedAdf {
        /// Module index.
        module: usize,
        /// Cell index.
        cell: usize,
    },
    /// ADF call in a function without submodules.
    #[error("module {module} cell {cell}: ADF call without any submodule")]
    MissingAdfModule {
        /// Module index.
        module: usize,
        /// Cell index.
        cell: usize,
    },
    /// Cell connection outside `[0, sensors + cells)`.
    #[error("module {module} cell {cell}: connection {connection} = {value} out of range")]
    ConnectionOutOfRange {
        /// Module index.
        module: usize,
        /// Cell index.
        cell: usize,
        /// Connection slot.
        connection: usize,
        /// Stored value.
        value: f32,
    },
    /// Actuator source outside `[0, sensors + cells)`.
    #[error("module {module} actuator {actuator}: source {value} out of range")]
    ActuatorOutOfRange {
        /// Module index.
        module: usize,
        /// Actuator index.
        actuator: usize,
        /// Stored value.
        value: f32,
    },
    /// Constant outside `[-MAX_CONSTANT, MAX_CONSTANT]`.
    #[error("module {module} cell {cell}: constant {value} out of range")]
    ConstantOutOfRange {
        /// Module index.
        module: usize,
        /// Cell index.
        cell: usize,
        /// Stored value.
        value: f32,
    },
    /// Gene, used or state array has the wrong length for the layout.
    #[error("module {module}: expected {expected} entries, found {found}")]
    GenomeLength {
        /// Module index.
        module: usize,
        /// Length implied by the layout.
        expected: usize,
        /// Actual length.
        found: usize,
    },
    /// Cells have connections but nothing in column 0 can feed them.
    #[error("module {module}: connected cells without any sensor")]
    NoSensors {
        /// Module index.
        module: usize,
    },
    /// Grid larger than the node ceiling.
    #[error("module {module}: {nodes} cells exceed the node limit")]
    TooManyNodes {
        /// Module index.
        module: usize,
        /// Cell count.
        nodes: usize,
    },
    /// More submodules than calls can address.
    #[error("{count} ADF modules exceed the limit")]
    TooManyAdfModules {
        /// Submodule count.
        count: usize,
    },
    /// Submodule shape does not match what a call passes.
    #[error("module {module}: ADF shape mismatch (sensors {sensors}, expected {expected})")]
    AdfArgumentMismatch {
        /// Module index.
        module: usize,
        /// Declared sensor count.
        sensors: usize,
        /// Arguments a call passes.
        expected: usize,
    },
}

/// Reason an ADF compression was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompressError {
    /// Every ADF slot is in use, or there are none.
    #[error("no ADF module available")]
    NoModuleAvailable,
    /// The target is not a live, movable cell.
    #[error("no live genes found at the target")]
    NoGenes,
    /// Subgraph smaller than the configured minimum.
    #[error("{found} genes is below the minimum of {min}")]
    TooFewGenes {
        /// Genes collected.
        found: usize,
        /// Configured minimum.
        min: usize,
    },
    /// Subgraph larger than the configured maximum or the ADF grid.
    #[error("{found} genes exceeds the maximum of {max}")]
    TooManyGenes {
        /// Genes collected.
        found: usize,
        /// Effective maximum.
        max: usize,
    },
    /// Subgraph has no external inputs.
    #[error("subgraph has no external inputs")]
    NoInputs,
    /// More external inputs than the submodule has sensors.
    #[error("{found} external inputs exceed the ADF capacity of {max}")]
    TooManyInputs {
        /// Inputs collected.
        found: usize,
        /// Submodule sensor count.
        max: usize,
    },
    /// A collected cell reads a value computed later in the pass.
    #[error("subgraph contains a forward reference")]
    ForwardReference,
    /// A host cell reads, copies or overwrites a gene or state the
    /// rewrite would change.
    #[error("subgraph genes are referenced by another cell")]
    GeneReference,
}

impl CompressError {
    /// Stable negative code for this failure.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::NoModuleAvailable => -1,
            Self::NoGenes => -2,
            Self::TooFewGenes { .. } => -3,
            Self::TooManyGenes { .. } => -4,
            Self::NoInputs => -5,
            Self::TooManyInputs { .. } => -6,
            Self::ForwardReference => -7,
            Self::GeneReference => -8,
        }
    }
}

/// Failure while loading a saved structure.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying read failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Input is not a well-formed record.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Record holds a different structure than requested.
    #[error("expected a {expected} record, found {found}")]
    WrongKind {
        /// Requested kind.
        expected: &'static str,
        /// Kind in the file.
        found: String,
    },
    /// Format version not understood.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    /// Required value missing from a record.
    #[error("value not found: {0}")]
    MissingField(&'static str),
    /// Grid larger than the node ceiling.
    #[error("{nodes} nodes exceed the maximum of {max}")]
    MaxNodesExceeded {
        /// Declared cell count.
        nodes: usize,
        /// Node ceiling.
        max: usize,
    },
    /// Gene array shorter or longer than the layout requires.
    #[error("module {module}: expected {expected} gene fields, found {found}")]
    NodeNotFound {
        /// Module index.
        module: usize,
        /// Required length.
        expected: usize,
        /// Stored length.
        found: usize,
    },
    /// Connection or actuator source outside the module.
    #[error("module {module}: link at gene field {field} not found")]
    LinkNotFound {
        /// Module index.
        module: usize,
        /// Offset in the gene array.
        field: usize,
    },
    /// Opcode code with no matching operation.
    #[error("module {module} cell {cell}: function type {code} not found")]
    FunctionTypeNotFound {
        /// Module index.
        module: usize,
        /// Cell index.
        cell: usize,
        /// Stored code.
        code: i32,
    },
    /// Mating log refers to a parent that does not exist.
    #[error("mating parent {0} not found")]
    ParentNotFound(usize),
    /// Mating log refers to a child that does not exist.
    #[error("mating child {0} not found")]
    ChildNotFound(usize),
    /// Declared population size disagrees with the records read.
    #[error("population size {declared} but {read} individuals read")]
    PopulationSizeMismatch {
        /// Declared size.
        declared: usize,
        /// Records read.
        read: usize,
    },
    /// Declared island count disagrees with the records read.
    #[error("island count {declared} but {read} islands read")]
    IslandCountMismatch {
        /// Declared count.
        declared: usize,
        /// Records read.
        read: usize,
    },
}

impl LoadError {
    /// Stable code for this failure. Zero is reserved for success.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::Parse(_) => 2,
            Self::WrongKind { .. } => 3,
            Self::UnsupportedVersion(_) => 4,
            Self::MissingField(_) => 5,
            Self::MaxNodesExceeded { .. } => 6,
            Self::NodeNotFound { .. } => 7,
            Self::LinkNotFound { .. } => 8,
            Self::FunctionTypeNotFound { .. } => 9,
            Self::ParentNotFound(_) => 10,
            Self::ChildNotFound(_) => 11,
            Self::PopulationSizeMismatch { .. } => 12,
            Self::IslandCountMismatch { .. } => 13,
        }
    }
}
