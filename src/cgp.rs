//! Cartesian Genetic Programming representation and operators.
//!
//! A [`Function`] is a main module plus optional ADF submodules. Each module
//! is a grid of genes stored flat, evaluated column by column against a
//! state vector of sensors, cell outputs and actuators.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Mutation │ Crossover │ ADF Compression │
//! ├─────────────────────────────────────────┤
//! │       Validator     │   Interpreter     │
//! ├─────────────────────────────────────────┤
//! │  Function (main module + ADF modules)   │
//! ├─────────────────────────────────────────┤
//! │  ModuleGenome │ Layout │ InstructionSet │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use cgpevo::cgp::{Function, FunctionShape, InstructionSet, RunOptions};
//! use cgpevo::rng::Rng;
//!
//! let set = InstructionSet::full();
//! let mut rng = Rng::new(7);
//! let mut f = Function::random(&FunctionShape::default(), &set, &mut rng);
//! assert!(f.validate(&set).is_ok());
//! let out = f.run(&[1.5], &set, RunOptions::default());
//! assert_eq!(out.len(), 1);
//! ```

mod compress;
mod crossover;
mod function;
mod genome;
mod interpreter;
mod layout;
mod mutation;
mod opcode;
mod validate;

pub use compress::CompressionConfig;
pub use crossover::{ActuatorInheritance, CrossoverConfig, CrossoverPattern, crossover};
pub use function::{
    ADF_ITERATIONS, ADF_MAX_SENSORS, Function, FunctionShape, MAX_ADF_MODULES, MAX_NODES,
    adf_sensors,
};
pub use genome::{
    ArgLimits, DISABLED, Gene, MAX_CONSTANT, MAX_STATE, ModuleGenome, RandomInit, clamp_state,
    field_index,
};
pub use interpreter::{BLOCK_CELLS, GeneEdit, RunOptions};
pub use layout::{FIELD_CONSTANT, FIELD_OPCODE, GENE_HEADER, Layout, NodeRef};
pub use mutation::{MutationConfig, mutate};
pub use opcode::{InstructionSet, MAX_ARGS, MAX_ARGS_ADF, Opcode};
