// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! cgpevo: Cartesian Genetic Programming with ADF compression.
//!
//! This crate evolves small programs encoded as flat gene arrays:
//! - Deterministic interpretation with self-modifying opcodes
//! - Mutation, crossover and subgraph compression into ADF modules
//! - Generational, steady-state and island-model evolution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Island System / Environment       │
//! ├─────────────────────────────────────┤
//! │   Population (selection, history)   │
//! ├─────────────────────────────────────┤
//! │   Function (modules, interpreter)   │
//! ├─────────────────────────────────────┤
//! │   Rng (threaded 32-bit seed)        │
//! └─────────────────────────────────────┘
//! ```
//!
//! Fitness is always supplied by the caller. Persistence writes tagged
//! JSON records that reload bit-exactly.

pub mod cgp;
pub mod config;
pub mod error;
pub mod evolution;
pub mod persistence;
pub mod rng;

pub use cgp::{Function, FunctionShape, InstructionSet, Opcode};
pub use error::{CompressError, LoadError, ValidationError};
pub use evolution::{Environment, IslandSystem, Population};
