//! Evolutionary loops over CGP functions.
//!
//! Three levels share the same operators:
//!
//! - [`Population`]: generational replacement with elitism.
//! - [`Environment`]: steady-state mating and death with a mating log.
//! - [`IslandSystem`]: several populations with ring migration.
//!
//! Fitness is always supplied by the caller through [`FitnessFunction`].
//! Nothing here spawns threads; islands are independent values, so a caller
//! may evaluate them in parallel and then call
//! [`IslandSystem::update_fitness`].
//!
//! # Example
//!
//! ```
//! use cgpevo::cgp::InstructionSet;
//! use cgpevo::evolution::{Population, PopulationConfig};
//! use cgpevo::rng::Rng;
//! use std::sync::Arc;
//!
//! let config = PopulationConfig { size: 8, ..PopulationConfig::default() };
//! let mut pop = Population::new(config, Arc::new(InstructionSet::arithmetic()), &mut Rng::new(1));
//! pop.evaluate(1, 0, &mut |_: usize, p: &mut Population, i: usize, _: i32| {
//!     let out = p.run_individual(i, &[2.0]).map_or(0.0, |o| o[0]);
//!     -(out - 4.0).abs()
//! });
//! pop.generation();
//! assert_eq!(pop.history().index, 1);
//! ```

mod environment;
mod island;
mod population;
mod selection;

pub use environment::{Environment, EnvironmentConfig, Mating};
pub use island::{IslandConfig, IslandSystem};
pub use population::{
    BusBinding, FitnessFunction, History, HistorySample, Individual, Population, PopulationConfig,
};
pub use selection::{SelectionConfig, SelectionStats, ranking, tournament_select};
