//! Steady-state populations.
//!
//! An [`Environment`] grows and shrinks one individual at a time. Every
//! successful mating is logged as a `(parent1, parent2, child)` triple; the
//! log is bounded by the capacity and cleared by the caller at the end of a
//! measurement window.

use crate::evolution::population::{Individual, Population};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configuration for an environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Capacity. Mating fails once the population reaches it.
    pub max_population_size: usize,
    /// Probability that a mating skips crossover and mutates one parent.
    pub pure_mutant_probability: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            max_population_size: 128,
            pure_mutant_probability: 0.1,
        }
    }
}

/// One logged mating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mating {
    /// First parent index.
    pub parent1: usize,
    /// Second parent index.
    pub parent2: usize,
    /// Child index.
    pub child: usize,
}

/// A steady-state population with a mating log.
#[derive(Debug, Clone)]
pub struct Environment {
    population: Population,
    config: EnvironmentConfig,
    mating: VecDeque<Mating>,
}

impl Environment {
    /// Wrap a population.
    #[must_use]
    pub fn new(population: Population, config: EnvironmentConfig) -> Self {
        Self {
            population,
            config,
            mating: VecDeque::new(),
        }
    }

    /// Rebuild from stored parts.
    #[must_use]
    pub fn from_parts(
        population: Population,
        config: EnvironmentConfig,
        mating: VecDeque<Mating>,
    ) -> Self {
        Self {
            population,
            config,
            mating,
        }
    }

    /// Live individuals.
    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Live individuals, writable.
    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Current size.
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    /// Matings since the log was last cleared, oldest first.
    #[must_use]
    pub fn mating(&self) -> &VecDeque<Mating> {
        &self.mating
    }

    /// Empty the mating log.
    pub fn clear_mating(&mut self) {
        self.mating.clear();
    }

    /// Breed a child from two parents and append it.
    ///
    /// Returns the child's index, or `None` when the environment is full or
    /// a parent does not exist.
    pub fn mate(&mut self, parent1: usize, parent2: usize) -> Option<usize> {
        let size = self.population.len();
        if size >= self.config.max_population_size || parent1 >= size || parent2 >= size {
            return None;
        }

        let pure = self
            .population
            .rng_mut()
            .chance(self.config.pure_mutant_probability);
        let child = self
            .population
            .offspring(parent1, (!pure).then_some(parent2));
        self.population.push(child);

        let index = size;
        self.mating.push_back(Mating {
            parent1,
            parent2,
            child: index,
        });
        while self.mating.len() > self.config.max_population_size {
            self.mating.pop_front();
        }
        log::trace!("mate {parent1} x {parent2} -> {index}");
        Some(index)
    }

    /// Remove an individual, shifting later ones down.
    ///
    /// Log entries that mention the victim are dropped and the rest are
    /// renumbered. Returns `false` when `victim` does not exist.
    pub fn death(&mut self, victim: usize) -> bool {
        if victim >= self.population.len() {
            return false;
        }
        let removed: Individual = self.population.remove(victim);
        log::trace!("death {victim} (fitness {:.3})", removed.fitness);

        let shift = |i: usize| if i > victim { i - 1 } else { i };
        self.mating.retain(|m| {
            m.parent1 != victim && m.parent2 != victim && m.child != victim
        });
        for m in &mut self.mating {
            m.parent1 = shift(m.parent1);
            m.parent2 = shift(m.parent2);
            m.child = shift(m.child);
        }
        true
    }
}
