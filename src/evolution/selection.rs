//! Selection operators.
//!
//! Parents are picked by tournament; the best fraction of the population
//! survives unchanged as elites.

// Fitness statistics divide by the population size
#![allow(clippy::cast_precision_loss)]

use crate::rng::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Configuration for selection operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of individuals competing in each tournament.
    pub tournament_size: usize,
    /// Fraction of the population kept unchanged. At least one individual
    /// is kept whenever the population is non-empty.
    pub elitism: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            tournament_size: 3,
            elitism: 0.1,
        }
    }
}

impl SelectionConfig {
    /// Number of elites for a population of `size`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn elite_count(&self, size: usize) -> usize {
        if size == 0 {
            return 0;
        }
        let share = (self.elitism.clamp(0.0, 1.0) * size as f32).round() as usize;
        share.clamp(1, size)
    }
}

/// Descending fitness order. Ties keep their original relative order.
#[must_use]
pub fn ranking(fitness: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| descending(fitness[a], fitness[b]));
    order
}

/// Comparator for sorting by descending fitness.
#[must_use]
pub(crate) fn descending(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}

/// Tournament selection: sample `k` individuals and return the fittest.
pub fn tournament_select(fitness: &[f32], k: usize, rng: &mut Rng) -> usize {
    let pop_size = fitness.len();
    if pop_size == 0 {
        return 0;
    }

    let k = k.clamp(1, pop_size);
    let mut best_idx = rng.below(pop_size);
    let mut best_fitness = fitness[best_idx];

    for _ in 1..k {
        let idx = rng.below(pop_size);
        if fitness[idx] > best_fitness {
            best_idx = idx;
            best_fitness = fitness[idx];
        }
    }

    best_idx
}

/// Summary of a fitness vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionStats {
    /// Mean fitness of the population.
    pub mean_fitness: f32,
    /// Best fitness in the population.
    pub best_fitness: f32,
    /// Worst fitness in the population.
    pub worst_fitness: f32,
    /// Standard deviation of fitness.
    pub fitness_std: f32,
}

impl SelectionStats {
    /// Calculate statistics from fitness values.
    #[must_use]
    pub fn from_fitness(fitness: &[f32]) -> Self {
        if fitness.is_empty() {
            return Self {
                mean_fitness: 0.0,
                best_fitness: 0.0,
                worst_fitness: 0.0,
                fitness_std: 0.0,
            };
        }

        let n = fitness.len() as f64;
        let mean = fitness.iter().map(|&f| f64::from(f)).sum::<f64>() / n;
        let best = fitness.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let worst = fitness.iter().copied().fold(f32::INFINITY, f32::min);
        let variance = fitness
            .iter()
            .map(|&f| (f64::from(f) - mean).powi(2))
            .sum::<f64>()
            / n;

        let max = f64::from(f32::MAX);
        #[allow(clippy::cast_possible_truncation)]
        Self {
            mean_fitness: mean.clamp(-max, max) as f32,
            best_fitness: best,
            worst_fitness: worst,
            fitness_std: variance.sqrt().min(max) as f32,
        }
    }
}
