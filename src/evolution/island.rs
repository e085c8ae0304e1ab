//! Island model: independent populations with ring migration.

use crate::cgp::InstructionSet;
use crate::evolution::population::{FitnessFunction, Individual, Population, PopulationConfig};
use crate::evolution::selection::{descending, ranking};
use crate::rng::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for an island system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandConfig {
    /// Number of islands.
    pub islands: usize,
    /// Generations between migrations. Zero disables migration.
    pub migration_interval: usize,
    /// Individuals sent from each island per migration.
    pub migrants: usize,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            islands: 4,
            migration_interval: 10,
            migrants: 1,
        }
    }
}

/// A set of populations evolving side by side.
#[derive(Debug, Clone)]
pub struct IslandSystem {
    islands: Vec<Population>,
    fitness: Vec<f32>,
    migration_tick: usize,
    config: IslandConfig,
}

impl IslandSystem {
    /// Random islands sharing one instruction set.
    #[must_use]
    pub fn new(
        config: IslandConfig,
        population: PopulationConfig,
        set: &Arc<InstructionSet>,
        rng: &mut Rng,
    ) -> Self {
        let islands: Vec<Population> = (0..config.islands)
            .map(|_| Population::new(population, Arc::clone(set), rng))
            .collect();
        Self {
            fitness: vec![0.0; islands.len()],
            islands,
            migration_tick: 0,
            config,
        }
    }

    /// Rebuild from stored parts.
    #[must_use]
    pub fn from_parts(
        config: IslandConfig,
        islands: Vec<Population>,
        fitness: Vec<f32>,
        migration_tick: usize,
    ) -> Self {
        Self {
            islands,
            fitness,
            migration_tick,
            config,
        }
    }

    /// The islands.
    #[must_use]
    pub fn islands(&self) -> &[Population] {
        &self.islands
    }

    /// The islands, writable. Call [`IslandSystem::update_fitness`] after
    /// evaluating them directly.
    pub fn islands_mut(&mut self) -> &mut [Population] {
        &mut self.islands
    }

    /// Best fitness of each island.
    #[must_use]
    pub fn fitness(&self) -> &[f32] {
        &self.fitness
    }

    /// Generations since the system was created.
    #[must_use]
    pub fn migration_tick(&self) -> usize {
        self.migration_tick
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &IslandConfig {
        &self.config
    }

    /// Evaluate every island in turn.
    pub fn evaluate_system<F: FitnessFunction>(
        &mut self,
        time_steps: usize,
        custom_command: i32,
        fitness: &mut F,
    ) {
        for island in &mut self.islands {
            island.evaluate(time_steps, custom_command, fitness);
        }
        self.update_fitness();
    }

    /// Refresh the per-island best fitness.
    pub fn update_fitness(&mut self) {
        self.fitness = self
            .islands
            .iter()
            .map(|p| p.best().map_or(f32::MIN, |b| b.fitness))
            .collect();
    }

    /// Order islands by descending best fitness, and each island's
    /// individuals likewise. The per-island fitness is refreshed first.
    pub fn sort_system(&mut self) {
        for island in &mut self.islands {
            island.sort();
        }
        self.update_fitness();
        let mut paired: Vec<(f32, Population)> = self
            .fitness
            .drain(..)
            .zip(self.islands.drain(..))
            .collect();
        paired.sort_by(|a, b| descending(a.0, b.0));
        (self.fitness, self.islands) = paired.into_iter().unzip();
    }

    /// Advance every island one generation. Migration runs first when
    /// scheduled, so emigrants and victims are ranked by evaluated fitness.
    pub fn generation_system(&mut self) {
        self.migration_tick += 1;
        if self.config.migration_interval > 0
            && self.migration_tick.is_multiple_of(self.config.migration_interval)
        {
            self.migrate();
        }
        for island in &mut self.islands {
            island.generation();
        }
    }

    /// Copy each island's best individuals over the weakest of the next
    /// island in the ring. Emigrants are chosen before anything is written.
    pub fn migrate(&mut self) {
        let n = self.islands.len();
        if n < 2 || self.config.migrants == 0 {
            return;
        }
        let emigrants: Vec<Vec<Individual>> = self
            .islands
            .iter()
            .map(|island| {
                ranking(&island.fitness())
                    .into_iter()
                    .take(self.config.migrants)
                    .map(|i| island.individuals()[i].clone())
                    .collect()
            })
            .collect();

        for (from, group) in emigrants.into_iter().enumerate() {
            let to = (from + 1) % n;
            log::debug!("migrating {} individuals from island {from} to {to}", group.len());
            self.islands[to].replace_weakest(group);
        }
    }

    /// Fittest individual across all islands with its island index.
    #[must_use]
    pub fn best(&self) -> Option<(usize, &Individual)> {
        self.islands
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.best().map(|b| (i, b)))
            .reduce(|best, cand| if cand.1.fitness > best.1.fitness { cand } else { best })
    }

    /// Count of differing fields between two systems. Zero means equal.
    #[must_use]
    pub fn differences(&self, other: &Self) -> usize {
        let islands: usize = self
            .islands
            .iter()
            .zip(&other.islands)
            .map(|(a, b)| a.differences(b))
            .sum();
        let fitness = self
            .fitness
            .iter()
            .zip(&other.fitness)
            .filter(|(a, b)| a.to_bits() != b.to_bits())
            .count();
        islands
            + fitness
            + self.islands.len().abs_diff(other.islands.len())
            + self.fitness.len().abs_diff(other.fitness.len())
            + usize::from(self.migration_tick != other.migration_tick)
            + usize::from(self.config != other.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgp::FunctionShape;
    use crate::evolution::selection::SelectionConfig;

    fn system(islands: usize) -> IslandSystem {
        system_with(islands, 2, SelectionConfig::default())
    }

    fn system_with(
        islands: usize,
        migration_interval: usize,
        selection: SelectionConfig,
    ) -> IslandSystem {
        let population = PopulationConfig {
            size: 6,
            shape: FunctionShape {
                rows: 2,
                columns: 3,
                ..FunctionShape::default()
            },
            selection,
            ..PopulationConfig::default()
        };
        let config = IslandConfig {
            islands,
            migration_interval,
            migrants: 1,
        };
        IslandSystem::new(
            config,
            population,
            &Arc::new(InstructionSet::arithmetic()),
            &mut Rng::new(8),
        )
    }

    #[allow(clippy::cast_precision_loss)]
    fn by_seed(_: usize, pop: &mut Population, index: usize, _: i32) -> f32 {
        (pop.individuals()[index].function.random_seed() % 1000) as f32
    }

    #[allow(clippy::cast_precision_loss)]
    fn below_zero(_: usize, pop: &mut Population, index: usize, _: i32) -> f32 {
        -1.0 - (pop.individuals()[index].function.random_seed() % 1_000_000) as f32
    }

    #[test]
    fn test_sort_system() {
        let mut sys = system(3);
        sys.evaluate_system(1, 0, &mut by_seed);
        sys.sort_system();
        assert!(sys.fitness().windows(2).all(|w| w[0] >= w[1]));
        for (island, &best) in sys.islands().iter().zip(sys.fitness()) {
            assert!((island.individuals()[0].fitness - best).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_migration_ring() {
        let mut sys = system(3);
        sys.evaluate_system(1, 0, &mut by_seed);
        let champions: Vec<u32> = sys
            .islands()
            .iter()
            .map(|p| p.best().unwrap().function.random_seed())
            .collect();
        sys.migrate();
        for (from, seed) in champions.iter().enumerate() {
            let to = (from + 1) % 3;
            assert!(
                sys.islands()[to]
                    .individuals()
                    .iter()
                    .any(|i| i.function.random_seed() == *seed)
            );
        }
    }

    #[test]
    fn test_sort_system_refreshes_fitness() {
        let mut sys = system(3);
        for island in sys.islands_mut() {
            island.evaluate(1, 0, &mut by_seed);
        }
        let islands = sys.islands().to_vec();
        let mut stale = IslandSystem::from_parts(*sys.config(), islands, vec![1.0], 0);
        stale.sort_system();
        assert_eq!(stale.islands().len(), 3);
        assert_eq!(stale.fitness().len(), 3);
        assert!(stale.fitness().windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_migration_with_negative_fitness_keeps_elites() {
        let selection = SelectionConfig {
            tournament_size: 3,
            elitism: 0.34,
        };
        let mut sys = system_with(2, 1, selection);
        sys.evaluate_system(1, 0, &mut below_zero);
        let elites: Vec<(u32, f32)> = sys
            .islands()
            .iter()
            .map(|p| p.best().map(|b| (b.function.random_seed(), b.fitness)).unwrap())
            .collect();

        sys.generation_system();
        assert_eq!(sys.migration_tick(), 1);
        for (to, island) in sys.islands().iter().enumerate() {
            let from = 1 - to;
            let seeds: Vec<u32> = island
                .individuals()
                .iter()
                .map(|i| i.function.random_seed())
                .collect();
            assert!(seeds.contains(&elites[to].0), "island {to} lost its elite");
            if elites[from].1 > elites[to].1 {
                assert!(seeds.contains(&elites[from].0), "island {to} lost its migrant");
            }
            let best = island.best().unwrap().fitness;
            assert_eq!(best.to_bits(), elites[to].1.max(elites[from].1).to_bits());
        }
    }

    #[test]
    fn test_generation_system_counts() {
        let mut sys = system(2);
        for _ in 0..4 {
            sys.evaluate_system(1, 0, &mut by_seed);
            sys.generation_system();
        }
        assert_eq!(sys.migration_tick(), 4);
        for island in sys.islands() {
            assert_eq!(island.history().index, 4);
            assert_eq!(island.len(), 6);
        }
        assert!(sys.best().is_some());
    }
}
