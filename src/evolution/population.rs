//! Generational populations.

// History statistics and bus sizes mix counts with floats
#![allow(clippy::cast_precision_loss)]

use crate::cgp::{
    CompressionConfig, CrossoverConfig, Function, FunctionShape, InstructionSet, MutationConfig,
    RunOptions, crossover, mutate,
};
use crate::evolution::selection::{SelectionConfig, SelectionStats, descending, tournament_select};
use crate::rng::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fitness of an individual that has not been evaluated yet. Never ranks
/// above an evaluated one.
const UNEVALUATED: f32 = f32::MIN;

/// Configuration for a population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Number of individuals.
    pub size: usize,
    /// Shape of every individual's function.
    pub shape: FunctionShape,
    /// Parent selection and elitism.
    pub selection: SelectionConfig,
    /// Mutation applied to every child.
    pub mutation: MutationConfig,
    /// Crossover applied to a share of children.
    pub crossover: CrossoverConfig,
    /// Probability that a child is produced by crossover.
    pub crossover_rate: f32,
    /// Bounds for ADF compression of children.
    pub compression: CompressionConfig,
    /// Probability that a child is compressed. Zero disables compression.
    pub compression_rate: f32,
    /// Generations between history samples. Zero disables sampling.
    pub history_interval: usize,
    /// Size of the external sensor/actuator bus. Zero disables binding.
    pub bus_size: usize,
    /// Options passed to every run.
    pub run: RunOptions,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 64,
            shape: FunctionShape::default(),
            selection: SelectionConfig::default(),
            mutation: MutationConfig::default(),
            crossover: CrossoverConfig::default(),
            crossover_rate: 0.5,
            compression: CompressionConfig::default(),
            compression_rate: 0.0,
            history_interval: 1,
            bus_size: 0,
            run: RunOptions::default(),
        }
    }
}

/// Binding of an individual's sensors and actuators to a shared bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusBinding {
    /// Bus index read by each sensor.
    pub sensor_source: Vec<usize>,
    /// Bus index written by each actuator.
    pub actuator_destination: Vec<usize>,
}

impl BusBinding {
    /// Random binding onto a bus of `bus_size` slots.
    #[must_use]
    pub fn random(sensors: usize, actuators: usize, bus_size: usize, rng: &mut Rng) -> Self {
        Self {
            sensor_source: (0..sensors).map(|_| rng.below(bus_size)).collect(),
            actuator_destination: (0..actuators).map(|_| rng.below(bus_size)).collect(),
        }
    }
}

/// A function with its fitness.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    /// The evolved program.
    pub function: Function,
    /// Fitness from the last evaluation; `f32::MIN` for new children.
    pub fitness: f32,
    /// Optional bus binding.
    pub binding: Option<BusBinding>,
}

/// One history sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    /// Generation the sample was taken at.
    pub generation: usize,
    /// Best fitness.
    pub best: f32,
    /// Mean fitness.
    pub mean: f32,
    /// Fitness standard deviation.
    pub std: f32,
}

/// Generation counters and fitness log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Generations completed.
    pub index: usize,
    /// Evaluation passes completed.
    pub tick: usize,
    /// Generations between samples.
    pub interval: usize,
    /// Recorded samples, oldest first.
    pub samples: Vec<HistorySample>,
}

/// Caller-supplied fitness evaluation.
///
/// Called once per individual with the number of time steps to simulate,
/// the population, the individual's index and a free-form command value.
pub trait FitnessFunction {
    /// Evaluate individual `index`.
    fn evaluate(
        &mut self,
        time_steps: usize,
        population: &mut Population,
        index: usize,
        custom_command: i32,
    ) -> f32;
}

impl<F> FitnessFunction for F
where
    F: FnMut(usize, &mut Population, usize, i32) -> f32,
{
    fn evaluate(
        &mut self,
        time_steps: usize,
        population: &mut Population,
        index: usize,
        custom_command: i32,
    ) -> f32 {
        self(time_steps, population, index, custom_command)
    }
}

/// A generational population.
#[derive(Debug, Clone)]
pub struct Population {
    individuals: Vec<Individual>,
    history: History,
    config: PopulationConfig,
    set: Arc<InstructionSet>,
    rng: Rng,
}

impl Population {
    /// Random population.
    #[must_use]
    pub fn new(config: PopulationConfig, set: Arc<InstructionSet>, rng: &mut Rng) -> Self {
        let individuals = (0..config.size)
            .map(|_| {
                let function = Function::random(&config.shape, &set, rng);
                let binding = (config.bus_size > 0).then(|| {
                    BusBinding::random(
                        config.shape.sensors,
                        config.shape.actuators,
                        config.bus_size,
                        rng,
                    )
                });
                Individual {
                    function,
                    fitness: UNEVALUATED,
                    binding,
                }
            })
            .collect();
        Self {
            individuals,
            history: History {
                interval: config.history_interval,
                ..History::default()
            },
            config,
            set,
            rng: Rng::new(rng.fork()),
        }
    }

    /// Rebuild from stored parts.
    #[must_use]
    pub fn from_parts(
        config: PopulationConfig,
        set: Arc<InstructionSet>,
        individuals: Vec<Individual>,
        history: History,
        rng: Rng,
    ) -> Self {
        Self {
            individuals,
            history,
            config,
            set,
            rng,
        }
    }

    /// Number of individuals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Whether the population is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// All individuals.
    #[must_use]
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// All individuals, writable.
    pub fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    /// Generation counters and samples.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Shared instruction set.
    #[must_use]
    pub fn set(&self) -> &Arc<InstructionSet> {
        &self.set
    }

    /// Population random state.
    #[must_use]
    pub fn rng(&self) -> Rng {
        self.rng
    }

    pub(crate) fn rng_mut(&mut self) -> &mut Rng {
        &mut self.rng
    }

    pub(crate) fn push(&mut self, individual: Individual) {
        self.individuals.push(individual);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Individual {
        self.individuals.remove(index)
    }

    /// Run individual `index` once and return its actuators.
    pub fn run_individual(&mut self, index: usize, sensors: &[f32]) -> Option<&[f32]> {
        let set = &self.set;
        let options = self.config.run;
        self.individuals
            .get_mut(index)
            .map(|ind| ind.function.run(sensors, set, options))
    }

    /// Evaluate every individual. NaN and negative infinity are recorded as
    /// `f32::MIN`, positive infinity as `f32::MAX`.
    pub fn evaluate<F: FitnessFunction>(
        &mut self,
        time_steps: usize,
        custom_command: i32,
        fitness: &mut F,
    ) {
        for index in 0..self.individuals.len() {
            let value = fitness.evaluate(time_steps, self, index, custom_command);
            if let Some(ind) = self.individuals.get_mut(index) {
                ind.fitness = if value.is_nan() {
                    UNEVALUATED
                } else {
                    value.clamp(f32::MIN, f32::MAX)
                };
            }
        }
        self.history.tick += 1;
    }

    /// Sort by descending fitness. Equal fitness keeps relative order.
    pub fn sort(&mut self) {
        self.individuals.sort_by(|a, b| descending(a.fitness, b.fitness));
    }

    /// Fittest individual; the first one on ties.
    #[must_use]
    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .reduce(|best, ind| if ind.fitness > best.fitness { ind } else { best })
    }

    /// Fitness of every individual, in order.
    #[must_use]
    pub fn fitness(&self) -> Vec<f32> {
        self.individuals.iter().map(|i| i.fitness).collect()
    }

    /// Statistics over the current fitness values.
    #[must_use]
    pub fn stats(&self) -> SelectionStats {
        SelectionStats::from_fitness(&self.fitness())
    }

    /// Replace the next generation using elitism, tournament selection,
    /// crossover, mutation and optional compression.
    ///
    /// Fitness must be current; call [`Population::evaluate`] first.
    pub fn generation(&mut self) {
        let stats = self.stats();
        let index = self.history.index;
        if self.history.interval > 0 && index.is_multiple_of(self.history.interval) {
            self.history.samples.push(HistorySample {
                generation: index,
                best: stats.best_fitness,
                mean: stats.mean_fitness,
                std: stats.fitness_std,
            });
        }

        self.sort();
        let size = self.individuals.len();
        let elites = self.config.selection.elite_count(size);
        let fitness = self.fitness();

        let mut next: Vec<Individual> = self.individuals[..elites].to_vec();
        while next.len() < size {
            let p1 = tournament_select(&fitness, self.config.selection.tournament_size, &mut self.rng);
            let p2 = self
                .rng
                .chance(self.config.crossover_rate)
                .then(|| tournament_select(&fitness, self.config.selection.tournament_size, &mut self.rng));
            next.push(self.offspring(p1, p2));
        }
        self.individuals = next;
        self.history.index += 1;

        log::debug!(
            "generation {index}: best {:.3}, mean {:.3}, std {:.3}",
            stats.best_fitness,
            stats.mean_fitness,
            stats.fitness_std
        );
    }

    /// Child of `parent1`, crossed with `parent2` when given, then mutated.
    pub(crate) fn offspring(&mut self, parent1: usize, parent2: Option<usize>) -> Individual {
        let first = &self.individuals[parent1];
        let mut function = match parent2 {
            Some(p2) => crossover(
                &first.function,
                &self.individuals[p2].function,
                &self.set,
                &self.config.crossover,
                &mut self.rng,
            ),
            None => {
                let mut copy = first.function.clone();
                copy.clear_state();
                copy.set_random_seed(self.rng.fork());
                copy
            }
        };
        let binding = first.binding.clone();

        mutate(&mut function, &self.set, &self.config.mutation, &mut self.rng);
        let compressed = self.rng.chance(self.config.compression_rate).then(|| {
            function.compress_random(&self.config.compression, &self.set, &mut self.rng)
        });
        if let Some(Err(e)) = compressed {
            log::trace!("compression skipped: {e}");
        }

        Individual {
            function,
            fitness: UNEVALUATED,
            binding,
        }
    }

    /// Replace the weakest individuals with `incoming`, one distinct slot
    /// each, in ascending order of fitness.
    pub fn replace_weakest(&mut self, incoming: Vec<Individual>) {
        let mut order: Vec<usize> = (0..self.individuals.len()).collect();
        order.sort_by(|&a, &b| descending(self.individuals[b].fitness, self.individuals[a].fitness));
        for (slot, individual) in order.into_iter().zip(incoming) {
            self.individuals[slot] = individual;
        }
    }

    /// Count of differing fields between two populations. Zero means equal.
    #[must_use]
    pub fn differences(&self, other: &Self) -> usize {
        let individuals: usize = self
            .individuals
            .iter()
            .zip(&other.individuals)
            .map(|(a, b)| {
                a.function.differences(&b.function)
                    + usize::from(a.fitness.to_bits() != b.fitness.to_bits())
                    + usize::from(a.binding != b.binding)
            })
            .sum();
        individuals
            + self.individuals.len().abs_diff(other.individuals.len())
            + usize::from(self.history != other.history)
            + usize::from(self.rng != other.rng)
            + usize::from(self.config != other.config)
            + usize::from(self.set != other.set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PopulationConfig {
        PopulationConfig {
            size: 12,
            shape: FunctionShape {
                sensors: 1,
                actuators: 1,
                rows: 3,
                columns: 4,
                ..FunctionShape::default()
            },
            ..PopulationConfig::default()
        }
    }

    fn population(seed: u32) -> Population {
        Population::new(config(), Arc::new(InstructionSet::arithmetic()), &mut Rng::new(seed))
    }

    #[test]
    fn test_new_population_is_valid() {
        let pop = population(1);
        assert_eq!(pop.len(), 12);
        for ind in pop.individuals() {
            assert_eq!(ind.function.validate(pop.set()), Ok(()));
            assert!(ind.binding.is_none());
        }
    }

    #[test]
    fn test_sort_is_descending_and_stable() {
        let mut pop = population(2);
        let values = [1.0, 5.0, 1.0, 3.0, 5.0, 0.0, 1.0, 2.0, 2.0, 4.0, 0.5, 5.0];
        for (ind, &v) in pop.individuals_mut().iter_mut().zip(&values) {
            ind.fitness = v;
        }
        let seeds: Vec<u32> = pop.individuals().iter().map(|i| i.function.random_seed()).collect();
        pop.sort();

        let sorted = pop.fitness();
        assert!(sorted.windows(2).all(|w| w[0] >= w[1]));
        // The three 5.0 entries were at 1, 4 and 11
        let top: Vec<u32> = pop.individuals()[..3].iter().map(|i| i.function.random_seed()).collect();
        assert_eq!(top, vec![seeds[1], seeds[4], seeds[11]]);
    }

    #[test]
    fn test_evaluate_records_fitness() {
        let mut pop = population(3);
        pop.evaluate(5, 7, &mut |steps: usize, _: &mut Population, index: usize, cmd: i32| {
            if index == 0 {
                f32::NAN
            } else {
                (steps + index) as f32 + cmd as f32
            }
        });
        assert!((pop.individuals()[0].fitness - f32::MIN).abs() < f32::EPSILON);
        assert!((pop.individuals()[2].fitness - 14.0).abs() < f32::EPSILON);
        assert_eq!(pop.history().tick, 1);
    }

    #[test]
    fn test_infinite_fitness_is_clamped() {
        let mut pop = population(7);
        pop.evaluate(1, 0, &mut |_: usize, _: &mut Population, index: usize, _: i32| {
            match index {
                0 => f32::INFINITY,
                1 => f32::NEG_INFINITY,
                _ => 1.0,
            }
        });
        assert!(pop.fitness().iter().all(|f| f.is_finite()));
        assert_eq!(pop.individuals()[0].fitness.to_bits(), f32::MAX.to_bits());
        assert_eq!(pop.individuals()[1].fitness.to_bits(), f32::MIN.to_bits());
        let top = pop.individuals()[0].function.random_seed();
        assert_eq!(pop.best().map(|b| b.function.random_seed()), Some(top));
    }

    #[test]
    fn test_children_start_unevaluated() {
        let mut pop = population(8);
        pop.evaluate(1, 0, &mut |_: usize, _: &mut Population, index: usize, _: i32| {
            -10.0 - index as f32
        });
        let elite = pop.best().map(|b| b.fitness.to_bits());
        pop.generation();
        let elites = pop.config().selection.elite_count(pop.len());
        assert!(pop.individuals()[elites..]
            .iter()
            .all(|i| i.fitness.to_bits() == f32::MIN.to_bits()));
        assert_eq!(pop.best().map(|b| b.fitness.to_bits()), elite);
    }

    #[test]
    fn test_generation_keeps_elite() {
        let mut pop = population(4);
        pop.evaluate(1, 0, &mut |_: usize, _: &mut Population, index: usize, _: i32| {
            index as f32
        });
        let best = pop.best().unwrap().function.clone();
        pop.generation();

        assert_eq!(pop.len(), 12);
        assert_eq!(pop.history().index, 1);
        assert_eq!(pop.history().samples.len(), 1);
        assert_eq!(pop.individuals()[0].function.differences(&best), 0);
        for ind in pop.individuals() {
            assert_eq!(ind.function.validate(pop.set()), Ok(()));
        }
    }

    #[test]
    fn test_run_individual() {
        let mut pop = population(5);
        assert_eq!(pop.run_individual(0, &[1.0]).map(<[f32]>::len), Some(1));
        assert!(pop.run_individual(99, &[1.0]).is_none());
    }

    #[test]
    fn test_bus_binding() {
        let config = PopulationConfig {
            bus_size: 8,
            ..config()
        };
        let pop = Population::new(config, Arc::new(InstructionSet::full()), &mut Rng::new(6));
        for ind in pop.individuals() {
            let binding = ind.binding.as_ref().unwrap();
            assert_eq!(binding.sensor_source.len(), 1);
            assert!(binding.actuator_destination.iter().all(|&d| d < 8));
        }
    }
}
