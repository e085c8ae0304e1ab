//! End-to-end evolution on a small regression problem.
//!
//! Target: y = x^2 + x on x in [-2, 2].

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use cgpevo::cgp::{CompressionConfig, FunctionShape, InstructionSet};
use cgpevo::evolution::{
    Environment, EnvironmentConfig, IslandConfig, IslandSystem, Population, PopulationConfig,
    SelectionConfig,
};
use cgpevo::rng::Rng;
use std::sync::Arc;

fn samples() -> impl Iterator<Item = f32> {
    (-4_i8..=4).map(|i| f32::from(i) * 0.5)
}

fn regression(_: usize, pop: &mut Population, index: usize, _: i32) -> f32 {
    let mut error = 0.0;
    for x in samples() {
        pop.individuals_mut()[index].function.clear_state();
        let y = pop.run_individual(index, &[x]).map_or(0.0, |o| o[0]);
        error += (y - (x * x + x)).abs();
    }
    -error
}

fn config(set_has_adf: bool) -> PopulationConfig {
    PopulationConfig {
        size: 30,
        shape: FunctionShape {
            sensors: 1,
            actuators: 1,
            rows: 3,
            columns: 6,
            connections_per_gene: 2,
            adf_modules: usize::from(set_has_adf),
            ..FunctionShape::default()
        },
        selection: SelectionConfig {
            tournament_size: 3,
            elitism: 0.1,
        },
        compression: CompressionConfig::default(),
        compression_rate: if set_has_adf { 0.2 } else { 0.0 },
        ..PopulationConfig::default()
    }
}

#[test]
fn test_best_never_regresses_with_elitism() {
    let mut pop = Population::new(
        config(false),
        Arc::new(InstructionSet::arithmetic()),
        &mut Rng::new(31),
    );
    pop.evaluate(1, 0, &mut regression);
    let mut best = pop.best().unwrap().fitness;
    let first = best;

    for generation in 1..=20 {
        pop.generation();
        pop.evaluate(1, 0, &mut regression);
        let now = pop.best().unwrap().fitness;
        assert!(now >= best, "generation {generation}: {now} < {best}");
        best = now;
        assert_eq!(pop.history().index, generation);
        assert_eq!(pop.len(), 30);
    }
    assert!(best >= first);
    assert_eq!(pop.history().samples.len(), 20);
    assert!(pop.individuals().iter().all(|i| i.function.validate(pop.set()).is_ok()));
}

#[test]
fn test_compression_during_evolution_stays_valid() {
    let set = Arc::new(InstructionSet::arithmetic_with_adf());
    let mut pop = Population::new(config(true), Arc::clone(&set), &mut Rng::new(32));
    for _ in 0..15 {
        pop.evaluate(1, 0, &mut regression);
        pop.generation();
    }
    for individual in pop.individuals() {
        assert_eq!(individual.function.validate(&set), Ok(()));
    }
}

#[test]
fn test_islands_improve_or_hold() {
    let mut system = IslandSystem::new(
        IslandConfig {
            islands: 3,
            migration_interval: 4,
            migrants: 2,
        },
        config(false),
        &Arc::new(InstructionSet::arithmetic()),
        &mut Rng::new(33),
    );
    system.evaluate_system(1, 0, &mut regression);
    let start = system.best().unwrap().1.fitness;
    for _ in 0..12 {
        system.generation_system();
        system.evaluate_system(1, 0, &mut regression);
    }
    assert!(system.best().unwrap().1.fitness >= start);
    system.sort_system();
    assert!(system.fitness().windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_steady_state_environment() {
    let pop = Population::new(
        config(false),
        Arc::new(InstructionSet::arithmetic()),
        &mut Rng::new(34),
    );
    let mut env = Environment::new(
        pop,
        EnvironmentConfig {
            max_population_size: 40,
            pure_mutant_probability: 0.1,
        },
    );
    let mut rng = Rng::new(35);
    for _ in 0..50 {
        env.population_mut().evaluate(1, 0, &mut regression);
        let fitness = env.population().fitness();
        let a = cgpevo::evolution::tournament_select(&fitness, 3, &mut rng);
        let b = cgpevo::evolution::tournament_select(&fitness, 3, &mut rng);
        if env.mate(a, b).is_none() {
            let worst = *cgpevo::evolution::ranking(&fitness).last().unwrap();
            assert!(env.death(worst));
        }
        assert!(env.population_size() <= 40);
    }
    assert!(env.mating().len() <= 40);
}
