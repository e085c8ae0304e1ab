//! Evolve command: symbolic regression over an island system.
//!
//! The target is `y = 3x² + 2x − 5` sampled on `[-5, 5]` in steps of 0.5.
//! Each sample scores `100 − |error|`, so a perfect individual reaches
//! 2100.

use super::CliError;
use cgpevo::config::Config;
use cgpevo::evolution::{IslandSystem, Population};
use cgpevo::persistence;
use cgpevo::rng::Rng;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Score of one exactly matched sample.
const SAMPLE_SCORE: f32 = 100.0;

fn reference(x: f32) -> f32 {
    3.0 * x * x + 2.0 * x - 5.0
}

fn samples() -> impl Iterator<Item = f32> {
    (-10_i8..=10).map(|i| f32::from(i) * 0.5)
}

/// Regression fitness for one individual.
pub(crate) fn regression_fitness(
    time_steps: usize,
    population: &mut Population,
    index: usize,
    _custom_command: i32,
) -> f32 {
    let mut total = 0.0;
    for x in samples() {
        if let Some(ind) = population.individuals_mut().get_mut(index) {
            ind.function.clear_state();
        }
        let mut y = 0.0;
        for _ in 0..time_steps.max(1) {
            y = population
                .run_individual(index, &[x])
                .and_then(|out| out.first().copied())
                .unwrap_or(0.0);
        }
        total += SAMPLE_SCORE - (y - reference(x)).abs();
    }
    total
}

/// Evaluate every island on the rayon pool.
fn evaluate_parallel(system: &mut IslandSystem, time_steps: usize) {
    system.islands_mut().par_iter_mut().for_each(|island| {
        island.evaluate(time_steps, 0, &mut regression_fitness);
    });
    system.update_fitness();
}

fn save(system: &IslandSystem, path: &Path) -> Result<(), CliError> {
    let file = File::create(path)
        .map_err(|e| CliError::new(format!("Failed to create {}: {e}", path.display())))?;
    persistence::save_islands(system, BufWriter::new(file))?;
    Ok(())
}

/// Execute the evolve command.
///
/// # Errors
///
/// Returns an error if the configuration or checkpoint cannot be read, or
/// the output cannot be written.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn execute(
    config_path: Option<PathBuf>,
    output: PathBuf,
    seed: Option<u32>,
    generations: Option<usize>,
    resume: Option<PathBuf>,
    progress: bool,
) -> Result<(), CliError> {
    let mut config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(seed) = seed {
        config.run.seed = seed;
    }
    if let Some(generations) = generations {
        config.run.generations = generations;
    }
    if config.population.shape.sensors != 1 || config.population.shape.actuators == 0 {
        return Err(CliError::new(
            "regression needs exactly one sensor and at least one actuator",
        ));
    }

    let mut system = if let Some(path) = &resume {
        println!("Resuming from checkpoint: {}", path.display());
        let file = File::open(path)
            .map_err(|e| CliError::new(format!("Failed to open {}: {e}", path.display())))?;
        persistence::load_islands(file)?
    } else {
        let set = Arc::new(config.run.instruction_set.build());
        IslandSystem::new(
            config.islands,
            config.population,
            &set,
            &mut Rng::new(config.run.seed),
        )
    };

    let run = config.run;
    println!("Starting evolution:");
    println!("  Islands:     {}", system.islands().len());
    println!("  Population:  {}", config.population.size);
    println!("  Generations: {}", run.generations);
    println!("  Seed:        {}", run.seed);
    println!("  Output:      {}", output.display());
    println!();

    let pb = if progress {
        let pb = ProgressBar::new(u64::try_from(run.generations).unwrap_or(u64::MAX));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} generations {msg}")
                .map_err(|e| CliError::new(e.to_string()))?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let start = Instant::now();
    for generation in 0..run.generations {
        evaluate_parallel(&mut system, run.time_steps);
        let best = system.fitness().iter().copied().fold(f32::MIN, f32::max);
        pb.set_message(format!("best {best:.2}"));
        system.generation_system();
        pb.inc(1);

        if run.save_interval > 0 && (generation + 1).is_multiple_of(run.save_interval) {
            save(&system, &output)?;
            info!("checkpoint at generation {}", generation + 1);
        }
    }
    pb.finish_and_clear();

    evaluate_parallel(&mut system, run.time_steps);
    system.sort_system();
    save(&system, &output)?;

    println!("Evolution complete!");
    if let Some((island, best)) = system.best() {
        println!("  Best fitness: {:.4}", best.fitness);
        println!("  Island:       {island}");
        println!("  Nodes:        {}", best.function.node_count());
    }
    println!("  Elapsed time: {:.1}s", start.elapsed().as_secs_f64());
    println!("  Saved to:     {}", output.display());
    Ok(())
}
