//! Inspect command: summarize a saved file.

use super::{CliError, Loaded};
use cgpevo::cgp::Opcode;
use cgpevo::{Function, InstructionSet};
use std::path::PathBuf;

fn print_function(function: &Function, set: &InstructionSet, genes: bool) {
    println!("  Modules:      {}", function.modules().len());
    println!("  Nodes:        {}", function.node_count());
    println!("  Max depth:    {}", function.max_depth(set));
    println!("  Seed:         {}", function.random_seed());
    for (m, module) in function.modules().iter().enumerate() {
        let layout = module.layout();
        println!(
            "  Module {m}: {}x{} grid, {} sensors, {} actuators, {} used",
            layout.rows,
            layout.columns,
            layout.sensors,
            layout.actuators,
            module.used_count()
        );
        let sources: Vec<String> = (0..layout.actuators)
            .map(|a| module.actuator_source(a).map_or("-".into(), |s| s.to_string()))
            .collect();
        println!("    actuators <- [{}]", sources.join(", "));
        if !genes {
            continue;
        }
        for cell in 0..layout.cells() {
            if !module.used()[layout.cell_state(cell)] {
                continue;
            }
            let gene = module.gene(cell);
            let name = gene
                .opcode
                .map_or_else(|| "disabled".to_string(), |op: Opcode| format!("{op:?}"));
            println!(
                "    cell {cell:>4}: {name:<14} c={:<10.4} in={:?}",
                gene.constant, gene.inputs
            );
        }
    }
}

/// Execute the inspect command.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn execute(file: PathBuf, genes: bool) -> Result<(), CliError> {
    let loaded = Loaded::read(&file)?;
    println!("File: {}", file.display());

    if let Loaded::Function(function) = &loaded {
        println!("Kind: function");
        print_function(function, &InstructionSet::with_adf(), genes);
        return Ok(());
    }

    if let Loaded::Islands(system) = &loaded {
        println!("Kind: islands");
        println!("  Migration tick: {}", system.migration_tick());
    }
    if let Loaded::Environment(env) = &loaded {
        println!("Kind: environment");
        println!("  Mating log:   {} entries", env.mating().len());
        println!("  Capacity:     {}", env.config().max_population_size);
    }

    for (p, population) in loaded.populations().into_iter().enumerate() {
        let stats = population.stats();
        println!();
        println!("Population {p}:");
        println!("  Size:         {}", population.len());
        println!("  Generation:   {}", population.history().index);
        println!("  Opcodes:      {}", population.set().len());
        println!(
            "  Fitness:      best {:.4}  mean {:.4}  worst {:.4}  std {:.4}",
            stats.best_fitness, stats.mean_fitness, stats.worst_fitness, stats.fitness_std
        );
        if let Some(best) = population.best() {
            println!("Champion:");
            print_function(&best.function, population.set(), genes);
        }
    }
    Ok(())
}
