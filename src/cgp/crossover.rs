//! Chromosome crossover between two functions of the same shape.
//!
//! Each module's grid is cut into contiguous column blocks. A block is a
//! run of whole columns, and connections only ever point at earlier
//! columns, so any mix of blocks from two valid parents is itself valid.

use crate::cgp::function::Function;
use crate::cgp::opcode::InstructionSet;
use crate::rng::Rng;
use serde::{Deserialize, Serialize};

/// How parents are assigned to chromosome blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossoverPattern {
    /// First parent, second parent, first parent...
    #[default]
    Alternate,
    /// Independent coin flip per block, forced to include both parents.
    Random,
}

/// Where the child's actuator mapping comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActuatorInheritance {
    /// Copy the whole block from the first parent.
    #[default]
    FirstParent,
    /// Pick each actuator from either parent.
    Recombine,
}

/// Configuration for crossover operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    /// Number of column blocks per module.
    pub chromosomes: usize,
    /// Block assignment pattern.
    pub pattern: CrossoverPattern,
    /// Actuator mapping inheritance.
    pub actuators: ActuatorInheritance,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            chromosomes: 2,
            pattern: CrossoverPattern::Alternate,
            actuators: ActuatorInheritance::FirstParent,
        }
    }
}

/// Build a child from two parents.
///
/// Parents must share every module layout. When they do not, the child is a
/// copy of `parent1`. The child gets a fresh seed and cleared state.
#[must_use]
pub fn crossover(
    parent1: &Function,
    parent2: &Function,
    set: &InstructionSet,
    config: &CrossoverConfig,
    rng: &mut Rng,
) -> Function {
    let mut child = parent1.clone();
    child.clear_state();
    child.set_random_seed(rng.fork());

    let compatible = parent1.modules().len() == parent2.modules().len()
        && parent1
            .modules()
            .iter()
            .zip(parent2.modules())
            .all(|(a, b)| a.layout() == b.layout());
    if !compatible {
        log::debug!("crossover skipped: parent layouts differ");
        return child;
    }

    for (module, donor) in child.modules_mut().iter_mut().zip(parent2.modules()) {
        let layout = *module.layout();
        let blocks = config.chromosomes.clamp(1, layout.columns.max(1));
        let from_second = block_owners(blocks, config.pattern, rng);

        let genes = module.genes_mut();
        for (block, &second) in from_second.iter().enumerate() {
            if !second {
                continue;
            }
            let first_col = block * layout.columns / blocks;
            let end_col = (block + 1) * layout.columns / blocks;
            let start = layout.gene_offset(layout.cell_index(0, first_col));
            let end = layout.gene_offset(layout.cell_index(0, end_col));
            genes[start..end].copy_from_slice(&donor.genes()[start..end]);
        }

        if config.actuators == ActuatorInheritance::Recombine {
            for a in 0..layout.actuators {
                if rng.chance(0.5) {
                    let offset = layout.actuator_offset(a);
                    genes[offset] = donor.genes()[offset];
                }
            }
        }
    }

    child.refresh_used(set);
    child
}

/// For each block, whether it comes from the second parent.
fn block_owners(blocks: usize, pattern: CrossoverPattern, rng: &mut Rng) -> Vec<bool> {
    match pattern {
        CrossoverPattern::Alternate => (0..blocks).map(|b| b % 2 == 1).collect(),
        CrossoverPattern::Random => {
            let mut owners: Vec<bool> = (0..blocks).map(|_| rng.chance(0.5)).collect();
            if blocks >= 2 {
                // Both parents must contribute
                if owners.iter().all(|&o| o) || owners.iter().all(|&o| !o) {
                    let flip = rng.below(blocks);
                    owners[flip] = !owners[flip];
                }
            }
            owners
        }
    }
}
