//! Point mutation for CGP functions.
//!
//! Each cell of each module is visited once. A mutated cell has exactly one
//! field replaced: its opcode, its constant, or one connection. Replacement
//! values are drawn from the same ranges random construction uses, so a
//! valid function stays valid.

use crate::cgp::function::Function;
use crate::cgp::genome::{MAX_CONSTANT, random_source};
use crate::cgp::opcode::InstructionSet;
use crate::rng::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for mutation operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Probability that a cell (or actuator mapping) is mutated.
    pub rate: f32,
    /// Maximum perturbation of a constant.
    pub constant_range: f32,
    /// How many previous columns a new connection may reach (0 = all).
    pub levels_back: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            rate: 0.05,
            constant_range: 10.0,
            levels_back: 0,
        }
    }
}

/// Mutate a function in place and return the number of mutated cells.
///
/// Actuator mappings are mutated at the same rate but not counted.
pub fn mutate(
    function: &mut Function,
    set: &InstructionSet,
    config: &MutationConfig,
    rng: &mut Rng,
) -> usize {
    let has_adfs = function.adf_count() > 0;
    let mut mutated = 0;

    for (m, module) in function.modules_mut().iter_mut().enumerate() {
        let layout = *module.layout();
        let allow_adf = m == 0 && has_adfs;
        let k = layout.connections_per_gene;

        for cell in 0..layout.cells() {
            if !rng.chance(config.rate) {
                continue;
            }
            mutated += 1;
            let fields = if k == 0 { 2 } else { 3 };
            match rng.below(fields) {
                0 => module.set_opcode(cell, set.choose(rng, allow_adf)),
                1 => {
                    let old = module.gene(cell).constant;
                    let value = rng
                        .mutate_value(old, config.constant_range)
                        .clamp(-MAX_CONSTANT, MAX_CONSTANT);
                    module.set_constant(cell, value);
                }
                _ => {
                    let connection = rng.below(k);
                    let source =
                        random_source(&layout, layout.column_of(cell), config.levels_back, rng);
                    module.set_input(cell, connection, source);
                }
            }
        }

        for actuator in 0..layout.actuators {
            if rng.chance(config.rate) {
                module.set_actuator_source(actuator, rng.below(layout.source_bound()));
            }
        }
    }

    function.refresh_used(set);
    mutated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgp::function::FunctionShape;

    fn shape() -> FunctionShape {
        FunctionShape {
            sensors: 2,
            actuators: 2,
            rows: 8,
            columns: 10,
            connections_per_gene: 3,
            ..FunctionShape::default()
        }
    }

    #[test]
    fn test_mutation_keeps_validity() {
        let set = InstructionSet::with_adf();
        let shape = FunctionShape {
            adf_modules: 2,
            ..shape()
        };
        let mut rng = Rng::new(11);
        let mut f = Function::random(&shape, &set, &mut rng);
        let config = MutationConfig {
            rate: 0.3,
            ..MutationConfig::default()
        };
        for _ in 0..100 {
            mutate(&mut f, &set, &config, &mut rng);
            assert_eq!(f.validate(&set), Ok(()));
        }
    }

    #[test]
    fn test_mutation_rate() {
        let set = InstructionSet::full();
        let mut rng = Rng::new(12);
        let mut f = Function::random(&shape(), &set, &mut rng);
        let config = MutationConfig {
            rate: 0.1,
            ..MutationConfig::default()
        };

        // 100 trials over 80 cells at 10% expects 800 mutations
        let total: usize = (0..100)
            .map(|_| mutate(&mut f, &set, &config, &mut rng))
            .sum();
        assert!(total > 400 && total < 1200, "{total} mutations");
    }

    #[test]
    fn test_mutation_changes_function() {
        let set = InstructionSet::full();
        let mut rng = Rng::new(13);
        let original = Function::random(&shape(), &set, &mut rng);
        let changed = (0..20)
            .filter(|_| {
                let mut copy = original.clone();
                mutate(&mut copy, &set, &MutationConfig::default(), &mut rng);
                copy.differences(&original) > 0
            })
            .count();
        assert!(changed > 15);
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let set = InstructionSet::full();
        let mut rng = Rng::new(14);
        let original = Function::random(&shape(), &set, &mut rng);
        let mut copy = original.clone();
        let config = MutationConfig {
            rate: 0.0,
            ..MutationConfig::default()
        };
        assert_eq!(mutate(&mut copy, &set, &config, &mut rng), 0);
        assert_eq!(copy.differences(&original), 0);
    }
}
