//! Multi-module programs.
//!
//! Module 0 is the main program. Modules `1..=M` are ADF submodules with a
//! small fixed sensor count and a single actuator. Each module owns its own
//! state and used map; the function as a whole owns a random seed so that
//! per-individual stochastic behaviour continues reproducibly after a reload.

use crate::cgp::genome::{ArgLimits, ModuleGenome, RandomInit};
use crate::cgp::layout::Layout;
use crate::cgp::opcode::InstructionSet;
use crate::rng::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound on ADF submodules per function.
pub const MAX_ADF_MODULES: usize = 4;

/// Upper bound on sensors of an ADF submodule.
pub const ADF_MAX_SENSORS: usize = 5;

/// Inner iterations when a submodule is called.
pub const ADF_ITERATIONS: usize = 2;

/// Upper bound on cells in any module.
pub const MAX_NODES: usize = 65_536;

/// Shape of a function: main grid plus optional ADF grids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionShape {
    /// Sensors of the main module.
    pub sensors: usize,
    /// Actuators of the main module.
    pub actuators: usize,
    /// Rows of the main grid.
    pub rows: usize,
    /// Columns of the main grid.
    pub columns: usize,
    /// Connections per gene, shared by every module.
    pub connections_per_gene: usize,
    /// Number of ADF submodules.
    pub adf_modules: usize,
    /// Rows of each ADF grid.
    pub adf_rows: usize,
    /// Columns of each ADF grid.
    pub adf_columns: usize,
    /// Random construction parameters.
    pub init: RandomInit,
}

impl Default for FunctionShape {
    fn default() -> Self {
        Self {
            sensors: 1,
            actuators: 1,
            rows: 6,
            columns: 10,
            connections_per_gene: 3,
            adf_modules: 0,
            adf_rows: 3,
            adf_columns: 4,
            init: RandomInit::default(),
        }
    }
}

impl FunctionShape {
    /// Layout of the main module.
    #[must_use]
    pub fn main_layout(&self) -> Layout {
        Layout::new(
            self.sensors,
            self.actuators,
            self.rows,
            self.columns,
            self.connections_per_gene,
        )
    }

    /// Layout of every ADF submodule.
    #[must_use]
    pub fn adf_layout(&self) -> Layout {
        Layout::new(
            adf_sensors(self.connections_per_gene),
            1,
            self.adf_rows,
            self.adf_columns,
            self.connections_per_gene,
        )
    }
}

/// Sensor count of an ADF submodule for a given connection count.
#[must_use]
pub fn adf_sensors(connections_per_gene: usize) -> usize {
    ADF_MAX_SENSORS.min(connections_per_gene)
}

/// An evolvable program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    modules: Vec<ModuleGenome>,
    random_seed: u32,
}

impl Function {
    /// Zero-filled function with the given shape.
    #[must_use]
    pub fn new(shape: &FunctionShape) -> Self {
        let adf_modules = shape.adf_modules.min(MAX_ADF_MODULES);
        let mut modules = Vec::with_capacity(1 + adf_modules);
        modules.push(ModuleGenome::new(shape.main_layout()));
        for _ in 0..adf_modules {
            modules.push(ModuleGenome::new(shape.adf_layout()));
        }
        Self {
            modules,
            random_seed: 0,
        }
    }

    /// Random function with the given shape.
    #[must_use]
    pub fn random(shape: &FunctionShape, set: &InstructionSet, rng: &mut Rng) -> Self {
        let mut function = Self::new(shape);
        function.randomize(set, &shape.init, rng);
        function
    }

    /// Rebuild from stored modules.
    #[must_use]
    pub fn from_parts(modules: Vec<ModuleGenome>, random_seed: u32) -> Self {
        Self {
            modules,
            random_seed,
        }
    }

    /// Re-roll every gene and the seed.
    pub fn randomize(&mut self, set: &InstructionSet, init: &RandomInit, rng: &mut Rng) {
        let limits = self.limits(set);
        let has_adfs = self.modules.len() > 1;
        for (m, module) in self.modules.iter_mut().enumerate() {
            module.randomize(set, m == 0 && has_adfs, init, limits, rng);
        }
        self.random_seed = rng.fork();
    }

    /// Argument limits when this function is evaluated with `set`.
    #[must_use]
    pub fn limits(&self, set: &InstructionSet) -> ArgLimits {
        ArgLimits::new(set, adf_sensors(self.main().layout().connections_per_gene))
    }

    /// The main module.
    #[must_use]
    pub fn main(&self) -> &ModuleGenome {
        &self.modules[0]
    }

    /// The main module, writable.
    pub fn main_mut(&mut self) -> &mut ModuleGenome {
        &mut self.modules[0]
    }

    /// All modules, main first.
    #[must_use]
    pub fn modules(&self) -> &[ModuleGenome] {
        &self.modules
    }

    /// All modules, writable.
    pub fn modules_mut(&mut self) -> &mut [ModuleGenome] {
        &mut self.modules
    }

    /// Number of ADF submodules.
    #[must_use]
    pub fn adf_count(&self) -> usize {
        self.modules.len() - 1
    }

    /// Seed carried with this function.
    #[must_use]
    pub fn random_seed(&self) -> u32 {
        self.random_seed
    }

    /// Replace the seed.
    pub fn set_random_seed(&mut self, seed: u32) {
        self.random_seed = seed;
    }

    /// Actuator outputs of the main module.
    #[must_use]
    pub fn actuators(&self) -> &[f32] {
        self.main().actuators()
    }

    /// Recompute every module's used map.
    pub fn refresh_used(&mut self, set: &InstructionSet) {
        let limits = self.limits(set);
        for module in &mut self.modules {
            module.refresh_used(limits);
        }
    }

    /// Zero every module's state.
    pub fn clear_state(&mut self) {
        for module in &mut self.modules {
            module.clear_state();
        }
    }

    /// Used cells in the main module.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.main().node_count()
    }

    /// Depth of the main module.
    #[must_use]
    pub fn max_depth(&self, set: &InstructionSet) -> usize {
        self.main().max_depth(self.limits(set))
    }

    /// Count of differing fields between two functions. Zero means equal.
    #[must_use]
    pub fn differences(&self, other: &Self) -> usize {
        let modules: usize = self
            .modules
            .iter()
            .zip(&other.modules)
            .map(|(a, b)| a.differences(b))
            .sum();
        let missing = self.modules.len().abs_diff(other.modules.len());
        let seed = usize::from(self.random_seed != other.random_seed);
        modules + missing + seed
    }
}
