//! Per-module genome: the flat gene array, its used map and state vector.
//!
//! A gene is `[opcode, constant, input_0 .. input_{k-1}]`. All fields are
//! stored as `f32` so that self-modifying cells can copy any field of one
//! gene into the same field of another without a type switch. A negative
//! opcode marks a disabled cell.

// Gene fields are floats that encode integer indices
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::cgp::layout::{FIELD_CONSTANT, FIELD_OPCODE, GENE_HEADER, Layout};
use crate::cgp::opcode::{InstructionSet, Opcode};
use crate::rng::Rng;
use serde::{Deserialize, Serialize};

/// Bound on every state value.
pub const MAX_STATE: f32 = 4096.0;

/// Bound on every stored constant.
pub const MAX_CONSTANT: f32 = 4096.0;

/// Opcode field value of a disabled cell.
pub const DISABLED: f32 = -1.0;

/// Clamp a computed value into the legal state range. NaN and infinities
/// collapse to zero.
#[must_use]
pub fn clamp_state(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-MAX_STATE, MAX_STATE)
    } else {
        0.0
    }
}

/// Decode a connection field into a state index.
#[must_use]
pub fn field_index(field: f32) -> Option<usize> {
    if field.is_finite() && field >= 0.0 {
        Some(field as usize)
    } else {
        None
    }
}

/// Argument ceilings that decide how many inputs a cell reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgLimits {
    /// n-ary ceiling of the instruction set.
    pub max_args: usize,
    /// Arguments passed by an ADF call.
    pub adf_args: usize,
}

impl ArgLimits {
    /// Limits for a function evaluated with `set`.
    #[must_use]
    pub fn new(set: &InstructionSet, adf_args: usize) -> Self {
        Self {
            max_args: set.max_args(),
            adf_args,
        }
    }
}

/// Read-only view of one gene.
#[derive(Debug, Clone, Copy)]
pub struct Gene<'a> {
    /// Decoded opcode, `None` when the cell is disabled.
    pub opcode: Option<Opcode>,
    /// Constant field.
    pub constant: f32,
    /// Raw connection fields.
    pub inputs: &'a [f32],
}

/// Parameters for random genome construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomInit {
    /// Lower bound for initial constants.
    pub min_constant: f32,
    /// Upper bound for initial constants.
    pub max_constant: f32,
    /// How many previous columns a connection may reach (0 = all).
    pub levels_back: usize,
}

impl Default for RandomInit {
    fn default() -> Self {
        Self {
            min_constant: -10.0,
            max_constant: 10.0,
            levels_back: 0,
        }
    }
}

/// One module of a [`Function`](crate::cgp::Function).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleGenome {
    layout: Layout,
    genes: Vec<f32>,
    used: Vec<bool>,
    state: Vec<f32>,
}

impl ModuleGenome {
    /// Create a zero-filled module with an empty used map.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            genes: vec![0.0; layout.genome_len()],
            used: vec![false; layout.state_len()],
            state: vec![0.0; layout.state_len()],
        }
    }

    /// Rebuild a module from stored parts.
    ///
    /// Lengths are not checked here; the loader and validator do that.
    #[must_use]
    pub fn from_parts(layout: Layout, genes: Vec<f32>, used: Vec<bool>, state: Vec<f32>) -> Self {
        Self {
            layout,
            genes,
            used,
            state,
        }
    }

    /// Fill every gene with random legal values.
    pub fn randomize(
        &mut self,
        set: &InstructionSet,
        allow_adf: bool,
        init: &RandomInit,
        limits: ArgLimits,
        rng: &mut Rng,
    ) {
        let layout = self.layout;
        for cell in 0..layout.cells() {
            let col = layout.column_of(cell);
            let offset = layout.gene_offset(cell);
            self.genes[offset + FIELD_OPCODE] = set.choose(rng, allow_adf).gene_value();
            self.genes[offset + FIELD_CONSTANT] =
                rng.float_range(init.min_constant, init.max_constant);
            for j in 0..layout.connections_per_gene {
                self.genes[offset + GENE_HEADER + j] =
                    random_source(&layout, col, init.levels_back, rng) as f32;
            }
        }
        for a in 0..layout.actuators {
            self.genes[layout.actuator_offset(a)] = rng.below(layout.source_bound()) as f32;
        }
        self.refresh_used(limits);
    }

    /// Shape of this module.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Flat gene array.
    #[must_use]
    pub fn genes(&self) -> &[f32] {
        &self.genes
    }

    pub(crate) fn genes_mut(&mut self) -> &mut [f32] {
        &mut self.genes
    }

    /// Used map over the state vector.
    #[must_use]
    pub fn used(&self) -> &[bool] {
        &self.used
    }

    /// State vector.
    #[must_use]
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut [f32] {
        &mut self.state
    }

    /// Split borrow: genes read-only, state writable.
    pub(crate) fn genes_and_state(&mut self) -> (&[f32], &mut [f32]) {
        (&self.genes, &mut self.state)
    }

    /// Zero the state vector.
    pub fn clear_state(&mut self) {
        self.state.iter_mut().for_each(|v| *v = 0.0);
    }

    /// View of one gene.
    #[must_use]
    pub fn gene(&self, cell: usize) -> Gene<'_> {
        let offset = self.layout.gene_offset(cell);
        let fields = &self.genes[offset..offset + self.layout.gene_size()];
        Gene {
            opcode: Opcode::from_gene(fields[FIELD_OPCODE]),
            constant: fields[FIELD_CONSTANT],
            inputs: &fields[GENE_HEADER..],
        }
    }

    /// Set a cell's opcode.
    pub fn set_opcode(&mut self, cell: usize, op: Opcode) {
        let offset = self.layout.gene_offset(cell);
        self.genes[offset + FIELD_OPCODE] = op.gene_value();
    }

    /// Disable a cell.
    pub fn disable(&mut self, cell: usize) {
        let offset = self.layout.gene_offset(cell);
        self.genes[offset + FIELD_OPCODE] = DISABLED;
    }

    /// Set a cell's constant.
    pub fn set_constant(&mut self, cell: usize, constant: f32) {
        let offset = self.layout.gene_offset(cell);
        self.genes[offset + FIELD_CONSTANT] = constant;
    }

    /// Set one connection of a cell to a state index.
    pub fn set_input(&mut self, cell: usize, connection: usize, source: usize) {
        let offset = self.layout.gene_offset(cell);
        self.genes[offset + GENE_HEADER + connection] = source as f32;
    }

    /// State index an actuator reads from.
    #[must_use]
    pub fn actuator_source(&self, actuator: usize) -> Option<usize> {
        field_index(self.genes[self.layout.actuator_offset(actuator)])
    }

    /// Point an actuator at a state index.
    pub fn set_actuator_source(&mut self, actuator: usize, source: usize) {
        let offset = self.layout.actuator_offset(actuator);
        self.genes[offset] = source as f32;
    }

    /// Actuator outputs from the last run.
    #[must_use]
    pub fn actuators(&self) -> &[f32] {
        &self.state[self.layout.source_bound()..]
    }

    /// State indices a cell actually reads.
    #[must_use]
    pub fn active_inputs(&self, cell: usize, limits: ArgLimits) -> Vec<usize> {
        let gene = self.gene(cell);
        let Some(op) = gene.opcode else {
            return Vec::new();
        };
        let n = op.arity(
            gene.constant,
            self.layout.connections_per_gene,
            limits.max_args,
            limits.adf_args,
        );
        gene.inputs[..n].iter().filter_map(|&f| field_index(f)).collect()
    }

    /// Recompute the used map by walking back from the actuators.
    pub fn refresh_used(&mut self, limits: ArgLimits) {
        let layout = self.layout;
        self.used.clear();
        self.used.resize(layout.state_len(), false);

        let mut stack = Vec::new();
        for a in 0..layout.actuators {
            self.used[layout.source_bound() + a] = true;
            if let Some(src) = self.actuator_source(a) {
                stack.push(src);
            }
        }

        while let Some(index) = stack.pop() {
            if index >= layout.source_bound() || self.used[index] {
                continue;
            }
            self.used[index] = true;
            if let Some(cell) = layout.state_cell(index) {
                stack.extend(self.active_inputs(cell, limits));
            }
        }
    }

    /// Number of used sensors and cells.
    #[must_use]
    pub fn used_count(&self) -> usize {
        self.used[..self.layout.source_bound().min(self.used.len())]
            .iter()
            .filter(|&&u| u)
            .count()
    }

    /// Number of used cells.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let layout = self.layout;
        (layout.sensors..layout.source_bound().min(self.used.len()))
            .filter(|&i| self.used[i])
            .count()
    }

    /// Longest chain of cells between a sensor and an actuator.
    #[must_use]
    pub fn max_depth(&self, limits: ArgLimits) -> usize {
        let layout = self.layout;
        let mut depth = vec![0usize; layout.cells()];
        for cell in 0..layout.cells() {
            if self.gene(cell).opcode.is_none() {
                continue;
            }
            let deepest = self
                .active_inputs(cell, limits)
                .into_iter()
                .filter_map(|i| layout.state_cell(i))
                .filter(|&c| c < cell)
                .map(|c| depth[c])
                .max()
                .unwrap_or(0);
            depth[cell] = deepest + 1;
        }
        (0..layout.actuators)
            .filter_map(|a| self.actuator_source(a))
            .filter_map(|i| layout.state_cell(i))
            .map(|c| depth.get(c).copied().unwrap_or(0))
            .max()
            .unwrap_or(0)
    }

    /// Count differing genes, used flags and state values.
    #[must_use]
    pub fn differences(&self, other: &Self) -> usize {
        if self.layout != other.layout {
            return self.genes.len().max(other.genes.len()) + 1;
        }
        let genes = count_float_diffs(&self.genes, &other.genes);
        let used = self
            .used
            .iter()
            .zip(&other.used)
            .filter(|(a, b)| a != b)
            .count()
            + self.used.len().abs_diff(other.used.len());
        let state = count_float_diffs(&self.state, &other.state);
        genes + used + state
    }
}

/// Random connection target for a cell in `col`.
pub(crate) fn random_source(layout: &Layout, col: usize, levels_back: usize, rng: &mut Rng) -> usize {
    let (lo, hi) = layout.feed_forward_range(col, levels_back);
    let choices = layout.sensors + (hi - lo);
    if choices == 0 {
        return 0;
    }
    let r = rng.below(choices);
    if r < layout.sensors {
        r
    } else {
        lo + (r - layout.sensors)
    }
}

fn count_float_diffs(a: &[f32], b: &[f32]) -> usize {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.to_bits() != y.to_bits())
        .count()
        + a.len().abs_diff(b.len())
}
