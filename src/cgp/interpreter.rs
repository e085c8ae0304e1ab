//! Interpreter for CGP modules.
//!
//! Cells are evaluated column by column, row by row, which is strictly
//! increasing flat cell order. A cell may read sensors and any state value;
//! random construction and mutation only ever point connections backwards,
//! so in practice every read sees a value computed earlier in the pass.
//!
//! Self-modifying opcodes never touch the gene array while the pass is
//! running. They emit [`GeneEdit`]s which are applied once the pass is over.

// Gene fields are floats that encode integer indices
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::cgp::function::{ADF_ITERATIONS, Function};
use crate::cgp::genome::{ArgLimits, ModuleGenome, clamp_state, field_index};
use crate::cgp::layout::{FIELD_CONSTANT, FIELD_OPCODE, GENE_HEADER, Layout};
use crate::cgp::opcode::{InstructionSet, MAX_ARGS, Opcode};
use crate::rng::Rng;
use serde::{Deserialize, Serialize};

/// Number of consecutive cells moved by a block copy.
pub const BLOCK_CELLS: usize = 5;

/// Options for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Probability that a dropout cell outputs zero.
    pub dropout_rate: f32,
}

/// A change to the gene array requested by a self-modifying cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneEdit {
    /// Copy one field of the `from` cell's gene into the `to` cell's gene.
    CopyField {
        /// Source cell.
        from: usize,
        /// Destination cell.
        to: usize,
        /// Field offset within the gene.
        field: usize,
    },
    /// Copy `len` consecutive genes starting at `from` over those at `to`.
    CopyBlock {
        /// First source cell.
        from: usize,
        /// First destination cell.
        to: usize,
        /// Number of cells.
        len: usize,
    },
}

impl GeneEdit {
    /// Apply this edit. Out-of-grid parts are ignored.
    pub fn apply(self, module: &mut ModuleGenome) {
        let layout = *module.layout();
        let cells = layout.cells();
        let genes = module.genes_mut();
        match self {
            Self::CopyField { from, to, field } => {
                if from < cells && to < cells && field < layout.gene_size() {
                    genes[layout.gene_offset(to) + field] = genes[layout.gene_offset(from) + field];
                }
            }
            Self::CopyBlock { from, to, len } => {
                if from >= cells || to >= cells {
                    return;
                }
                let count = len.min(cells - from).min(cells - to);
                let src = layout.gene_offset(from)..layout.gene_offset(from + count);
                genes.copy_within(src, layout.gene_offset(to));
            }
        }
    }
}

impl Function {
    /// Run the function once on `sensors` and return the actuator values.
    ///
    /// Extra sensor values are ignored; missing ones read as zero.
    pub fn run(&mut self, sensors: &[f32], set: &InstructionSet, options: RunOptions) -> &[f32] {
        let limits = self.limits(set);
        let mut rng = Rng::new(self.random_seed());
        let mut edits = Vec::new();

        let (main, adfs) = self.modules_mut().split_at_mut(1);
        let main = &mut main[0];
        let n_sensors = main.layout().sensors;
        for (i, slot) in main.state_mut()[..n_sensors].iter_mut().enumerate() {
            *slot = clamp_state(sensors.get(i).copied().unwrap_or(0.0));
        }

        run_module(main, adfs, limits, options, &mut rng, &mut edits);
        for edit in edits {
            edit.apply(main);
        }

        self.set_random_seed(rng.seed());
        self.refresh_used(set);
        self.actuators()
    }
}

/// Evaluate every cell of `module` once and update its actuators.
///
/// `adfs` is the table of callable submodules; it is empty when `module` is
/// itself a submodule, which is what keeps calls from nesting.
#[allow(clippy::too_many_lines)]
fn run_module(
    module: &mut ModuleGenome,
    adfs: &mut [ModuleGenome],
    limits: ArgLimits,
    options: RunOptions,
    rng: &mut Rng,
    edits: &mut Vec<GeneEdit>,
) {
    let layout = *module.layout();
    let (genes, state) = module.genes_and_state();
    let k = layout.connections_per_gene;

    for cell in 0..layout.cells() {
        let offset = layout.gene_offset(cell);
        let gene = &genes[offset..offset + layout.gene_size()];
        let Some(op) = Opcode::from_gene(gene[FIELD_OPCODE]) else {
            continue;
        };
        let constant = gene[FIELD_CONSTANT];
        let inputs = &gene[GENE_HEADER..];
        let n = op
            .arity(constant, k, limits.max_args, limits.adf_args)
            .min(MAX_ARGS);

        let mut args = [0.0f32; MAX_ARGS];
        for (arg, &field) in args.iter_mut().zip(&inputs[..n]) {
            *arg = read(state, field);
        }
        let (a0, a1) = (args[0], args[1]);
        let input_cell = |j: usize| {
            inputs
                .get(j)
                .filter(|_| j < n)
                .and_then(|&f| field_index(f))
                .and_then(|i| layout.state_cell(i))
        };

        let value = match op {
            Opcode::Constant => constant,
            Opcode::Add => args[..n.max(1)].iter().sum(),
            Opcode::Subtract => a0 - args[1..n.max(1)].iter().sum::<f32>(),
            Opcode::Multiply => args[..n.max(1)].iter().product(),
            Opcode::Mean => args[..n.max(1)].iter().sum::<f32>() / n.max(1) as f32,
            Opcode::Divide => {
                if a1.abs() < f32::MIN_POSITIVE {
                    a0
                } else {
                    a0 / a1
                }
            }
            Opcode::Modulo => {
                if a1.abs() < f32::MIN_POSITIVE {
                    a0
                } else {
                    a0 % a1
                }
            }
            Opcode::Floor => a0.floor(),
            Opcode::Negate => -a0,
            Opcode::Value => a0,
            Opcode::Greater => threshold(a0 > a1, constant),
            Opcode::Less => threshold(a0 < a1, constant),
            Opcode::Equal => threshold((a0 - a1).abs() < f32::EPSILON, constant),
            Opcode::And => threshold(a0 > 0.0 && a1 > 0.0, constant),
            Opcode::Or => threshold(a0 > 0.0 || a1 > 0.0, constant),
            Opcode::Xor => threshold((a0 > 0.0) != (a1 > 0.0), constant),
            Opcode::NotEqual => threshold(a0 as i32 != a1 as i32, constant),
            Opcode::ScaledProduct => 0.1 * a0 * a1,
            Opcode::Exp => a0.exp(),
            Opcode::Sqrt => a0.abs().sqrt(),
            Opcode::Sine => a0.sin() * 256.0,
            Opcode::Arcsine => a0.asin(),
            Opcode::Cosine => a0.cos() * 256.0,
            Opcode::Arccosine => a0.acos(),
            Opcode::Power => a0.powf(a1),
            Opcode::Min => args[..n.max(1)].iter().copied().fold(f32::INFINITY, f32::min),
            Opcode::Max => args[..n.max(1)]
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max),
            Opcode::CopyFunction | Opcode::CopyConstant => {
                if let (Some(from), Some(to)) = (input_cell(0), input_cell(1)) {
                    let field = if op == Opcode::CopyFunction {
                        FIELD_OPCODE
                    } else {
                        FIELD_CONSTANT
                    };
                    edits.push(GeneEdit::CopyField { from, to, field });
                }
                a0
            }
            Opcode::CopyState => {
                if let Some(to) = input_cell(1) {
                    state[layout.cell_state(to)] = a0;
                }
                a0
            }
            Opcode::CopyBlock => {
                if let (Some(from), Some(to)) = (input_cell(0), input_cell(1)) {
                    edits.push(GeneEdit::CopyBlock {
                        from,
                        to,
                        len: BLOCK_CELLS,
                    });
                }
                a0
            }
            Opcode::GetFunction => gene_field(genes, &layout, input_cell(0), FIELD_OPCODE).unwrap_or(a0),
            Opcode::GetConstant => {
                gene_field(genes, &layout, input_cell(0), FIELD_CONSTANT).unwrap_or(a0)
            }
            Opcode::GetInput => {
                let field = GENE_HEADER + (constant.abs() as usize) % k.max(1);
                gene_field(genes, &layout, input_cell(0), field).unwrap_or(a0)
            }
            Opcode::GetInputValue => gene_field(genes, &layout, input_cell(0), GENE_HEADER)
                .map_or(a0, |field| read(state, field)),
            Opcode::Dropout => {
                if rng.chance(options.dropout_rate) {
                    0.0
                } else {
                    a0
                }
            }
            Opcode::AdfCall => call_adf(adfs, constant, &args[..n], limits, options, rng),
        };

        state[layout.cell_state(cell)] = clamp_state(value);
    }

    write_actuators(&layout, genes, state);
}

/// Run a submodule on `args` and return its single actuator.
fn call_adf(
    adfs: &mut [ModuleGenome],
    constant: f32,
    args: &[f32],
    limits: ArgLimits,
    options: RunOptions,
    rng: &mut Rng,
) -> f32 {
    if adfs.is_empty() {
        return 0.0;
    }
    let slot = (constant.abs() as usize) % adfs.len();
    let sub = &mut adfs[slot];
    let sensors = sub.layout().sensors;
    for (s, &v) in sub.state_mut()[..sensors].iter_mut().zip(args) {
        *s = v;
    }

    let mut edits = Vec::new();
    for _ in 0..ADF_ITERATIONS {
        run_module(sub, &mut [], limits, options, rng, &mut edits);
    }
    for edit in edits {
        edit.apply(sub);
    }
    sub.actuators().first().copied().unwrap_or(0.0)
}

fn write_actuators(layout: &Layout, genes: &[f32], state: &mut [f32]) {
    let base = layout.source_bound();
    for a in 0..layout.actuators {
        let value = read(state, genes[layout.actuator_offset(a)]);
        state[base + a] = value;
    }
}

fn read(state: &[f32], field: f32) -> f32 {
    field_index(field)
        .and_then(|i| state.get(i).copied())
        .unwrap_or(0.0)
}

fn threshold(condition: bool, constant: f32) -> f32 {
    if condition { constant } else { 0.0 }
}

fn gene_field(genes: &[f32], layout: &Layout, cell: Option<usize>, field: usize) -> Option<f32> {
    cell.map(|c| genes[layout.gene_offset(c) + field])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgp::function::FunctionShape;

    fn shape(sensors: usize, rows: usize, columns: usize, k: usize) -> FunctionShape {
        FunctionShape {
            sensors,
            actuators: 1,
            rows,
            columns,
            connections_per_gene: k,
            ..FunctionShape::default()
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_simple_graph() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(2, 1, 2, 2));
        let layout = *f.main().layout();
        let m = f.main_mut();
        // cell0 = s0 * s1, cell1 = cell0 - s0
        m.set_opcode(0, Opcode::Multiply);
        m.set_constant(0, 1.0);
        m.set_input(0, 0, 0);
        m.set_input(0, 1, 1);
        m.set_opcode(1, Opcode::Subtract);
        m.set_constant(1, 1.0);
        m.set_input(1, 0, layout.cell_state(0));
        m.set_input(1, 1, 0);
        m.set_actuator_source(0, layout.cell_state(1));

        let out = f.run(&[3.0, 4.0], &set, RunOptions::default());
        assert!(approx(out[0], 9.0));
    }

    #[test]
    fn test_disabled_cell_is_skipped() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(1, 1, 1, 2));
        f.main_mut().disable(0);
        f.main_mut().set_actuator_source(0, 1);
        f.main_mut().state_mut()[1] = 12.0;
        let out = f.run(&[3.0], &set, RunOptions::default());
        assert!(approx(out[0], 12.0));
    }

    #[test]
    fn test_safe_divide_and_clamp() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(2, 2, 1, 2));
        let m = f.main_mut();
        m.set_opcode(0, Opcode::Divide);
        m.set_input(0, 0, 0);
        m.set_input(0, 1, 1);
        m.set_opcode(1, Opcode::Exp);
        m.set_input(1, 0, 0);
        m.set_actuator_source(0, 2);

        let out = f.run(&[5.0, 0.0], &set, RunOptions::default());
        assert!(approx(out[0], 5.0));

        f.main_mut().set_actuator_source(0, 3);
        let out = f.run(&[10.0, 0.0], &set, RunOptions::default());
        assert!(approx(out[0], 4096.0));
    }

    #[test]
    fn test_threshold_emits_constant() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(2, 1, 1, 2));
        let m = f.main_mut();
        m.set_opcode(0, Opcode::Greater);
        m.set_constant(0, 2.5);
        m.set_input(0, 0, 0);
        m.set_input(0, 1, 1);
        m.set_actuator_source(0, 2);

        assert!(approx(f.run(&[2.0, 1.0], &set, RunOptions::default())[0], 2.5));
        assert!(approx(f.run(&[1.0, 2.0], &set, RunOptions::default())[0], 0.0));
    }

    #[test]
    fn test_run_is_deterministic() {
        let set = InstructionSet::full();
        let mut rng = Rng::new(31);
        let mut a = Function::random(&shape(3, 5, 8, 3), &set, &mut rng);
        let mut b = a.clone();
        let out_a = a.run(&[1.0, -2.0, 0.5], &set, RunOptions::default()).to_vec();
        let out_b = b.run(&[1.0, -2.0, 0.5], &set, RunOptions::default()).to_vec();
        assert_eq!(a.differences(&b), 0);
        for (x, y) in out_a.iter().zip(&out_b) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_copy_function_applies_after_pass() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(1, 1, 4, 2));
        let layout = *f.main().layout();
        let m = f.main_mut();
        m.set_opcode(0, Opcode::Negate);
        m.set_input(0, 0, 0);
        m.set_opcode(1, Opcode::Constant);
        m.set_constant(1, 7.0);
        m.set_opcode(2, Opcode::CopyFunction);
        m.set_input(2, 0, layout.cell_state(0));
        m.set_input(2, 1, layout.cell_state(1));
        m.set_opcode(3, Opcode::Value);
        m.set_input(3, 0, layout.cell_state(1));
        m.set_actuator_source(0, layout.cell_state(3));

        // The copy is deferred, so this pass still sees the constant
        assert!(approx(f.run(&[2.0], &set, RunOptions::default())[0], 7.0));
        assert_eq!(f.main().gene(1).opcode, Some(Opcode::Negate));
        assert!(approx(f.run(&[2.0], &set, RunOptions::default())[0], -2.0));
    }

    #[test]
    fn test_gene_reads() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(1, 1, 3, 2));
        let layout = *f.main().layout();
        let m = f.main_mut();
        m.set_opcode(0, Opcode::Constant);
        m.set_constant(0, 3.5);
        m.set_opcode(1, Opcode::GetConstant);
        m.set_input(1, 0, layout.cell_state(0));
        m.set_opcode(2, Opcode::GetFunction);
        m.set_input(2, 0, layout.cell_state(1));
        m.set_actuator_source(0, layout.cell_state(1));

        assert!(approx(f.run(&[0.0], &set, RunOptions::default())[0], 3.5));
        let code = f.main().state()[layout.cell_state(2)];
        assert!(approx(code, Opcode::GetConstant.gene_value()));
    }

    #[test]
    fn test_copy_state_writes_target() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(1, 1, 3, 2));
        let layout = *f.main().layout();
        let m = f.main_mut();
        m.set_opcode(0, Opcode::CopyState);
        m.set_input(0, 0, 0);
        m.set_input(0, 1, layout.cell_state(2));
        m.disable(1);
        m.disable(2);
        m.set_actuator_source(0, layout.cell_state(2));

        assert!(approx(f.run(&[6.0], &set, RunOptions::default())[0], 6.0));
    }

    #[test]
    fn test_block_copy() {
        let layout = Layout::new(1, 1, 1, 12, 2);
        let mut module = ModuleGenome::new(layout);
        for cell in 0..5 {
            module.set_opcode(cell, Opcode::Sqrt);
        }
        GeneEdit::CopyBlock { from: 0, to: 9, len: BLOCK_CELLS }.apply(&mut module);
        for cell in 9..12 {
            assert_eq!(module.gene(cell).opcode, Some(Opcode::Sqrt));
        }
        assert_eq!(module.gene(8).opcode, Some(Opcode::Constant));
    }

    #[test]
    fn test_adf_call() {
        let set = InstructionSet::with_adf();
        let shape = FunctionShape {
            adf_modules: 1,
            adf_rows: 1,
            adf_columns: 1,
            ..shape(2, 1, 1, 2)
        };
        let mut f = Function::new(&shape);
        {
            let sub = &mut f.modules_mut()[1];
            sub.set_opcode(0, Opcode::Multiply);
            sub.set_constant(0, 1.0);
            sub.set_input(0, 0, 0);
            sub.set_input(0, 1, 1);
            sub.set_actuator_source(0, 2);
        }
        let m = f.main_mut();
        m.set_opcode(0, Opcode::AdfCall);
        m.set_input(0, 0, 0);
        m.set_input(0, 1, 1);
        m.set_actuator_source(0, 2);

        assert!(approx(f.run(&[3.0, -2.0], &set, RunOptions::default())[0], -6.0));
    }

    #[test]
    fn test_dropout_uses_function_seed() {
        let set = InstructionSet::full();
        let mut f = Function::new(&shape(1, 1, 1, 1));
        f.main_mut().set_opcode(0, Opcode::Dropout);
        f.main_mut().set_actuator_source(0, 1);
        f.set_random_seed(9);

        let options = RunOptions { dropout_rate: 0.5 };
        let zeros = (0..200)
            .filter(|_| f.run(&[1.0], &set, options)[0].abs() < f32::EPSILON)
            .count();
        assert!(zeros > 50 && zeros < 150);
        assert_ne!(f.random_seed(), 9);
    }
}
