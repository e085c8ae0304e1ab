//! Subgraph extraction into ADF submodules.
//!
//! Compression walks backwards from a target cell, moves the pure cells it
//! finds into a free submodule, and rewrites the target as a call to that
//! submodule. Values crossing the boundary become call arguments, bound to
//! the submodule's sensors in discovery order.
//!
//! Only pure cells are moved. Anything that reads genes, writes state, draws
//! random numbers or calls another module stays behind as an external
//! input. Compression is refused when any enabled host cell reads, copies
//! or overwrites the genes or state of a collected cell or of a cell
//! feeding the subgraph. On a graph
//! evaluated in feed-forward order, the rewritten function produces the
//! same actuator values as the original.

// Slot numbers are stored in the float constant field
#![allow(clippy::cast_precision_loss)]

use crate::cgp::function::Function;
use crate::cgp::genome::{ArgLimits, ModuleGenome, field_index};
use crate::cgp::interpreter::BLOCK_CELLS;
use crate::cgp::layout::Layout;
use crate::cgp::opcode::{InstructionSet, Opcode};
use crate::error::CompressError;
use crate::rng::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Bounds on the extracted subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Fewest cells worth moving.
    pub min_nodes: usize,
    /// Most cells collected before the rest become inputs.
    pub max_nodes: usize,
    /// Deepest level collected, counting the target as level 1.
    pub max_depth: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_nodes: 2,
            max_nodes: 8,
            max_depth: 4,
        }
    }
}

/// Subgraph found by the backward walk.
#[derive(Debug)]
struct Extraction {
    /// Host cells to move, ascending.
    cells: Vec<usize>,
    /// Host state indices that become call arguments, in discovery order.
    externals: Vec<usize>,
}

impl Function {
    /// Move the subgraph feeding main-module cell `target` into a free ADF
    /// slot and return that slot.
    ///
    /// # Errors
    ///
    /// Returns a [`CompressError`] and leaves the function unchanged when no
    /// slot is free or the subgraph is outside the configured bounds.
    pub fn compress_to_adf(
        &mut self,
        target: usize,
        config: &CompressionConfig,
        set: &InstructionSet,
    ) -> Result<usize, CompressError> {
        self.refresh_used(set);
        if !set.supports_adf() {
            return Err(CompressError::NoModuleAvailable);
        }
        let slot = self.free_adf_slot().ok_or(CompressError::NoModuleAvailable)?;

        let limits = self.limits(set);
        let host = self.main();
        let layout = *host.layout();
        if target >= layout.cells() || !host.used()[layout.cell_state(target)] || !movable(host, target) {
            return Err(CompressError::NoGenes);
        }

        let extraction = extract(host, target, config, limits)?;
        let sub_layout = *self.modules()[slot + 1].layout();
        let found = extraction.cells.len();
        if found < config.min_nodes {
            return Err(CompressError::TooFewGenes {
                found,
                min: config.min_nodes,
            });
        }
        if found > sub_layout.cells() {
            return Err(CompressError::TooManyGenes {
                found,
                max: sub_layout.cells(),
            });
        }
        if extraction.externals.is_empty() {
            return Err(CompressError::NoInputs);
        }
        if extraction.externals.len() > sub_layout.sensors {
            return Err(CompressError::TooManyInputs {
                found: extraction.externals.len(),
                max: sub_layout.sensors,
            });
        }
        let mut watched = extraction.cells.clone();
        watched.extend(extraction.externals.iter().filter_map(|&i| layout.state_cell(i)));
        if gene_referenced(self.main(), &watched) {
            return Err(CompressError::GeneReference);
        }

        let sub = build_submodule(self.main(), &extraction, sub_layout);
        self.modules_mut()[slot + 1] = sub;

        let host = self.main_mut();
        host.set_opcode(target, Opcode::AdfCall);
        host.set_constant(target, slot as f32);
        let first = extraction.externals[0];
        for j in 0..layout.connections_per_gene {
            let source = extraction.externals.get(j).copied().unwrap_or(first);
            host.set_input(target, j, source);
        }

        self.refresh_used(set);
        log::debug!(
            "compressed {found} cells with {} inputs into ADF slot {slot}",
            extraction.externals.len()
        );
        Ok(slot)
    }

    /// Compress around a random live cell of the main module.
    ///
    /// # Errors
    ///
    /// Same as [`Function::compress_to_adf`]; [`CompressError::NoGenes`] when
    /// no live cell can be moved.
    pub fn compress_random(
        &mut self,
        config: &CompressionConfig,
        set: &InstructionSet,
        rng: &mut Rng,
    ) -> Result<usize, CompressError> {
        self.refresh_used(set);
        let host = self.main();
        let layout = host.layout();
        let candidates: Vec<usize> = (0..layout.cells())
            .filter(|&c| host.used()[layout.cell_state(c)] && movable(host, c))
            .collect();
        if candidates.is_empty() {
            return Err(CompressError::NoGenes);
        }
        let target = candidates[rng.below(candidates.len())];
        self.compress_to_adf(target, config, set)
    }

    /// Lowest submodule slot no enabled call cell points at. Dead calls
    /// count, since they still run every pass.
    fn free_adf_slot(&self) -> Option<usize> {
        let count = self.adf_count();
        if count == 0 {
            return None;
        }
        let host = self.main();
        let layout = host.layout();
        let taken: HashSet<usize> = (0..layout.cells())
            .map(|c| host.gene(c))
            .filter(|g| g.opcode == Some(Opcode::AdfCall))
            .map(|g| adf_slot(g.constant, count))
            .collect();
        (0..count).find(|s| !taken.contains(s))
    }
}

/// Slot a call cell with `constant` dispatches to.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn adf_slot(constant: f32, count: usize) -> usize {
    (constant.abs() as usize) % count
}

/// Whether a cell can be moved into a submodule.
fn movable(module: &ModuleGenome, cell: usize) -> bool {
    module.gene(cell).opcode.is_some_and(Opcode::is_pure)
}

/// Whether an enabled cell with a gene or state addressing opcode points
/// at any of `cells`.
///
/// Addresses come from the first two connections; block copies cover
/// [`BLOCK_CELLS`] cells from each address.
fn gene_referenced(host: &ModuleGenome, cells: &[usize]) -> bool {
    let layout = host.layout();
    (0..layout.cells()).any(|cell| {
        let gene = host.gene(cell);
        let span = match gene.opcode {
            Some(Opcode::CopyBlock) => BLOCK_CELLS,
            Some(
                Opcode::CopyFunction
                | Opcode::CopyConstant
                | Opcode::CopyState
                | Opcode::GetFunction
                | Opcode::GetConstant
                | Opcode::GetInput
                | Opcode::GetInputValue,
            ) => 1,
            _ => return false,
        };
        gene.inputs
            .iter()
            .take(2)
            .filter_map(|&field| field_index(field))
            .filter_map(|index| layout.state_cell(index))
            .any(|start| {
                let block = start..start.saturating_add(span);
                cells.iter().any(|c| block.contains(c))
            })
    })
}

/// Breadth-first walk from `target`; each cell is classified at its
/// shallowest depth.
fn extract(
    host: &ModuleGenome,
    target: usize,
    config: &CompressionConfig,
    limits: ArgLimits,
) -> Result<Extraction, CompressError> {
    let layout = host.layout();
    let mut cells = vec![target];
    let mut externals = Vec::new();
    let mut seen = HashSet::from([layout.cell_state(target)]);
    let mut queue = VecDeque::from([(target, 1usize)]);

    while let Some((cell, depth)) = queue.pop_front() {
        let own = layout.cell_state(cell);
        for input in host.active_inputs(cell, limits) {
            if input >= own {
                return Err(CompressError::ForwardReference);
            }
            if !seen.insert(input) {
                continue;
            }
            match layout.state_cell(input) {
                Some(c)
                    if movable(host, c)
                        && depth < config.max_depth
                        && cells.len() < config.max_nodes =>
                {
                    cells.push(c);
                    queue.push_back((c, depth + 1));
                }
                _ => externals.push(input),
            }
        }
    }

    cells.sort_unstable();
    Ok(Extraction { cells, externals })
}

/// Lay the extracted cells out in a fresh submodule.
fn build_submodule(
    host: &ModuleGenome,
    extraction: &Extraction,
    sub_layout: Layout,
) -> ModuleGenome {
    let host_layout = host.layout();
    let mut sub = ModuleGenome::new(sub_layout);

    // Host state index -> submodule state index
    let mut remap: BTreeMap<usize, usize> = extraction
        .externals
        .iter()
        .enumerate()
        .map(|(sensor, &index)| (index, sensor))
        .collect();
    for (i, &cell) in extraction.cells.iter().enumerate() {
        remap.insert(host_layout.cell_state(cell), sub_layout.cell_state(i));
    }

    for cell in 0..sub_layout.cells() {
        sub.disable(cell);
    }
    for (i, &cell) in extraction.cells.iter().enumerate() {
        let gene = host.gene(cell);
        if let Some(op) = gene.opcode {
            sub.set_opcode(i, op);
        }
        sub.set_constant(i, gene.constant);
        for (j, &field) in gene.inputs.iter().enumerate() {
            let mapped = field_index(field)
                .and_then(|index| remap.get(&index).copied())
                .unwrap_or(0);
            sub.set_input(i, j, mapped);
        }
    }

    let last = extraction.cells.len() - 1;
    sub.set_actuator_source(0, sub_layout.cell_state(last));
    sub
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgp::function::FunctionShape;
    use crate::cgp::interpreter::RunOptions;

    fn shape() -> FunctionShape {
        FunctionShape {
            sensors: 3,
            actuators: 1,
            rows: 4,
            columns: 4,
            connections_per_gene: 3,
            adf_modules: 1,
            adf_rows: 3,
            adf_columns: 4,
            ..FunctionShape::default()
        }
    }

    /// cell0 = s0 + s1 + s2, cell4 = cell0 * s0, cell8 = cell4 - s1
    fn chain() -> Function {
        let mut f = Function::new(&shape());
        let layout = *f.main().layout();
        let m = f.main_mut();
        for cell in 0..layout.cells() {
            m.disable(cell);
        }
        m.set_opcode(0, Opcode::Add);
        m.set_constant(0, 2.0);
        m.set_input(0, 0, 0);
        m.set_input(0, 1, 1);
        m.set_input(0, 2, 2);
        m.set_opcode(4, Opcode::Multiply);
        m.set_constant(4, 1.0);
        m.set_input(4, 0, layout.cell_state(0));
        m.set_input(4, 1, 0);
        m.set_opcode(8, Opcode::Subtract);
        m.set_constant(8, 1.0);
        m.set_input(8, 0, layout.cell_state(4));
        m.set_input(8, 1, 1);
        m.set_actuator_source(0, layout.cell_state(8));
        f
    }

    #[test]
    fn test_compress_chain() {
        let set = InstructionSet::arithmetic_with_adf();
        let mut f = chain();
        let sensors = [1.0, 2.0, 3.0];
        let before = f.run(&sensors, &set, RunOptions::default())[0];

        let slot = f
            .compress_to_adf(8, &CompressionConfig::default(), &set)
            .unwrap();
        assert_eq!(slot, 0);
        assert_eq!(f.validate(&set), Ok(()));
        assert_eq!(f.main().gene(8).opcode, Some(Opcode::AdfCall));
        // Three sensor inputs plus the call cell
        assert_eq!(f.main().used_count(), 4);

        let after = f.run(&sensors, &set, RunOptions::default())[0];
        assert!((before - after).abs() < 1e-2);
        assert!((after - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_depth_bound_makes_inputs() {
        let set = InstructionSet::arithmetic_with_adf();
        let mut f = chain();
        let config = CompressionConfig {
            max_depth: 2,
            ..CompressionConfig::default()
        };
        let before = f.run(&[0.5, -1.0, 2.0], &set, RunOptions::default())[0];
        f.compress_to_adf(8, &config, &set).unwrap();
        // cell0 stays in the host and feeds the call
        assert!(f.main().used()[f.main().layout().cell_state(0)]);
        let after = f.run(&[0.5, -1.0, 2.0], &set, RunOptions::default())[0];
        assert!((before - after).abs() < 1e-2);
    }

    #[test]
    fn test_compress_errors() {
        let set = InstructionSet::arithmetic_with_adf();
        let config = CompressionConfig::default();

        let mut f = chain();
        assert_eq!(f.compress_to_adf(1, &config, &set), Err(CompressError::NoGenes));

        let strict = CompressionConfig {
            min_nodes: 5,
            ..config
        };
        assert_eq!(
            f.compress_to_adf(8, &strict, &set),
            Err(CompressError::TooFewGenes { found: 3, min: 5 })
        );

        let mut constant = chain();
        constant.main_mut().set_opcode(8, Opcode::Constant);
        let single = CompressionConfig {
            min_nodes: 1,
            ..config
        };
        assert_eq!(
            constant.compress_to_adf(8, &single, &set),
            Err(CompressError::NoInputs)
        );

        f.compress_to_adf(8, &config, &set).unwrap();
        let layout = *f.main().layout();
        f.main_mut().set_opcode(12, Opcode::Value);
        f.main_mut().set_input(12, 0, layout.cell_state(8));
        f.main_mut().set_actuator_source(0, layout.cell_state(12));
        assert_eq!(
            f.compress_to_adf(12, &single, &set),
            Err(CompressError::NoModuleAvailable)
        );
    }

    #[test]
    fn test_too_many_inputs() {
        let set = InstructionSet::arithmetic_with_adf();
        let narrow = FunctionShape {
            connections_per_gene: 2,
            ..shape()
        };
        let mut f = Function::new(&narrow);
        let layout = *f.main().layout();
        let m = f.main_mut();
        for cell in 0..layout.cells() {
            m.disable(cell);
        }
        // cell0 = s0 + s1, cell4 = cell0 + s2
        m.set_opcode(0, Opcode::Add);
        m.set_constant(0, 1.0);
        m.set_input(0, 0, 0);
        m.set_input(0, 1, 1);
        m.set_opcode(4, Opcode::Add);
        m.set_constant(4, 1.0);
        m.set_input(4, 0, layout.cell_state(0));
        m.set_input(4, 1, 2);
        m.set_actuator_source(0, layout.cell_state(4));

        assert_eq!(
            f.compress_to_adf(4, &CompressionConfig::default(), &set),
            Err(CompressError::TooManyInputs { found: 3, max: 2 })
        );
    }

    #[test]
    fn test_gene_reader_blocks_compression() {
        let set = InstructionSet::with_adf();
        let mut f = chain();
        let layout = *f.main().layout();
        let m = f.main_mut();
        // cell12 reads the constant of cell8 and drives the actuator
        m.set_opcode(12, Opcode::GetConstant);
        m.set_constant(12, 1.0);
        m.set_input(12, 0, layout.cell_state(8));
        m.set_actuator_source(0, layout.cell_state(12));
        let sensors = [1.0, 2.0, 3.0];
        let before = f.run(&sensors, &set, RunOptions::default())[0];
        let genes = f.main().genes().to_vec();

        assert_eq!(
            f.compress_to_adf(8, &CompressionConfig::default(), &set),
            Err(CompressError::GeneReference)
        );
        assert_eq!(f.main().genes(), genes.as_slice());
        let after = f.run(&sensors, &set, RunOptions::default())[0];
        assert!((before - after).abs() < 1e-2);
    }

    #[test]
    fn test_block_copy_over_moved_cell_blocks_compression() {
        let set = InstructionSet::with_adf();
        let mut f = chain();
        let layout = *f.main().layout();
        let m = f.main_mut();
        // Block from cell2 spans cells 2..7, which covers moved cell4
        m.set_opcode(13, Opcode::CopyBlock);
        m.set_constant(13, 1.0);
        m.set_input(13, 0, layout.cell_state(2));
        m.set_input(13, 1, layout.cell_state(10));
        assert_eq!(
            f.compress_to_adf(8, &CompressionConfig::default(), &set),
            Err(CompressError::GeneReference)
        );

        // A reader aimed elsewhere leaves compression alone
        let mut g = chain();
        g.main_mut().set_opcode(13, Opcode::GetConstant);
        g.main_mut().set_input(13, 0, layout.cell_state(1));
        g.main_mut().set_input(13, 1, 0);
        assert_eq!(
            g.compress_to_adf(8, &CompressionConfig::default(), &set),
            Ok(0)
        );
    }

    #[test]
    fn test_forward_reference() {
        let set = InstructionSet::arithmetic_with_adf();
        let mut f = chain();
        let late = f.main().layout().cell_state(12);
        f.main_mut().set_opcode(12, Opcode::Constant);
        f.main_mut().set_input(4, 1, late);
        assert_eq!(
            f.compress_to_adf(8, &CompressionConfig::default(), &set),
            Err(CompressError::ForwardReference)
        );
    }
}
