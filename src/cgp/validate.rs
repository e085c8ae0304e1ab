//! Structural validation of functions.
//!
//! Validation runs over stored genes only. It never executes anything and
//! never panics: every defect is reported as a [`ValidationError`].

// Opcode fields are floats that encode integer codes
#![allow(clippy::cast_possible_truncation)]

use crate::cgp::function::{Function, MAX_ADF_MODULES, MAX_NODES, adf_sensors};
use crate::cgp::genome::{MAX_CONSTANT, ModuleGenome};
use crate::cgp::layout::{FIELD_CONSTANT, FIELD_OPCODE, GENE_HEADER};
use crate::cgp::opcode::{InstructionSet, Opcode};
use crate::error::ValidationError;

impl Function {
    /// Check every module against `set` and the size bounds.
    ///
    /// # Errors
    ///
    /// Returns the first defect found, scanning modules in order.
    pub fn validate(&self, set: &InstructionSet) -> Result<(), ValidationError> {
        let adf_count = self.adf_count();
        if adf_count > MAX_ADF_MODULES {
            return Err(ValidationError::TooManyAdfModules { count: adf_count });
        }

        let main_k = self.main().layout().connections_per_gene;
        for (m, module) in self.modules().iter().enumerate().skip(1) {
            let layout = module.layout();
            let expected = adf_sensors(main_k);
            if layout.sensors != expected
                || layout.actuators != 1
                || layout.connections_per_gene != main_k
            {
                return Err(ValidationError::AdfArgumentMismatch {
                    module: m,
                    sensors: layout.sensors,
                    expected,
                });
            }
        }

        for (m, module) in self.modules().iter().enumerate() {
            validate_module(m, module, set, adf_count)?;
        }
        Ok(())
    }
}

fn validate_module(
    m: usize,
    module: &ModuleGenome,
    set: &InstructionSet,
    adf_count: usize,
) -> Result<(), ValidationError> {
    let layout = module.layout();
    if layout.cells() > MAX_NODES {
        return Err(ValidationError::TooManyNodes {
            module: m,
            nodes: layout.cells(),
        });
    }
    if layout.sensors == 0 && layout.connections_per_gene > 0 && layout.cells() > 0 {
        return Err(ValidationError::NoSensors { module: m });
    }
    for (expected, found) in [
        (layout.genome_len(), module.genes().len()),
        (layout.state_len(), module.used().len()),
        (layout.state_len(), module.state().len()),
    ] {
        if expected != found {
            return Err(ValidationError::GenomeLength {
                module: m,
                expected,
                found,
            });
        }
    }

    let genes = module.genes();
    let bound = layout.source_bound() as f32;
    let in_range = |v: f32| v.is_finite() && v >= 0.0 && v < bound;

    for cell in 0..layout.cells() {
        let offset = layout.gene_offset(cell);
        let raw = genes[offset + FIELD_OPCODE];
        if raw.is_nan() {
            return Err(ValidationError::InvalidOpcode {
                module: m,
                cell,
                code: i32::MIN,
            });
        }
        // Negative opcodes are disabled cells
        if raw >= 0.0 {
            let op = Opcode::from_gene(raw)
                .filter(|&op| set.contains(op))
                .ok_or(ValidationError::InvalidOpcode {
                    module: m,
                    cell,
                    code: raw as i32,
                })?;
            if op == Opcode::AdfCall {
                if m != 0 {
                    return Err(ValidationError::NestedAdf { module: m, cell });
                }
                if adf_count == 0 {
                    return Err(ValidationError::MissingAdfModule { module: m, cell });
                }
            }
        }

        let constant = genes[offset + FIELD_CONSTANT];
        if !constant.is_finite() || constant.abs() > MAX_CONSTANT {
            return Err(ValidationError::ConstantOutOfRange {
                module: m,
                cell,
                value: constant,
            });
        }

        for connection in 0..layout.connections_per_gene {
            let value = genes[offset + GENE_HEADER + connection];
            if !in_range(value) {
                return Err(ValidationError::ConnectionOutOfRange {
                    module: m,
                    cell,
                    connection,
                    value,
                });
            }
        }
    }

    for actuator in 0..layout.actuators {
        let value = genes[layout.actuator_offset(actuator)];
        if !in_range(value) {
            return Err(ValidationError::ActuatorOutOfRange {
                module: m,
                actuator,
                value,
            });
        }
    }
    Ok(())
}
