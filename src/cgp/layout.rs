//! Grid topology and the tagged state index.
//!
//! Storage stays flat, but every conversion between a flat index and a grid
//! position goes through [`Layout`] so the sensor and actuator offsets live in
//! exactly one place.

use serde::{Deserialize, Serialize};

/// Number of non-connection fields in a gene (opcode, constant).
pub const GENE_HEADER: usize = 2;

/// Offset of the opcode field within a gene.
pub const FIELD_OPCODE: usize = 0;

/// Offset of the constant field within a gene.
pub const FIELD_CONSTANT: usize = 1;

/// Shape of one module genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout {
    /// Number of sensor (input) slots.
    pub sensors: usize,
    /// Number of actuator (output) slots.
    pub actuators: usize,
    /// Rows in the cell grid.
    pub rows: usize,
    /// Columns in the cell grid.
    pub columns: usize,
    /// Input connections stored per gene.
    pub connections_per_gene: usize,
}

/// A position in a module's state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Sensor reading.
    Sensor(usize),
    /// Grid cell output.
    Cell {
        /// Row within the column.
        row: usize,
        /// Column (evaluation order).
        col: usize,
    },
    /// Actuator output.
    Actuator(usize),
}

impl Layout {
    /// Create a layout.
    #[must_use]
    pub const fn new(
        sensors: usize,
        actuators: usize,
        rows: usize,
        columns: usize,
        connections_per_gene: usize,
    ) -> Self {
        Self {
            sensors,
            actuators,
            rows,
            columns,
            connections_per_gene,
        }
    }

    /// Number of grid cells.
    #[must_use]
    pub const fn cells(&self) -> usize {
        self.rows * self.columns
    }

    /// Number of fields per gene.
    #[must_use]
    pub const fn gene_size(&self) -> usize {
        GENE_HEADER + self.connections_per_gene
    }

    /// Length of the flat gene array, including the actuator mapping block.
    #[must_use]
    pub const fn genome_len(&self) -> usize {
        self.cells() * self.gene_size() + self.actuators
    }

    /// Length of the state vector.
    #[must_use]
    pub const fn state_len(&self) -> usize {
        self.sensors + self.cells() + self.actuators
    }

    /// Exclusive upper bound for connection indices (sensors and cells).
    #[must_use]
    pub const fn source_bound(&self) -> usize {
        self.sensors + self.cells()
    }

    /// Offset of a cell's gene in the flat gene array.
    #[must_use]
    pub const fn gene_offset(&self, cell: usize) -> usize {
        cell * self.gene_size()
    }

    /// Offset of an actuator's source index in the flat gene array.
    #[must_use]
    pub const fn actuator_offset(&self, actuator: usize) -> usize {
        self.cells() * self.gene_size() + actuator
    }

    /// Flat cell index (column-major) for a grid position.
    #[must_use]
    pub const fn cell_index(&self, row: usize, col: usize) -> usize {
        col * self.rows + row
    }

    /// Column of a flat cell index.
    #[must_use]
    pub const fn column_of(&self, cell: usize) -> usize {
        if self.rows == 0 { 0 } else { cell / self.rows }
    }

    /// State index of a cell's output.
    #[must_use]
    pub const fn cell_state(&self, cell: usize) -> usize {
        self.sensors + cell
    }

    /// Cell for a state index, if the index lies in the cell region.
    #[must_use]
    pub const fn state_cell(&self, index: usize) -> Option<usize> {
        if index >= self.sensors && index < self.source_bound() {
            Some(index - self.sensors)
        } else {
            None
        }
    }

    /// Convert a tagged reference to its flat state index.
    #[must_use]
    pub const fn flat(&self, node: NodeRef) -> usize {
        match node {
            NodeRef::Sensor(i) => i,
            NodeRef::Cell { row, col } => self.sensors + self.cell_index(row, col),
            NodeRef::Actuator(i) => self.source_bound() + i,
        }
    }

    /// Convert a flat state index to a tagged reference.
    #[must_use]
    pub const fn node(&self, index: usize) -> Option<NodeRef> {
        if index < self.sensors {
            Some(NodeRef::Sensor(index))
        } else if index < self.source_bound() {
            let cell = index - self.sensors;
            Some(NodeRef::Cell {
                row: cell % self.rows,
                col: cell / self.rows,
            })
        } else if index < self.state_len() {
            Some(NodeRef::Actuator(index - self.source_bound()))
        } else {
            None
        }
    }

    /// Range of state indices a cell in `col` may connect to.
    ///
    /// Sensors are always reachable; cells are restricted to previous
    /// columns, and to at most `levels_back` of them when it is non-zero.
    #[must_use]
    pub fn feed_forward_range(&self, col: usize, levels_back: usize) -> (usize, usize) {
        let first_col = if levels_back == 0 {
            0
        } else {
            col.saturating_sub(levels_back)
        };
        (
            self.sensors + first_col * self.rows,
            self.sensors + col * self.rows,
        )
    }
}
