//! Cell opcodes and instruction sets.
//!
//! Opcodes are stored in the gene's opcode field as their numeric code, so
//! the numbering below is part of the persistence format.

// Opcode fields are stored as floats in the gene array
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use serde::{Deserialize, Serialize};

/// Maximum n-ary arguments for the full instruction set.
pub const MAX_ARGS: usize = 10;

/// Maximum n-ary arguments when ADF calls are enabled.
pub const MAX_ARGS_ADF: usize = 4;

/// Operation computed by a grid cell.
#[allow(missing_docs)] // Variant names describe the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ==================== Arithmetic ====================
    Constant = 0,
    Add = 1,
    Subtract = 2,
    Multiply = 3,
    Mean = 4,
    Divide = 5,
    Modulo = 6,
    Floor = 7,
    Negate = 8,
    Value = 9,

    // ==================== Thresholds ====================
    Greater = 10,
    Less = 11,
    Equal = 12,
    And = 13,
    Or = 14,
    Xor = 15,
    NotEqual = 16,

    // ==================== Transcendental ====================
    ScaledProduct = 17,
    Exp = 18,
    Sqrt = 19,
    Sine = 20,
    Arcsine = 21,
    Cosine = 22,
    Arccosine = 23,
    Power = 24,
    Min = 25,
    Max = 26,

    // ==================== Self-modifying ====================
    CopyFunction = 27,
    CopyConstant = 28,
    CopyState = 29,
    CopyBlock = 30,

    // ==================== Gene reads ====================
    GetFunction = 31,
    GetConstant = 32,
    GetInput = 33,
    GetInputValue = 34,

    // ==================== Stochastic / modules ====================
    Dropout = 35,
    AdfCall = 36,
}

impl Opcode {
    /// Every opcode, in code order.
    pub const ALL: [Self; 37] = [
        Self::Constant,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Mean,
        Self::Divide,
        Self::Modulo,
        Self::Floor,
        Self::Negate,
        Self::Value,
        Self::Greater,
        Self::Less,
        Self::Equal,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::NotEqual,
        Self::ScaledProduct,
        Self::Exp,
        Self::Sqrt,
        Self::Sine,
        Self::Arcsine,
        Self::Cosine,
        Self::Arccosine,
        Self::Power,
        Self::Min,
        Self::Max,
        Self::CopyFunction,
        Self::CopyConstant,
        Self::CopyState,
        Self::CopyBlock,
        Self::GetFunction,
        Self::GetConstant,
        Self::GetInput,
        Self::GetInputValue,
        Self::Dropout,
        Self::AdfCall,
    ];

    /// Numeric code stored in the gene.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Gene field value for this opcode.
    #[must_use]
    pub fn gene_value(self) -> f32 {
        self.code() as f32
    }

    /// Look up an opcode by numeric code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Decode a gene's opcode field. `None` for disabled (negative) cells,
    /// fractional fields and unknown codes.
    #[must_use]
    pub fn from_gene(field: f32) -> Option<Self> {
        if field.is_nan() || field < 0.0 || field.fract() != 0.0 {
            return None;
        }
        Self::from_code(field as i32)
    }

    /// Whether this opcode takes a constant-controlled number of arguments.
    #[must_use]
    pub const fn is_n_ary(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Mean | Self::Min | Self::Max
        )
    }

    /// Whether the output depends only on the cell's inputs and constant.
    ///
    /// Pure cells can be moved into another module without changing the
    /// result.
    #[must_use]
    pub const fn is_pure(self) -> bool {
        !matches!(
            self,
            Self::CopyFunction
                | Self::CopyConstant
                | Self::CopyState
                | Self::CopyBlock
                | Self::GetFunction
                | Self::GetConstant
                | Self::GetInput
                | Self::GetInputValue
                | Self::Dropout
                | Self::AdfCall
        )
    }

    /// Number of inputs this opcode reads.
    ///
    /// `max_args` is the instruction set's n-ary ceiling; the result never
    /// exceeds `connections`.
    #[must_use]
    pub fn arity(self, constant: f32, connections: usize, max_args: usize, adf_args: usize) -> usize {
        let arity = match self {
            Self::Constant => 0,
            Self::Add | Self::Subtract | Self::Multiply | Self::Mean | Self::Min | Self::Max => {
                1 + (constant.abs() as usize) % max_args.max(1)
            }
            Self::Floor
            | Self::Negate
            | Self::Value
            | Self::Exp
            | Self::Sqrt
            | Self::Sine
            | Self::Arcsine
            | Self::Cosine
            | Self::Arccosine
            | Self::GetFunction
            | Self::GetConstant
            | Self::GetInput
            | Self::GetInputValue
            | Self::Dropout => 1,
            Self::Divide
            | Self::Modulo
            | Self::Greater
            | Self::Less
            | Self::Equal
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::NotEqual
            | Self::ScaledProduct
            | Self::Power
            | Self::CopyFunction
            | Self::CopyConstant
            | Self::CopyState
            | Self::CopyBlock => 2,
            Self::AdfCall => adf_args,
        };
        arity.min(connections)
    }
}

/// The opcodes available to random generation, mutation and validation.
///
/// Built once and shared read-only between populations and threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSet {
    opcodes: Vec<Opcode>,
}

impl InstructionSet {
    /// Build a set from a list of opcodes. Duplicates are removed.
    #[must_use]
    pub fn new(opcodes: &[Opcode]) -> Self {
        let mut opcodes = opcodes.to_vec();
        opcodes.sort_unstable();
        opcodes.dedup();
        Self { opcodes }
    }

    /// Every opcode except ADF calls.
    #[must_use]
    pub fn full() -> Self {
        Self::new(&Opcode::ALL[..Opcode::ALL.len() - 1])
    }

    /// Every opcode including ADF calls.
    #[must_use]
    pub fn with_adf() -> Self {
        Self::new(&Opcode::ALL)
    }

    /// Only pure numeric opcodes: no gene access, no randomness.
    #[must_use]
    pub fn arithmetic() -> Self {
        let pure: Vec<Opcode> = Opcode::ALL.iter().copied().filter(|op| op.is_pure()).collect();
        Self::new(&pure)
    }

    /// Pure opcodes plus ADF calls.
    #[must_use]
    pub fn arithmetic_with_adf() -> Self {
        let mut ops: Vec<Opcode> = Opcode::ALL.iter().copied().filter(|op| op.is_pure()).collect();
        ops.push(Opcode::AdfCall);
        Self::new(&ops)
    }

    /// Opcodes in this set.
    #[must_use]
    pub fn opcodes(&self) -> &[Opcode] {
        &self.opcodes
    }

    /// Number of opcodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }

    /// Whether the set contains `op`.
    #[must_use]
    pub fn contains(&self, op: Opcode) -> bool {
        self.opcodes.binary_search(&op).is_ok()
    }

    /// Whether ADF calls are enabled.
    #[must_use]
    pub fn supports_adf(&self) -> bool {
        self.contains(Opcode::AdfCall)
    }

    /// Ceiling for n-ary arguments.
    #[must_use]
    pub fn max_args(&self) -> usize {
        if self.supports_adf() { MAX_ARGS_ADF } else { MAX_ARGS }
    }

    /// Pick a random opcode. Submodules never receive ADF calls.
    pub fn choose(&self, rng: &mut crate::rng::Rng, allow_adf: bool) -> Opcode {
        let usable = if !allow_adf && self.supports_adf() {
            self.opcodes.len() - 1
        } else {
            self.opcodes.len()
        };
        // AdfCall sorts last, so trimming the tail excludes it
        self.opcodes
            .get(rng.below(usable))
            .copied()
            .unwrap_or(Opcode::Constant)
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::full()
    }
}
