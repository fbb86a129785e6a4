// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! RISC-V instructions
//!
//! Reconstructing the control flow requires a notion of those instructions
//! that alter it: jumps, branches and instructions entering or leaving traps.
//! This module provides an [`Instruction`] type that carries the [`Kind`] of
//! such instructions. All other instructions are only known by their [`Size`]
//! and, for correlating the vector unit's cycle-accurate trace, their
//! [`Class`].

pub mod bits;
pub mod format;
pub mod kind;

#[cfg(test)]
mod tests;

use core::fmt;

pub use bits::Bits;
pub use kind::Kind;

use format::Register;

/// Link registers `ra` and `t0`
///
/// Jumps involving these registers push to or pop from the call-return stack.
pub const LINK_REGISTERS: [Register; 2] = [1, 5];

/// Check whether the given register is one of the [`LINK_REGISTERS`]
pub fn is_link(reg: Register) -> bool {
    LINK_REGISTERS.contains(&reg)
}

/// RISC-V base instruction set
///
/// Some compressed encodings differ between the 32 and 64 bit variants.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Base {
    #[default]
    Rv32,
    Rv64,
}

/// Size of an [`Instruction`] in bytes
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Size {
    Compressed = 2,
    #[default]
    Normal = 4,
}

impl Size {
    /// Retrieve the size in 16 bit units
    ///
    /// Instruction counts in trace messages are expressed in this unit.
    pub fn halfwords(self) -> u64 {
        (self as u64) / 2
    }
}

impl From<Size> for u64 {
    fn from(size: Size) -> Self {
        size as u64
    }
}

/// Coarse classification used for correlating the vector unit's trace
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Class {
    /// Any instruction not handled by the vector unit
    #[default]
    Scalar,
    VectorArith,
    VectorLoad,
    VectorStore,
    /// Vector atomic memory operation not writing back the original value
    VectorAmo,
    /// Vector atomic memory operation writing back the original value
    VectorAmoWw,
    /// `vsetvl` and friends
    VectorConfig,
}

impl Class {
    /// Classify a 32 bit instruction
    pub fn of(insn: u32) -> Self {
        let width = (insn >> 12) & 0x7;
        let vector_width = matches!(width, 0 | 5 | 6 | 7);
        match insn & 0x7f {
            0x57 if width == 7 => Self::VectorConfig,
            0x57 => Self::VectorArith,
            0x07 if vector_width => Self::VectorLoad,
            0x27 if vector_width => Self::VectorStore,
            0x2f if vector_width && insn & (1 << 26) != 0 => Self::VectorAmoWw,
            0x2f if vector_width => Self::VectorAmo,
            _ => Self::Scalar,
        }
    }

    /// Check whether this class is executed by the vector unit
    pub fn is_vector(self) -> bool {
        self != Self::Scalar
    }
}

/// A single RISC-V instruction
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub size: Size,
    /// The instruction's kind, if it is a known control flow instruction
    pub kind: Option<Kind>,
    pub class: Class,
    /// Raw bits, if the instruction was decoded from them
    pub bits: Option<Bits>,
}

impl Instruction {
    /// Decode an instruction from its [`Bits`]
    pub fn decode(bits: Bits, base: Base) -> Self {
        match bits {
            Bits::Bit16(insn) => Self {
                size: Size::Compressed,
                kind: Kind::decode_16(insn, base),
                class: Class::Scalar,
                bits: Some(bits),
            },
            Bits::Bit32(insn) => Self {
                size: Size::Normal,
                kind: Kind::decode_32(insn),
                class: Class::of(insn),
                bits: Some(bits),
            },
        }
    }

    /// Extract an instruction from the beginning of a raw byte slice
    ///
    /// Returns the instruction and the remaining bytes if successful.
    pub fn extract(data: &[u8], base: Base) -> Option<(Self, &[u8])> {
        Bits::extract(data).map(|(bits, rest)| (Self::decode(bits, base), rest))
    }
}

impl From<Kind> for Instruction {
    fn from(kind: Kind) -> Self {
        let size = if kind.is_compressed() {
            Size::Compressed
        } else {
            Size::Normal
        };
        Self {
            size,
            kind: Some(kind),
            ..Default::default()
        }
    }
}

impl From<Bits> for Instruction {
    fn from(bits: Bits) -> Self {
        Self::decode(bits, Default::default())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.bits) {
            (Some(kind), _) => write!(f, "{kind}"),
            (None, Some(bits)) => write!(f, ".insn {bits}"),
            (None, None) => write!(f, "unknown"),
        }
    }
}
