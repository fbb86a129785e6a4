// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Variable instruction fields
//!
//! Each type holds the register and immediate fields of one of the encoding
//! variants of the base instruction set and of compressed instructions.
//! Immediates are stored as the values they denote rather than the scrambled
//! bit patterns found in the encoding.

/// Register number
pub type Register = u8;

/// Variable fields in R-type and CR-type instructions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeR {
    pub rd: Register,
    pub rs1: Register,
    pub rs2: Register,
}

impl From<u32> for TypeR {
    fn from(insn: u32) -> Self {
        Self {
            rd: reg(insn, 7),
            rs1: reg(insn, 15),
            rs2: reg(insn, 20),
        }
    }
}

impl From<u16> for TypeR {
    fn from(insn: u16) -> Self {
        let insn = insn.into();
        Self {
            rd: reg(insn, 7),
            rs1: reg(insn, 7),
            rs2: reg(insn, 2),
        }
    }
}

/// Variable fields in I-type instructions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeI {
    pub rd: Register,
    pub rs1: Register,
    /// Immediate in the range `-2048..=2047`
    pub imm: i16,
}

impl From<u32> for TypeI {
    fn from(insn: u32) -> Self {
        Self {
            rd: reg(insn, 7),
            rs1: reg(insn, 15),
            imm: sign_extend(insn >> 20, 12) as i16,
        }
    }
}

/// Variable fields in B-type and CB-type instructions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeB {
    pub rs1: Register,
    pub rs2: Register,
    /// Branch offset, always a multiple of two
    pub imm: i32,
}

impl From<u32> for TypeB {
    fn from(insn: u32) -> Self {
        let imm = pick(insn, 8, 4, 1)
            | pick(insn, 25, 6, 5)
            | pick(insn, 7, 1, 11)
            | pick(insn, 31, 1, 12);
        Self {
            rs1: reg(insn, 15),
            rs2: reg(insn, 20),
            imm: sign_extend(imm, 13),
        }
    }
}

impl From<u16> for TypeB {
    fn from(insn: u16) -> Self {
        let insn = insn.into();
        let imm = pick(insn, 3, 2, 1)
            | pick(insn, 10, 2, 3)
            | pick(insn, 2, 1, 5)
            | pick(insn, 5, 2, 6)
            | pick(insn, 12, 1, 8);
        Self {
            rs1: 8 + pick(insn, 7, 3, 0) as Register,
            rs2: 0,
            imm: sign_extend(imm, 9),
        }
    }
}

/// Variable fields in U-type instructions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeU {
    pub rd: Register,
    /// Immediate with the lower 12 bits cleared
    pub imm: i32,
}

impl From<u32> for TypeU {
    fn from(insn: u32) -> Self {
        Self {
            rd: reg(insn, 7),
            imm: (insn & 0xffff_f000) as i32,
        }
    }
}

/// Variable fields in J-type and CJ-type instructions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeJ {
    pub rd: Register,
    /// Jump offset, always a multiple of two
    pub imm: i32,
}

impl From<u32> for TypeJ {
    fn from(insn: u32) -> Self {
        let imm = pick(insn, 21, 10, 1)
            | pick(insn, 20, 1, 11)
            | pick(insn, 12, 8, 12)
            | pick(insn, 31, 1, 20);
        Self {
            rd: reg(insn, 7),
            imm: sign_extend(imm, 21),
        }
    }
}

impl From<u16> for TypeJ {
    /// Extract the offset of a `c.j` or `c.jal`
    ///
    /// The destination register is left as `x0`. Callers set it according to
    /// the instruction.
    fn from(insn: u16) -> Self {
        let insn = insn.into();
        let imm = pick(insn, 3, 3, 1)
            | pick(insn, 11, 1, 4)
            | pick(insn, 2, 1, 5)
            | pick(insn, 7, 1, 6)
            | pick(insn, 6, 1, 7)
            | pick(insn, 9, 2, 8)
            | pick(insn, 8, 1, 10)
            | pick(insn, 12, 1, 11);
        Self {
            rd: 0,
            imm: sign_extend(imm, 12),
        }
    }
}

/// Extract the 5 bit register field starting at `lo`
const fn reg(insn: u32, lo: u32) -> Register {
    pick(insn, lo, 5, 0) as Register
}

/// Extract `len` bits starting at `lo` and place them at position `at`
const fn pick(insn: u32, lo: u32, len: u32, at: u32) -> u32 {
    ((insn >> lo) & ((1 << len) - 1)) << at
}

/// Sign extend the lower `width` bits of `value`
const fn sign_extend(value: u32, width: u32) -> i32 {
    let shift = u32::BITS - width;
    ((value << shift) as i32) >> shift
}
