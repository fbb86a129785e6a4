// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Control flow relevant instruction kinds

use core::fmt;

use super::Base;
use super::format::{Register, TypeB, TypeI, TypeJ, TypeR, TypeU};

/// Control flow relevant instructions and a few others worth displaying
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
    // SYS
    mret,
    sret,
    uret,
    dret,
    wfi,
    fence,
    fence_i,
    ecall,
    ebreak,
    c_ebreak,
    // B
    beq(TypeB),
    bne(TypeB),
    blt(TypeB),
    bge(TypeB),
    bltu(TypeB),
    bgeu(TypeB),
    // CB
    c_beqz(TypeB),
    c_bnez(TypeB),
    // U
    auipc(TypeU),
    lui(TypeU),
    // J
    jal(TypeJ),
    // CJ
    c_j(TypeJ),
    c_jal(TypeJ),
    // CR
    c_jr(TypeR),
    c_jalr(TypeR),
    // I
    jalr(TypeI),
}

impl Kind {
    /// Decode a 32 bit instruction
    ///
    /// Returns `None` for instructions not listed in [`Kind`]. This is not an
    /// error: only few instructions are relevant for control flow.
    #[allow(clippy::unusual_byte_groupings)]
    pub fn decode_32(insn: u32) -> Option<Self> {
        let funct3 = (insn >> 12) & 0x7;
        match insn & 0x7f {
            0b0001111 => match funct3 {
                0b000 => Some(Self::fence),
                0b001 => Some(Self::fence_i),
                _ => None,
            },
            0b0110111 => Some(Self::lui(insn.into())),
            0b0010111 => Some(Self::auipc(insn.into())),
            0b1100011 => match funct3 {
                0b000 => Some(Self::beq(insn.into())),
                0b001 => Some(Self::bne(insn.into())),
                0b100 => Some(Self::blt(insn.into())),
                0b101 => Some(Self::bge(insn.into())),
                0b110 => Some(Self::bltu(insn.into())),
                0b111 => Some(Self::bgeu(insn.into())),
                _ => None,
            },
            0b1100111 if funct3 == 0 => Some(Self::jalr(insn.into())),
            0b1101111 => Some(Self::jal(insn.into())),
            0b1110011 => match insn >> 7 {
                0b000000000000_00000_000_00000 => Some(Self::ecall),
                0b000000000001_00000_000_00000 => Some(Self::ebreak),
                0b000000000010_00000_000_00000 => Some(Self::uret),
                0b000100000010_00000_000_00000 => Some(Self::sret),
                0b001100000010_00000_000_00000 => Some(Self::mret),
                0b011110110010_00000_000_00000 => Some(Self::dret),
                0b000100000101_00000_000_00000 => Some(Self::wfi),
                _ => None,
            },
            _ => None,
        }
    }

    /// Decode a 16 bit ("compressed") instruction
    ///
    /// Returns `None` for instructions not listed in [`Kind`].
    pub fn decode_16(insn: u16, base: Base) -> Option<Self> {
        match (insn & 0x3, insn >> 13) {
            (0b01, 0b001) if base == Base::Rv32 => {
                Some(Self::c_jal(TypeJ {
                    rd: 1,
                    ..TypeJ::from(insn)
                }))
            }
            (0b01, 0b101) => Some(Self::c_j(insn.into())),
            (0b01, 0b110) => Some(Self::c_beqz(insn.into())),
            (0b01, 0b111) => Some(Self::c_bnez(insn.into())),
            (0b10, 0b100) => {
                let data = TypeR::from(insn);
                match ((insn >> 12) & 0x1, data.rs1, data.rs2) {
                    (0, r, 0) if r != 0 => Some(Self::c_jr(TypeR { rd: 0, ..data })),
                    (1, r, 0) if r != 0 => Some(Self::c_jalr(TypeR { rd: 1, ..data })),
                    (1, 0, 0) => Some(Self::c_ebreak),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Check whether this is a compressed instruction
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Self::c_ebreak
                | Self::c_beqz(_)
                | Self::c_bnez(_)
                | Self::c_j(_)
                | Self::c_jal(_)
                | Self::c_jr(_)
                | Self::c_jalr(_)
        )
    }

    /// Determine the branch target of a conditional branch
    ///
    /// Returns the target relative to this instruction, or `None` if this is
    /// not a conditional branch.
    pub fn branch_target(self) -> Option<i32> {
        match self {
            Self::beq(d)
            | Self::bne(d)
            | Self::blt(d)
            | Self::bge(d)
            | Self::bltu(d)
            | Self::bgeu(d)
            | Self::c_beqz(d)
            | Self::c_bnez(d) => Some(d.imm),
            _ => None,
        }
    }

    /// Determine the destination register and target of a direct jump
    ///
    /// The target is relative to this instruction.
    pub fn direct_jump(self) -> Option<(Register, i32)> {
        match self {
            Self::jal(d) | Self::c_jal(d) | Self::c_j(d) => Some((d.rd, d.imm)),
            _ => None,
        }
    }

    /// Determine the destination and source register of an indirect jump
    ///
    /// Compressed jumps report the registers they implicitly use: `x0` as
    /// destination for `c.jr` and `x1` for `c.jalr`.
    pub fn indirect_jump(self) -> Option<(Register, Register)> {
        match self {
            Self::jalr(d) => Some((d.rd, d.rs1)),
            Self::c_jr(d) | Self::c_jalr(d) => Some((d.rd, d.rs1)),
            _ => None,
        }
    }

    /// Check whether this instruction raises an exception
    pub fn is_exception(self) -> bool {
        matches!(self, Self::ecall | Self::ebreak | Self::c_ebreak)
    }

    /// Check whether this instruction returns from a trap
    pub fn is_exception_return(self) -> bool {
        matches!(self, Self::mret | Self::sret | Self::uret | Self::dret)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::mret => write!(f, "mret"),
            Self::sret => write!(f, "sret"),
            Self::uret => write!(f, "uret"),
            Self::dret => write!(f, "dret"),
            Self::wfi => write!(f, "wfi"),
            Self::fence => write!(f, "fence"),
            Self::fence_i => write!(f, "fence.i"),
            Self::ecall => write!(f, "ecall"),
            Self::ebreak => write!(f, "ebreak"),
            Self::c_ebreak => write!(f, "c.ebreak"),
            Self::beq(d) => write!(f, "beq x{}, x{}, {}", d.rs1, d.rs2, Offset(d.imm)),
            Self::bne(d) => write!(f, "bne x{}, x{}, {}", d.rs1, d.rs2, Offset(d.imm)),
            Self::blt(d) => write!(f, "blt x{}, x{}, {}", d.rs1, d.rs2, Offset(d.imm)),
            Self::bge(d) => write!(f, "bge x{}, x{}, {}", d.rs1, d.rs2, Offset(d.imm)),
            Self::bltu(d) => write!(f, "bltu x{}, x{}, {}", d.rs1, d.rs2, Offset(d.imm)),
            Self::bgeu(d) => write!(f, "bgeu x{}, x{}, {}", d.rs1, d.rs2, Offset(d.imm)),
            Self::c_beqz(d) => write!(f, "c.beqz x{}, {}", d.rs1, Offset(d.imm)),
            Self::c_bnez(d) => write!(f, "c.bnez x{}, {}", d.rs1, Offset(d.imm)),
            Self::auipc(d) => write!(f, "auipc x{}, {:#x}", d.rd, (d.imm as u32) >> 12),
            Self::lui(d) => write!(f, "lui x{}, {:#x}", d.rd, (d.imm as u32) >> 12),
            Self::jal(d) => write!(f, "jal x{}, {}", d.rd, Offset(d.imm)),
            Self::c_j(d) => write!(f, "c.j {}", Offset(d.imm)),
            Self::c_jal(d) => write!(f, "c.jal {}", Offset(d.imm)),
            Self::c_jr(d) => write!(f, "c.jr x{}", d.rs1),
            Self::c_jalr(d) => write!(f, "c.jalr x{}", d.rs1),
            Self::jalr(d) => write!(f, "jalr x{}, x{}, {}", d.rd, d.rs1, Offset(d.imm.into())),
        }
    }
}

/// Signed hexadecimal offset
struct Offset(i32);

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-{:#x}", self.0.unsigned_abs())
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}
