// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Providers of the code being traced
//!
//! Reconstructing the execution requires knowledge about the program being
//! traced. This module defines the [`CodeProvider`] trait used by the
//! [`TraceDecoder`][crate::decoder::TraceDecoder] for retrieving
//! [`Instruction`]s, their disassembly and source information, as well as a
//! number of types implementing it:
//!
//! * [basic] providers created through free fns such as [`from_fn`] and
//!   [`from_segment`],
//! * slices of address-[`Instruction`] pairs for small, fixed code sequences,
//! * [`Either`][either::Either] of two providers (`either` feature) and
//! * [ELF][elf] files (`elf` feature).
//!
//! # Example
//!
//! ```
//! use riscv_nexus_trace::code::{self, CodeProvider};
//! use riscv_nexus_trace::instruction::Base;
//!
//! let bootrom = b"\x97\x02\x00\x00\x93\x85\x02\x02\x67\x80\x02\x00";
//! let mut code = code::from_segment(0x1000, bootrom, Base::Rv32);
//! assert_eq!(code.disassemble(0x1008).unwrap(), "jalr x0, x5, 0x0");
//! ```

pub mod basic;
#[cfg(feature = "elf")]
pub mod elf;
pub mod error;

#[cfg(test)]
mod tests;

use std::fmt;

pub use basic::{Empty, from_fn, from_segment};

use crate::instruction::Instruction;

/// A provider of [`Instruction`]s for the code being traced
///
/// Providers may be mutated when fetching an [`Instruction`], e.g. for
/// caching purposes.
pub trait CodeProvider {
    /// Error type returned by [`get_insn`][Self::get_insn]
    type Error;

    /// Retrieve the [`Instruction`] at the given address
    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error>;

    /// Retrieve a textual representation of the [`Instruction`] at the given
    /// address
    ///
    /// The text is for display only.
    fn disassemble(&mut self, address: u64) -> Result<String, Self::Error> {
        self.get_insn(address).map(|i| i.to_string())
    }

    /// Retrieve [`SourceInfo`] for the given address, if available
    fn source_info(&mut self, _address: u64) -> Option<SourceInfo> {
        None
    }
}

impl<P: CodeProvider + ?Sized> CodeProvider for &mut P {
    type Error = P::Error;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        P::get_insn(self, address)
    }

    fn disassemble(&mut self, address: u64) -> Result<String, Self::Error> {
        P::disassemble(self, address)
    }

    fn source_info(&mut self, address: u64) -> Option<SourceInfo> {
        P::source_info(self, address)
    }
}

/// [`CodeProvider`] defined by a set of address-[`Instruction`] pairs
///
/// This is meant for small, fixed code sequences.
impl CodeProvider for &[(u64, Instruction)] {
    type Error = error::NoInstruction;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        self.iter()
            .find(|(a, _)| *a == address)
            .map(|(_, i)| *i)
            .ok_or(error::NoInstruction(address))
    }
}

#[cfg(feature = "either")]
impl<L, R, E> CodeProvider for either::Either<L, R>
where
    L: CodeProvider<Error = E>,
    R: CodeProvider<Error = E>,
{
    type Error = E;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        either::for_both!(self, p => p.get_insn(address))
    }

    fn disassemble(&mut self, address: u64) -> Result<String, Self::Error> {
        either::for_both!(self, p => p.disassemble(address))
    }

    fn source_info(&mut self, address: u64) -> Option<SourceInfo> {
        either::for_both!(self, p => p.source_info(address))
    }
}

/// Source information for an address
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceInfo {
    /// Name of the function containing the address
    pub function: Option<String>,
    /// Offset of the address from the start of the function
    pub offset: u64,
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "<{name}+{:#x}>", self.offset),
            None => write!(f, "<unknown>"),
        }
    }
}
