// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! ELF related utilities

use core::borrow::Borrow;

use elf::ElfBytes;
use elf::endian::EndianParse;

use crate::instruction::{Base, Instruction};

use super::{CodeProvider, SourceInfo};

/// Static ELF [`CodeProvider`]
///
/// This provider retrieves [`Instruction`]s from executable `LOAD` segments
/// found in [`ElfBytes`] based on virtual address mapping. Source information
/// is derived from the nearest function symbol.
#[derive(Clone)]
pub struct Elf<'d, E, P>
where
    E: Borrow<ElfBytes<'d, P>>,
    P: EndianParse,
{
    elf: E,
    last_segment: (u64, &'d [u8]),
    base: Base,
    /// Function symbols as start, size and name, sorted by start
    functions: Vec<(u64, u64, String)>,
    phantom: core::marker::PhantomData<P>,
}

impl<'d, E, P> Elf<'d, E, P>
where
    E: Borrow<ElfBytes<'d, P>>,
    P: EndianParse,
{
    /// Create a new ELF [`CodeProvider`]
    pub fn new(elf: E) -> Result<Self, Error> {
        use elf::abi;

        let hdr = &elf.borrow().ehdr;
        if hdr.e_machine != abi::EM_RISCV {
            return Err(Error::UnsupportedArchitecture);
        }
        if !hdr.endianness.is_little() {
            return Err(Error::UnsupportedEndianess);
        }
        let base = match hdr.class {
            elf::file::Class::ELF32 => Base::Rv32,
            elf::file::Class::ELF64 => Base::Rv64,
        };

        let mut functions = Vec::new();
        if let Some((symbols, strings)) = elf
            .borrow()
            .symbol_table()
            .map_err(Error::CouldNotRetrieveData)?
        {
            for sym in symbols.iter().filter(|s| s.st_symtype() == abi::STT_FUNC) {
                let name = strings
                    .get(sym.st_name as usize)
                    .map_err(Error::CouldNotRetrieveData)?;
                functions.push((sym.st_value, sym.st_size, name.into()));
            }
        }
        functions.sort_unstable_by_key(|(a, _, _)| *a);

        Ok(Self {
            elf,
            last_segment: (u64::MAX, &[]),
            base,
            functions,
            phantom: Default::default(),
        })
    }

    /// Retrieve the inner [`ElfBytes`]
    pub fn inner(&self) -> &ElfBytes<'d, P> {
        self.elf.borrow()
    }

    /// Retrieve the [`Base`] of the instructions in this ELF
    pub fn base(&self) -> Base {
        self.base
    }
}

impl<'d, E, P> CodeProvider for Elf<'d, E, P>
where
    E: Borrow<ElfBytes<'d, P>>,
    P: EndianParse,
{
    type Error = Error;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        let segments = self
            .elf
            .borrow()
            .segments()
            .into_iter()
            .flat_map(|s| s.iter())
            .filter(|s| s.p_type == elf::abi::PT_LOAD && s.p_flags & elf::abi::PF_X != 0)
            .map(|s| {
                self.elf
                    .borrow()
                    .segment_data(&s)
                    .map(|d| (s.p_vaddr, d))
                    .map_err(Error::CouldNotRetrieveData)
            });

        // Start with the segment used last, it is the most likely candidate
        let (insn_data, segment) = core::iter::once(Ok(self.last_segment))
            .chain(segments)
            .map(|s| {
                let (start, data) = s?;
                let res = address
                    .checked_sub(start)
                    .and_then(|o| usize::try_from(o).ok())
                    .and_then(|o| data.split_at_checked(o))
                    .filter(|(_, insn_data)| !insn_data.is_empty())
                    .map(|(_, insn_data)| (insn_data, (start, data)));
                Ok(res)
            })
            .find_map(Result::transpose)
            .ok_or(Error::NoSegmentFound(address))??;

        self.last_segment = segment;
        Instruction::extract(insn_data, self.base)
            .map(|(i, _)| i)
            .ok_or(Error::InvalidInstruction(address))
    }

    fn source_info(&mut self, address: u64) -> Option<SourceInfo> {
        let index = self
            .functions
            .partition_point(|(start, _, _)| *start <= address)
            .checked_sub(1)?;
        let (start, size, name) = &self.functions[index];
        let offset = address - start;
        (*size == 0 || offset < *size).then(|| SourceInfo {
            function: Some(name.clone()),
            offset,
        })
    }
}

/// ELF specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not find segment for address {0:#x}")]
    NoSegmentFound(u64),
    #[error("Could not retrieve data from ELF")]
    CouldNotRetrieveData(#[source] elf::parse::ParseError),
    #[error("No valid instruction at {0:#x}")]
    InvalidInstruction(u64),
    /// The ELF file is not a RISC-V ELF file
    #[error("The target architecture is not supported")]
    UnsupportedArchitecture,
    #[error("The target is not little endian")]
    UnsupportedEndianess,
}
