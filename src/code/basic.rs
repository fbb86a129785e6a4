// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Basic [`CodeProvider`]s and adapters

use crate::instruction::{Base, Instruction};

use super::CodeProvider;
use super::error;

/// [`CodeProvider`] adapter for an [`FnMut`]
#[derive(Copy, Clone, Default, Debug)]
pub struct Func<F: FnMut(u64) -> Result<Instruction, E>, E> {
    func: F,
    phantom: core::marker::PhantomData<E>,
}

impl<F: FnMut(u64) -> Result<Instruction, E>, E> CodeProvider for Func<F, E> {
    type Error = E;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        (self.func)(address)
    }
}

/// Create a [`Func`] [`CodeProvider`] from an [`FnMut`]
pub fn from_fn<F: FnMut(u64) -> Result<Instruction, E>, E>(func: F) -> Func<F, E> {
    Func {
        func,
        phantom: Default::default(),
    }
}

/// [`CodeProvider`] consisting of a single segment of encoded instructions
#[derive(Copy, Clone, Debug)]
pub struct Segment<T: AsRef<[u8]>> {
    start: u64,
    data: T,
    base: Base,
}

impl<T: AsRef<[u8]>> CodeProvider for Segment<T> {
    type Error = error::SegmentError;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        let insn_data = address
            .checked_sub(self.start)
            .and_then(|o| usize::try_from(o).ok())
            .and_then(|o| self.data.as_ref().split_at_checked(o))
            .map(|(_, d)| d)
            .filter(|d| !d.is_empty())
            .ok_or(error::SegmentError::AddressNotCovered(address))?;
        Instruction::extract(insn_data, self.base)
            .map(|(i, _)| i)
            .ok_or(error::SegmentError::InvalidInstruction(address))
    }
}

/// Create a [`Segment`] [`CodeProvider`] for code starting at `start`
pub fn from_segment<T: AsRef<[u8]>>(start: u64, data: T, base: Base) -> Segment<T> {
    Segment { start, data, base }
}

/// A [`CodeProvider`] that does not contain any [`Instruction`]s
#[derive(Copy, Clone, Default, Debug)]
pub struct Empty;

impl CodeProvider for Empty {
    type Error = error::NoInstruction;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        Err(error::NoInstruction(address))
    }
}
