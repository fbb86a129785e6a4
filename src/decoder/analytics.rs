// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Decoding statistics

use core::fmt;
use std::collections::HashMap;

use crate::instruction::{Instruction, Size};
use crate::message::{TCode, TraceMessage};
use crate::types::CoreId;

/// Statistics gathered while decoding
#[derive(Clone, Debug, Default)]
pub struct Analytics {
    messages: HashMap<TCode, u64>,
    instructions: Vec<u64>,
    compressed: u64,
    normal: u64,
    malformed: u64,
    unknown_branches: u64,
    truncated: bool,
}

impl Analytics {
    pub(super) fn new(max_cores: usize) -> Self {
        Self {
            instructions: vec![0; max_cores],
            ..Default::default()
        }
    }

    pub(super) fn count_message(&mut self, message: &TraceMessage) {
        *self.messages.entry(message.tcode()).or_default() += 1;
    }

    pub(super) fn count_instruction(&mut self, core: CoreId, insn: &Instruction) {
        if let Some(count) = self.instructions.get_mut(usize::from(core)) {
            *count += 1;
        }
        match insn.size {
            Size::Compressed => self.compressed += 1,
            Size::Normal => self.normal += 1,
        }
    }

    pub(super) fn count_malformed(&mut self) {
        self.malformed += 1;
    }

    pub(super) fn count_unknown_branch(&mut self) {
        self.unknown_branches += 1;
    }

    pub(super) fn set_truncated(&mut self) {
        self.truncated = true;
    }

    /// Retrieve the number of messages of the given type
    pub fn messages(&self, tcode: TCode) -> u64 {
        self.messages.get(&tcode).copied().unwrap_or(0)
    }

    /// Retrieve the number of messages of all types
    pub fn total_messages(&self) -> u64 {
        self.messages.values().sum()
    }

    /// Retrieve the number of instructions reported for the given core
    pub fn instructions(&self, core: CoreId) -> u64 {
        self.instructions
            .get(usize::from(core))
            .copied()
            .unwrap_or(0)
    }

    /// Retrieve the number of instructions reported for all cores
    pub fn total_instructions(&self) -> u64 {
        self.instructions.iter().sum()
    }

    /// Retrieve the number of 16 bit instructions reported
    pub fn compressed(&self) -> u64 {
        self.compressed
    }

    /// Retrieve the number of 32 bit instructions reported
    pub fn normal(&self) -> u64 {
        self.normal
    }

    /// Retrieve the number of malformed messages discarded
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Retrieve the number of times a conditional branch's outcome was
    /// [unknown][crate::types::BranchFlag::Unknown] and had to be retried
    /// with the counts of the following message
    pub fn unknown_branches(&self) -> u64 {
        self.unknown_branches
    }

    /// Check whether the trace ended in the middle of a message
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Display for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "messages: {}", self.total_messages())?;
        let mut messages: Vec<_> = self.messages.iter().collect();
        messages.sort_by_key(|(t, _)| **t as u8);
        for (tcode, count) in messages {
            writeln!(f, "  {tcode}: {count}")?;
        }
        if self.malformed > 0 {
            writeln!(f, "  malformed: {}", self.malformed)?;
        }
        writeln!(
            f,
            "instructions: {} ({} compressed, {} normal)",
            self.total_instructions(),
            self.compressed,
            self.normal
        )?;
        for (core, count) in self.instructions.iter().enumerate().filter(|(_, c)| **c > 0) {
            writeln!(f, "  core {core}: {count}")?;
        }
        if self.unknown_branches > 0 {
            writeln!(f, "unknown branches: {}", self.unknown_branches)?;
        }
        if self.truncated {
            writeln!(f, "trace truncated")?;
        }
        Ok(())
    }
}
