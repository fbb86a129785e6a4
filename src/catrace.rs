// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Cycle-accurate trace correlation
//!
//! Some encoders emit a second, independent trace stream reporting when
//! instructions finish in the core's pipelines and, for vector traces, when the
//! vector unit starts and finishes operations. This module provides the
//! [`CaTraceCorrelator`] reading such a stream and handing out [`Timing`]s for
//! the instructions reconstructed from the instruction trace.
//!
//! # Format
//!
//! A cycle-accurate trace is a sequence of little endian 32 bit words, grouped
//! into [blocks][record::Block] of 32 words. See [`record::Block`] for the
//! layout of individual blocks.

pub mod error;
pub mod queue;
pub mod record;

#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::code::CodeProvider;
use crate::config::CaTraceKind;
use crate::instruction::{self, Class, Instruction};

pub use error::Error;

use queue::{TraceQueue, flags};
use record::Block;

/// Cycles covered by a scalar trace [`Block`]
const SCALAR_BLOCK_CYCLES: u64 = 15 * record::WORDS as u64;

/// Cycles covered by a vector trace [`Block`]
const VECTOR_BLOCK_CYCLES: u64 = 5 * record::WORDS as u64;

/// Pipeline an instruction finished in
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Pipe {
    #[default]
    Pipe0,
    Pipe1,
}

/// Vector operations in flight
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InFlight {
    /// Operations queued for the vector unit
    pub queue: u8,
    pub arith: u8,
    pub load: u8,
    pub store: u8,
}

impl InFlight {
    /// Account for an operation of the kind indicated by a [queue flag][flags]
    pub fn bump(&mut self, flag: u8) {
        let counter = match flag {
            flags::START => &mut self.queue,
            flags::ARITH => &mut self.arith,
            flags::LOAD => &mut self.load,
            flags::STORE => &mut self.store,
            _ => return,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Timing of a single instruction
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Timing {
    pub pipe: Pipe,
    /// Cycle the instruction finished in
    pub cycles: u64,
    /// Cycle the vector unit started the instruction in
    pub vector_start: Option<u64>,
    /// Cycle the vector unit finished the instruction in
    pub vector_finish: Option<u64>,
    /// Vector operations queued, as seen when the instruction started
    pub queue_depth: u8,
    /// Vector operations in flight, as seen when the instruction finished
    pub in_flight: InFlight,
}

/// Correlator for a cycle-accurate trace
///
/// The correlator hands out one [`Timing`] per instruction via
/// [`consume`][Self::consume]. Before timings are meaningful, the trace must be
/// aligned with the instruction trace. The trace's [start
/// address][Self::start_address] may lag behind the first address reported by
/// the instruction trace, in which case [`fast_forward`][Self::fast_forward]
/// replays the code until both coincide.
#[derive(Clone, Debug)]
pub struct CaTraceCorrelator {
    kind: CaTraceKind,
    words: Vec<u32>,
    index: usize,
    block: Block,
    block_number: u64,
    start: u64,
    queue: TraceQueue,
}

impl CaTraceCorrelator {
    /// Open a cycle-accurate trace file of the given kind
    pub fn open(path: impl AsRef<Path>, kind: CaTraceKind) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        tracing::debug!(?path, ?kind, "Opened cycle-accurate trace");
        Self::new(file, kind)
    }

    /// Create a correlator for a cycle-accurate trace of the given kind
    ///
    /// The whole trace is read from the reader and its first [`Block`] is
    /// parsed. Fails with [`Error::Eof`] if the trace does not hold a single
    /// complete block.
    pub fn new(mut reader: impl Read, kind: CaTraceKind) -> Result<Self, Error> {
        if kind == CaTraceKind::None {
            return Err(Error::NoTraceKind);
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let words = data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let mut correlator = Self {
            kind,
            words,
            index: 0,
            block: Default::default(),
            block_number: 0,
            start: 0,
            queue: Default::default(),
        };
        correlator.rewind()?;
        Ok(correlator)
    }

    /// Retrieve the kind of trace
    pub fn kind(&self) -> CaTraceKind {
        self.kind
    }

    /// Retrieve the address of the first instruction covered by the trace
    pub fn start_address(&self) -> u64 {
        self.start
    }

    /// Restart at the beginning of the trace
    pub fn rewind(&mut self) -> Result<(), Error> {
        self.index = 0;
        self.queue.clear();
        self.next_block()?;
        self.start = self.block.address();
        tracing::trace!(start = self.start, "Cycle-accurate trace rewound");
        Ok(())
    }

    /// Consume the timing of the next instruction of the given [`Class`]
    ///
    /// For vector traces, the instruction's class determines which vector
    /// flags are consumed in addition to the pipe flag.
    pub fn consume(&mut self, class: Class) -> Result<Timing, Error> {
        match self.kind {
            CaTraceKind::None => Err(Error::NoTraceKind),
            CaTraceKind::Instruction => {
                let (pipe, cycles) = self.consume_scalar()?;
                Ok(Timing {
                    pipe,
                    cycles,
                    ..Default::default()
                })
            }
            CaTraceKind::Vector => self.consume_vector(class),
        }
    }

    /// Replay code from the trace's start address until reaching `target`
    ///
    /// One timing is consumed for every instruction replayed, up to `budget`
    /// instructions. Returns whether the target was reached. Replaying stops
    /// early at instructions with a target that cannot be inferred.
    pub fn fast_forward<C: CodeProvider>(
        &mut self,
        code: &mut C,
        target: u64,
        budget: u32,
    ) -> Result<bool, Error> {
        let mut address = self.start;
        let mut saved = None;
        for _ in 0..budget {
            if address == target {
                break;
            }
            let Ok(insn) = code.get_insn(address) else {
                tracing::debug!(address, "No instruction while fast-forwarding");
                return Ok(false);
            };
            let Some(next) = next_ca_addr(&insn, address, &mut saved) else {
                tracing::debug!(address, "Uninferable target while fast-forwarding");
                return Ok(false);
            };
            address = next;
            self.consume(Class::Scalar)?;
        }
        Ok(address == target)
    }

    fn consume_scalar(&mut self) -> Result<(Pipe, u64), Error> {
        loop {
            if let Some((pipe, cycles)) = self.block.consume_instruction() {
                let cycles = u64::from(cycles) + self.block_number * SCALAR_BLOCK_CYCLES;
                return Ok((pipe, cycles));
            }
            self.next_block()?;
        }
    }

    fn consume_vector(&mut self, class: Class) -> Result<Timing, Error> {
        let mut cursor = self.queue.head();
        let (pipe, cycles) = loop {
            if let Some(pipe) = self.queue.take_pipe(&mut cursor) {
                break pipe;
            }
            cursor = self.load_vector_word()?;
        };
        let mut timing = Timing {
            pipe,
            cycles,
            ..Default::default()
        };

        let finish: &[u8] = match class {
            Class::VectorArith => &[flags::ARITH],
            Class::VectorLoad | Class::VectorAmo => &[flags::LOAD],
            Class::VectorStore => &[flags::STORE],
            Class::VectorAmoWw => &[flags::LOAD, flags::STORE],
            Class::VectorConfig | Class::Scalar => &[],
        };
        if let Some((first, rest)) = finish.split_first() {
            let (start, started) = self.take_vector(&mut cursor, flags::START)?;
            timing.vector_start = Some(start);
            timing.queue_depth = started.queue;

            let (finish, in_flight) = self.take_vector(&mut cursor, *first)?;
            timing.vector_finish = Some(finish);
            timing.in_flight = in_flight;
            for flag in rest {
                let (finish, _) = self.take_vector(&mut cursor, *flag)?;
                timing.vector_finish = Some(finish);
            }
        }

        self.queue.advance();
        Ok(timing)
    }

    /// Take the next vector flag of the given kind, loading words as needed
    ///
    /// Returns the flag's cycle and the operations in flight as seen from the
    /// cursor's entry.
    fn take_vector(&mut self, cursor: &mut usize, flag: u8) -> Result<(u64, InFlight), Error> {
        if *cursor == self.queue.tail() {
            *cursor = self.load_vector_word()?;
        }
        let mut in_flight = self
            .queue
            .get(*cursor)
            .map(|i| i.in_flight)
            .unwrap_or_default();
        loop {
            if let Some(cycles) = self.queue.take_flag(cursor, flag) {
                in_flight.bump(flag);
                return Ok((cycles, in_flight));
            }
            *cursor = self.load_vector_word()?;
        }
    }

    /// Move the next non-empty vector word into the queue
    ///
    /// Returns the queue index of the first new entry.
    fn load_vector_word(&mut self) -> Result<usize, Error> {
        loop {
            if let Some((word, cycles)) = self.block.consume_vector() {
                let cycles = u64::from(cycles) + self.block_number * VECTOR_BLOCK_CYCLES;
                return self.queue.push_word(word, cycles);
            }
            self.next_block()?;
        }
    }

    fn next_block(&mut self) -> Result<(), Error> {
        let words = self
            .words
            .get(self.index..self.index + record::WORDS)
            .and_then(|w| <&[u32; record::WORDS]>::try_from(w).ok())
            .ok_or(Error::Eof)?;
        let first = self.index == 0;
        self.block = Block::from_words(words, first);
        self.block_number = if first { 0 } else { self.block_number + 1 };
        self.index += record::WORDS;
        tracing::trace!(
            block = self.block_number,
            address = self.block.address(),
            "Cycle-accurate trace block"
        );
        Ok(())
    }
}

/// Infer the address following an instruction without any trace information
///
/// `saved` serves as a single entry call-return stack. Returns `None` for
/// instructions whose successor cannot be inferred, such as indirect jumps not
/// returning to `saved`, conditional branches with a target other than the
/// next instruction and traps.
pub fn next_ca_addr(insn: &Instruction, address: u64, saved: &mut Option<u64>) -> Option<u64> {
    let fallthrough = address.wrapping_add(insn.size.into());
    let Some(kind) = insn.kind else {
        return Some(fallthrough);
    };

    if let Some((rd, imm)) = kind.direct_jump() {
        if instruction::is_link(rd) {
            *saved = Some(fallthrough);
        }
        return Some(address.wrapping_add_signed(imm.into()));
    }
    if let Some((rd, rs1)) = kind.indirect_jump() {
        return match (instruction::is_link(rd), instruction::is_link(rs1)) {
            (true, true) if rd != rs1 => saved.replace(fallthrough),
            (true, _) => {
                *saved = Some(fallthrough);
                None
            }
            (false, true) => saved.take(),
            (false, false) => None,
        };
    }
    if let Some(imm) = kind.branch_target() {
        return (i64::from(imm) == insn.size as i64).then_some(fallthrough);
    }
    if kind.is_exception() || kind.is_exception_return() {
        return None;
    }
    Some(fallthrough)
}
