// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Blocks of cycle-accurate trace words

use super::Pipe;

/// Number of words in a [`Block`]
pub const WORDS: usize = 32;

/// Number of payload bits in a single word
pub const PAYLOAD_BITS: u32 = 30;

const PAYLOAD_MASK: u32 = (1 << PAYLOAD_BITS) - 1;

/// A block of 32 cycle-accurate trace words
///
/// The lower 30 bits of each word are payload. In scalar traces every pair of
/// payload bits covers one cycle, with the more significant bits being the
/// older ones. In vector traces each word carries five six bit records, one per
/// cycle. The upper two bits of words `1` through `31` form the address the
/// block starts at, least significant bits first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    data: [u32; WORDS],
    address: u64,
    offset: u32,
}

impl Block {
    /// Assemble a block from raw words
    ///
    /// If `first` is set, the block is the trace's first one and the oldest
    /// pipe 0 flag is forced, marking the instruction at the block's address.
    pub fn from_words(words: &[u32; WORDS], first: bool) -> Self {
        let mut data = [0; WORDS];
        let mut address = 0;
        for (i, word) in words.iter().enumerate() {
            data[i] = word & PAYLOAD_MASK;
            if i > 0 {
                address |= u64::from(word >> PAYLOAD_BITS) << (2 * (i - 1));
            }
        }
        if first {
            data[0] |= 1 << (PAYLOAD_BITS - 1);
        }
        Self {
            data,
            address,
            offset: 0,
        }
    }

    /// Retrieve the address encoded in the block's trailer
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Retrieve the payload of the word at the given index
    pub fn payload(&self, index: usize) -> Option<u32> {
        self.data.get(index).copied()
    }

    /// Consume the next pipe finish flag of a scalar trace
    ///
    /// Returns the pipe and the cycle relative to the start of the block, or
    /// `None` if the block is exhausted.
    pub fn consume_instruction(&mut self) -> Option<(Pipe, u32)> {
        let total = PAYLOAD_BITS * WORDS as u32;
        while self.offset < total {
            let index = (self.offset / PAYLOAD_BITS) as usize;
            let bit = PAYLOAD_BITS - 1 - self.offset % PAYLOAD_BITS;
            let offset = self.offset;
            self.offset += 1;
            if self.data[index] & (1 << bit) != 0 {
                let pipe = if bit & 1 != 0 { Pipe::Pipe0 } else { Pipe::Pipe1 };
                return Some((pipe, offset / 2));
            }
        }
        None
    }

    /// Consume the next non-empty word of a vector trace
    ///
    /// Returns the word's payload and the cycle of its first record relative
    /// to the start of the block, or `None` if the block is exhausted.
    pub fn consume_vector(&mut self) -> Option<(u32, u32)> {
        let start = self.offset as usize;
        let index = (start..WORDS).find(|i| self.data[*i] != 0)?;
        self.offset = index as u32 + 1;
        Some((self.data[index], index as u32 * 5))
    }
}
