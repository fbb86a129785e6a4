// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Slice stream encoder

use std::fmt::Write;

use super::TraceMessage;

/// An encoder producing slice streams from [`TraceMessage`]s
///
/// The tcode of each message occupies a slice of its own. Fixed-width fields
/// are packed into the following slices, variable-width fields are emitted
/// with the minimal number of bits and complete the slice they end in.
///
/// # Example
///
/// ```
/// use riscv_nexus_trace::message::encoder::Encoder;
/// use riscv_nexus_trace::message::{Payload, TraceMessage};
///
/// let mut encoder = Encoder::new(0);
/// encoder.encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 6 }));
/// assert_eq!(encoder.finish(), vec![0x0c, 0x1b]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Encoder {
    slices: Vec<u8>,
    slice: u8,
    pos: u32,
    src_bits: u8,
}

impl Encoder {
    /// Create a new encoder for the given width of the core id field
    pub fn new(src_bits: u8) -> Self {
        Self {
            src_bits,
            ..Default::default()
        }
    }

    /// Encode one message
    pub fn encode(&mut self, message: &TraceMessage) -> &mut Self {
        self.slice = 0;
        self.pos = 2;
        self.append(message.tcode() as u64, 6);
        self.flush();

        self.append(message.core.into(), self.src_bits.into());
        message.payload.emit(self);
        if let Some(timestamp) = message.timestamp {
            self.var(timestamp);
        }
        if let Some(last) = self.slices.last_mut() {
            *last |= 0x3;
        }
        self
    }

    /// Append a raw slice
    ///
    /// This allows the construction of streams with garbage or truncated
    /// messages.
    pub fn literal(&mut self, slice: u8) -> &mut Self {
        self.slices.push(slice);
        self
    }

    /// Retrieve the slices encoded so far
    pub fn slices(&self) -> &[u8] {
        &self.slices
    }

    /// Render the slices encoded so far as text, one slice per line
    pub fn to_text(&self) -> String {
        self.slices.iter().fold(String::new(), |mut s, slice| {
            let _ = writeln!(s, "{slice:02x}");
            s
        })
    }

    /// Finish the encoding process, returning the slices
    pub fn finish(self) -> Vec<u8> {
        self.slices
    }

    /// Append a fixed-width field
    pub(super) fn fixed(&mut self, value: u64, width: u32) {
        self.append(value, width);
    }

    /// Append a variable-width field, terminating it
    pub(super) fn var(&mut self, value: u64) {
        self.append(value, u64::BITS - value.leading_zeros());
        self.slice |= 0x1;
        self.flush();
    }

    fn append(&mut self, mut value: u64, bits: u32) {
        let mut left = bits;
        while left > 0 {
            if self.pos == 8 {
                self.flush();
            }
            let chunk = left.min(8 - self.pos);
            let mask = (1u64 << chunk) - 1;
            self.slice |= ((value & mask) as u8) << self.pos;
            value = value.checked_shr(chunk).unwrap_or(0);
            left -= chunk;
            self.pos += chunk;
        }
    }

    fn flush(&mut self) {
        self.slices.push(self.slice);
        self.slice = 0;
        self.pos = 2;
    }
}
