// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Instrumentation trace channel print output
//!
//! Software may print text by writing it to a stimulus register of the
//! instrumentation trace channel. These writes show up in the trace as data
//! acquisition or auxiliary access messages. The [`ItcPrintAggregator`]
//! reassembles them into lines of text per core.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use crate::config::ItcPrint;
use crate::types::CoreId;

/// A run of printed text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrintRun {
    pub text: String,
    /// Timestamp of the first write contributing to the run
    pub start: u64,
    /// Timestamp of the last write contributing to the run
    pub end: u64,
    /// Whether the run was terminated by a newline or NUL character
    pub terminated: bool,
}

/// Aggregator for print output on a single stimulus channel
///
/// Each core has its own buffer of [`PrintRun`]s holding up to a configured
/// number of characters. If a buffer overflows, the oldest unterminated run is
/// evicted, or the oldest run if all are terminated. Evictions are counted and
/// available via [`dropped`][Self::dropped].
#[derive(Clone, Debug)]
pub struct ItcPrintAggregator {
    channel: u8,
    capacity: usize,
    cores: Vec<Buffer>,
    dropped: u64,
}

#[derive(Clone, Debug, Default)]
struct Buffer {
    runs: VecDeque<PrintRun>,
    chars: usize,
}

impl ItcPrintAggregator {
    /// Create an aggregator for the given number of cores
    pub fn new(settings: &ItcPrint, max_cores: usize) -> Self {
        Self {
            channel: settings.channel,
            capacity: settings.buffer_size.max(1),
            cores: vec![Default::default(); max_cores],
            dropped: 0,
        }
    }

    /// Retrieve the stimulus channel observed
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Observe a write to a stimulus register
    ///
    /// `address` is the register offset, i.e. four times the channel plus the
    /// byte offset determining the access width: offset `0` writes four, `2`
    /// two and `3` a single character, least significant byte first. Returns
    /// whether the write was a print on the observed channel.
    pub fn observe(&mut self, core: CoreId, address: u64, data: u64, timestamp: u64) -> bool {
        if address >> 2 != u64::from(self.channel) {
            return false;
        }
        let width = match address & 0x3 {
            0 => 4,
            2 => 2,
            3 => 1,
            _ => return false,
        };
        let capacity = self.capacity;
        let Some(buffer) = self.cores.get_mut(usize::from(core)) else {
            tracing::debug!(core, "Print for core out of range");
            return false;
        };

        for byte in data.to_le_bytes().into_iter().take(width) {
            let open = buffer.runs.back().is_some_and(|r| !r.terminated);
            match byte {
                b'\n' | 0 => {
                    if let Some(run) = buffer.runs.back_mut().filter(|_| open) {
                        run.terminated = true;
                        run.end = timestamp;
                    } else if byte == b'\n' {
                        buffer.runs.push_back(PrintRun {
                            text: String::new(),
                            start: timestamp,
                            end: timestamp,
                            terminated: true,
                        });
                    }
                }
                c => {
                    if buffer.chars >= capacity
                        && let Some(run) = buffer.evict()
                    {
                        self.dropped += 1;
                        tracing::warn!(core, text = %run.text, "Evicted print run");
                    }
                    match buffer.runs.back_mut().filter(|r| !r.terminated) {
                        Some(run) => {
                            run.text.push(char::from(c));
                            run.end = timestamp;
                        }
                        None => buffer.runs.push_back(PrintRun {
                            text: char::from(c).to_string(),
                            start: timestamp,
                            end: timestamp,
                            terminated: false,
                        }),
                    }
                    buffer.chars += 1;
                }
            }
        }
        true
    }

    /// Shorthand for [`observe`][Self::observe]
    pub fn print(&mut self, core: CoreId, address: u64, data: u64, timestamp: u64) -> bool {
        self.observe(core, address, data, timestamp)
    }

    /// Take the oldest run of the given core if it is terminated
    pub fn get_print_string(&mut self, core: CoreId) -> Option<PrintRun> {
        let buffer = self.cores.get_mut(usize::from(core))?;
        if !buffer.runs.front()?.terminated {
            return None;
        }
        Self::take(buffer)
    }

    /// Take the oldest run of the given core, terminated or not
    pub fn flush_print_string(&mut self, core: CoreId) -> Option<PrintRun> {
        Self::take(self.cores.get_mut(usize::from(core))?)
    }

    /// Retrieve the number of runs buffered for the given core
    pub fn pending(&self, core: CoreId) -> usize {
        self.cores
            .get(usize::from(core))
            .map(|b| b.runs.len())
            .unwrap_or(0)
    }

    /// Check whether any core has a terminated run buffered
    pub fn has_terminated(&self) -> bool {
        self.cores
            .iter()
            .any(|b| b.runs.front().is_some_and(|r| r.terminated))
    }

    /// Retrieve the number of runs evicted so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn take(buffer: &mut Buffer) -> Option<PrintRun> {
        let run = buffer.runs.pop_front()?;
        buffer.chars = buffer.chars.saturating_sub(run.text.chars().count());
        Some(run)
    }
}

impl Buffer {
    /// Remove the oldest unterminated run, or the oldest run
    fn evict(&mut self) -> Option<PrintRun> {
        let index = self.runs.iter().position(|r| !r.terminated).unwrap_or(0);
        let run = self.runs.remove(index)?;
        self.chars = self.chars.saturating_sub(run.text.chars().count());
        Some(run)
    }
}
