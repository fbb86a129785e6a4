// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Queue of vector trace records

use super::{Error, InFlight, Pipe};

/// Default capacity of a [`TraceQueue`]
pub const CAPACITY: usize = 512;

/// Number of records carried by a single vector trace word
pub const RECORDS_PER_WORD: usize = 5;

/// Flags of a single vector trace record
pub mod flags {
    pub const V0: u8 = 0x20;
    pub const V1: u8 = 0x10;
    pub const START: u8 = 0x08;
    pub const ARITH: u8 = 0x04;
    pub const STORE: u8 = 0x02;
    pub const LOAD: u8 = 0x01;
}

/// A single entry of the [`TraceQueue`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Item {
    /// Flags not yet consumed, see [`flags`]
    pub record: u8,
    pub cycle: u64,
    /// Operations passing this entry while searching for their flag
    pub in_flight: InFlight,
}

/// Ring buffer of vector trace records
///
/// Records are appended five at a time, one per cycle of a trace word.
/// Consumers search forward from a cursor and clear the flags they consume.
/// Entries whose flags were all consumed stay in place until
/// [`advance`][Self::advance] or [`pack`][Self::pack] removes them.
#[derive(Clone, Debug)]
pub struct TraceQueue {
    items: Vec<Item>,
    head: usize,
    tail: usize,
}

impl TraceQueue {
    /// Create a queue holding up to `capacity - 1` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            items: vec![Default::default(); capacity.max(RECORDS_PER_WORD + 1)],
            head: 0,
            tail: 0,
        }
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.items.fill(Default::default());
        self.head = 0;
        self.tail = 0;
    }

    /// Retrieve the index of the oldest entry
    pub fn head(&self) -> usize {
        self.head
    }

    /// Retrieve the index one past the newest entry
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Retrieve the number of entries, including consumed ones
    pub fn len(&self) -> usize {
        (self.tail + self.items.len() - self.head) % self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Retrieve the number of free slots
    pub fn room(&self) -> usize {
        self.items.len() - 1 - self.len()
    }

    /// Retrieve the entry at the given index
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Move all entries with unconsumed flags towards the head
    pub fn pack(&mut self) {
        let size = self.items.len();
        let mut dst = self.head;
        let mut src = self.head;
        while src != self.tail {
            let item = core::mem::take(&mut self.items[src]);
            if item.record != 0 {
                self.items[dst] = item;
                dst = (dst + 1) % size;
            }
            src = (src + 1) % size;
        }
        self.tail = dst;
    }

    /// Append the records of a vector trace word
    ///
    /// Records without flags are dropped. The queue is [packed][Self::pack] if
    /// it has not enough room. Returns the index of the first new entry.
    pub fn push_word(&mut self, word: u32, cycle: u64) -> Result<usize, Error> {
        if self.room() < RECORDS_PER_WORD {
            self.pack();
            if self.room() < RECORDS_PER_WORD {
                tracing::warn!(len = self.len(), "Vector trace queue full");
                return Err(Error::QueueFull);
            }
        }

        let start = self.tail;
        for i in 0..RECORDS_PER_WORD {
            let record = ((word >> (6 * (RECORDS_PER_WORD - 1 - i))) & 0x3f) as u8;
            if record != 0 {
                self.items[self.tail] = Item {
                    record,
                    cycle: cycle + i as u64,
                    in_flight: Default::default(),
                };
                self.tail = self.next(self.tail);
            }
        }
        Ok(start)
    }

    /// Search for the next pipe flag, starting at the given cursor
    ///
    /// The flag found is consumed and the cursor placed after its entry. If no
    /// flag is found, the cursor is left at the [tail][Self::tail].
    pub fn take_pipe(&mut self, cursor: &mut usize) -> Option<(Pipe, u64)> {
        while *cursor != self.tail {
            let item = &mut self.items[*cursor];
            let pipe = if item.record & flags::V0 != 0 {
                item.record &= !flags::V0;
                Some(Pipe::Pipe0)
            } else if item.record & flags::V1 != 0 {
                item.record &= !flags::V1;
                Some(Pipe::Pipe1)
            } else {
                None
            };
            let cycle = item.cycle;
            *cursor = self.next(*cursor);
            if let Some(pipe) = pipe {
                return Some((pipe, cycle));
            }
        }
        None
    }

    /// Search for the given vector flag, starting at the given cursor
    ///
    /// Every entry passed, including the one holding the flag, records the
    /// operation as in flight. The flag found is consumed and the cursor
    /// placed after its entry. If no flag is found, the cursor is left at the
    /// [tail][Self::tail].
    pub fn take_flag(&mut self, cursor: &mut usize, flag: u8) -> Option<u64> {
        while *cursor != self.tail {
            let item = &mut self.items[*cursor];
            item.in_flight.bump(flag);
            let found = item.record & flag != 0;
            item.record &= !flag;
            let cycle = item.cycle;
            *cursor = self.next(*cursor);
            if found {
                return Some(cycle);
            }
        }
        None
    }

    /// Drop fully consumed entries at the head
    pub fn advance(&mut self) {
        while self.head != self.tail && self.items[self.head].record == 0 {
            self.items[self.head] = Default::default();
            self.head = self.next(self.head);
        }
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) % self.items.len()
    }
}

impl Default for TraceQueue {
    fn default() -> Self {
        Self::new(CAPACITY)
    }
}
