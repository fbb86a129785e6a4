// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Instruction and branch count bookkeeping
//!
//! Trace messages do not report every instruction executed. Instead, they
//! carry counts of instructions or branch outcomes after which the next message
//! is due. A [`CountTracker`] keeps these counts for a single core, along with
//! the core's call-return stack.

pub mod error;

#[cfg(test)]
mod tests;

use core::fmt;

use crate::message::{Payload, ResourceKind};
use crate::types::history::History;
use crate::types::stack::{ReturnStack, VecStack};

pub use error::Error;

/// Kind of count currently driving the decoding
///
/// Only one kind is considered live at any time. If a message supplies
/// multiple counts, they are consumed by priority: history bits first, then
/// taken and not-taken counts and finally the instruction count.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CountType {
    #[default]
    None,
    ICnt,
    History,
    Taken,
    NotTaken,
}

impl fmt::Display for CountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ICnt => write!(f, "i-cnt"),
            Self::History => write!(f, "history"),
            Self::Taken => write!(f, "taken"),
            Self::NotTaken => write!(f, "not-taken"),
        }
    }
}

/// Counts and call-return stack of a single core
#[derive(Clone, Debug)]
pub struct CountTracker<S = VecStack> {
    i_cnt: u64,
    history: History,
    taken: u64,
    not_taken: u64,
    stack: S,
}

impl<S: ReturnStack> CountTracker<S> {
    /// Create a new tracker with a call-return stack of the given capacity
    ///
    /// Returns `None` if the stack could not be constructed.
    pub fn new(stack_size: usize) -> Option<Self> {
        S::new(stack_size).map(|stack| Self {
            i_cnt: 0,
            history: Default::default(),
            taken: 0,
            not_taken: 0,
            stack,
        })
    }

    /// Determine which count is live
    pub fn count_type(&self) -> CountType {
        if !self.history.is_empty() {
            CountType::History
        } else if self.taken > 0 {
            CountType::Taken
        } else if self.not_taken > 0 {
            CountType::NotTaken
        } else if self.i_cnt > 0 {
            CountType::ICnt
        } else {
            CountType::None
        }
    }

    /// Drop all counts
    pub fn reset_counts(&mut self) {
        self.i_cnt = 0;
        self.history = Default::default();
        self.taken = 0;
        self.not_taken = 0;
    }

    /// Replace all counts with those carried by a message's payload
    ///
    /// Returns the [`CountType`] live afterwards. Counts not carried by the
    /// payload are cleared.
    pub fn set_counts(&mut self, payload: &Payload) -> CountType {
        self.reset_counts();
        self.i_cnt = payload.i_cnt().unwrap_or(0);
        match *payload {
            Payload::IndirectHistory { history, .. }
            | Payload::IndirectHistoryWs { history, .. }
            | Payload::Correlation {
                history: Some(history),
                ..
            } => self.history = History::from_raw(history),
            Payload::ResourceFull { rcode, rdata } => match ResourceKind::from(rcode) {
                ResourceKind::ICnt => self.i_cnt = rdata,
                ResourceKind::History => self.history = History::from_raw(rdata),
                ResourceKind::Taken => self.taken = rdata,
                ResourceKind::NotTaken => self.not_taken = rdata,
                ResourceKind::Other(rcode) => {
                    tracing::warn!(rcode, "Ignoring resource full message of unknown kind")
                }
            },
            _ => (),
        }
        let count_type = self.count_type();
        tracing::trace!(
            i_cnt = self.i_cnt,
            history = self.history.remaining(),
            taken = self.taken,
            not_taken = self.not_taken,
            %count_type,
            "Counts set"
        );
        count_type
    }

    /// Retrieve the remaining instruction count in 16 bit units
    pub fn i_cnt(&self) -> u64 {
        self.i_cnt
    }

    /// Retrieve the number of history bits not yet consumed
    pub fn history_remaining(&self) -> u8 {
        self.history.remaining()
    }

    /// Consume instruction count in 16 bit units
    ///
    /// The count saturates at zero. Returns the remaining count.
    pub fn consume_i_cnt(&mut self, halfwords: u64) -> u64 {
        self.i_cnt = self.i_cnt.saturating_sub(halfwords);
        self.i_cnt
    }

    /// Consume the next history bit
    ///
    /// Returns whether the branch was taken.
    pub fn consume_history(&mut self) -> Result<bool, Error> {
        self.history
            .pop_taken()
            .ok_or(Error::CountExhausted(CountType::History))
    }

    /// Consume one taken branch
    pub fn consume_taken(&mut self) -> Result<(), Error> {
        self.taken = self
            .taken
            .checked_sub(1)
            .ok_or(Error::CountExhausted(CountType::Taken))?;
        Ok(())
    }

    /// Consume one not-taken branch
    pub fn consume_not_taken(&mut self) -> Result<(), Error> {
        self.not_taken = self
            .not_taken
            .checked_sub(1)
            .ok_or(Error::CountExhausted(CountType::NotTaken))?;
        Ok(())
    }

    /// Push a return address
    pub fn push(&mut self, addr: u64) {
        self.stack.push(addr);
    }

    /// Pop a return address
    pub fn pop(&mut self) -> Result<u64, Error> {
        self.stack.pop().ok_or(Error::StackUnderflow)
    }

    /// Remove all return addresses
    pub fn reset_stack(&mut self) {
        self.stack.clear();
    }

    /// Retrieve the number of return addresses on the stack
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }
}
