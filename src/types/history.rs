// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Branch history utilities
//!
//! History messages report conditional branch outcomes as a run of bits
//! preceeded by a single stop bit: the most significant set bit of the raw
//! field marks the start, the bits below it are the outcomes with the oldest
//! branch at the highest position. A set bit denotes a taken branch.

/// A run of branch outcomes, consumed oldest first
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct History {
    bits: u64,
    remaining: u8,
}

impl History {
    /// Maximum number of outcomes a history can hold
    pub const MAX_BRANCHES: u32 = u64::BITS - 1;

    /// Create a history from the raw message field including the stop bit
    pub fn from_raw(raw: u64) -> Self {
        let remaining = u64::BITS
            .saturating_sub(raw.leading_zeros())
            .saturating_sub(1);
        Self {
            bits: raw,
            remaining: remaining as u8,
        }
    }

    /// Remove the oldest outcome and return whether the branch was taken
    pub fn pop_taken(&mut self) -> Option<bool> {
        let index = self.remaining.checked_sub(1)?;
        self.remaining = index;
        Some((self.bits >> index) & 1 != 0)
    }

    /// Append the outcome of a newer branch
    pub fn push_taken(&mut self, taken: bool) -> Result<(), Error> {
        if u32::from(self.remaining) >= Self::MAX_BRANCHES {
            return Err(Error::TooManyBranches);
        }
        let outcomes = self.bits & Self::mask(self.remaining);
        self.remaining += 1;
        self.bits = (1 << self.remaining) | (outcomes << 1) | u64::from(taken);
        Ok(())
    }

    /// Retrieve the number of outcomes not yet consumed
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    /// Check whether all outcomes were consumed
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Retrieve the raw field value, stop bit included, for the outcomes left
    pub fn raw(&self) -> u64 {
        (1 << self.remaining) | (self.bits & Self::mask(self.remaining))
    }

    fn mask(count: u8) -> u64 {
        1u64.checked_shl(count.into()).unwrap_or(0).wrapping_sub(1)
    }
}

impl FromIterator<bool> for History {
    /// Collect outcomes, oldest first, silently dropping those exceeding
    /// [`MAX_BRANCHES`][Self::MAX_BRANCHES]
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let mut res = Self::from_raw(1);
        for taken in iter {
            if res.push_taken(taken).is_err() {
                break;
            }
        }
        res
    }
}

/// Errors produced by [`History`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation would exceed [`History::MAX_BRANCHES`]
    #[error("Too many branches")]
    TooManyBranches,
}
