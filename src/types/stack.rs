// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Call-return address stacks
//!
//! Encoders only keep a bounded number of return addresses. Once the bound is
//! reached, pushing an address evicts the oldest one. The decoder has to
//! mirror that behavior in order to infer return targets the same way.

use std::collections::VecDeque;

/// Bounded stack of return addresses
pub trait ReturnStack: Sized {
    /// Create a new return stack with the given maximum depth
    ///
    /// Returns [`None`] if `max_depth` is not supported by the implementation.
    fn new(max_depth: usize) -> Option<Self>;

    /// Push a return address, evicting the bottom one if the stack is full
    fn push(&mut self, addr: u64);

    /// Retrieve and remove the topmost return address
    fn pop(&mut self) -> Option<u64>;

    /// Remove all return addresses
    fn clear(&mut self);

    /// Get the current stack depth
    fn depth(&self) -> usize;

    /// Get the maximum stack depth
    fn max_depth(&self) -> usize;
}

/// [`ReturnStack`] backed by an array of size `N`
///
/// Addresses are kept in a ring, `top` pointing at the slot the next address
/// is written to.
#[derive(Clone, Debug)]
pub struct StaticStack<const N: usize> {
    data: [u64; N],
    max_depth: usize,
    top: usize,
    depth: usize,
}

impl<const N: usize> ReturnStack for StaticStack<N> {
    fn new(max_depth: usize) -> Option<Self> {
        if max_depth > N {
            return None;
        }
        Some(Self {
            data: [0; N],
            max_depth,
            top: 0,
            depth: 0,
        })
    }

    fn push(&mut self, addr: u64) {
        let Some(slot) = self.data.get_mut(..self.max_depth).and_then(|d| d.get_mut(self.top))
        else {
            return;
        };
        *slot = addr;
        self.top = (self.top + 1) % self.max_depth;
        self.depth = (self.depth + 1).min(self.max_depth);
    }

    fn pop(&mut self) -> Option<u64> {
        self.depth = self.depth.checked_sub(1)?;
        self.top = self.top.checked_sub(1).unwrap_or(self.max_depth - 1);
        Some(self.data[self.top])
    }

    fn clear(&mut self) {
        self.top = 0;
        self.depth = 0;
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Heap allocated [`ReturnStack`] of arbitrary depth
#[derive(Clone, Debug, Default)]
pub struct VecStack {
    data: VecDeque<u64>,
    max_depth: usize,
}

impl ReturnStack for VecStack {
    fn new(max_depth: usize) -> Option<Self> {
        Some(Self {
            data: VecDeque::with_capacity(max_depth),
            max_depth,
        })
    }

    fn push(&mut self, addr: u64) {
        if self.max_depth == 0 {
            return;
        }
        if self.data.len() == self.max_depth
            && let Some(evicted) = self.data.pop_front()
        {
            tracing::trace!(evicted, "Return stack full");
        }
        self.data.push_back(addr);
    }

    fn pop(&mut self) -> Option<u64> {
        self.data.pop_back()
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn depth(&self) -> usize {
        self.data.len()
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }
}
