// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Code provider related error types

/// The provider does not hold an instruction at the given address
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("No instruction at {0:#x}")]
pub struct NoInstruction(pub u64);

/// Errors returned by a [`Segment`][super::basic::Segment]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    /// The address is outside of the segment
    #[error("Address {0:#x} not covered by segment")]
    AddressNotCovered(u64),
    /// An instruction could not be extracted from the data at the address
    #[error("No valid instruction at {0:#x}")]
    InvalidInstruction(u64),
}
