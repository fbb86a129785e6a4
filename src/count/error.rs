// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Count-specific error types

use super::CountType;

/// Count bookkeeping errors
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A return address was requested from an empty call-return stack
    #[error("Call-return stack underflow")]
    StackUnderflow,
    /// A count was consumed which is already exhausted
    #[error("Exhausted {0} count consumed")]
    CountExhausted(CountType),
    /// A branch outcome was requested while no counts are live
    #[error("No counts available")]
    NoCounts,
}
