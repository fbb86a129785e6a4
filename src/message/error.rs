// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Message-specific error types

/// Errors produced by the [`MessageSlicer`][super::slicer::MessageSlicer]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The trace ended in the middle of a message
    #[error("Trace ended in the middle of a message")]
    Truncated,
    /// A message did not match the layout its tcode demands
    ///
    /// The message is discarded. Parsing may continue with the next message.
    #[error("Malformed message")]
    Malformed(#[from] Malformed),
    /// A line in a textual trace is not a hexadecimal slice
    #[error("Invalid slice {text:?} in line {line}")]
    InvalidText { line: u64, text: String },
    /// Core ids of the configured width do not fit in a [`CoreId`][crate::types::CoreId]
    #[error("Width of src field {0} exceeds {max} bits", max = crate::config::MAX_SRC_BITS)]
    SrcBits(u8),
    #[error("Could not read trace")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check whether parsing may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Truncated)
    }
}

/// Ways in which a message may be malformed
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    #[error("Unknown tcode {0}")]
    UnknownTCode(u8),
    /// The message ended before all fields were read
    #[error("Missing field")]
    MissingField,
    /// The message contains more fields than expected
    #[error("Unexpected extra field")]
    ExtraField,
    /// A field's value does not fit in 64 bits
    #[error("Field value overflows")]
    FieldOverflow,
}
