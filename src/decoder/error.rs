// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Decoder specific error types

use crate::message::{Ict, TCode};
use crate::types::CoreId;
use crate::{catrace, count, message};

use super::state::State;

/// Decoding errors
///
/// `E` is the error type of the [`CodeProvider`][crate::code::CodeProvider]
/// the decoder was built with.
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// The trace could not be read
    #[error("Could not read trace")]
    Message(#[from] message::Error),
    /// Counts or call-return stack are inconsistent with the code
    #[error("Inconsistent counts")]
    Count(#[from] count::Error),
    #[error("Cycle-accurate trace failed")]
    CaTrace(#[from] catrace::Error),
    /// The address following an instruction could not be determined even
    /// though counts remain
    #[error("Unresolved address after instruction at {0:#x}")]
    UnresolvedAddress(u64),
    /// Instructions were to be stepped without a known address
    #[error("No address to step from")]
    NoAddress,
    /// We could not fetch an instruction from a given address
    #[error("Cannot get the instruction at {1:#x}")]
    CannotGetInstruction(#[source] E, u64),
    /// A message arrived in a state not prepared to handle it
    #[error("Unexpected {tcode} message while {state}")]
    UnexpectedMessage { tcode: TCode, state: State },
    /// An in-circuit trace message carries an unsupported combination of
    /// checkpoint source and data format
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(Ict),
    /// A message originates from a core the decoder keeps no state for
    #[error("Core {0} out of range")]
    CoreOutOfRange(CoreId),
    /// The call-return stack cannot be constructed for the given size
    #[error("Cannot construct return stack of size {0}")]
    CannotConstructStack(usize),
    /// A previous error stopped the decoder
    #[error("Decoder halted")]
    Halted,
}

impl<E> Error<E> {
    /// Check whether the decoder or the affected core cannot continue
    ///
    /// Messages from cores out of range and cycle-accurate trace failures only
    /// affect the single call reporting them.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Message(e) => !e.is_recoverable(),
            Self::CaTrace(_) | Self::CoreOutOfRange(_) => false,
            _ => true,
        }
    }
}
