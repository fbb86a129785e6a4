// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Types shared by the [count tracker][crate::count] and the [decoder][crate::decoder]

pub mod history;
pub mod stack;

#[cfg(test)]
mod tests;

use core::fmt;

/// Core identifier as carried in the `src` field of trace messages
pub type CoreId = u8;

/// Classification of an instruction regarding calls and returns
///
/// Several of these may apply to a single instruction, e.g. a `jalr` that
/// returns and calls at the same time is both a [`Self::Swap`] and reported
/// as such rather than as call or return.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CallReturn {
    pub call: bool,
    pub ret: bool,
    pub swap: bool,
    pub exception: bool,
    pub exception_return: bool,
    pub interrupt: bool,
}

impl CallReturn {
    /// Check whether none of the flags is set
    pub fn is_none(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for CallReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.call, "call"),
            (self.ret, "return"),
            (self.swap, "swap"),
            (self.exception, "exception"),
            (self.exception_return, "exception-return"),
            (self.interrupt, "interrupt"),
        ];
        let mut first = true;
        for (_, name) in flags.iter().filter(|(set, _)| *set) {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        Ok(())
    }
}

/// Outcome of a conditional branch
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BranchFlag {
    /// The instruction is not a conditional branch
    #[default]
    None,
    Taken,
    NotTaken,
    /// The outcome could not (yet) be determined from the available counts
    Unknown,
}

/// Trace mode as inferred from the messages observed
///
/// Branch trace mode (BTM) reports every taken branch with a message, history
/// trace mode (HTM) reports branch outcomes as history bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TraceMode {
    #[default]
    Branch,
    History,
}

impl fmt::Display for TraceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "BTM"),
            Self::History => write!(f, "HTM"),
        }
    }
}
