// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Decoding results

use core::fmt;

use crate::catrace::Timing;
use crate::code::SourceInfo;
use crate::instruction::Instruction;
use crate::message::TraceMessage;
use crate::types::{BranchFlag, CallReturn, CoreId};

/// Result of a single [`next_instruction`][super::TraceDecoder::next_instruction]
///
/// Each of the slots is optional. A step may carry an instruction, a message
/// or both, e.g. for an in-circuit trace message reporting an address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// Core the step refers to
    pub core: CoreId,
    pub instruction: Option<DecodedInstruction>,
    pub message: Option<ReportedMessage>,
    /// Source information for the instruction or the message's address
    pub source_info: Option<SourceInfo>,
    /// An error message was observed and the core needs to resynchronize
    pub sync_lost: bool,
    /// The cycle-accurate trace could not be aligned with the instruction
    /// trace and timings are no longer reported
    pub ca_misaligned: bool,
    /// The cycle-accurate trace ended or could not be read and timings are
    /// no longer reported
    pub ca_stopped: bool,
    /// Print output became available via the
    /// [`ItcPrintAggregator`][crate::itc::ItcPrintAggregator]
    pub itc_print: bool,
}

impl Step {
    pub(super) fn new(core: CoreId) -> Self {
        Self {
            core,
            ..Default::default()
        }
    }

    /// Check whether the step carries no information at all
    pub fn is_empty(&self) -> bool {
        self.instruction.is_none()
            && self.message.is_none()
            && !self.sync_lost
            && !self.ca_misaligned
            && !self.ca_stopped
            && !self.itc_print
    }
}

/// A reconstructed, retired instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub core: CoreId,
    pub address: u64,
    pub instruction: Instruction,
    pub call_return: CallReturn,
    pub branch: BranchFlag,
    /// Timestamp of the last message or, if correlated, the cycle the
    /// instruction finished in
    pub timestamp: u64,
    /// Timing from the cycle-accurate trace, if correlated
    pub timing: Option<Timing>,
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}: {}", self.address, self.instruction)?;
        if !self.call_return.is_none() {
            write!(f, " [{}]", self.call_return)?;
        }
        match self.branch {
            BranchFlag::Taken => write!(f, " taken")?,
            BranchFlag::NotTaken => write!(f, " not taken")?,
            _ => (),
        }
        Ok(())
    }
}

/// A trace message as reported to the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportedMessage {
    pub message: TraceMessage,
    /// Address of the core after processing the message, if known
    pub address: Option<u64>,
    /// Reconstructed timestamp after processing the message
    pub time: u64,
}

impl fmt::Display for ReportedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} time={}", self.message, self.time)?;
        if let Some(address) = self.address {
            write!(f, " address={address:#x}")?;
        }
        Ok(())
    }
}
