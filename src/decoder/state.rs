// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Per-core decoding state

use core::fmt;

use crate::count::{self, CountTracker, CountType};
use crate::instruction::{self, Instruction};
use crate::message::{Ict, IctSource, Payload, TCode, TraceMessage};
use crate::types::stack::ReturnStack;
use crate::types::{BranchFlag, CallReturn, TraceMode};

use super::time;

/// Decoding state of a single core
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum State {
    /// Waiting for the first sync while the cycle-accurate trace still needs
    /// to be aligned
    AwaitingCaSync,
    #[default]
    AwaitingFirstSync,
    /// Waiting for a message carrying counts
    AwaitingCountedMessage,
    /// Stepping through instructions until the counts are exhausted
    Stepping,
    /// Applying the message whose counts were exhausted
    Retiring,
    /// A fatal error occurred, messages of this core are ignored
    Halted,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingCaSync => write!(f, "awaiting CA sync"),
            Self::AwaitingFirstSync => write!(f, "awaiting first sync"),
            Self::AwaitingCountedMessage => write!(f, "awaiting counted message"),
            Self::Stepping => write!(f, "stepping"),
            Self::Retiring => write!(f, "retiring"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// Result of [`Core::next_addr`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Next {
    /// Address of the next instruction, if it could be determined
    pub address: Option<u64>,
    pub call_return: CallReturn,
    pub branch: BranchFlag,
}

/// Addresses, time, counts and mode of a single core
#[derive(Clone, Debug)]
pub struct Core<S> {
    pub state: State,
    /// Address of the next instruction to report
    pub address: Option<u64>,
    /// Last full address reported by the trace
    ///
    /// Uninferable address fields are XORed into this address.
    pub faddr: u64,
    pub time: u64,
    pub counts: CountTracker<S>,
    pub mode: TraceMode,
    /// Whether to flag the next instruction as interrupt handler entry
    pub interrupt: bool,
    /// Message whose counts drive the current stepping
    pub message: Option<TraceMessage>,
}

impl<S: ReturnStack> Core<S> {
    /// Create state for a core with a call-return stack of the given size
    pub fn new(stack_size: usize, state: State) -> Option<Self> {
        CountTracker::new(stack_size).map(|counts| Self {
            state,
            address: None,
            faddr: 0,
            time: 0,
            counts,
            mode: Default::default(),
            interrupt: false,
            message: None,
        })
    }

    /// Update the time based on a message's timestamp field
    pub fn update_time(&mut self, message: &TraceMessage, width: u8) {
        let Some(raw) = message.timestamp else {
            return;
        };
        let kind = match message.tcode() {
            t if t.is_sync() => time::Kind::Full,
            TCode::IctWs => time::Kind::Full,
            _ => time::Kind::Relative,
        };
        self.time = time::reconstruct(kind, self.time, raw, width);
    }

    /// Forget time and addresses after an error message
    pub fn lose_sync(&mut self) {
        self.time = 0;
        self.address = None;
        self.faddr = 0;
    }

    /// Infer the trace mode from a message observed for this core
    ///
    /// Only messages of history trace mode switch the mode. There is no way
    /// back to branch trace mode.
    pub fn observe_mode(&mut self, payload: &Payload) {
        let history = matches!(
            payload,
            Payload::ResourceFull { .. }
                | Payload::IndirectHistory { .. }
                | Payload::IndirectHistoryWs { .. }
                | Payload::Correlation { cdf: 1, .. }
        );
        if history && self.mode != TraceMode::History {
            tracing::debug!(tcode = %payload.tcode(), "Switching to HTM");
            self.mode = TraceMode::History;
        }
    }

    /// Apply a message's address and timestamp fields
    ///
    /// Counts are not touched, except for sync messages resetting counts and
    /// call-return stack. Returns the [`Ict`] of an in-circuit trace message
    /// with an unsupported checkpoint.
    pub fn process_message(&mut self, message: &TraceMessage, width: u8) -> Result<(), Ict> {
        self.update_time(message, width);
        match message.payload {
            Payload::Error { .. } => {
                self.faddr = 0;
                self.address = None;
            }
            Payload::IndirectBranch { u_addr, .. } | Payload::IndirectHistory { u_addr, .. } => {
                self.faddr ^= u_addr << 1;
                self.address = Some(self.faddr);
            }
            Payload::Sync { f_addr, .. }
            | Payload::DirectBranchWs { f_addr, .. }
            | Payload::IndirectBranchWs { f_addr, .. }
            | Payload::IndirectHistoryWs { f_addr, .. } => {
                self.faddr = f_addr << 1;
                self.address = Some(self.faddr);
                self.counts.reset_counts();
                self.counts.reset_stack();
            }
            Payload::Ict(ict) => self.checkpoint(&ict, self.faddr)?,
            Payload::IctWs(ict) => self.checkpoint(&ict, 0)?,
            _ => (),
        }
        Ok(())
    }

    /// Apply the address fields of an in-circuit trace message
    ///
    /// Address fields are XORed into `base`.
    fn checkpoint(&mut self, ict: &Ict, base: u64) -> Result<(), Ict> {
        let target = base ^ (ict.ckdata0 << 1);
        match (ict.source(), ict.ckdf) {
            (IctSource::ExtTrigger | IctSource::Watchpoint, 0) => self.faddr = target,
            (IctSource::Control, 0) => (),
            (IctSource::ExtTrigger | IctSource::Watchpoint, 1)
            | (IctSource::Exception | IctSource::Interrupt | IctSource::Context, 1)
            | (IctSource::Control, 1)
            | (IctSource::PcSample, 0)
            | (IctSource::InferableCall, 0) => {
                self.faddr = target;
                self.address = Some(target);
            }
            (IctSource::InferableCall, 1) => {
                let ckdata1 = ict.ckdata1.ok_or(*ict)?;
                self.address = Some(target);
                self.faddr = target ^ (ckdata1 << 1);
            }
            _ => return Err(*ict),
        }
        Ok(())
    }

    /// Determine the address following the given instruction
    ///
    /// Counts are consumed for the instruction and the call-return stack is
    /// updated. `tcode` is the type of the message driving the stepping. If a
    /// conditional branch's outcome cannot be determined from the counts, no
    /// counts are consumed and [`BranchFlag::Unknown`] is reported. In history
    /// trace mode, a return with an unknown target fails with
    /// [`count::Error::StackUnderflow`] unless it is the last instruction
    /// counted by the message, which then supplies the target.
    pub fn next_addr(
        &mut self,
        address: u64,
        insn: &Instruction,
        tcode: Option<TCode>,
    ) -> Result<Next, count::Error> {
        let halfwords = insn.size.halfwords();
        let fallthrough = address.wrapping_add(insn.size.into());
        let mut next = Next {
            address: Some(fallthrough),
            ..Default::default()
        };

        if let Some(kind) = insn.kind {
            if let Some((rd, imm)) = kind.direct_jump() {
                if instruction::is_link(rd) {
                    self.counts.push(fallthrough);
                    next.call_return.call = true;
                }
                next.address = Some(address.wrapping_add_signed(imm.into()));
            } else if let Some((rd, rs1)) = kind.indirect_jump() {
                next.address = self.indirect_jump(rd, rs1, fallthrough, &mut next.call_return);
                let cr = next.call_return;
                if self.mode == TraceMode::Branch {
                    let pending = self.counts.i_cnt() > halfwords;
                    if (cr.ret || cr.swap) && pending {
                        tracing::debug!(address, "Return with instructions pending, switching to HTM");
                        self.mode = TraceMode::History;
                    } else {
                        // The target of the jump follows with the next message
                        next.address = pending.then_some(fallthrough);
                    }
                }
                if self.mode == TraceMode::History && (cr.ret || cr.swap) && next.address.is_none()
                {
                    // The message's address resolves a return retiring it
                    self.counts.consume_i_cnt(halfwords);
                    if self.counts.count_type() != CountType::None {
                        return Err(count::Error::StackUnderflow);
                    }
                    tracing::debug!(address, "Return target follows with the message");
                    return Ok(next);
                }
            } else if let Some(imm) = kind.branch_target() {
                let taken = match self.mode {
                    TraceMode::History => match self.counts.count_type() {
                        CountType::None => return Err(count::Error::NoCounts),
                        CountType::ICnt => None,
                        CountType::History => Some(self.counts.consume_history()?),
                        CountType::Taken => self.counts.consume_taken().map(|_| Some(true))?,
                        CountType::NotTaken => {
                            self.counts.consume_not_taken().map(|_| Some(false))?
                        }
                    },
                    TraceMode::Branch => Some(
                        self.counts.i_cnt() <= halfwords
                            && matches!(tcode, Some(TCode::DirectBranch | TCode::DirectBranchWs)),
                    ),
                };
                match taken {
                    Some(true) => {
                        next.branch = BranchFlag::Taken;
                        next.address = Some(address.wrapping_add_signed(imm.into()));
                    }
                    Some(false) => next.branch = BranchFlag::NotTaken,
                    None => {
                        tracing::trace!(address, "Branch outcome unknown");
                        next.branch = BranchFlag::Unknown;
                        next.address = None;
                        return Ok(next);
                    }
                }
            } else if kind.is_exception() {
                next.call_return.exception = true;
                next.address = None;
            } else if kind.is_exception_return() {
                next.call_return.exception_return = true;
                next.address = None;
            }
        }

        self.counts.consume_i_cnt(halfwords);
        Ok(next)
    }

    /// Classify an indirect jump and determine its target from the stack
    ///
    /// Returns `None` if the target is not known, including returns popping
    /// from an empty stack.
    fn indirect_jump(
        &mut self,
        rd: instruction::format::Register,
        rs1: instruction::format::Register,
        fallthrough: u64,
        call_return: &mut CallReturn,
    ) -> Option<u64> {
        match (instruction::is_link(rd), instruction::is_link(rs1)) {
            (true, true) if rd != rs1 => {
                call_return.swap = true;
                let target = self.pop();
                self.counts.push(fallthrough);
                target
            }
            (true, _) => {
                call_return.call = true;
                self.counts.push(fallthrough);
                None
            }
            (false, true) => {
                call_return.ret = true;
                self.pop()
            }
            (false, false) => None,
        }
    }

    /// Pop a return address, tolerating an empty stack
    ///
    /// In branch trace mode, return targets are reported by messages anyway.
    fn pop(&mut self) -> Option<u64> {
        self.counts
            .pop()
            .inspect_err(|_| tracing::debug!(mode = %self.mode, "Return with empty stack"))
            .ok()
    }
}
