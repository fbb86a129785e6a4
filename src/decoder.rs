// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace decoding
//!
//! This module provides the [`TraceDecoder`], which reads [`TraceMessage`]s
//! from a [`MessageSlicer`] and reconstructs the instructions executed by each
//! core, one [`Step`] at a time.
//!
//! Messages only report what cannot be inferred from the code: instruction
//! counts, branch outcomes and the targets of indirect jumps. The decoder
//! steps through the code provided by a [`CodeProvider`], consuming the counts
//! of the last message, until those counts are exhausted. It then applies the
//! message's address fields and reads the next message.

pub mod analytics;
pub mod error;
pub mod item;
pub mod state;
pub mod time;


use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::catrace::{self, CaTraceCorrelator};
use crate::code::{self, CodeProvider};
use crate::config::{CaTraceKind, ItcPrint, Settings};
use crate::count::CountType;
use crate::itc::ItcPrintAggregator;
use crate::message::slicer::MessageSlicer;
use crate::message::{self, BranchType, Payload, TraceMessage};
use crate::types::stack::{ReturnStack, VecStack};
use crate::types::{BranchFlag, CoreId, TraceMode};

pub use analytics::Analytics;
pub use error::Error;
pub use item::{DecodedInstruction, ReportedMessage, Step};
pub use state::State;

use state::Core;

/// Decoder for a trace of one or more cores
///
/// Each call to [`next_instruction`][Self::next_instruction] yields a [`Step`]
/// carrying a reconstructed instruction, a message worth reporting or both.
/// Once the trace is exhausted, `None` is returned. Steps are also available
/// via the decoder's [`Iterator`] implementation.
///
/// Messages of different cores may be interleaved. The decoder keeps separate
/// [`State`], counts and call-return stack for each core. A fatal error only
/// halts the affected core. Errors not attributable to a single core halt the
/// decoder as a whole.
///
/// # Example
///
/// ```
/// use riscv_nexus_trace::decoder;
/// use riscv_nexus_trace::instruction::Instruction;
/// use riscv_nexus_trace::message::encoder::Encoder;
/// use riscv_nexus_trace::message::slicer::MessageSlicer;
/// use riscv_nexus_trace::message::{Payload, TraceMessage};
///
/// let mut encoder = Encoder::new(0);
/// encoder
///     .encode(&TraceMessage::new(Payload::Sync { sync: 0, i_cnt: 0, f_addr: 0x800 }))
///     .encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 4 }));
/// let data = encoder.finish();
/// let slicer = MessageSlicer::new(data.as_slice(), Default::default(), 0);
///
/// let code: &[(u64, Instruction)] = &[(0x1000, Default::default()), (0x1004, Default::default())];
/// let mut decoder: decoder::TraceDecoder<_, _> = decoder::builder()
///     .with_code(code)
///     .build(slicer)
///     .unwrap();
///
/// let addresses: Vec<_> = decoder
///     .by_ref()
///     .filter_map(|s| s.unwrap().instruction)
///     .map(|i| i.address)
///     .collect();
/// assert_eq!(addresses, [0x1000, 0x1004]);
/// ```
pub struct TraceDecoder<C, R = BufReader<File>, S = VecStack> {
    slicer: MessageSlicer<R>,
    code: C,
    cores: Vec<Core<S>>,
    current: CoreId,
    ts_size: u8,
    ca: Option<Correlation>,
    ca_sync_budget: u32,
    ca_retry_budget: u32,
    itc: Option<ItcPrintAggregator>,
    analytics: Analytics,
    done: bool,
    halted: bool,
}

impl<C: CodeProvider, R: BufRead, S: ReturnStack> TraceDecoder<C, R, S> {
    /// Decode the next [`Step`]
    ///
    /// Returns `None` once the trace is exhausted, and on every call after
    /// that. Steps carrying no information are never returned.
    pub fn next_instruction(&mut self) -> Result<Option<Step>, Error<C::Error>> {
        if self.halted {
            return Err(Error::Halted);
        }
        if self.done {
            return Ok(None);
        }

        loop {
            let core = self.current;
            let busy = self
                .cores
                .get(usize::from(core))
                .is_some_and(|c| matches!(c.state, State::Stepping | State::Retiring));
            let mut step = Step::new(core);
            let res = if busy {
                self.advance(core, &mut step)
            } else {
                let Some(message) = self.read_message()? else {
                    tracing::debug!(offset = self.slicer.file_offset(), "End of trace");
                    self.done = true;
                    return Ok(None);
                };
                self.current = message.core;
                step.core = message.core;
                self.dispatch(message, &mut step)
            };

            if let Err(e) = res {
                if e.is_fatal()
                    && let Some(core) = self.cores.get_mut(usize::from(step.core))
                {
                    tracing::error!(core = step.core, error = %e, "Halting core");
                    core.state = State::Halted;
                    core.message = None;
                }
                return Err(e);
            }
            if let Some(ca) = self.ca.as_mut() {
                step.ca_stopped |= core::mem::take(&mut ca.stop_unreported);
            }
            if !step.is_empty() {
                return Ok(Some(step));
            }
        }
    }

    /// Retrieve the [`State`] of the given core
    pub fn state(&self, core: CoreId) -> Option<State> {
        self.cores.get(usize::from(core)).map(|c| c.state)
    }

    /// Retrieve the [`TraceMode`] inferred for the given core
    pub fn trace_mode(&self, core: CoreId) -> Option<TraceMode> {
        self.cores.get(usize::from(core)).map(|c| c.mode)
    }

    /// Retrieve the depth of the given core's call-return stack
    pub fn stack_depth(&self, core: CoreId) -> Option<usize> {
        self.cores
            .get(usize::from(core))
            .map(|c| c.counts.stack_depth())
    }

    /// Retrieve the [`Analytics`] gathered so far
    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Retrieve the [`MessageSlicer`] messages are read from
    pub fn slicer(&self) -> &MessageSlicer<R> {
        &self.slicer
    }

    /// Retrieve the [`CodeProvider`]
    pub fn code(&self) -> &C {
        &self.code
    }

    /// Retrieve the [`CodeProvider`] for modification
    pub fn code_mut(&mut self) -> &mut C {
        &mut self.code
    }

    /// Check whether timings from a cycle-accurate trace are being reported
    pub fn is_ca_correlated(&self) -> bool {
        self.ca.as_ref().is_some_and(|c| c.sync == CaSync::Correlated)
    }

    /// Retrieve the [`ItcPrintAggregator`], if print output is decoded
    pub fn itc_print(&mut self) -> Option<&mut ItcPrintAggregator> {
        self.itc.as_mut()
    }

    /// Start decoding print output with the given settings
    ///
    /// Print messages already decoded are not replayed.
    pub fn set_itc_print(&mut self, settings: &ItcPrint) {
        self.itc = Some(ItcPrintAggregator::new(settings, self.cores.len()));
    }

    /// Correlate a cycle-accurate trace read from the given file
    ///
    /// This only has an effect before the first core synchronized.
    pub fn set_ca_trace_file(
        &mut self,
        path: impl AsRef<Path>,
        kind: CaTraceKind,
    ) -> Result<(), catrace::Error> {
        let correlator = CaTraceCorrelator::open(path, kind)?;
        self.set_ca_trace(correlator);
        Ok(())
    }

    /// Correlate the given cycle-accurate trace
    ///
    /// This only has an effect before the first core synchronized.
    pub fn set_ca_trace(&mut self, correlator: CaTraceCorrelator) {
        self.ca = Some(Correlation::new(correlator));
        self.cores
            .iter_mut()
            .filter(|c| c.state == State::AwaitingFirstSync && c.address.is_none())
            .for_each(|c| c.state = State::AwaitingCaSync);
    }

    /// Read the next message, skipping malformed ones
    fn read_message(&mut self) -> Result<Option<TraceMessage>, Error<C::Error>> {
        loop {
            match self.slicer.read_next_message() {
                Ok(Some(message)) => {
                    tracing::trace!(%message, "Message");
                    self.analytics.count_message(&message);
                    return Ok(Some(message));
                }
                Ok(None) => return Ok(None),
                Err(message::Error::Malformed(_)) => self.analytics.count_malformed(),
                Err(message::Error::Truncated) => {
                    self.analytics.set_truncated();
                    return Ok(None);
                }
                Err(e) => {
                    self.halted = true;
                    return Err(e.into());
                }
            }
        }
    }

    /// Handle a message according to its core's state
    fn dispatch(&mut self, message: TraceMessage, step: &mut Step) -> Result<(), Error<C::Error>> {
        let id = message.core;
        let core = self
            .cores
            .get_mut(usize::from(id))
            .ok_or(Error::CoreOutOfRange(id))?;
        core.observe_mode(&message.payload);
        let state = core.state;
        match state {
            State::AwaitingCaSync | State::AwaitingFirstSync => self.first_sync(message, step),
            State::AwaitingCountedMessage => self.counted(message, step),
            State::Halted => {
                tracing::warn!(core = id, number = message.number, "Ignoring message of halted core");
                Ok(())
            }
            state => Err(Error::UnexpectedMessage {
                tcode: message.tcode(),
                state,
            }),
        }
    }

    /// Handle a message while waiting for the first sync
    fn first_sync(&mut self, message: TraceMessage, step: &mut Step) -> Result<(), Error<C::Error>> {
        let id = message.core;
        let ts_size = self.ts_size;
        let core = &mut self.cores[usize::from(id)];
        let ca_pending = core.state == State::AwaitingCaSync;

        let synced = match message.payload {
            Payload::Sync { .. }
            | Payload::DirectBranchWs { .. }
            | Payload::IndirectBranchWs { .. }
            | Payload::IndirectHistoryWs { .. } => {
                core.process_message(&message, ts_size)
                    .map_err(Error::InvalidCheckpoint)?;
                true
            }
            Payload::IctWs(ict) => {
                core.process_message(&message, ts_size)
                    .map_err(Error::InvalidCheckpoint)?;
                if ict.is_uncommitted_sample() {
                    core.address = Some(core.faddr);
                }
                if !ict.is_address_less_control() && !ict.is_uncommitted_sample() {
                    step.instruction = self.checkpoint_instruction(id);
                }
                !ict.is_address_less_control()
            }
            Payload::Error { .. } => {
                core.lose_sync();
                step.sync_lost = true;
                false
            }
            _ => {
                core.update_time(&message, ts_size);
                if self.observe_print(&message) {
                    step.itc_print = true;
                    return Ok(());
                }
                false
            }
        };

        let core = &mut self.cores[usize::from(id)];
        if synced {
            tracing::debug!(core = id, address = ?core.address, "Synchronized");
            core.state = State::AwaitingCountedMessage;
            if ca_pending && let Some(address) = core.address {
                self.sync_ca(address);
            }
        }
        self.report(message, step);
        Ok(())
    }

    /// Handle a message while waiting for one carrying counts
    fn counted(&mut self, message: TraceMessage, step: &mut Step) -> Result<(), Error<C::Error>> {
        let id = message.core;
        let ts_size = self.ts_size;
        let core = &mut self.cores[usize::from(id)];

        match message.payload {
            payload if payload.tcode().is_counted() => {
                let count_type = core.counts.set_counts(&payload);
                tracing::trace!(core = id, %count_type, tcode = %payload.tcode(), "Stepping");
                core.message = Some(message);
                core.state = State::Stepping;
                return Ok(());
            }
            Payload::Ict(ict) | Payload::IctWs(ict) => {
                core.process_message(&message, ts_size)
                    .map_err(Error::InvalidCheckpoint)?;
                if !ict.is_address_less_control() && !ict.is_uncommitted_sample() {
                    step.instruction = self.checkpoint_instruction(id);
                }
                let core = &self.cores[usize::from(id)];
                let address = if ict.is_uncommitted_sample() {
                    Some(core.faddr)
                } else {
                    core.address
                };
                let time = core.time;
                step.source_info = address.and_then(|a| self.code.source_info(a));
                step.message = Some(ReportedMessage {
                    message,
                    address,
                    time,
                });
                return Ok(());
            }
            Payload::Error { .. } => {
                tracing::debug!(core = id, "Sync lost");
                core.lose_sync();
                core.state = State::AwaitingFirstSync;
                step.sync_lost = true;
            }
            _ => {
                core.update_time(&message, ts_size);
                if self.observe_print(&message) {
                    step.itc_print = true;
                    return Ok(());
                }
            }
        }
        self.report(message, step);
        Ok(())
    }

    /// Advance a core which is stepping or retiring a message
    fn advance(&mut self, id: CoreId, step: &mut Step) -> Result<(), Error<C::Error>> {
        let ts_size = self.ts_size;
        let core = &mut self.cores[usize::from(id)];

        if core.state == State::Retiring {
            let Some(message) = core.message.take() else {
                core.state = State::AwaitingCountedMessage;
                return Ok(());
            };
            let address = match message.payload {
                Payload::Correlation { i_cnt, .. } => {
                    core.update_time(&message, ts_size);
                    core.state = State::AwaitingFirstSync;
                    tracing::debug!(core = id, "Trace paused");
                    Some(core.faddr.wrapping_add(i_cnt * 2))
                }
                _ => {
                    core.process_message(&message, ts_size)
                        .map_err(Error::InvalidCheckpoint)?;
                    if message.payload.b_type() == Some(BranchType::Exception) {
                        core.interrupt = true;
                    }
                    core.state = State::AwaitingCountedMessage;
                    core.address
                }
            };
            let time = core.time;
            step.source_info = address.and_then(|a| self.code.source_info(a));
            step.message = Some(ReportedMessage {
                message,
                address,
                time,
            });
            return Ok(());
        }

        if core.counts.count_type() == CountType::None {
            core.state = State::Retiring;
            return Ok(());
        }
        let address = core.address.ok_or(Error::NoAddress)?;
        let insn = self
            .code
            .get_insn(address)
            .map_err(|e| Error::CannotGetInstruction(e, address))?;
        let tcode = core.message.as_ref().map(TraceMessage::tcode);
        let next = core.next_addr(address, &insn, tcode)?;
        if next.address.is_none() {
            if next.branch == BranchFlag::Unknown {
                tracing::debug!(core = id, address, "Retrying branch after next message");
                self.analytics.count_unknown_branch();
                core.state = State::Retiring;
                return Ok(());
            }
            if core.counts.count_type() != CountType::None {
                return Err(Error::UnresolvedAddress(address));
            }
        }

        core.address = next.address;
        if core.counts.count_type() == CountType::None {
            core.state = State::Retiring;
        }
        let mut call_return = next.call_return;
        call_return.interrupt = core.interrupt;
        core.interrupt = false;

        let mut decoded = DecodedInstruction {
            core: id,
            address,
            instruction: insn,
            call_return,
            branch: next.branch,
            timestamp: core.time,
            timing: None,
        };
        tracing::trace!(core = id, %decoded, "Instruction");
        self.analytics.count_instruction(id, &insn);
        self.correlate(&mut decoded, step);
        step.source_info = self.code.source_info(address);
        step.instruction = Some(decoded);
        Ok(())
    }

    /// Create an instruction record for an in-circuit trace message
    ///
    /// The record carries no branch or call information.
    fn checkpoint_instruction(&mut self, id: CoreId) -> Option<DecodedInstruction> {
        let core = &self.cores[usize::from(id)];
        let address = core.address?;
        let instruction = self
            .code
            .get_insn(address)
            .inspect_err(|_| tracing::debug!(address, "No instruction at checkpoint"))
            .ok()?;
        self.analytics.count_instruction(id, &instruction);
        Some(DecodedInstruction {
            core: id,
            address,
            instruction,
            call_return: Default::default(),
            branch: Default::default(),
            timestamp: core.time,
            timing: None,
        })
    }

    /// Add a message to the step
    fn report(&mut self, message: TraceMessage, step: &mut Step) {
        let core = &self.cores[usize::from(message.core)];
        let address = core.address;
        let time = core.time;
        if step.source_info.is_none() {
            step.source_info = address.and_then(|a| self.code.source_info(a));
        }
        step.message = Some(ReportedMessage {
            message,
            address,
            time,
        });
    }

    /// Feed a data acquisition or auxiliary access message to the print
    /// aggregator
    ///
    /// Returns whether the message was consumed as print output.
    fn observe_print(&mut self, message: &TraceMessage) -> bool {
        let Some(itc) = self.itc.as_mut() else {
            return false;
        };
        let (address, data) = match message.payload {
            Payload::DataAcquisition { idtag, dqdata } => (idtag, dqdata),
            Payload::AuxAccessWrite { a_addr, data } => (a_addr, data),
            _ => return false,
        };
        let time = self.cores[usize::from(message.core)].time;
        itc.observe(message.core, address, data, time)
    }

    /// Align the cycle-accurate trace with the given address
    fn sync_ca(&mut self, target: u64) {
        let Some(ca) = self.ca.as_mut() else {
            return;
        };
        if ca.sync != CaSync::Awaiting {
            return;
        }
        ca.sync = match ca
            .correlator
            .fast_forward(&mut self.code, target, self.ca_sync_budget)
        {
            Ok(true) => {
                tracing::debug!(target, "Cycle-accurate trace synchronized");
                CaSync::Correlated
            }
            Ok(false) => match ca.correlator.rewind() {
                Ok(()) => {
                    let target = ca.correlator.start_address();
                    tracing::debug!(target, "Waiting for cycle-accurate trace start");
                    CaSync::Retrying {
                        target,
                        remaining: self.ca_retry_budget,
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not rewind cycle-accurate trace");
                    CaSync::Stopped
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Could not fast-forward cycle-accurate trace");
                CaSync::Stopped
            }
        };
        ca.stop_unreported = ca.sync == CaSync::Stopped;
    }

    /// Annotate an instruction with timing from the cycle-accurate trace
    fn correlate(&mut self, decoded: &mut DecodedInstruction, step: &mut Step) {
        let Some(ca) = self.ca.as_mut() else {
            return;
        };
        match ca.sync {
            CaSync::Retrying { target, remaining } => {
                if target == decoded.address {
                    tracing::debug!(target, "Cycle-accurate trace synchronized");
                    ca.sync = CaSync::Correlated;
                } else if let Some(remaining) = remaining.checked_sub(1).filter(|r| *r > 0) {
                    ca.sync = CaSync::Retrying { target, remaining };
                    return;
                } else {
                    tracing::warn!(target, "Cycle-accurate trace misaligned, dropping timings");
                    ca.sync = CaSync::Misaligned;
                    step.ca_misaligned = true;
                    return;
                }
            }
            CaSync::Correlated => (),
            _ => return,
        }

        match ca.correlator.consume(decoded.instruction.class) {
            Ok(timing) => {
                decoded.timestamp = timing.cycles;
                decoded.timing = Some(timing);
            }
            Err(e) if e.is_eof() => {
                tracing::debug!("Cycle-accurate trace exhausted");
                ca.sync = CaSync::Stopped;
                step.ca_stopped = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not consume cycle-accurate trace");
                ca.sync = CaSync::Stopped;
                step.ca_stopped = true;
            }
        }
    }
}

impl<C: CodeProvider, R: BufRead, S: ReturnStack> Iterator for TraceDecoder<C, R, S> {
    type Item = Result<Step, Error<C::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_instruction() {
            Err(Error::Halted) => None,
            res => res.transpose(),
        }
    }
}

/// A cycle-accurate trace and its alignment with the instruction trace
struct Correlation {
    correlator: CaTraceCorrelator,
    sync: CaSync,
    /// The trace stopped outside of any step and the next step has to say so
    stop_unreported: bool,
}

impl Correlation {
    fn new(correlator: CaTraceCorrelator) -> Self {
        Self {
            correlator,
            sync: CaSync::Awaiting,
            stop_unreported: false,
        }
    }
}

/// Alignment of a cycle-accurate trace
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CaSync {
    /// No core synchronized yet
    Awaiting,
    /// Waiting for the instruction trace to reach the `target` address within
    /// `remaining` instructions
    Retrying { target: u64, remaining: u32 },
    Correlated,
    /// The instruction trace never reached the cycle-accurate trace's start
    Misaligned,
    /// The trace is exhausted or unreadable
    Stopped,
}

/// Create a new [`Builder`] for [`TraceDecoder`]s
pub fn builder() -> Builder<code::Empty> {
    Builder::new()
}

/// Builder for [`TraceDecoder`]
#[derive(Clone, Debug)]
pub struct Builder<C = code::Empty> {
    code: C,
    settings: Settings,
    ca_trace: Option<CaTraceCorrelator>,
}

impl Builder<code::Empty> {
    /// Create a new builder for a [`TraceDecoder`]
    pub fn new() -> Self {
        Default::default()
    }
}

impl<C> Builder<C> {
    /// Build the [`TraceDecoder`] with the given [`Settings`]
    ///
    /// New builders assume [`Default`] settings.
    pub fn with_settings(self, settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            ..self
        }
    }

    /// Build the [`TraceDecoder`] with the given [`CodeProvider`]
    ///
    /// New builders carry an [empty][code::Empty] provider. This is usually
    /// not what you want.
    pub fn with_code<D>(self, code: D) -> Builder<D> {
        Builder {
            code,
            settings: self.settings,
            ca_trace: self.ca_trace,
        }
    }

    /// Build the [`TraceDecoder`] with a cycle-accurate trace to correlate
    pub fn with_ca_trace(self, correlator: CaTraceCorrelator) -> Self {
        Self {
            ca_trace: Some(correlator),
            ..self
        }
    }

    /// Build the [`TraceDecoder`] reading messages from the given slicer
    ///
    /// Print output is decoded if enabled in the [`Settings`].
    pub fn build<R, S>(self, slicer: MessageSlicer<R>) -> Result<TraceDecoder<C, R, S>, Error<C::Error>>
    where
        C: CodeProvider,
        R: BufRead,
        S: ReturnStack,
    {
        let settings = self.settings;
        let initial = if self.ca_trace.is_some() {
            State::AwaitingCaSync
        } else {
            State::AwaitingFirstSync
        };
        let cores = (0..settings.max_cores)
            .map(|_| Core::new(settings.stack_size, initial))
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::CannotConstructStack(settings.stack_size))?;
        let itc = settings
            .itc_print
            .enabled
            .then(|| ItcPrintAggregator::new(&settings.itc_print, settings.max_cores));

        Ok(TraceDecoder {
            slicer,
            code: self.code,
            cores,
            current: 0,
            ts_size: settings.ts_size,
            ca: self.ca_trace.map(Correlation::new),
            ca_sync_budget: settings.ca_sync_budget,
            ca_retry_budget: settings.ca_retry_budget,
            itc,
            analytics: Analytics::new(settings.max_cores),
            done: false,
            halted: false,
        })
    }
}

impl<C: Default> Default for Builder<C> {
    fn default() -> Self {
        Self {
            code: Default::default(),
            settings: Default::default(),
            ca_trace: None,
        }
    }
}
