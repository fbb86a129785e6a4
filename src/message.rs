// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace messages
//!
//! This module defines the [`TraceMessage`]s making up an instruction trace,
//! the [`MessageSlicer`][slicer::MessageSlicer] reconstructing them from a
//! stream of slices and the [`Encoder`][encoder::Encoder] producing such
//! streams.
//!
//! # Slices
//!
//! A trace is a sequence of slices, each a byte carrying 6 data bits (MDO) in
//! its upper and 2 control bits (MSEO) in its lower bits. A slice with control
//! bits `00` outside a message starts a message, its data bits being the
//! message's [`TCode`]. Data of subsequent slices is accumulated, least
//! significant bits first, until a slice with the end-of-field bit (`01`) set.
//! Such a run holds the core id and fixed-width fields, if any, and a single
//! variable-width field occupying the remaining bits. The end-of-message bit
//! (`10`) terminates the message.

pub mod encoder;
pub mod error;
pub mod slicer;

#[cfg(test)]
mod tests;

use core::fmt;

use crate::types::CoreId;

pub use error::{Error, Malformed};

/// Type tag of a [`TraceMessage`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TCode {
    Ownership = 2,
    DirectBranch = 3,
    IndirectBranch = 4,
    DataAcquisition = 7,
    Error = 8,
    Sync = 9,
    DirectBranchWs = 11,
    IndirectBranchWs = 12,
    AuxAccessWrite = 21,
    ResourceFull = 27,
    IndirectHistory = 28,
    IndirectHistoryWs = 29,
    Correlation = 33,
    Ict = 34,
    IctWs = 35,
}

impl TCode {
    /// Check whether messages of this type carry a full address and timestamp
    pub fn is_sync(self) -> bool {
        matches!(
            self,
            Self::Sync | Self::DirectBranchWs | Self::IndirectBranchWs | Self::IndirectHistoryWs
        )
    }

    /// Check whether messages of this type carry instruction counts
    pub fn is_counted(self) -> bool {
        matches!(
            self,
            Self::Sync
                | Self::DirectBranch
                | Self::IndirectBranch
                | Self::DirectBranchWs
                | Self::IndirectBranchWs
                | Self::Correlation
                | Self::IndirectHistory
                | Self::IndirectHistoryWs
                | Self::ResourceFull
        )
    }

    /// Name as found in the trace standard
    pub fn name(self) -> &'static str {
        match self {
            Self::Ownership => "OWNERSHIP",
            Self::DirectBranch => "DIRECT_BRANCH",
            Self::IndirectBranch => "INDIRECT_BRANCH",
            Self::DataAcquisition => "DATA_ACQUISITION",
            Self::Error => "ERROR",
            Self::Sync => "SYNC",
            Self::DirectBranchWs => "DIRECT_BRANCH_WS",
            Self::IndirectBranchWs => "INDIRECT_BRANCH_WS",
            Self::AuxAccessWrite => "AUX_ACCESS_WRITE",
            Self::ResourceFull => "RESOURCE_FULL",
            Self::IndirectHistory => "INDIRECT_BRANCH_HISTORY",
            Self::IndirectHistoryWs => "INDIRECT_BRANCH_HISTORY_WS",
            Self::Correlation => "CORRELATION",
            Self::Ict => "IN_CIRCUIT_TRACE",
            Self::IctWs => "IN_CIRCUIT_TRACE_WS",
        }
    }
}

impl TryFrom<u8> for TCode {
    type Error = Malformed;

    fn try_from(value: u8) -> Result<Self, Malformed> {
        match value {
            2 => Ok(Self::Ownership),
            3 => Ok(Self::DirectBranch),
            4 => Ok(Self::IndirectBranch),
            7 => Ok(Self::DataAcquisition),
            8 => Ok(Self::Error),
            9 => Ok(Self::Sync),
            11 => Ok(Self::DirectBranchWs),
            12 => Ok(Self::IndirectBranchWs),
            21 => Ok(Self::AuxAccessWrite),
            27 => Ok(Self::ResourceFull),
            28 => Ok(Self::IndirectHistory),
            29 => Ok(Self::IndirectHistoryWs),
            33 => Ok(Self::Correlation),
            34 => Ok(Self::Ict),
            35 => Ok(Self::IctWs),
            t => Err(Malformed::UnknownTCode(t)),
        }
    }
}

impl fmt::Display for TCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single trace message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceMessage {
    /// Core the message originates from
    pub core: CoreId,
    /// Sequence number of the message within the trace
    pub number: u64,
    /// Offset of the message's first slice within the trace
    pub offset: u64,
    /// Raw timestamp field, if present
    ///
    /// For [sync][TCode::is_sync] messages this is a full timestamp, for all
    /// other messages it is XORed into the running timestamp.
    pub timestamp: Option<u64>,
    pub payload: Payload,
}

impl TraceMessage {
    /// Create a message for core `0` without timestamp
    pub fn new(payload: Payload) -> Self {
        Self {
            core: 0,
            number: 0,
            offset: 0,
            timestamp: None,
            payload,
        }
    }

    /// Set the core this message originates from
    pub fn with_core(self, core: CoreId) -> Self {
        Self { core, ..self }
    }

    /// Set the raw timestamp field
    pub fn with_timestamp(self, timestamp: u64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    /// Retrieve this message's [`TCode`]
    pub fn tcode(&self) -> TCode {
        self.payload.tcode()
    }
}

impl fmt::Display for TraceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} core {} {}", self.number, self.core, self.payload)?;
        if let Some(timestamp) = self.timestamp {
            write!(f, " ts={timestamp:#x}")?;
        }
        Ok(())
    }
}

/// Kind specific contents of a [`TraceMessage`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Ownership {
        process: u64,
    },
    DirectBranch {
        i_cnt: u64,
    },
    IndirectBranch {
        b_type: BranchType,
        i_cnt: u64,
        u_addr: u64,
    },
    DataAcquisition {
        idtag: u64,
        dqdata: u64,
    },
    Error {
        etype: u8,
        pad: u64,
    },
    Sync {
        sync: u8,
        i_cnt: u64,
        f_addr: u64,
    },
    DirectBranchWs {
        sync: u8,
        i_cnt: u64,
        f_addr: u64,
    },
    IndirectBranchWs {
        sync: u8,
        b_type: BranchType,
        i_cnt: u64,
        f_addr: u64,
    },
    AuxAccessWrite {
        a_addr: u64,
        data: u64,
    },
    ResourceFull {
        rcode: u8,
        rdata: u64,
    },
    IndirectHistory {
        b_type: BranchType,
        i_cnt: u64,
        u_addr: u64,
        history: u64,
    },
    IndirectHistoryWs {
        sync: u8,
        b_type: BranchType,
        i_cnt: u64,
        f_addr: u64,
        history: u64,
    },
    Correlation {
        evcode: u8,
        cdf: u8,
        i_cnt: u64,
        /// History bits, present if `cdf` is `1`
        history: Option<u64>,
    },
    Ict(Ict),
    IctWs(Ict),
}

impl Payload {
    /// Retrieve the [`TCode`] corresponding to this payload
    pub fn tcode(&self) -> TCode {
        match self {
            Self::Ownership { .. } => TCode::Ownership,
            Self::DirectBranch { .. } => TCode::DirectBranch,
            Self::IndirectBranch { .. } => TCode::IndirectBranch,
            Self::DataAcquisition { .. } => TCode::DataAcquisition,
            Self::Error { .. } => TCode::Error,
            Self::Sync { .. } => TCode::Sync,
            Self::DirectBranchWs { .. } => TCode::DirectBranchWs,
            Self::IndirectBranchWs { .. } => TCode::IndirectBranchWs,
            Self::AuxAccessWrite { .. } => TCode::AuxAccessWrite,
            Self::ResourceFull { .. } => TCode::ResourceFull,
            Self::IndirectHistory { .. } => TCode::IndirectHistory,
            Self::IndirectHistoryWs { .. } => TCode::IndirectHistoryWs,
            Self::Correlation { .. } => TCode::Correlation,
            Self::Ict(_) => TCode::Ict,
            Self::IctWs(_) => TCode::IctWs,
        }
    }

    /// Retrieve the instruction count, if the payload carries one
    pub fn i_cnt(&self) -> Option<u64> {
        match self {
            Self::DirectBranch { i_cnt }
            | Self::IndirectBranch { i_cnt, .. }
            | Self::Sync { i_cnt, .. }
            | Self::DirectBranchWs { i_cnt, .. }
            | Self::IndirectBranchWs { i_cnt, .. }
            | Self::IndirectHistory { i_cnt, .. }
            | Self::IndirectHistoryWs { i_cnt, .. }
            | Self::Correlation { i_cnt, .. } => Some(*i_cnt),
            _ => None,
        }
    }

    /// Retrieve the branch type, if the payload carries one
    pub fn b_type(&self) -> Option<BranchType> {
        match self {
            Self::IndirectBranch { b_type, .. }
            | Self::IndirectBranchWs { b_type, .. }
            | Self::IndirectHistory { b_type, .. }
            | Self::IndirectHistoryWs { b_type, .. } => Some(*b_type),
            _ => None,
        }
    }

    /// Retrieve the full address field, if the payload carries one
    pub fn f_addr(&self) -> Option<u64> {
        match self {
            Self::Sync { f_addr, .. }
            | Self::DirectBranchWs { f_addr, .. }
            | Self::IndirectBranchWs { f_addr, .. }
            | Self::IndirectHistoryWs { f_addr, .. } => Some(*f_addr),
            _ => None,
        }
    }

    /// Retrieve the [`Ict`] part, if this is an in-circuit trace payload
    pub fn ict(&self) -> Option<&Ict> {
        match self {
            Self::Ict(ict) | Self::IctWs(ict) => Some(ict),
            _ => None,
        }
    }

    /// Parse the payload from the fields of a message
    pub(crate) fn parse(tcode: TCode, fields: &mut slicer::Fields) -> Result<Self, Malformed> {
        let payload = match tcode {
            TCode::Ownership => Self::Ownership {
                process: fields.var()?,
            },
            TCode::DirectBranch => Self::DirectBranch {
                i_cnt: fields.var()?,
            },
            TCode::IndirectBranch => Self::IndirectBranch {
                b_type: fields.fixed(2)?.into(),
                i_cnt: fields.var()?,
                u_addr: fields.var()?,
            },
            TCode::DataAcquisition => Self::DataAcquisition {
                idtag: fields.var()?,
                dqdata: fields.var()?,
            },
            TCode::Error => Self::Error {
                etype: fields.fixed(4)?,
                pad: fields.var()?,
            },
            TCode::Sync => Self::Sync {
                sync: fields.fixed(4)?,
                i_cnt: fields.var()?,
                f_addr: fields.var()?,
            },
            TCode::DirectBranchWs => Self::DirectBranchWs {
                sync: fields.fixed(4)?,
                i_cnt: fields.var()?,
                f_addr: fields.var()?,
            },
            TCode::IndirectBranchWs => Self::IndirectBranchWs {
                sync: fields.fixed(4)?,
                b_type: fields.fixed(2)?.into(),
                i_cnt: fields.var()?,
                f_addr: fields.var()?,
            },
            TCode::AuxAccessWrite => Self::AuxAccessWrite {
                a_addr: fields.var()?,
                data: fields.var()?,
            },
            TCode::ResourceFull => Self::ResourceFull {
                rcode: fields.fixed(4)?,
                rdata: fields.var()?,
            },
            TCode::IndirectHistory => Self::IndirectHistory {
                b_type: fields.fixed(2)?.into(),
                i_cnt: fields.var()?,
                u_addr: fields.var()?,
                history: fields.var()?,
            },
            TCode::IndirectHistoryWs => Self::IndirectHistoryWs {
                sync: fields.fixed(4)?,
                b_type: fields.fixed(2)?.into(),
                i_cnt: fields.var()?,
                f_addr: fields.var()?,
                history: fields.var()?,
            },
            TCode::Correlation => {
                let evcode = fields.fixed(4)?;
                let cdf = fields.fixed(2)?;
                let i_cnt = fields.var()?;
                let history = if cdf == 1 { Some(fields.var()?) } else { None };
                Self::Correlation {
                    evcode,
                    cdf,
                    i_cnt,
                    history,
                }
            }
            TCode::Ict => Self::Ict(Ict::parse(fields)?),
            TCode::IctWs => Self::IctWs(Ict::parse(fields)?),
        };
        Ok(payload)
    }

    /// Emit the payload's fields, excluding the timestamp
    pub(crate) fn emit(&self, encoder: &mut encoder::Encoder) {
        match *self {
            Self::Ownership { process } => encoder.var(process),
            Self::DirectBranch { i_cnt } => encoder.var(i_cnt),
            Self::IndirectBranch {
                b_type,
                i_cnt,
                u_addr,
            } => {
                encoder.fixed(b_type.into(), 2);
                encoder.var(i_cnt);
                encoder.var(u_addr);
            }
            Self::DataAcquisition { idtag, dqdata } => {
                encoder.var(idtag);
                encoder.var(dqdata);
            }
            Self::Error { etype, pad } => {
                encoder.fixed(etype.into(), 4);
                encoder.var(pad);
            }
            Self::Sync {
                sync,
                i_cnt,
                f_addr,
            }
            | Self::DirectBranchWs {
                sync,
                i_cnt,
                f_addr,
            } => {
                encoder.fixed(sync.into(), 4);
                encoder.var(i_cnt);
                encoder.var(f_addr);
            }
            Self::IndirectBranchWs {
                sync,
                b_type,
                i_cnt,
                f_addr,
            } => {
                encoder.fixed(sync.into(), 4);
                encoder.fixed(b_type.into(), 2);
                encoder.var(i_cnt);
                encoder.var(f_addr);
            }
            Self::AuxAccessWrite { a_addr, data } => {
                encoder.var(a_addr);
                encoder.var(data);
            }
            Self::ResourceFull { rcode, rdata } => {
                encoder.fixed(rcode.into(), 4);
                encoder.var(rdata);
            }
            Self::IndirectHistory {
                b_type,
                i_cnt,
                u_addr,
                history,
            } => {
                encoder.fixed(b_type.into(), 2);
                encoder.var(i_cnt);
                encoder.var(u_addr);
                encoder.var(history);
            }
            Self::IndirectHistoryWs {
                sync,
                b_type,
                i_cnt,
                f_addr,
                history,
            } => {
                encoder.fixed(sync.into(), 4);
                encoder.fixed(b_type.into(), 2);
                encoder.var(i_cnt);
                encoder.var(f_addr);
                encoder.var(history);
            }
            Self::Correlation {
                evcode,
                cdf,
                i_cnt,
                history,
            } => {
                encoder.fixed(evcode.into(), 4);
                encoder.fixed(cdf.into(), 2);
                encoder.var(i_cnt);
                if let Some(history) = history {
                    encoder.var(history);
                }
            }
            Self::Ict(ict) | Self::IctWs(ict) => {
                encoder.fixed(ict.cksrc.into(), 4);
                encoder.fixed(ict.ckdf.into(), 2);
                encoder.var(ict.ckdata0);
                if let Some(ckdata1) = ict.ckdata1 {
                    encoder.var(ckdata1);
                }
            }
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tcode())?;
        match self {
            Self::Ownership { process } => write!(f, " process={process:#x}"),
            Self::DataAcquisition { idtag, dqdata } => {
                write!(f, " idtag={idtag:#x} dqdata={dqdata:#x}")
            }
            Self::Error { etype, .. } => write!(f, " etype={etype}"),
            Self::AuxAccessWrite { a_addr, data } => write!(f, " a_addr={a_addr:#x} data={data:#x}"),
            Self::ResourceFull { rcode, rdata } => write!(f, " rcode={rcode} rdata={rdata:#x}"),
            Self::Ict(ict) | Self::IctWs(ict) => write!(f, " {ict}"),
            _ => {
                if let Some(b_type) = self.b_type() {
                    write!(f, " b_type={b_type:?}")?;
                }
                if let Some(i_cnt) = self.i_cnt() {
                    write!(f, " i_cnt={i_cnt}")?;
                }
                if let Some(f_addr) = self.f_addr() {
                    write!(f, " f_addr={f_addr:#x}")?;
                }
                match self {
                    Self::IndirectBranch { u_addr, .. } | Self::IndirectHistory { u_addr, .. } => {
                        write!(f, " u_addr={u_addr:#x}")?;
                    }
                    _ => (),
                }
                match self {
                    Self::IndirectHistory { history, .. }
                    | Self::IndirectHistoryWs { history, .. }
                    | Self::Correlation {
                        history: Some(history),
                        ..
                    } => write!(f, " history={history:#b}"),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Type of an indirect branch
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BranchType {
    /// Regular indirect branch
    #[default]
    Indirect,
    /// Entry into an exception or interrupt handler
    Exception,
    /// Branch caused by hardware
    Hardware,
    Reserved,
}

impl From<u8> for BranchType {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::Indirect,
            1 => Self::Exception,
            2 => Self::Hardware,
            _ => Self::Reserved,
        }
    }
}

impl From<BranchType> for u64 {
    fn from(value: BranchType) -> Self {
        match value {
            BranchType::Indirect => 0,
            BranchType::Exception => 1,
            BranchType::Hardware => 2,
            BranchType::Reserved => 3,
        }
    }
}

/// Kind of a [`TCode::ResourceFull`] message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// Instruction count overflow
    ICnt,
    /// History buffer full
    History,
    /// Not-taken branch count
    NotTaken,
    /// Taken branch count
    Taken,
    Other(u8),
}

impl From<u8> for ResourceKind {
    fn from(rcode: u8) -> Self {
        match rcode {
            0 => Self::ICnt,
            1 => Self::History,
            8 => Self::NotTaken,
            9 => Self::Taken,
            r => Self::Other(r),
        }
    }
}

/// Contents of an in-circuit trace message
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Ict {
    /// Checkpoint source, see [`IctSource`]
    pub cksrc: u8,
    /// Checkpoint data format
    pub ckdf: u8,
    pub ckdata0: u64,
    /// Second data field, present if `ckdf` is `1`
    pub ckdata1: Option<u64>,
}

impl Ict {
    /// Retrieve the [`IctSource`]
    pub fn source(&self) -> IctSource {
        self.cksrc.into()
    }

    /// Check whether this is a control message not carrying an address
    pub fn is_address_less_control(&self) -> bool {
        self.source() == IctSource::Control && self.ckdf == 0
    }

    /// Check whether this is a trigger or watchpoint sample not committing
    /// the address as the current instruction
    pub fn is_uncommitted_sample(&self) -> bool {
        matches!(
            self.source(),
            IctSource::ExtTrigger | IctSource::Watchpoint
        ) && self.ckdf == 0
    }

    fn parse(fields: &mut slicer::Fields) -> Result<Self, Malformed> {
        let cksrc = fields.fixed(4)?;
        let ckdf = fields.fixed(2)?;
        let ckdata0 = fields.var()?;
        let ckdata1 = if ckdf == 1 { Some(fields.var()?) } else { None };
        Ok(Self {
            cksrc,
            ckdf,
            ckdata0,
            ckdata1,
        })
    }
}

impl fmt::Display for Ict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cksrc={:?} ckdf={} ckdata0={:#x}",
            self.source(),
            self.ckdf,
            self.ckdata0
        )?;
        if let Some(ckdata1) = self.ckdata1 {
            write!(f, " ckdata1={ckdata1:#x}")?;
        }
        Ok(())
    }
}

/// Checkpoint source of an in-circuit trace message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IctSource {
    Control,
    ExtTrigger,
    InferableCall,
    Exception,
    Interrupt,
    Context,
    Watchpoint,
    PcSample,
    Other(u8),
}

impl From<u8> for IctSource {
    fn from(cksrc: u8) -> Self {
        match cksrc {
            0 => Self::Control,
            8 => Self::ExtTrigger,
            9 => Self::InferableCall,
            10 => Self::Exception,
            11 => Self::Interrupt,
            12 => Self::Context,
            14 => Self::Watchpoint,
            15 => Self::PcSample,
            s => Self::Other(s),
        }
    }
}
