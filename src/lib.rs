// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! # Decoder for Nexus-style RISC-V instruction traces
//!
//! This crate reconstructs the instructions executed by one or more RISC-V
//! cores from a trace of Nexus messages, as emitted by
//! [RISC-V N-Trace](https://github.com/riscv-non-isa/tg-nexus-trace)
//! encoders. Messages only report what cannot be inferred from the
//! program, so decoding requires access to the traced code via a
//! [`CodeProvider`][code::CodeProvider].
//!
//! Decoding happens in layers:
//! - the [`MessageSlicer`][message::slicer::MessageSlicer] splits raw trace
//!   data into [`TraceMessage`][message::TraceMessage]s,
//! - the [`CountTracker`][count::CountTracker] keeps the instruction counts,
//!   branch history and call-return stack of a core,
//! - the [`TraceDecoder`][decoder::TraceDecoder] steps through the code and
//!   yields one [`Step`][decoder::Step] at a time.
//!
//! Optionally, instructions are annotated with timings from a cycle-accurate
//! trace via the [`CaTraceCorrelator`][catrace::CaTraceCorrelator], and print
//! output written to an instrumentation trace channel is collected by the
//! [`ItcPrintAggregator`][itc::ItcPrintAggregator].
//!
//! # Features
//! - `serde`: loading [`Settings`][config::Settings] from TOML files (default)
//! - `elf`: a [`CodeProvider`][code::CodeProvider] for ELF files
//! - `either`: combining two code providers
//!
//! # Example
//!
//! ```
//! use riscv_nexus_trace::decoder::{self, TraceDecoder};
//! use riscv_nexus_trace::instruction::{Instruction, Kind, format::TypeB};
//! use riscv_nexus_trace::message::encoder::Encoder;
//! use riscv_nexus_trace::message::slicer::MessageSlicer;
//! use riscv_nexus_trace::message::{Payload, TraceMessage};
//! use riscv_nexus_trace::types::BranchFlag;
//!
//! // A loop at 0x80000000 branching back to itself once
//! let branch = Kind::bne(TypeB { rs1: 10, rs2: 11, imm: -4 });
//! let code: &[(u64, Instruction)] = &[
//!     (0x8000_0000, Instruction::default()),
//!     (0x8000_0004, branch.into()),
//!     (0x8000_0008, Instruction::default()),
//! ];
//!
//! let mut encoder = Encoder::new(0);
//! encoder
//!     .encode(&TraceMessage::new(Payload::Sync { sync: 0, i_cnt: 0, f_addr: 0x4000_0000 }))
//!     .encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 4 }))
//!     .encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 6 }));
//! let data = encoder.finish();
//! let slicer = MessageSlicer::new(data.as_slice(), Default::default(), 0);
//!
//! let mut decoder: TraceDecoder<_, _> = decoder::builder()
//!     .with_code(code)
//!     .build(slicer)
//!     .unwrap();
//! for step in decoder.by_ref() {
//!     if let Some(insn) = step.unwrap().instruction {
//!         println!("{insn}");
//!     }
//! }
//! assert_eq!(decoder.analytics().total_instructions(), 5);
//! ```

pub mod catrace;
pub mod code;
pub mod config;
pub mod count;
pub mod decoder;
pub mod instruction;
pub mod itc;
pub mod message;
pub mod types;

pub use instruction::Instruction;
