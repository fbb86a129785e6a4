// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace dump
//!
//!     Usage: dump [OPTIONS] <elf> <trace>
//!
//! This program decodes a Nexus trace of a program provided in the form of an
//! ELF file. Slice files ending in `.txt` are read as text, one hexadecimal
//! slice per line. All others are read as binary, one slice per byte.
//! Optionally, settings may be supplied in the form of a TOML file and a
//! cycle-accurate trace may be correlated with the instruction trace.
//!
//! By default, the program prints a single line for every instruction and
//! message to stdout, followed by decoding statistics. Log output is
//! controlled via the `RUST_LOG` environment variable.

use std::path::PathBuf;

use riscv_nexus_trace::catrace::CaTraceCorrelator;
use riscv_nexus_trace::code::elf;
use riscv_nexus_trace::config::{CaTraceKind, Settings};
use riscv_nexus_trace::decoder::{self, TraceDecoder};
use riscv_nexus_trace::message::slicer::MessageSlicer;

fn main() {
    let matches = clap::Command::new("Nexus trace dump")
        .arg(clap::arg!(<elf> "Path to the traced program").value_parser(clap::value_parser!(PathBuf)))
        .arg(clap::arg!(<trace> "Path to the trace file").value_parser(clap::value_parser!(PathBuf)))
        .arg(
            clap::arg!(-s --settings <FILE> "Decoder settings")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(--"ca-trace" <FILE> "Cycle-accurate trace to correlate")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(--"vector" "Treat the cycle-accurate trace as vector trace")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::arg!(-q --quiet "Only print print output and statistics")
                .env("QUIET")
                .action(clap::ArgAction::SetTrue)
                .value_parser(clap::builder::FalseyValueParser::new()),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let quiet = matches.get_flag("quiet");

    let settings = matches
        .get_one::<PathBuf>("settings")
        .map(|p| Settings::load(p).expect("Could not load settings"))
        .unwrap_or_default();
    tracing::debug!(?settings, "Settings");

    let elf_path = matches.get_one::<PathBuf>("elf").expect("No ELF file specified");
    let elf_data = std::fs::read(elf_path).expect("Could not load ELF file");
    let elf = ::elf::ElfBytes::<::elf::endian::LittleEndian>::minimal_parse(elf_data.as_ref())
        .expect("Could not parse ELF file");
    let code = elf::Elf::new(elf).expect("Could not create code provider");

    let trace_path = matches.get_one::<PathBuf>("trace").expect("No trace file specified");
    let slicer = MessageSlicer::open(trace_path, &settings).expect("Could not open trace file");

    let mut builder = decoder::builder().with_settings(&settings).with_code(code);
    if let Some(path) = matches.get_one::<PathBuf>("ca-trace") {
        let kind = if matches.get_flag("vector") {
            CaTraceKind::Vector
        } else {
            CaTraceKind::Instruction
        };
        let correlator = CaTraceCorrelator::open(path, kind).expect("Could not open CA trace");
        builder = builder.with_ca_trace(correlator);
    }
    let mut decoder: TraceDecoder<_> = builder.build(slicer).expect("Could not build decoder");

    loop {
        let step = match decoder.next_instruction() {
            Ok(Some(step)) => step,
            Ok(None) => break,
            Err(decoder::Error::Halted) => break,
            Err(e) if e.is_fatal() => {
                eprintln!("Error: {e}");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping message");
                continue;
            }
        };

        if !quiet {
            if let Some(insn) = step.instruction {
                match &step.source_info {
                    Some(info) => println!("{insn} {info}"),
                    None => println!("{insn}"),
                }
            }
            if let Some(message) = step.message {
                println!("{message}");
            }
            if step.sync_lost {
                println!("core {}: sync lost", step.core);
            }
            if step.ca_misaligned {
                println!("cycle-accurate trace misaligned, timings dropped");
            }
            if step.ca_stopped {
                println!("cycle-accurate trace stopped, timings dropped");
            }
        }
        if step.itc_print
            && let Some(itc) = decoder.itc_print()
        {
            while let Some(run) = itc.get_print_string(step.core) {
                println!("[core {}, {}..{}] {}", step.core, run.start, run.end, run.text);
            }
        }
    }

    if let Some(itc) = decoder.itc_print() {
        for core in 0..settings.max_cores {
            let Ok(core) = u8::try_from(core) else {
                break;
            };
            while let Some(run) = itc.flush_print_string(core) {
                println!("[core {core}, {}..{}] {}", run.start, run.end, run.text);
            }
        }
    }
    eprint!("{}", decoder.analytics());
}
