// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

use std::io::Write;

use crate::instruction::Kind;
use crate::instruction::format::{TypeB, TypeI, TypeJ};

/// Build the raw words of a block starting at the given address
fn block(address: u64, payloads: &[(usize, u32)]) -> [u32; record::WORDS] {
    let mut words = [0u32; record::WORDS];
    for (i, word) in words.iter_mut().enumerate().skip(1) {
        *word = (((address >> (2 * (i - 1))) & 0x3) as u32) << 30;
    }
    for (i, payload) in payloads {
        words[*i] |= payload;
    }
    words
}

fn bytes(blocks: &[[u32; record::WORDS]]) -> Vec<u8> {
    blocks
        .iter()
        .flatten()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

/// Build a vector trace word from five records
fn vector_word(records: [u8; 5]) -> u32 {
    records
        .iter()
        .fold(0, |word, record| (word << 6) | u32::from(*record))
}

fn correlator(blocks: &[[u32; record::WORDS]], kind: CaTraceKind) -> CaTraceCorrelator {
    CaTraceCorrelator::new(bytes(blocks).as_slice(), kind).expect("Could not create correlator")
}

#[test]
fn block_address() {
    let block = Block::from_words(&block(0x8000_1234, &[]), false);
    assert_eq!(block.address(), 0x8000_1234);
    assert_eq!(block.payload(0), Some(0));
    assert_eq!(block.payload(32), None);
}

#[test]
fn first_block_flag() {
    let block = Block::from_words(&block(0, &[]), true);
    assert_eq!(block.payload(0), Some(1 << 29));
}

#[test]
fn scalar() {
    let first = block(0x1000, &[(0, 1 << 26), (2, 1 << 29)]);
    let second = block(0x2000, &[(0, 1 << 28)]);
    let mut ca = correlator(&[first, second], CaTraceKind::Instruction);
    assert_eq!(ca.start_address(), 0x1000);

    let timings: Vec<_> = (0..4)
        .map(|_| ca.consume(Class::Scalar).map(|t| (t.pipe, t.cycles)))
        .collect::<Result<_, _>>()
        .expect("Could not consume");
    assert_eq!(
        timings,
        [
            (Pipe::Pipe0, 0),
            (Pipe::Pipe1, 1),
            (Pipe::Pipe0, 30),
            (Pipe::Pipe1, 480),
        ]
    );
    assert!(ca.consume(Class::Scalar).is_err_and(|e| e.is_eof()));
}

#[test]
fn rewind() {
    let mut ca = correlator(&[block(0x1000, &[(1, 1 << 29)])], CaTraceKind::Instruction);
    assert_eq!(ca.consume(Class::Scalar).map(|t| t.cycles).ok(), Some(0));
    assert_eq!(ca.consume(Class::Scalar).map(|t| t.cycles).ok(), Some(15));
    ca.rewind().expect("Could not rewind");
    assert_eq!(ca.start_address(), 0x1000);
    assert_eq!(ca.consume(Class::Scalar).map(|t| t.cycles).ok(), Some(0));
}

#[test]
fn vector_arith() {
    let word = vector_word([flags::V0, flags::START, flags::ARITH, 0, 0]);
    let mut ca = correlator(&[block(0x1000, &[(0, word)])], CaTraceKind::Vector);
    let timing = ca.consume(Class::VectorArith).expect("Could not consume");
    assert_eq!(
        timing,
        Timing {
            pipe: Pipe::Pipe0,
            cycles: 0,
            vector_start: Some(1),
            vector_finish: Some(2),
            queue_depth: 1,
            in_flight: InFlight {
                arith: 1,
                ..Default::default()
            },
        }
    );
    assert!(ca.consume(Class::Scalar).is_err_and(|e| e.is_eof()));
}

#[test]
fn vector_amo_ww() {
    let word = vector_word([flags::V0, flags::START, flags::LOAD, flags::STORE, 0]);
    let mut ca = correlator(&[block(0x1000, &[(0, word)])], CaTraceKind::Vector);
    let timing = ca.consume(Class::VectorAmoWw).expect("Could not consume");
    assert_eq!(timing.vector_start, Some(1));
    assert_eq!(timing.vector_finish, Some(3));
    assert_eq!(timing.in_flight.load, 1);
}

#[test]
fn vector_pipes() {
    let words = [
        (0, vector_word([flags::V0, 0, 0, 0, flags::V1])),
        (3, vector_word([0, flags::V0, 0, 0, 0])),
    ];
    let mut ca = correlator(&[block(0x1000, &words)], CaTraceKind::Vector);
    let pipes: Vec<_> = (0..3)
        .map(|_| ca.consume(Class::VectorConfig).map(|t| (t.pipe, t.cycles)))
        .collect::<Result<_, _>>()
        .expect("Could not consume");
    assert_eq!(pipes, [(Pipe::Pipe0, 0), (Pipe::Pipe1, 4), (Pipe::Pipe0, 16)]);
}

#[test]
fn queue_pack() {
    let mut queue = TraceQueue::new(8);
    assert_eq!(queue.room(), 7);
    assert_eq!(queue.push_word(vector_word([flags::V0; 5]), 0).ok(), Some(0));
    assert_eq!(queue.room(), 2);

    let mut cursor = queue.head();
    for _ in 0..3 {
        assert!(queue.take_pipe(&mut cursor).is_some());
    }
    assert_eq!(queue.push_word(vector_word([flags::V1; 5]), 10).ok(), Some(2));
    assert_eq!(queue.len(), 7);
    assert_eq!(queue.get(0).map(|i| i.cycle), Some(3));
    assert_eq!(queue.get(2).map(|i| (i.record, i.cycle)), Some((flags::V1, 10)));
}

#[test]
fn queue_full() {
    let mut queue = TraceQueue::new(8);
    assert!(queue.push_word(vector_word([flags::V0; 5]), 0).is_ok());
    assert!(matches!(
        queue.push_word(vector_word([flags::V0; 5]), 5),
        Err(Error::QueueFull)
    ));
}

#[test]
fn queue_advance() {
    let mut queue = TraceQueue::new(16);
    assert!(
        queue
            .push_word(vector_word([flags::V0, flags::START, 0, 0, 0]), 0)
            .is_ok()
    );
    let mut cursor = queue.head();
    assert_eq!(queue.take_pipe(&mut cursor), Some((Pipe::Pipe0, 0)));
    queue.advance();
    assert_eq!(queue.head(), 1);
    assert_eq!(queue.take_flag(&mut cursor, flags::START), Some(1));
    queue.advance();
    assert!(queue.is_empty());
}

#[test]
fn next_address() {
    let mut saved = None;
    let call = Instruction::from(Kind::jal(TypeJ { rd: 1, imm: 0x100 }));
    assert_eq!(next_ca_addr(&call, 0x1000, &mut saved), Some(0x1100));
    assert_eq!(saved, Some(0x1004));

    let ret = Instruction::from(Kind::jalr(TypeI {
        rd: 0,
        rs1: 1,
        imm: 0,
    }));
    assert_eq!(next_ca_addr(&ret, 0x1100, &mut saved), Some(0x1004));
    assert_eq!(saved, None);
    assert_eq!(next_ca_addr(&ret, 0x1100, &mut saved), None);

    let short = Instruction::from(Kind::beq(TypeB {
        rs1: 1,
        rs2: 2,
        imm: 4,
    }));
    assert_eq!(next_ca_addr(&short, 0x1000, &mut saved), Some(0x1004));
    let long = Instruction::from(Kind::beq(TypeB {
        rs1: 1,
        rs2: 2,
        imm: 8,
    }));
    assert_eq!(next_ca_addr(&long, 0x1000, &mut saved), None);

    assert_eq!(next_ca_addr(&Kind::ecall.into(), 0x1000, &mut saved), None);
    assert_eq!(
        next_ca_addr(&Instruction::default(), 0x1000, &mut saved),
        Some(0x1004)
    );
}

#[test]
fn fast_forward() {
    let first = block(0x1000, &[(0, 1 << 27), (1, 1 << 29)]);
    let mut code: &[(u64, Instruction)] = &[
        (0x1000, Default::default()),
        (0x1004, Default::default()),
        (0x1008, Kind::ecall.into()),
    ];

    let mut ca = correlator(&[first], CaTraceKind::Instruction);
    assert!(matches!(ca.fast_forward(&mut code, 0x1008, 30), Ok(true)));
    assert_eq!(ca.consume(Class::Scalar).map(|t| t.cycles).ok(), Some(15));

    ca.rewind().expect("Could not rewind");
    assert!(matches!(ca.fast_forward(&mut code, 0x1008, 1), Ok(false)));

    ca.rewind().expect("Could not rewind");
    assert!(matches!(ca.fast_forward(&mut code, 0x2000, 30), Ok(false)));
}

#[test]
fn empty_trace() {
    let data = bytes(&[block(0, &[])]);
    assert!(matches!(
        CaTraceCorrelator::new(&data[..100], CaTraceKind::Instruction),
        Err(Error::Eof)
    ));
    assert!(matches!(
        CaTraceCorrelator::new(data.as_slice(), CaTraceKind::None),
        Err(Error::NoTraceKind)
    ));
}

#[test]
fn open_file() {
    let mut file = tempfile::NamedTempFile::new().expect("Could not create file");
    file.write_all(&bytes(&[block(0x4242, &[])]))
        .expect("Could not write file");
    let ca = CaTraceCorrelator::open(file.path(), CaTraceKind::Vector).expect("Could not open");
    assert_eq!(ca.start_address(), 0x4242);
    assert_eq!(ca.kind(), CaTraceKind::Vector);
}
