// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

use crate::instruction::format::{TypeI, TypeJ};
use crate::instruction::{Base, Kind, Size};

#[test]
fn segment() {
    let data = b"\x97\x02\x00\x00\x82\x80\x67\x80\x02\x00";
    let mut code = from_segment(0x1000, data, Base::Rv32);
    assert_eq!(code.get_insn(0x1000).map(|i| i.size), Ok(Size::Normal));
    assert_eq!(code.disassemble(0x1004), Ok("c.jr x1".into()));
    assert_eq!(
        code.get_insn(0x1006).map(|i| i.kind),
        Ok(Some(Kind::jalr(TypeI {
            rd: 0,
            rs1: 5,
            imm: 0
        })))
    );
    assert_eq!(
        code.get_insn(0xffe),
        Err(error::SegmentError::AddressNotCovered(0xffe))
    );
    assert_eq!(
        code.get_insn(0x100a),
        Err(error::SegmentError::AddressNotCovered(0x100a))
    );
    assert_eq!(
        code.get_insn(0x1009),
        Err(error::SegmentError::InvalidInstruction(0x1009))
    );
}

#[test]
fn pairs() {
    let jal = Kind::jal(TypeJ { rd: 1, imm: 0x10 });
    let mut code: &[(u64, Instruction)] = &[
        (0x80, Instruction::default()),
        (0x84, jal.into()),
    ];
    assert_eq!(code.get_insn(0x84), Ok(jal.into()));
    assert_eq!(code.disassemble(0x84), Ok("jal x1, 0x10".into()));
    assert_eq!(code.get_insn(0x88), Err(error::NoInstruction(0x88)));
    assert_eq!(code.source_info(0x84), None);
}

#[test]
fn func() {
    let mut code = from_fn(|a| {
        if a % 4 == 0 {
            Ok(Instruction::default())
        } else {
            Err(error::NoInstruction(a))
        }
    });
    assert_eq!(code.get_insn(0x20), Ok(Instruction::default()));
    assert_eq!(code.get_insn(0x22), Err(error::NoInstruction(0x22)));
}

#[test]
fn borrowed() {
    fn fetch<P: CodeProvider>(mut code: P, address: u64) -> Result<Instruction, P::Error> {
        code.get_insn(address)
    }

    let mut code = Empty;
    assert_eq!(fetch(&mut code, 0), Err(error::NoInstruction(0)));
}

#[test]
fn source_info_display() {
    let info = SourceInfo {
        function: Some("main".into()),
        offset: 0x12,
    };
    assert_eq!(info.to_string(), "<main+0x12>");
    assert_eq!(SourceInfo::default().to_string(), "<unknown>");
}
