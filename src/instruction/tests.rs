// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

use format::{TypeB, TypeI, TypeJ, TypeR};

macro_rules! decode_test {
    ($n:ident, $b:expr, $k:expr) => {
        #[test]
        fn $n() {
            let bits = Bits::try_from($b as u32).expect("Not an instruction");
            assert_eq!(Instruction::from(bits).kind, $k);
        }
    };
}

decode_test!(jal, 0x010000ef, Some(Kind::jal(TypeJ { rd: 1, imm: 16 })));
decode_test!(j_back, 0xffdff06f, Some(Kind::jal(TypeJ { rd: 0, imm: -4 })));
decode_test!(
    ret,
    0x00008067,
    Some(Kind::jalr(TypeI {
        rd: 0,
        rs1: 1,
        imm: 0
    }))
);
decode_test!(
    beq,
    0x00208463,
    Some(Kind::beq(TypeB {
        rs1: 1,
        rs2: 2,
        imm: 8
    }))
);
decode_test!(
    bne_back,
    0xfe209ee3,
    Some(Kind::bne(TypeB {
        rs1: 1,
        rs2: 2,
        imm: -4
    }))
);
decode_test!(ecall, 0x00000073, Some(Kind::ecall));
decode_test!(ebreak, 0x00100073, Some(Kind::ebreak));
decode_test!(mret, 0x30200073, Some(Kind::mret));
decode_test!(sret, 0x10200073, Some(Kind::sret));
decode_test!(uret, 0x00200073, Some(Kind::uret));
decode_test!(addi, 0x00150513, None);
decode_test!(
    c_jr,
    0x8082,
    Some(Kind::c_jr(TypeR {
        rd: 0,
        rs1: 1,
        rs2: 0
    }))
);
decode_test!(
    c_jalr,
    0x9782,
    Some(Kind::c_jalr(TypeR {
        rd: 1,
        rs1: 15,
        rs2: 0
    }))
);
decode_test!(c_ebreak, 0x9002, Some(Kind::c_ebreak));
decode_test!(c_j, 0xa001, Some(Kind::c_j(TypeJ { rd: 0, imm: 0 })));
decode_test!(c_jal, 0x2001, Some(Kind::c_jal(TypeJ { rd: 1, imm: 0 })));
decode_test!(
    c_bnez,
    0xe101,
    Some(Kind::c_bnez(TypeB {
        rs1: 10,
        rs2: 0,
        imm: 0
    }))
);
decode_test!(c_nop, 0x0001, None);

#[test]
fn c_jal_rv64() {
    assert_eq!(Kind::decode_16(0x2001, Base::Rv64), None);
}

#[test]
fn extract() {
    let data = b"\x82\x80\xef\x00\x00\x01\xff";
    let (first, rest) = Instruction::extract(data, Base::Rv32).expect("No instruction");
    assert_eq!(first.size, Size::Compressed);
    assert_eq!(first.bits, Some(Bits::Bit16(0x8082)));
    let (second, rest) = Instruction::extract(rest, Base::Rv32).expect("No instruction");
    assert_eq!(second.size, Size::Normal);
    assert_eq!(second.kind, Some(Kind::jal(TypeJ { rd: 1, imm: 16 })));
    assert_eq!(Instruction::extract(rest, Base::Rv32), None);
}

#[test]
fn halfwords() {
    assert_eq!(Size::Compressed.halfwords(), 1);
    assert_eq!(Size::Normal.halfwords(), 2);
}

macro_rules! class_test {
    ($n:ident, $b:literal, $c:expr) => {
        #[test]
        fn $n() {
            assert_eq!(Class::of($b), $c);
        }
    };
}

class_test!(class_vadd, 0x00000057, Class::VectorArith);
class_test!(class_vsetvli, 0x00007057, Class::VectorConfig);
class_test!(class_vle32, 0x00006007, Class::VectorLoad);
class_test!(class_flw, 0x00002007, Class::Scalar);
class_test!(class_vse32, 0x00006027, Class::VectorStore);
class_test!(class_vamo, 0x0000602f, Class::VectorAmo);
class_test!(class_vamo_ww, 0x0400602f, Class::VectorAmoWw);
class_test!(class_amoadd_w, 0x0000202f, Class::Scalar);

#[test]
fn link_registers() {
    assert!(is_link(1));
    assert!(is_link(5));
    assert!(!is_link(0));
    assert!(!is_link(2));
}

macro_rules! format_test {
    ($n:ident, $k:expr, $l:literal) => {
        #[test]
        fn $n() {
            assert_eq!($k.to_string(), $l);
        }
    };
}

format_test!(fmt_c_jr, Kind::c_jr(TypeR { rd: 0, rs1: 12, rs2: 0 }), "c.jr x12");
format_test!(fmt_c_j, Kind::c_j(TypeJ { rd: 0, imm: 0x14 }), "c.j 0x14");
format_test!(fmt_jal, Kind::jal(TypeJ { rd: 5, imm: 0x12 }), "jal x5, 0x12");
format_test!(
    fmt_beq,
    Kind::beq(TypeB {
        rs1: 9,
        rs2: 11,
        imm: -8
    }),
    "beq x9, x11, -0x8"
);
format_test!(fmt_fence_i, Kind::fence_i, "fence.i");
format_test!(
    fmt_unknown,
    Instruction::from(Bits::Bit32(0x00150513)),
    ".insn 00150513"
);
