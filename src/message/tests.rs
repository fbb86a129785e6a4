// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

use std::io::Write;

use crate::config::{SETTINGS, Settings, SliceFormat};

use encoder::Encoder;
use slicer::MessageSlicer;

fn messages() -> Vec<TraceMessage> {
    let ict = Ict {
        cksrc: 9,
        ckdf: 1,
        ckdata0: 0x10,
        ckdata1: Some(0x2a),
    };
    [
        Payload::Sync {
            sync: 5,
            i_cnt: 0,
            f_addr: 0x4000_0000,
        },
        Payload::DirectBranch { i_cnt: 0 },
        Payload::IndirectBranch {
            b_type: BranchType::Exception,
            i_cnt: 17,
            u_addr: 0x3c,
        },
        Payload::DataAcquisition {
            idtag: 0,
            dqdata: 0x0a6c_6c65,
        },
        Payload::Error { etype: 3, pad: 0 },
        Payload::DirectBranchWs {
            sync: 1,
            i_cnt: 4,
            f_addr: 0x800,
        },
        Payload::IndirectBranchWs {
            sync: 2,
            b_type: BranchType::Indirect,
            i_cnt: 12,
            f_addr: u64::MAX >> 1,
        },
        Payload::AuxAccessWrite {
            a_addr: 0x12,
            data: 0x21,
        },
        Payload::ResourceFull {
            rcode: 1,
            rdata: 0b1011,
        },
        Payload::IndirectHistory {
            b_type: BranchType::Indirect,
            i_cnt: 9,
            u_addr: 0x7,
            history: 0b110,
        },
        Payload::IndirectHistoryWs {
            sync: 3,
            b_type: BranchType::Hardware,
            i_cnt: 1,
            f_addr: 0x2000,
            history: 1,
        },
        Payload::Correlation {
            evcode: 4,
            cdf: 1,
            i_cnt: 2,
            history: Some(0b101),
        },
        Payload::Correlation {
            evcode: 0,
            cdf: 0,
            i_cnt: 8,
            history: None,
        },
        Payload::Ownership { process: 42 },
        Payload::Ict(ict),
        Payload::IctWs(Ict {
            cksrc: 15,
            ckdf: 0,
            ckdata0: 0x1234,
            ckdata1: None,
        }),
    ]
    .into_iter()
    .enumerate()
    .map(|(n, p)| {
        let message = TraceMessage::new(p).with_core((n % 4) as u8);
        if n % 3 == 0 {
            message.with_timestamp(n as u64 * 0x1001)
        } else {
            message
        }
    })
    .collect()
}

fn parse_all(data: &[u8], format: SliceFormat, src_bits: u8) -> Vec<TraceMessage> {
    MessageSlicer::new(data, format, src_bits)
        .collect::<Result<_, _>>()
        .expect("Could not parse messages")
}

/// Compare messages ignoring bookkeeping fields
fn assert_same(parsed: &[TraceMessage], expected: &[TraceMessage]) {
    assert_eq!(parsed.len(), expected.len());
    for (n, (p, e)) in parsed.iter().zip(expected).enumerate() {
        assert_eq!(p.number, n as u64);
        assert_eq!(
            TraceMessage {
                number: 0,
                offset: 0,
                ..p.clone()
            },
            *e
        );
    }
}

#[test]
fn round_trip() {
    let expected = messages();
    let mut encoder = Encoder::new(2);
    expected.iter().for_each(|m| {
        encoder.encode(m);
    });
    let parsed = parse_all(encoder.slices(), SliceFormat::Binary, 2);
    assert_same(&parsed, &expected);
}

#[test]
fn text_round_trip() {
    let expected = messages();
    let mut encoder = Encoder::new(2);
    expected.iter().for_each(|m| {
        encoder.encode(m);
    });
    let text = format!("# leading comment\n\n{}", encoder.to_text().replace("1b\n", "0x1b\n"));
    let parsed = parse_all(text.as_bytes(), SliceFormat::Text, 2);
    assert_same(&parsed, &expected);
}

#[test]
fn standalone_tcode() {
    let mut encoder = Encoder::new(0);
    encoder.encode(&TraceMessage::new(Payload::Ownership { process: 0 }));
    assert_eq!(encoder.slices(), &[0x08, 0x03]);
}

#[test]
fn offsets() {
    let mut encoder = Encoder::new(0);
    encoder
        .encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 6 }))
        .encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 0x100 }));
    let data = encoder.finish();
    let mut slicer = MessageSlicer::new(data.as_slice(), SliceFormat::Binary, 0);
    let first = slicer.read_next_message().expect("Error").expect("No message");
    assert_eq!((first.number, first.offset), (0, 0));
    assert_eq!(slicer.file_offset(), 2);
    let second = slicer.read_next_message().expect("Error").expect("No message");
    assert_eq!((second.number, second.offset), (1, 2));
    assert_eq!(second.payload, Payload::DirectBranch { i_cnt: 0x100 });
    assert_eq!(slicer.file_offset(), data.len() as u64);
    assert!(slicer.read_next_message().expect("Error").is_none());
    assert_eq!(slicer.file_size(), None);
}

#[test]
fn resync() {
    let mut encoder = Encoder::new(0);
    // Tail end of a message we missed the start of
    encoder.literal(0x1d).literal(0x07);
    encoder.encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 3 }));
    let parsed = parse_all(encoder.slices(), SliceFormat::Binary, 0);
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].payload, Payload::DirectBranch { i_cnt: 3 });
    assert_eq!(parsed[0].offset, 2);
}

#[test]
fn truncated() {
    let mut encoder = Encoder::new(0);
    encoder.encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 3 }));
    encoder.literal(0x24).literal(0x05);
    let data = encoder.finish();
    let mut slicer = MessageSlicer::new(data.as_slice(), SliceFormat::Binary, 0);
    assert!(matches!(slicer.read_next_message(), Ok(Some(_))));
    assert!(matches!(slicer.read_next_message(), Err(Error::Truncated)));
    assert!(matches!(slicer.read_next_message(), Ok(None)));
}

#[test]
fn unknown_tcode() {
    let mut encoder = Encoder::new(0);
    encoder.literal(63 << 2).literal(0x07);
    encoder.encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 3 }));
    let mut slicer = MessageSlicer::new(encoder.slices(), SliceFormat::Binary, 0);
    assert!(matches!(
        slicer.read_next_message(),
        Err(Error::Malformed(Malformed::UnknownTCode(63)))
    ));
    let message = slicer.read_next_message().expect("Error").expect("No message");
    assert_eq!(message.payload, Payload::DirectBranch { i_cnt: 3 });
    assert_eq!(message.number, 1);
}

#[test]
fn extra_field() {
    let mut encoder = Encoder::new(0);
    // DIRECT_BRANCH with i_cnt, timestamp and one more field
    encoder.literal(0x0c).literal(0x05).literal(0x09).literal(0x0f);
    let mut slicer = MessageSlicer::new(encoder.slices(), SliceFormat::Binary, 0);
    assert!(matches!(
        slicer.read_next_message(),
        Err(Error::Malformed(Malformed::ExtraField))
    ));
}

#[test]
fn missing_field() {
    let mut encoder = Encoder::new(0);
    // INDIRECT_BRANCH with only one variable field
    encoder.literal(0x10).literal(0x07);
    let mut slicer = MessageSlicer::new(encoder.slices(), SliceFormat::Binary, 0);
    assert!(matches!(
        slicer.read_next_message(),
        Err(Error::Malformed(Malformed::MissingField))
    ));
}

#[test]
fn field_overflow() {
    let mut encoder = Encoder::new(0);
    encoder.literal(0x0c);
    for _ in 0..11 {
        encoder.literal(0xfc);
    }
    encoder.literal(0xff);
    let mut slicer = MessageSlicer::new(encoder.slices(), SliceFormat::Binary, 0);
    assert!(matches!(
        slicer.read_next_message(),
        Err(Error::Malformed(Malformed::FieldOverflow))
    ));
    assert!(matches!(slicer.read_next_message(), Ok(None)));
}

#[test]
fn invalid_text() {
    let text = "0c\nzz\n";
    let mut slicer = MessageSlicer::new(text.as_bytes(), SliceFormat::Text, 0);
    match slicer.read_next_message() {
        Err(Error::InvalidText { line, text }) => {
            assert_eq!(line, 2);
            assert_eq!(text, "zz");
        }
        r => panic!("Unexpected result: {r:?}"),
    }
}

#[test]
fn open_text_file() {
    let mut encoder = Encoder::new(0);
    encoder.encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 6 }).with_timestamp(0x55));
    let mut file = tempfile::Builder::new()
        .suffix(".rtd.txt")
        .tempfile()
        .expect("Could not create file");
    file.write_all(encoder.to_text().as_bytes())
        .expect("Could not write trace");

    let mut slicer = MessageSlicer::open(file.path(), &SETTINGS).expect("Could not open trace");
    assert_eq!(slicer.file_size(), Some(12));
    let message = slicer.read_next_message().expect("Error").expect("No message");
    assert_eq!(message.timestamp, Some(0x55));
    assert_eq!(slicer.file_offset(), 12);
}

#[test]
fn open_binary_file() {
    let mut encoder = Encoder::new(1);
    encoder.encode(&TraceMessage::new(Payload::Ownership { process: 7 }).with_core(1));
    let mut file = tempfile::NamedTempFile::new().expect("Could not create file");
    file.write_all(encoder.slices()).expect("Could not write trace");

    let settings = Settings {
        src_bits: 1,
        ..SETTINGS
    };
    let messages: Vec<_> = MessageSlicer::open(file.path(), &settings)
        .expect("Could not open trace")
        .collect::<Result<_, _>>()
        .expect("Could not parse messages");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].core, 1);
    assert_eq!(messages[0].payload, Payload::Ownership { process: 7 });
}

#[test]
fn src_bits_too_wide() {
    let mut encoder = Encoder::new(8);
    encoder.encode(&TraceMessage::new(Payload::DirectBranch { i_cnt: 3 }).with_core(0xa5));
    let parsed = parse_all(encoder.slices(), SliceFormat::Binary, 8);
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].core, 0xa5);

    let mut slicer = MessageSlicer::new(encoder.slices(), SliceFormat::Binary, 9);
    assert!(matches!(slicer.read_next_message(), Err(Error::SrcBits(9))));
    assert!(slicer.read_next_message().is_err_and(|e| !e.is_recoverable()));
    assert_eq!(slicer.file_offset(), 0);

    let file = tempfile::NamedTempFile::new().expect("Could not create file");
    let settings = Settings {
        src_bits: 9,
        ..SETTINGS
    };
    assert!(matches!(
        MessageSlicer::open(file.path(), &settings),
        Err(Error::SrcBits(9))
    ));
}

#[test]
fn tcode_from_raw() {
    assert_eq!(TCode::try_from(8u8), Ok(TCode::Error));
    assert_eq!(TCode::try_from(35u8), Ok(TCode::IctWs));
    assert_eq!(TCode::try_from(5u8), Err(Malformed::UnknownTCode(5)));
}

#[test]
fn ict_predicates() {
    let control = Ict::default();
    assert!(control.is_address_less_control());
    let watchpoint = Ict {
        cksrc: 14,
        ..Default::default()
    };
    assert_eq!(watchpoint.source(), IctSource::Watchpoint);
    assert!(watchpoint.is_uncommitted_sample());
    assert!(!watchpoint.is_address_less_control());
}

#[test]
fn display() {
    let message = TraceMessage::new(Payload::Sync {
        sync: 1,
        i_cnt: 2,
        f_addr: 0x800,
    })
    .with_timestamp(0x10);
    assert_eq!(message.to_string(), "#0 core 0 SYNC i_cnt=2 f_addr=0x800 ts=0x10");
}
