// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

fn aggregator(buffer_size: usize) -> ItcPrintAggregator {
    let settings = ItcPrint {
        enabled: true,
        channel: 1,
        buffer_size,
    };
    ItcPrintAggregator::new(&settings, 2)
}

fn word(s: &[u8]) -> u64 {
    s.iter().rev().fold(0, |w, b| (w << 8) | u64::from(*b))
}

#[test]
fn words() {
    let mut itc = aggregator(64);
    assert!(itc.observe(0, 4, word(b"Hell"), 10));
    assert!(itc.observe(0, 4, word(b"o\n\0\0"), 12));
    assert_eq!(itc.pending(0), 1);
    assert_eq!(
        itc.get_print_string(0),
        Some(PrintRun {
            text: "Hello".into(),
            start: 10,
            end: 12,
            terminated: true,
        })
    );
    assert_eq!(itc.pending(0), 0);
}

#[test]
fn widths() {
    let mut itc = aggregator(64);
    assert!(itc.observe(0, 6, word(b"ab"), 1));
    assert!(itc.observe(0, 7, word(b"cd"), 2));
    assert!(itc.observe(0, 7, word(b"\n"), 3));
    assert_eq!(itc.get_print_string(0).map(|r| r.text), Some("abc".into()));
}

#[test]
fn other_channel() {
    let mut itc = aggregator(64);
    assert!(!itc.observe(0, 0, word(b"nope"), 1));
    assert!(!itc.observe(0, 5, word(b"nope"), 1));
    assert!(!itc.observe(7, 4, word(b"nope"), 1));
    assert_eq!(itc.pending(0), 0);
}

#[test]
fn unterminated() {
    let mut itc = aggregator(64);
    assert!(itc.observe(1, 4, word(b"abc"), 5));
    assert_eq!(itc.get_print_string(1), None);
    assert!(!itc.has_terminated());
    let run = itc.flush_print_string(1).expect("No run");
    assert_eq!(run.text, "abc");
    assert!(!run.terminated);
    assert_eq!(itc.flush_print_string(1), None);
}

#[test]
fn cores() {
    let mut itc = aggregator(64);
    assert!(itc.observe(0, 7, word(b"a"), 1));
    assert!(itc.observe(1, 7, word(b"b"), 2));
    assert!(itc.observe(0, 7, word(b"\n"), 3));
    assert!(itc.has_terminated());
    assert_eq!(itc.get_print_string(1), None);
    assert_eq!(itc.get_print_string(0).map(|r| r.text), Some("a".into()));
    assert_eq!(itc.flush_print_string(1).map(|r| r.text), Some("b".into()));
}

#[test]
fn empty_line() {
    let mut itc = aggregator(64);
    assert!(itc.observe(0, 4, word(b"x\n\n\0"), 1));
    assert_eq!(itc.pending(0), 2);
    assert_eq!(itc.get_print_string(0).map(|r| r.text), Some("x".into()));
    assert_eq!(itc.get_print_string(0).map(|r| r.text), Some("".into()));
}

#[test]
fn eviction() {
    let mut itc = aggregator(4);
    assert!(itc.observe(0, 4, word(b"ab\nc"), 1));
    assert!(itc.observe(0, 4, word(b"ef\0\0"), 2));
    assert_eq!(itc.dropped(), 1);
    assert_eq!(itc.get_print_string(0).map(|r| r.text), Some("ab".into()));
    assert_eq!(itc.flush_print_string(0).map(|r| r.text), Some("f".into()));
}
