// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

use history::History;
use stack::{ReturnStack, StaticStack, VecStack};

#[test]
fn vec_stack() {
    let mut s = VecStack::new(4).expect("Could not create stack");
    assert_eq!(s.max_depth(), 4);
    s.push(50);
    s.push(44);
    s.push(30);
    s.push(35);
    assert_eq!(s.depth(), 4);
    s.push(24);
    assert_eq!(s.depth(), 4);
    assert_eq!(s.pop(), Some(24));
    assert_eq!(s.pop(), Some(35));
    assert_eq!(s.depth(), 2);
    assert_eq!(s.pop(), Some(30));
    assert_eq!(s.pop(), Some(44));
    assert_eq!(s.pop(), None);
}

#[test]
fn vec_stack_zero_depth() {
    let mut s = VecStack::new(0).expect("Could not create stack");
    s.push(0x1000);
    assert_eq!(s.depth(), 0);
    assert_eq!(s.pop(), None);
}

#[test]
fn static_stack_eviction() {
    let mut s = StaticStack::<8>::new(3).expect("Could not create stack");
    for n in 1..10 {
        s.push(n);
    }

    let mut copy = s.clone();
    assert_eq!(s.pop(), Some(9));
    assert_eq!(s.pop(), Some(8));
    assert_eq!(s.pop(), Some(7));
    assert_eq!(s.pop(), None);

    assert_eq!(copy.pop(), Some(9));
    assert_eq!(copy.depth(), 2);
    copy.clear();
    assert_eq!(copy.pop(), None);
}

#[test]
fn static_stack_too_deep() {
    assert!(StaticStack::<2>::new(3).is_none());
}

#[test]
fn history_from_raw() {
    // stop bit, then taken, not taken, taken
    let mut history = History::from_raw(0b1101);
    assert_eq!(history.remaining(), 3);
    assert_eq!(history.pop_taken(), Some(true));
    assert_eq!(history.pop_taken(), Some(false));
    assert_eq!(history.raw(), 0b11);
    assert_eq!(history.pop_taken(), Some(true));
    assert!(history.is_empty());
    assert_eq!(history.pop_taken(), None);
}

#[test]
fn history_without_outcomes() {
    assert!(History::from_raw(0).is_empty());
    assert!(History::from_raw(1).is_empty());
}

#[test]
fn history_collect() {
    let history: History = [false, false, true].into_iter().collect();
    assert_eq!(history.raw(), 0b1001);
    assert_eq!(history, History::from_raw(0b1001));
}

#[test]
fn history_full() {
    let mut history: History = core::iter::repeat_n(true, 63).collect();
    assert_eq!(history.remaining(), 63);
    assert_eq!(history.raw(), u64::MAX);
    assert_eq!(history.push_taken(false), Err(history::Error::TooManyBranches));
}

#[test]
fn call_return_display() {
    let flags = CallReturn {
        call: true,
        swap: true,
        ..Default::default()
    };
    assert_eq!(flags.to_string(), "call|swap");
    assert!(CallReturn::default().is_none());
}
