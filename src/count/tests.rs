// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

use crate::message::BranchType;
use crate::types::stack::StaticStack;

fn tracker() -> CountTracker {
    CountTracker::new(4).expect("Could not create tracker")
}

#[test]
fn i_cnt() {
    let mut counts = tracker();
    assert_eq!(counts.count_type(), CountType::None);
    let count_type = counts.set_counts(&Payload::DirectBranch { i_cnt: 5 });
    assert_eq!(count_type, CountType::ICnt);
    assert_eq!(counts.consume_i_cnt(2), 3);
    assert_eq!(counts.consume_i_cnt(2), 1);
    assert_eq!(counts.count_type(), CountType::ICnt);
    assert_eq!(counts.consume_i_cnt(2), 0);
    assert_eq!(counts.count_type(), CountType::None);
}

#[test]
fn history() {
    let mut counts = tracker();
    let count_type = counts.set_counts(&Payload::IndirectHistory {
        b_type: BranchType::Indirect,
        i_cnt: 8,
        u_addr: 0,
        history: 0b110,
    });
    assert_eq!(count_type, CountType::History);
    assert_eq!(counts.consume_history(), Ok(true));
    assert_eq!(counts.consume_history(), Ok(false));
    assert_eq!(counts.count_type(), CountType::ICnt);
    assert_eq!(
        counts.consume_history(),
        Err(Error::CountExhausted(CountType::History))
    );
    assert_eq!(counts.i_cnt(), 8);
}

#[test]
fn exclusivity() {
    let mut counts = tracker();
    counts.set_counts(&Payload::ResourceFull { rcode: 9, rdata: 2 });
    assert_eq!(counts.count_type(), CountType::Taken);
    counts.set_counts(&Payload::ResourceFull { rcode: 8, rdata: 1 });
    assert_eq!(counts.count_type(), CountType::NotTaken);
    assert_eq!(
        counts.consume_taken(),
        Err(Error::CountExhausted(CountType::Taken))
    );
    assert_eq!(counts.consume_not_taken(), Ok(()));
    assert_eq!(counts.count_type(), CountType::None);

    counts.set_counts(&Payload::Correlation {
        evcode: 0,
        cdf: 1,
        i_cnt: 3,
        history: Some(0b11),
    });
    assert_eq!(counts.count_type(), CountType::History);
    counts.set_counts(&Payload::ResourceFull { rcode: 0, rdata: 7 });
    assert_eq!(counts.count_type(), CountType::ICnt);
    assert_eq!(counts.history_remaining(), 0);
    assert_eq!(counts.i_cnt(), 7);
}

#[test]
fn resource_full_history() {
    let mut counts = tracker();
    counts.set_counts(&Payload::ResourceFull {
        rcode: 1,
        rdata: 0b1_0000_0001,
    });
    assert_eq!(counts.history_remaining(), 8);
    assert_eq!(counts.i_cnt(), 0);
    for _ in 0..7 {
        assert_eq!(counts.consume_history(), Ok(false));
    }
    assert_eq!(counts.consume_history(), Ok(true));
    assert_eq!(counts.count_type(), CountType::None);
}

#[test]
fn messages_without_counts() {
    let mut counts = tracker();
    counts.set_counts(&Payload::DirectBranch { i_cnt: 5 });
    assert_eq!(
        counts.set_counts(&Payload::Ownership { process: 1 }),
        CountType::None
    );
}

#[test]
fn stack_balance() {
    let mut counts = tracker();
    counts.push(0x1004);
    counts.push(0x2008);
    assert_eq!(counts.stack_depth(), 2);
    assert_eq!(counts.pop(), Ok(0x2008));
    assert_eq!(counts.pop(), Ok(0x1004));
    assert_eq!(counts.stack_depth(), 0);
    assert_eq!(counts.pop(), Err(Error::StackUnderflow));
}

#[test]
fn stack_reset() {
    let mut counts: CountTracker<StaticStack<2>> =
        CountTracker::new(2).expect("Could not create tracker");
    counts.push(1);
    counts.push(2);
    counts.push(3);
    assert_eq!(counts.stack_depth(), 2);
    counts.reset_stack();
    assert_eq!(counts.pop(), Err(Error::StackUnderflow));
    assert!(CountTracker::<StaticStack<2>>::new(3).is_none());
}
