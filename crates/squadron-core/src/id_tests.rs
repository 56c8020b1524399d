// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

define_id! {
    pub struct TestId;
}

#[test]
fn short_truncates_long_ids() {
    let id = TestId::new("abcdefgh");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn short_leaves_short_ids_untouched() {
    let id = TestId::new("ab");
    assert_eq!(id.short(4), "ab");
}

#[test]
fn display_round_trips_through_string() {
    let id = TestId::new("x-1");
    assert_eq!(id.to_string(), "x-1");
    assert_eq!(id, "x-1");
}

#[test]
fn sequential_id_gen_is_monotonic_and_prefixed() {
    let gen = SequentialIdGen::new("agent");
    assert_eq!(gen.next(), "agent-1");
    assert_eq!(gen.next(), "agent-2");
}

#[test]
fn uuid_id_gen_produces_distinct_values() {
    let gen = UuidIdGen;
    assert_ne!(gen.next(), gen.next());
}
