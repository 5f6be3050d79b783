// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn first_insert_is_not_seen() {
    let mut w = DedupWindow::new(10);
    assert!(!w.check_and_insert("e1"));
}

#[test]
fn repeated_insert_is_seen() {
    let mut w = DedupWindow::new(10);
    assert!(!w.check_and_insert("e1"));
    assert!(w.check_and_insert("e1"));
}

#[test]
fn evicts_oldest_past_capacity() {
    let mut w = DedupWindow::new(2);
    assert!(!w.check_and_insert("e1"));
    assert!(!w.check_and_insert("e2"));
    assert!(!w.check_and_insert("e3")); // evicts e1
    assert!(!w.check_and_insert("e1")); // e1 was evicted, so it's "new" again
}
