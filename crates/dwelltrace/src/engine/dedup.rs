// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded LRU of recently seen `event_id`s, one per partition worker and
//! never shared across partitions. Same shift-remove/reinsert technique as
//! `PrewarmCache`, instead of pulling in a dedicated `lru` crate dependency.

use indexmap::IndexMap;

pub struct DedupWindow {
    seen: IndexMap<String, ()>,
    capacity: usize,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self { seen: IndexMap::with_capacity(capacity.min(1024)), capacity }
    }

    /// Returns `true` if `event_id` was already seen (and bumps it to
    /// most-recently-used); otherwise records it and returns `false`.
    pub fn check_and_insert(&mut self, event_id: &str) -> bool {
        if self.seen.shift_remove(event_id).is_some() {
            self.seen.insert(event_id.to_owned(), ());
            return true;
        }
        self.seen.insert(event_id.to_owned(), ());
        while self.seen.len() > self.capacity {
            self.seen.shift_remove_index(0);
        }
        false
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
