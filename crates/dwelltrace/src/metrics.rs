// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-level counters surfaced at `/metrics` as JSON. No external
//! metrics backend is wired up; this is a snapshot, not a scrape target.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Metrics {
    pub observations_received: AtomicU64,
    pub observations_deduplicated: AtomicU64,
    pub observations_applied: AtomicU64,
    pub out_of_order: AtomicU64,
    pub normalizer_dropped: AtomicU64,
    pub feedback_ops: AtomicU64,
    pub feedback_failed: AtomicU64,
    pub timeout_closes: AtomicU64,
    pub ingress_rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub observations_received: u64,
    pub observations_deduplicated: u64,
    pub observations_applied: u64,
    pub out_of_order: u64,
    pub normalizer_dropped: u64,
    pub feedback_ops: u64,
    pub feedback_failed: u64,
    pub timeout_closes: u64,
    pub ingress_rejected: u64,
}

impl Metrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            observations_received: self.observations_received.load(Ordering::Relaxed),
            observations_deduplicated: self.observations_deduplicated.load(Ordering::Relaxed),
            observations_applied: self.observations_applied.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            normalizer_dropped: self.normalizer_dropped.load(Ordering::Relaxed),
            feedback_ops: self.feedback_ops.load(Ordering::Relaxed),
            feedback_failed: self.feedback_failed.load(Ordering::Relaxed),
            timeout_closes: self.timeout_closes.load(Ordering::Relaxed),
            ingress_rejected: self.ingress_rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
