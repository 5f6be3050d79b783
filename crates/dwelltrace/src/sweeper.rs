// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic scan that closes spans for objects not seen within the dwell
//! timeout, independent of whether a new observation ever arrives for them.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::now_ms;
use crate::metrics::Metrics;
use crate::model::{CellKey, ObjectKey, RecentEvent, RecentEventKind, TimelineEntry, TimelineEntryKind};
use crate::store::StateStore;

pub struct TimeoutSweeper {
    store: Arc<StateStore>,
    timeout: Duration,
    tick: Duration,
    metrics: Arc<Metrics>,
}

impl TimeoutSweeper {
    pub fn new(store: Arc<StateStore>, timeout: Duration, tick: Duration, metrics: Arc<Metrics>) -> Self {
        Self { store, timeout, tick, metrics }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.sweep_once().await;
        }
        info!("timeout sweeper shutting down");
    }

    async fn sweep_once(&self) {
        let now = now_ms();
        let timeout_ms = self.timeout.as_millis() as u64;

        for key in self.store.stale_object_keys(now, timeout_ms).await {
            self.close_if_stale(&key, now, timeout_ms).await;
        }
    }

    async fn close_if_stale(&self, key: &ObjectKey, now: u64, timeout_ms: u64) {
        let _guard = self.store.lock_object(key).await;
        let Some(mut state) = self.store.get_object_state(key).await else { return };
        let Some(ref cell) = state.current_cell else { return };
        if now.saturating_sub(state.last_seen_ts_ms) <= timeout_ms {
            return;
        }

        let Some(enter_ts) = state.enter_ts_ms else { return };
        let dwell = state.last_seen_ts_ms.saturating_sub(enter_ts);
        let cell_key = CellKey::new(&key.partition.collector_id, &key.partition.camera_id, cell);
        self.store.add_contribution(&cell_key, &key.object_id, dwell).await;
        self.store
            .prepend_entry(
                key,
                TimelineEntry {
                    kind: TimelineEntryKind::Leave,
                    cell_id: cell.clone(),
                    from_ts_ms: enter_ts,
                    to_ts_ms: Some(state.last_seen_ts_ms),
                    meta: Some(serde_json::json!({ "reason": "timeout" })),
                },
            )
            .await;
        self.store
            .push_event(RecentEvent {
                kind: RecentEventKind::Exit,
                collector_id: key.partition.collector_id.clone(),
                camera_id: key.partition.camera_id.clone(),
                object_id: key.object_id.clone(),
                cell_id: cell.clone(),
                ts_ms: state.last_seen_ts_ms,
            })
            .await;

        state.current_cell = None;
        state.enter_ts_ms = None;
        self.store.set_object_state(key, state).await;

        self.metrics.timeout_closes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
