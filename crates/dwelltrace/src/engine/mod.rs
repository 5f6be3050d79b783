// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dwell-time state machine: a per-partition cooperative consumer that
//! applies each observation to `ObjectState`, updates cell aggregates and
//! timelines, and emits `RecentEvent`s.

mod dedup;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::metrics::Metrics;
use crate::model::{
    CellKey, Observation, ObjectKey, ObjectState, PartitionKey, RecentEvent, RecentEventKind,
    TimelineEntry, TimelineEntryKind,
};
use crate::queue::ObservationReceiver;
use crate::store::{epoch_ms, StateStore};

use dedup::DedupWindow;

/// Minimum spacing between consecutive `move` recent-events pushed for the
/// same object while it sits in one cell, so a fast-ticking stream doesn't
/// flood the recent-events ring with redundant entries.
const MOVE_EVENT_THROTTLE_MS: u64 = 1_000;

/// Outcome of applying one observation, used for metrics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Duplicate,
    FirstSighting,
    SameCellTick,
    Transition,
    TimeoutThenReenter,
    OutOfOrder,
}

/// The dwell engine's processing core, independent of how observations are
/// delivered. One `DwellEngine` is shared (via `Arc`) by every partition
/// worker.
pub struct DwellEngine {
    pub store: Arc<StateStore>,
    pub timeout: Duration,
    pub metrics: Arc<Metrics>,
}

impl DwellEngine {
    pub fn new(store: Arc<StateStore>, timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self { store, timeout, metrics }
    }

    /// Apply one observation under the given partition worker's dedup
    /// window and move-throttle tracker. Idempotent on `event_id` within
    /// the window.
    pub async fn process(
        &self,
        seen: &mut DedupWindow,
        last_move_push: &mut HashMap<String, u64>,
        obs: Observation,
    ) -> Outcome {
        if seen.check_and_insert(&obs.event_id) {
            self.metrics.observations_deduplicated.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Outcome::Duplicate;
        }

        let key = obs.object_key();
        let _guard = self.store.lock_object(&key).await;
        let prior = self.store.get_object_state(&key).await;

        let outcome = match prior {
            None => {
                self.first_sighting(&key, &obs).await;
                Outcome::FirstSighting
            }
            Some(s) => {
                if obs.ts_ms < s.last_seen_ts_ms {
                    self.metrics.out_of_order.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    warn!(
                        object_id = %obs.object_id,
                        observed_ts = obs.ts_ms,
                        watermark = s.last_seen_ts_ms,
                        "rejecting out-of-order observation"
                    );
                    return Outcome::OutOfOrder;
                }

                let gap = obs.ts_ms - s.last_seen_ts_ms;
                if gap > self.timeout.as_millis() as u64 {
                    self.implicit_close(&key, &s, "timeout").await;
                    self.first_sighting_with_accumulated(&key, &obs, s.accumulated_ms).await;
                    Outcome::TimeoutThenReenter
                } else if s.current_cell.as_deref() == Some(obs.grid_cell_id.as_str()) {
                    self.same_cell_tick(&key, &s, &obs, last_move_push).await;
                    Outcome::SameCellTick
                } else {
                    self.transition(&key, &s, &obs).await;
                    Outcome::Transition
                }
            }
        };

        self.metrics.observations_applied.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        outcome
    }

    async fn first_sighting(&self, key: &ObjectKey, obs: &Observation) {
        self.first_sighting_with_accumulated(key, obs, 0).await;
    }

    async fn first_sighting_with_accumulated(&self, key: &ObjectKey, obs: &Observation, accumulated_ms: u64) {
        let state = ObjectState {
            current_cell: Some(obs.grid_cell_id.clone()),
            enter_ts_ms: Some(obs.ts_ms),
            last_seen_ts_ms: obs.ts_ms,
            accumulated_ms,
        };
        self.store.set_object_state(key, state).await;
        self.store
            .prepend_entry(
                key,
                TimelineEntry {
                    kind: TimelineEntryKind::Enter,
                    cell_id: obs.grid_cell_id.clone(),
                    from_ts_ms: obs.ts_ms,
                    to_ts_ms: None,
                    meta: None,
                },
            )
            .await;
        self.push_event(obs, RecentEventKind::Enter, &obs.grid_cell_id, obs.ts_ms).await;
    }

    /// Close `state.current_cell` at `state.last_seen_ts_ms` (never at
    /// `now`), crediting the aggregate with exactly what was observed.
    async fn implicit_close(&self, key: &ObjectKey, state: &ObjectState, reason: &str) {
        let Some(ref cell) = state.current_cell else { return };
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
                    meta: Some(serde_json::json!({ "reason": reason })),
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
    }

    async fn same_cell_tick(
        &self,
        key: &ObjectKey,
        state: &ObjectState,
        obs: &Observation,
        last_move_push: &mut HashMap<String, u64>,
    ) {
        let updated = ObjectState { last_seen_ts_ms: obs.ts_ms, ..state.clone() };
        self.store.set_object_state(key, updated).await;

        let should_push = last_move_push
            .get(&key.object_id)
            .map(|&last| obs.ts_ms.saturating_sub(last) >= MOVE_EVENT_THROTTLE_MS)
            .unwrap_or(true);
        if should_push {
            self.push_event(obs, RecentEventKind::Move, &obs.grid_cell_id, obs.ts_ms).await;
            last_move_push.insert(key.object_id.clone(), obs.ts_ms);
        }
    }

    async fn transition(&self, key: &ObjectKey, state: &ObjectState, obs: &Observation) {
        let Some(ref old_cell) = state.current_cell else {
            // Defensive: a non-null current_cell is the precondition for a
            // transition; if it's absent, treat this as a fresh sighting.
            self.first_sighting(key, obs).await;
            return;
        };
        let Some(enter_ts) = state.enter_ts_ms else {
            self.first_sighting(key, obs).await;
            return;
        };

        // Closed on the new observation's timestamp, not last_seen_ts_ms,
        // so contiguous tracks account for every millisecond.
        let dwell = obs.ts_ms.saturating_sub(enter_ts);
        let cell_key = CellKey::new(&key.partition.collector_id, &key.partition.camera_id, old_cell);
        self.store.add_contribution(&cell_key, &key.object_id, dwell).await;
        self.store
            .prepend_entry(
                key,
                TimelineEntry {
                    kind: TimelineEntryKind::Leave,
                    cell_id: old_cell.clone(),
                    from_ts_ms: enter_ts,
                    to_ts_ms: Some(obs.ts_ms),
                    meta: None,
                },
            )
            .await;

        let new_state = ObjectState {
            current_cell: Some(obs.grid_cell_id.clone()),
            enter_ts_ms: Some(obs.ts_ms),
            last_seen_ts_ms: obs.ts_ms,
            accumulated_ms: state.accumulated_ms + dwell,
        };
        self.store.set_object_state(key, new_state).await;
        self.store
            .prepend_entry(
                key,
                TimelineEntry {
                    kind: TimelineEntryKind::Enter,
                    cell_id: obs.grid_cell_id.clone(),
                    from_ts_ms: obs.ts_ms,
                    to_ts_ms: None,
                    meta: None,
                },
            )
            .await;

        self.push_event(obs, RecentEventKind::Exit, old_cell, obs.ts_ms).await;
        self.push_event(obs, RecentEventKind::Enter, &obs.grid_cell_id, obs.ts_ms).await;
    }

    async fn push_event(&self, obs: &Observation, kind: RecentEventKind, cell_id: &str, ts_ms: u64) {
        self.store
            .push_event(RecentEvent {
                kind,
                collector_id: obs.collector_id.clone(),
                camera_id: obs.camera_id.clone(),
                object_id: obs.object_id.clone(),
                cell_id: cell_id.to_owned(),
                ts_ms,
            })
            .await;
    }
}

/// Fans observations out to one sequential worker task per partition: strict
/// order within a partition, no ordering guarantee across partitions.
pub struct Dispatcher {
    engine: Arc<DwellEngine>,
    dedup_window: usize,
    workers: tokio::sync::Mutex<HashMap<PartitionKey, tokio::sync::mpsc::UnboundedSender<Observation>>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(engine: Arc<DwellEngine>, dedup_window: usize, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self { engine, dedup_window, workers: tokio::sync::Mutex::new(HashMap::new()), shutdown })
    }

    /// Drive the dispatcher loop until `mut rx` closes or shutdown fires.
    pub async fn run(self: Arc<Self>, mut rx: ObservationReceiver) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                obs = rx.recv() => {
                    let Some(obs) = obs else { break };
                    self.dispatch(obs).await;
                }
            }
        }
        info!("dwell engine dispatcher shutting down");
    }

    async fn dispatch(&self, obs: Observation) {
        let partition = obs.partition();
        let tx = {
            let mut workers = self.workers.lock().await;
            workers
                .entry(partition.clone())
                .or_insert_with(|| self.spawn_partition_worker(partition.clone()))
                .clone()
        };
        if tx.send(obs).is_err() {
            warn!(partition = %partition.as_str(), "partition worker channel closed unexpectedly");
        }
    }

    fn spawn_partition_worker(
        &self,
        partition: PartitionKey,
    ) -> tokio::sync::mpsc::UnboundedSender<Observation> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Observation>();
        let engine = Arc::clone(&self.engine);
        let dedup_window = self.dedup_window;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut seen = DedupWindow::new(dedup_window);
            let mut last_move_push: HashMap<String, u64> = HashMap::new();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    obs = rx.recv() => {
                        let Some(obs) = obs else { break };
                        engine.process(&mut seen, &mut last_move_push, obs).await;
                    }
                }
            }
            info!(partition = %partition.as_str(), "partition worker shutting down");
        });

        tx
    }
}

/// Current wall-clock milliseconds, used by feedback (relabel closes open
/// spans "at now") and by the sweeper (gap computation against `now`).
pub fn now_ms() -> u64 {
    epoch_ms()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
