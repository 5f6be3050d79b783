// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Applies relabel / correct-cell / delete-span operations atomically
//! across object state, cell aggregates, and the object's timeline.

use std::sync::Arc;

use serde::Serialize;

use crate::engine::now_ms;
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::model::{CellKey, ObjectKey, RecentEvent, RecentEventKind, TimelineEntry, TimelineEntryKind};
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelabelOutcome {
    Applied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectCellOutcome {
    Applied,
    NoChange,
}

pub struct FeedbackProcessor {
    store: Arc<StateStore>,
    metrics: Arc<Metrics>,
}

impl FeedbackProcessor {
    pub fn new(store: Arc<StateStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Move `old_object_id`'s state, open-span dwell, and timeline onto
    /// `new_object_id`. The open span's dwell-so-far is carried forward as a
    /// closed contribution under the new id, computed at `now`, since the
    /// relabel itself is the event being recorded (unlike engine-driven
    /// closes, which never look past the last observed timestamp).
    pub async fn relabel(
        &self,
        collector_id: &str,
        camera_id: &str,
        old_object_id: &str,
        new_object_id: &str,
    ) -> Result<RelabelOutcome, ApiError> {
        let old_key = ObjectKey::new(collector_id, camera_id, old_object_id);
        let new_key = ObjectKey::new(collector_id, camera_id, new_object_id);

        let (_g1, _g2) = self.lock_pair(&old_key, &new_key).await;

        let old_state = match self.store.get_object_state(&old_key).await {
            Some(s) => s,
            None => {
                self.metrics.feedback_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Err(ApiError::NotFound);
            }
        };
        if self.store.get_object_state(&new_key).await.is_some() {
            self.metrics.feedback_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Err(ApiError::Conflict);
        }

        let now = now_ms();
        if let Some(ref cell) = old_state.current_cell {
            let cell_key = CellKey::new(collector_id, camera_id, cell);
            self.store.remove_contribution(&cell_key, old_object_id).await;
            let enter_ts = old_state.enter_ts_ms.unwrap_or(now);
            let open_dwell = now.saturating_sub(enter_ts);
            self.store.add_contribution(&cell_key, new_object_id, open_dwell).await;
        }

        self.store.set_object_state(&new_key, old_state.clone()).await;
        self.store.delete_object_state(&old_key).await;
        self.store.move_timeline(&old_key, &new_key).await;

        self.store
            .append_audit(
                "relabel",
                serde_json::json!({
                    "collector_id": collector_id,
                    "camera_id": camera_id,
                    "old_object_id": old_object_id,
                    "new_object_id": new_object_id,
                }),
                now,
            )
            .await;

        self.metrics.feedback_ops.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(RelabelOutcome::Applied)
    }

    /// Retroactively reassign the object's current cell as of `frame_ts_ms`,
    /// without touching `accumulated_ms` — the correction describes what the
    /// object was actually doing, not new elapsed time.
    pub async fn correct_cell(
        &self,
        collector_id: &str,
        camera_id: &str,
        object_id: &str,
        frame_ts_ms: u64,
        correct_cell_id: &str,
    ) -> Result<CorrectCellOutcome, ApiError> {
        let key = ObjectKey::new(collector_id, camera_id, object_id);
        let _guard = self.store.lock_object(&key).await;

        let mut state = match self.store.get_object_state(&key).await {
            Some(s) => s,
            None => {
                self.metrics.feedback_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Err(ApiError::NotFound);
            }
        };
        if state.current_cell.as_deref() == Some(correct_cell_id) {
            return Ok(CorrectCellOutcome::NoChange);
        }

        if let Some(ref original_cell) = state.current_cell {
            let cell_key = CellKey::new(collector_id, camera_id, original_cell);
            self.store.remove_contribution(&cell_key, object_id).await;
            self.store
                .prepend_entry(
                    &key,
                    TimelineEntry {
                        kind: TimelineEntryKind::Correct,
                        cell_id: original_cell.clone(),
                        from_ts_ms: state.enter_ts_ms.unwrap_or(frame_ts_ms),
                        to_ts_ms: Some(frame_ts_ms),
                        meta: Some(serde_json::json!({
                            "original": original_cell,
                            "corrected": correct_cell_id,
                        })),
                    },
                )
                .await;
        }

        state.current_cell = Some(correct_cell_id.to_owned());
        state.enter_ts_ms = Some(frame_ts_ms);
        state.last_seen_ts_ms = frame_ts_ms;
        self.store.set_object_state(&key, state).await;

        self.store
            .prepend_entry(
                &key,
                TimelineEntry {
                    kind: TimelineEntryKind::Enter,
                    cell_id: correct_cell_id.to_owned(),
                    from_ts_ms: frame_ts_ms,
                    to_ts_ms: None,
                    meta: Some(serde_json::json!({ "reason": "correction" })),
                },
            )
            .await;

        self.store
            .push_event(RecentEvent {
                kind: RecentEventKind::Enter,
                collector_id: collector_id.to_owned(),
                camera_id: camera_id.to_owned(),
                object_id: object_id.to_owned(),
                cell_id: correct_cell_id.to_owned(),
                ts_ms: frame_ts_ms,
            })
            .await;

        self.store
            .append_audit(
                "correct_cell",
                serde_json::json!({
                    "collector_id": collector_id,
                    "camera_id": camera_id,
                    "object_id": object_id,
                    "frame_ts_ms": frame_ts_ms,
                    "correct_cell_id": correct_cell_id,
                }),
                now_ms(),
            )
            .await;

        self.metrics.feedback_ops.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(CorrectCellOutcome::Applied)
    }

    /// Record a `delete` timeline entry marking `[from_ts_ms, to_ts_ms)` as a
    /// false-positive span. Audit-only: aggregates are not retroactively
    /// adjusted, matching the behavior this system was distilled from.
    pub async fn delete_span(
        &self,
        collector_id: &str,
        camera_id: &str,
        object_id: &str,
        from_ts_ms: u64,
        to_ts_ms: u64,
    ) -> Result<(), ApiError> {
        if from_ts_ms >= to_ts_ms {
            self.metrics.feedback_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Err(ApiError::InvalidSpan);
        }

        let key = ObjectKey::new(collector_id, camera_id, object_id);
        let _guard = self.store.lock_object(&key).await;

        self.store
            .prepend_entry(
                &key,
                TimelineEntry {
                    kind: TimelineEntryKind::Delete,
                    cell_id: "deleted".to_owned(),
                    from_ts_ms,
                    to_ts_ms: Some(to_ts_ms),
                    meta: Some(serde_json::json!({
                        "reason": "false_positive_removal",
                        "duration_ms": to_ts_ms - from_ts_ms,
                    })),
                },
            )
            .await;

        self.store
            .append_audit(
                "delete_span",
                serde_json::json!({
                    "collector_id": collector_id,
                    "camera_id": camera_id,
                    "object_id": object_id,
                    "from_ts_ms": from_ts_ms,
                    "to_ts_ms": to_ts_ms,
                }),
                now_ms(),
            )
            .await;

        self.metrics.feedback_ops.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    /// Lock both object keys in a fixed global order to avoid deadlocking
    /// against a concurrent relabel running in the opposite direction.
    async fn lock_pair(
        &self,
        a: &ObjectKey,
        b: &ObjectKey,
    ) -> (tokio::sync::OwnedMutexGuard<()>, tokio::sync::OwnedMutexGuard<()>) {
        if a < b {
            let g1 = self.store.lock_object(a).await;
            let g2 = self.store.lock_object(b).await;
            (g1, g2)
        } else {
            let g2 = self.store.lock_object(b).await;
            let g1 = self.store.lock_object(a).await;
            (g1, g2)
        }
    }
}

#[cfg(test)]
#[path = "feedback_tests.rs"]
mod tests;
