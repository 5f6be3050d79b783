// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed persistence for object state, cell aggregates, timelines, the
//! recent-events ring, and the feedback audit log.
//!
//! Backed by sharded `RwLock<HashMap<...>>` namespaces with per-entry TTL,
//! the same shape as `SessionEntry`/`MuxState` — no external database is
//! required: durability across a process restart isn't a goal here, so
//! TTL-bounded in-process state is the whole contract.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::model::{
    CellAggregateView, CellKey, Contribution, FeedbackAuditEntry, ObjectKey, ObjectState,
    PartitionKey, RecentEvent, TimelineEntry,
};

/// Wall-clock milliseconds since the Unix epoch.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

struct TtlEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> TtlEntry<V> {
    fn fresh(value: V, ttl: Duration) -> Self {
        Self { value, expires_at: Instant::now() + ttl }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// The state store. One instance is shared (behind an `Arc`) across the
/// ingress, engine, feedback, sweeper, and query components.
pub struct StateStore {
    ttl: Duration,
    recent_cap: usize,
    timeline_cap: usize,

    object_state: RwLock<HashMap<ObjectKey, TtlEntry<ObjectState>>>,
    cell_aggregates: RwLock<HashMap<CellKey, TtlEntry<HashMap<String, Contribution>>>>,
    timelines: RwLock<HashMap<ObjectKey, TtlEntry<VecDeque<TimelineEntry>>>>,
    recent_events: RwLock<VecDeque<RecentEvent>>,
    feedback_audit: RwLock<Vec<FeedbackAuditEntry>>,

    /// Per-object async locks giving the feedback processor and the dwell
    /// engine cross-namespace atomicity on a given object key, without
    /// requiring an external transactional store.
    object_locks: RwLock<HashMap<ObjectKey, Arc<Mutex<()>>>>,
}

impl StateStore {
    pub fn new(ttl: Duration, recent_cap: usize, timeline_cap: usize) -> Self {
        Self {
            ttl,
            recent_cap,
            timeline_cap,
            object_state: RwLock::new(HashMap::new()),
            cell_aggregates: RwLock::new(HashMap::new()),
            timelines: RwLock::new(HashMap::new()),
            recent_events: RwLock::new(VecDeque::new()),
            feedback_audit: RwLock::new(Vec::new()),
            object_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Acquire the per-object lock, serializing engine writes and feedback
    /// operations for this object key.
    pub async fn lock_object(&self, key: &ObjectKey) -> OwnedMutexGuard<()> {
        let existing = self.object_locks.read().await.get(key).cloned();
        let mutex = match existing {
            Some(m) => m,
            None => {
                let mut guard = self.object_locks.write().await;
                guard.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
            }
        };
        mutex.lock_owned().await
    }

    // -- ObjectState ----------------------------------------------------------

    pub async fn get_object_state(&self, key: &ObjectKey) -> Option<ObjectState> {
        let map = self.object_state.read().await;
        map.get(key).filter(|e| !e.is_expired()).map(|e| e.value.clone())
    }

    pub async fn set_object_state(&self, key: &ObjectKey, state: ObjectState) {
        let mut map = self.object_state.write().await;
        map.insert(key.clone(), TtlEntry::fresh(state, self.ttl));
    }

    pub async fn delete_object_state(&self, key: &ObjectKey) {
        self.object_state.write().await.remove(key);
    }

    /// Keys of all active (non-null `current_cell`) objects whose
    /// `last_seen_ts_ms` is older than `now - timeout_ms`. Used by the
    /// timeout sweeper; each returned key still needs its own per-object
    /// lock before being acted on, since this snapshot can go stale
    /// immediately under concurrent engine writes.
    pub async fn stale_object_keys(&self, now: u64, timeout_ms: u64) -> Vec<ObjectKey> {
        let map = self.object_state.read().await;
        map.iter()
            .filter(|(_, e)| !e.is_expired())
            .filter(|(_, e)| e.value.is_active())
            .filter(|(_, e)| now.saturating_sub(e.value.last_seen_ts_ms) > timeout_ms)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// All active (non-null `current_cell`) objects in a partition, paired
    /// with their object id.
    pub async fn list_active_states(&self, partition: &PartitionKey) -> Vec<(String, ObjectState)> {
        let map = self.object_state.read().await;
        map.iter()
            .filter(|(k, e)| &k.partition == partition && !e.is_expired() && e.value.is_active())
            .map(|(k, e)| (k.object_id.clone(), e.value.clone()))
            .collect()
    }

    // -- CellAggregate ----------------------------------------------------------

    /// Accumulate `dwell_ms` into `object_id`'s contribution to `cell`. Each
    /// call adds a new closed span's dwell on top of any prior contribution.
    pub async fn add_contribution(&self, cell: &CellKey, object_id: &str, dwell_ms: u64) {
        let mut map = self.cell_aggregates.write().await;
        let entry = map
            .entry(cell.clone())
            .and_modify(|e| {
                if e.is_expired() {
                    e.value.clear();
                }
                e.expires_at = Instant::now() + self.ttl;
            })
            .or_insert_with(|| TtlEntry::fresh(HashMap::new(), self.ttl));
        let contribution = entry.value.entry(object_id.to_owned()).or_default();
        contribution.dwell_ms += dwell_ms;
    }

    /// Delete `object_id`'s entire contribution to `cell` (feedback-only).
    pub async fn remove_contribution(&self, cell: &CellKey, object_id: &str) {
        let mut map = self.cell_aggregates.write().await;
        if let Some(entry) = map.get_mut(cell) {
            entry.value.remove(object_id);
        }
    }

    pub async fn get_aggregate(&self, cell: &CellKey) -> Option<CellAggregateView> {
        let map = self.cell_aggregates.read().await;
        let entry = map.get(cell).filter(|e| !e.is_expired())?;
        let contributions: Vec<(String, Contribution)> =
            entry.value.iter().map(|(k, v)| (k.clone(), *v)).collect();
        Some(CellAggregateView::from_contributions(&cell.grid_cell_id, &contributions))
    }

    /// List all aggregates for a partition, sorted by `total_dwell_ms` desc.
    pub async fn list_aggregates(&self, partition: &PartitionKey) -> Vec<CellAggregateView> {
        let map = self.cell_aggregates.read().await;
        let mut views: Vec<CellAggregateView> = map
            .iter()
            .filter(|(k, e)| &k.partition == partition && !e.is_expired())
            .map(|(k, e)| {
                let contributions: Vec<(String, Contribution)> =
                    e.value.iter().map(|(obj, c)| (obj.clone(), *c)).collect();
                CellAggregateView::from_contributions(&k.grid_cell_id, &contributions)
            })
            .collect();
        views.sort_by(|a, b| b.total_dwell_ms.cmp(&a.total_dwell_ms));
        views
    }

    // -- Timeline ----------------------------------------------------------

    /// Prepend an entry, bounding the list at `timeline_cap` (oldest discarded).
    pub async fn prepend_entry(&self, key: &ObjectKey, entry: TimelineEntry) {
        let mut map = self.timelines.write().await;
        let slot = map
            .entry(key.clone())
            .and_modify(|e| e.expires_at = Instant::now() + self.ttl)
            .or_insert_with(|| TtlEntry::fresh(VecDeque::new(), self.ttl));
        slot.value.push_front(entry);
        slot.value.truncate(self.timeline_cap);
    }

    /// Newest-first timeline entries, at most `limit`.
    pub async fn read_entries(&self, key: &ObjectKey, limit: usize) -> Vec<TimelineEntry> {
        let map = self.timelines.read().await;
        map.get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Move the full timeline from `old` to `new`, discarding `old`'s slot.
    /// Used by relabel, which has already checked that `new` has no prior
    /// state or timeline.
    pub async fn move_timeline(&self, old: &ObjectKey, new: &ObjectKey) {
        let mut map = self.timelines.write().await;
        if let Some(entry) = map.remove(old) {
            map.insert(new.clone(), entry);
        }
    }

    pub async fn delete_timeline(&self, key: &ObjectKey) {
        self.timelines.write().await.remove(key);
    }

    // -- RecentEvents ----------------------------------------------------------

    pub async fn push_event(&self, event: RecentEvent) {
        let mut buf = self.recent_events.write().await;
        buf.push_back(event);
        while buf.len() > self.recent_cap {
            buf.pop_front();
        }
    }

    /// Most recently pushed events first, at most `limit`.
    pub async fn read_latest(&self, limit: usize) -> Vec<RecentEvent> {
        let buf = self.recent_events.read().await;
        buf.iter().rev().take(limit).cloned().collect()
    }

    // -- FeedbackAudit ----------------------------------------------------------

    pub async fn append_audit(&self, op: &str, payload: serde_json::Value, ts_ms: u64) {
        let mut log = self.feedback_audit.write().await;
        log.push(FeedbackAuditEntry { op: op.to_owned(), payload, ts_ms });
    }

    pub async fn audit_len(&self) -> usize {
        self.feedback_audit.read().await.len()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
