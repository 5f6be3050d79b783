// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model: observations, object state, timelines, and aggregates.

use serde::{Deserialize, Serialize};

/// Identifies the ordering partition `(collector_id, camera_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub collector_id: String,
    pub camera_id: String,
}

impl PartitionKey {
    pub fn new(collector_id: impl Into<String>, camera_id: impl Into<String>) -> Self {
        Self { collector_id: collector_id.into(), camera_id: camera_id.into() }
    }

    pub fn as_str(&self) -> String {
        format!("{}:{}", self.collector_id, self.camera_id)
    }
}

/// Identifies a tracked object within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub partition: PartitionKey,
    pub object_id: String,
}

impl ObjectKey {
    pub fn new(collector_id: &str, camera_id: &str, object_id: &str) -> Self {
        Self {
            partition: PartitionKey::new(collector_id, camera_id),
            object_id: object_id.to_owned(),
        }
    }
}

/// Identifies a cell aggregate within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub partition: PartitionKey,
    pub grid_cell_id: String,
}

impl CellKey {
    pub fn new(collector_id: &str, camera_id: &str, grid_cell_id: &str) -> Self {
        Self {
            partition: PartitionKey::new(collector_id, camera_id),
            grid_cell_id: grid_cell_id.to_owned(),
        }
    }
}

/// Ingress unit produced by the normalizer and consumed by the dwell engine.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub event_id: String,
    pub collector_id: String,
    pub camera_id: String,
    pub object_id: String,
    pub grid_cell_id: String,
    pub ts_ms: u64,
}

impl Observation {
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(&self.collector_id, &self.camera_id)
    }

    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(&self.collector_id, &self.camera_id, &self.object_id)
    }
}

/// Live per-object state. One per `(collector, camera, object)`.
///
/// Invariants: `enter_ts_ms <= last_seen_ts_ms`; `current_cell.is_none() ==
/// enter_ts_ms.is_none()`; `accumulated_ms` never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ObjectState {
    pub current_cell: Option<String>,
    pub enter_ts_ms: Option<u64>,
    pub last_seen_ts_ms: u64,
    pub accumulated_ms: u64,
}

impl ObjectState {
    pub fn is_active(&self) -> bool {
        self.current_cell.is_some()
    }
}

/// One entry in an object's reverse-chronological timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    #[serde(rename = "type")]
    pub kind: TimelineEntryKind,
    pub cell_id: String,
    pub from_ts_ms: u64,
    pub to_ts_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEntryKind {
    Enter,
    Leave,
    Correct,
    Delete,
}

/// A single object's summed closed-span contribution to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contribution {
    pub dwell_ms: u64,
}

/// Derived, read-only view of a `CellAggregate`'s contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAggregateView {
    pub grid_cell_id: String,
    pub total_dwell_ms: u64,
    pub object_count: usize,
    pub avg_dwell_ms: u64,
    pub max_dwell_ms: u64,
    pub min_dwell_ms: u64,
}

impl CellAggregateView {
    pub fn from_contributions(grid_cell_id: &str, contributions: &[(String, Contribution)]) -> Self {
        let nonzero: Vec<u64> =
            contributions.iter().map(|(_, c)| c.dwell_ms).filter(|d| *d > 0).collect();
        let total: u64 = nonzero.iter().sum();
        let count = nonzero.len();
        let avg = if count > 0 { total / count as u64 } else { 0 };
        let max = nonzero.iter().copied().max().unwrap_or(0);
        let min = nonzero.iter().copied().min().unwrap_or(0);
        Self {
            grid_cell_id: grid_cell_id.to_owned(),
            total_dwell_ms: total,
            object_count: count,
            avg_dwell_ms: avg,
            min_dwell_ms: min,
            max_dwell_ms: max,
        }
    }
}

/// A bounded-FIFO entry covering ingestion/transition events across streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEvent {
    #[serde(rename = "type")]
    pub kind: RecentEventKind,
    pub collector_id: String,
    pub camera_id: String,
    pub object_id: String,
    pub cell_id: String,
    pub ts_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentEventKind {
    Enter,
    Exit,
    Move,
}

/// One entry in the append-only feedback audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAuditEntry {
    pub op: String,
    pub payload: serde_json::Value,
    pub ts_ms: u64,
}

/// Validate a grid cell id against `^G_\d{2}_\d{2}$` and that the coordinates
/// fall inside `W`x`H`.
pub fn validate_grid_cell(id: &str, w: u32, h: u32) -> bool {
    let Some(rest) = id.strip_prefix("G_") else { return false };
    let Some((x_str, y_str)) = rest.split_once('_') else { return false };
    if x_str.len() != 2 || y_str.len() != 2 {
        return false;
    }
    let (Ok(x), Ok(y)) = (x_str.parse::<u32>(), y_str.parse::<u32>()) else { return false };
    x < w && y < h
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
