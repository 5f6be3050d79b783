// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only projections over object state, cell aggregates, and recent
//! events. Query handlers never mutate the store.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::engine::now_ms;
use crate::error::ApiError;
use crate::model::{
    CellAggregateView, CellKey, ObjectKey, ObjectState, PartitionKey, RecentEvent, TimelineEntry,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CellsQuery {
    pub collector: String,
    pub camera: String,
    #[serde(default)]
    pub cell: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CellsResponse {
    pub cells: Vec<CellAggregateView>,
    pub timestamp: u64,
}

/// `GET /stats/cells?collector&camera[&cell]`
pub async fn stats_cells(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CellsQuery>,
) -> impl IntoResponse {
    let partition = PartitionKey::new(&q.collector, &q.camera);

    let cells = match q.cell {
        Some(ref cell_id) => {
            let key = CellKey::new(&q.collector, &q.camera, cell_id);
            s.store.get_aggregate(&key).await.into_iter().collect()
        }
        None => s.store.list_aggregates(&partition).await,
    };

    Json(CellsResponse { cells, timestamp: now_ms() }).into_response()
}

#[derive(Debug, Serialize)]
pub struct ObjectDetailResponse {
    pub state: ObjectState,
    pub timeline: Vec<TimelineEntry>,
    pub timestamp: u64,
}

/// `GET /objects/{collector}/{camera}/{object}`
pub async fn object_detail(
    State(s): State<Arc<AppState>>,
    Path((collector, camera, object)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let key = ObjectKey::new(&collector, &camera, &object);
    let Some(state) = s.store.get_object_state(&key).await else {
        return ApiError::NotFound.into_response();
    };
    let timeline = s.store.read_entries(&key, s.config.timeline_cap).await;
    Json(ObjectDetailResponse { state, timeline, timestamp: now_ms() }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct HeatmapQuery {
    pub collector: String,
    pub camera: String,
    pub window_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct GridSize {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Serialize)]
pub struct HeatmapCell {
    pub grid_cell_id: String,
    pub x: u32,
    pub y: u32,
    pub dwell_ms: u64,
    pub object_count: usize,
    pub intensity: f64,
}

#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub grid_size: GridSize,
    pub cells: Vec<HeatmapCell>,
    pub timestamp: u64,
    pub window_ms: u64,
}

/// `GET /heatmap?collector&camera&window_ms` — `window_ms=0` is reserved for
/// a future real-time projection and always yields an empty cell list.
pub async fn heatmap(
    State(s): State<Arc<AppState>>,
    Query(q): Query<HeatmapQuery>,
) -> impl IntoResponse {
    let grid_size = GridSize { w: s.config.grid_w, h: s.config.grid_h };

    if q.window_ms == 0 {
        return Json(HeatmapResponse { grid_size, cells: vec![], timestamp: now_ms(), window_ms: 0 })
            .into_response();
    }

    let partition = PartitionKey::new(&q.collector, &q.camera);
    let aggregates = s.store.list_aggregates(&partition).await;
    let max_dwell = aggregates.iter().map(|a| a.total_dwell_ms).max().unwrap_or(0);

    let cells = aggregates
        .into_iter()
        .filter_map(|a| {
            let (x, y) = parse_cell_coords(&a.grid_cell_id)?;
            let intensity = if max_dwell > 0 { a.total_dwell_ms as f64 / max_dwell as f64 } else { 0.0 };
            Some(HeatmapCell {
                grid_cell_id: a.grid_cell_id,
                x,
                y,
                dwell_ms: a.total_dwell_ms,
                object_count: a.object_count,
                intensity,
            })
        })
        .collect();

    Json(HeatmapResponse { grid_size, cells, timestamp: now_ms(), window_ms: q.window_ms })
        .into_response()
}

fn parse_cell_coords(id: &str) -> Option<(u32, u32)> {
    let rest = id.strip_prefix("G_")?;
    let (x_str, y_str) = rest.split_once('_')?;
    Some((x_str.parse().ok()?, y_str.parse().ok()?))
}

#[derive(Debug, Deserialize)]
pub struct ActiveObjectsQuery {
    pub collector: String,
    pub camera: String,
}

#[derive(Debug, Serialize)]
pub struct ActiveObject {
    pub object_id: String,
    pub state: ObjectState,
}

#[derive(Debug, Serialize)]
pub struct ActiveObjectsResponse {
    pub objects: Vec<ActiveObject>,
    pub timestamp: u64,
}

/// `GET /objects/active?collector&camera`
pub async fn active_objects(
    State(s): State<Arc<AppState>>,
    Query(q): Query<ActiveObjectsQuery>,
) -> impl IntoResponse {
    let partition = PartitionKey::new(&q.collector, &q.camera);
    let objects = s
        .store
        .list_active_states(&partition)
        .await
        .into_iter()
        .map(|(object_id, state)| ActiveObject { object_id, state })
        .collect();

    Json(ActiveObjectsResponse { objects, timestamp: now_ms() }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RecentEventsQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: usize,
}

fn default_recent_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct RecentEventsResponse {
    pub events: Vec<RecentEvent>,
    pub timestamp: u64,
}

/// `GET /events/recent?limit`
pub async fn recent_events(
    State(s): State<Arc<AppState>>,
    Query(q): Query<RecentEventsQuery>,
) -> impl IntoResponse {
    let events = s.store.read_latest(q.limit).await;
    Json(RecentEventsResponse { events, timestamp: now_ms() }).into_response()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: u64,
}

/// `GET /health` — liveness only.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "running", timestamp: now_ms() })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub grid_w: u32,
    pub grid_h: u32,
    pub timeout_ms: u64,
    pub timestamp: u64,
}

/// `GET /status` — consumer/engine configuration snapshot.
pub async fn status(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "running",
        grid_w: s.config.grid_w,
        grid_h: s.config.grid_h,
        timeout_ms: s.config.timeout_ms,
        timestamp: now_ms(),
    })
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub counters: crate::metrics::MetricsSnapshot,
    pub timestamp: u64,
}

/// `GET /metrics` — process-level counters as JSON.
pub async fn metrics(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(MetricsResponse { counters: s.metrics.snapshot(), timestamp: now_ms() })
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
