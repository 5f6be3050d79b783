// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface for the direct-call feedback path (relabel, correct-cell,
//! delete-span). The `feedback.updates` queue topic is the asynchronous
//! alternative; this is the primary one.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RelabelRequest {
    pub collector_id: String,
    pub camera_id: String,
    pub old_object_id: String,
    pub new_object_id: String,
}

/// `POST /feedback/relabel`
pub async fn relabel(State(s): State<Arc<AppState>>, Json(req): Json<RelabelRequest>) -> impl IntoResponse {
    let fut = s.feedback.relabel(&req.collector_id, &req.camera_id, &req.old_object_id, &req.new_object_id);
    match crate::with_deadline(s.config.op_deadline(), fut).await {
        Ok(Ok(outcome)) => Json(outcome).into_response(),
        Ok(Err(e)) | Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CorrectCellRequest {
    pub collector_id: String,
    pub camera_id: String,
    pub object_id: String,
    pub frame_ts_ms: u64,
    pub correct_cell_id: String,
}

/// `POST /feedback/correct_cell`
pub async fn correct_cell(
    State(s): State<Arc<AppState>>,
    Json(req): Json<CorrectCellRequest>,
) -> impl IntoResponse {
    let fut = s.feedback.correct_cell(
        &req.collector_id,
        &req.camera_id,
        &req.object_id,
        req.frame_ts_ms,
        &req.correct_cell_id,
    );
    match crate::with_deadline(s.config.op_deadline(), fut).await {
        Ok(Ok(outcome)) => Json(outcome).into_response(),
        Ok(Err(e)) | Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteSpanRequest {
    pub collector_id: String,
    pub camera_id: String,
    pub object_id: String,
    pub from_ts_ms: u64,
    pub to_ts_ms: u64,
}

#[derive(Debug, serde::Serialize)]
struct DeleteSpanResponse {
    status: &'static str,
}

/// `POST /feedback/delete_span`
pub async fn delete_span(
    State(s): State<Arc<AppState>>,
    Json(req): Json<DeleteSpanRequest>,
) -> impl IntoResponse {
    let fut =
        s.feedback.delete_span(&req.collector_id, &req.camera_id, &req.object_id, req.from_ts_ms, req.to_ts_ms);
    match crate::with_deadline(s.config.op_deadline(), fut).await {
        Ok(Ok(())) => Json(DeleteSpanResponse { status: "deleted" }).into_response(),
        Ok(Err(e)) | Err(e) => e.into_response(),
    }
}

#[cfg(test)]
#[path = "feedback_tests.rs"]
mod tests;
