// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collector-facing ingestion endpoint.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::normalizer::{self, DetectionPayload};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub frame_id: String,
    pub accepted: usize,
    pub dropped: usize,
}

/// `POST /frames` — normalize a per-frame detection payload and enqueue one
/// observation per accepted object.
pub async fn post_frame(
    State(s): State<Arc<AppState>>,
    Json(payload): Json<DetectionPayload>,
) -> impl IntoResponse {
    s.metrics.observations_received.fetch_add(payload.objects.len() as u64, Ordering::Relaxed);

    let (observations, report) =
        match normalizer::normalize(&payload, s.config.grid_w, s.config.grid_h) {
            Ok(result) => result,
            Err(e) => {
                s.metrics.ingress_rejected.fetch_add(1, Ordering::Relaxed);
                return e.into_response();
            }
        };
    s.metrics.normalizer_dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);

    for obs in observations {
        if let Err(e) = s.queue.publish_observation(obs) {
            tracing::error!("failed to publish observation: {e}");
            return ApiError::StoreUnavailable.into_response();
        }
    }

    Json(IngestResponse {
        status: "accepted",
        frame_id: payload.frame_id,
        accepted: report.accepted,
        dropped: report.dropped,
    })
    .into_response()
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod tests;
