// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validates per-frame detection payloads and explodes each into one
//! `Observation` per detected object.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::model::{validate_grid_cell, Observation};

/// Raw per-frame detection payload posted by a collector.
#[derive(Debug, Deserialize)]
pub struct DetectionPayload {
    pub collector_id: String,
    pub camera_id: String,
    pub timestamp_ms: u64,
    pub frame_id: String,
    pub objects: Vec<DetectedObject>,
}

/// A single detected object within a frame. `class`, `confidence`, and
/// `bbox` are accepted for schema compatibility but dropped after
/// validation — the dwell engine is class-agnostic.
#[derive(Debug, Deserialize)]
pub struct DetectedObject {
    pub object_id: String,
    pub grid_cell_id: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub bbox: Option<serde_json::Value>,
}

/// Per-frame drop accounting, surfaced to the ingress HTTP response and
/// `/metrics`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub dropped: usize,
}

/// Validate `payload` and explode it into one `Observation` per valid
/// object. Invalid objects are dropped and counted; a structurally invalid
/// frame is rejected wholesale with `ERR_INVALID_PAYLOAD`.
pub fn normalize(
    payload: &DetectionPayload,
    grid_w: u32,
    grid_h: u32,
) -> Result<(Vec<Observation>, NormalizeReport), ApiError> {
    if payload.collector_id.is_empty() || payload.camera_id.is_empty() || payload.frame_id.is_empty()
    {
        return Err(ApiError::InvalidPayload);
    }

    let mut observations = Vec::with_capacity(payload.objects.len());
    let mut report = NormalizeReport::default();

    for obj in &payload.objects {
        if obj.object_id.is_empty() || !validate_grid_cell(&obj.grid_cell_id, grid_w, grid_h) {
            report.dropped += 1;
            continue;
        }

        let event_id = compute_event_id(
            &payload.collector_id,
            &payload.camera_id,
            payload.timestamp_ms,
            &obj.object_id,
        );

        observations.push(Observation {
            event_id,
            collector_id: payload.collector_id.clone(),
            camera_id: payload.camera_id.clone(),
            object_id: obj.object_id.clone(),
            grid_cell_id: obj.grid_cell_id.clone(),
            ts_ms: payload.timestamp_ms,
        });
        report.accepted += 1;
    }

    Ok((observations, report))
}

/// Deterministic event id: lowercase hex of
/// `sha256(collector_id|camera_id|timestamp_ms|object_id)`, enabling
/// downstream dedup by `event_id` regardless of delivery order.
fn compute_event_id(collector_id: &str, camera_id: &str, timestamp_ms: u64, object_id: &str) -> String {
    let input = format!("{collector_id}|{camera_id}|{timestamp_ms}|{object_id}");
    let digest = Sha256::digest(input.as_bytes());
    to_hex(&digest)
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
