// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered, at-least-once hand-off between ingestion and the dwell engine.
//! The in-process channel is the default and primary path for both
//! detections and feedback; the NATS-backed implementation (feature `nats`)
//! externalizes the same two logical topics (`raw.detections`,
//! `feedback.updates`) for multi-process deployments without changing how
//! the engine consumes them.

#[cfg(feature = "nats")]
pub mod nats;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::Observation;

/// Asynchronous feedback operation, mirrors `FeedbackProcessor`'s three
/// operations for the optional `feedback.updates` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedbackMessage {
    Relabel { collector_id: String, camera_id: String, old_object_id: String, new_object_id: String },
    CorrectCell {
        collector_id: String,
        camera_id: String,
        object_id: String,
        frame_ts_ms: u64,
        correct_cell_id: String,
    },
    DeleteSpan {
        collector_id: String,
        camera_id: String,
        object_id: String,
        from_ts_ms: u64,
        to_ts_ms: u64,
    },
}

/// Producer handle for the ingress queue. Producers never block — the
/// in-process implementation is an unbounded channel, and the NATS
/// implementation's `publish` is a fire-and-forget network call.
#[derive(Clone)]
pub struct LocalQueue {
    observations_tx: mpsc::UnboundedSender<Observation>,
    feedback_tx: mpsc::UnboundedSender<FeedbackMessage>,
}

/// Consumer-side receiver for raw detections, owned by exactly one dwell
/// engine loop per the single-consumer-per-partition Non-goal.
pub struct ObservationReceiver(mpsc::UnboundedReceiver<Observation>);

/// Consumer-side receiver for asynchronous feedback operations.
pub struct FeedbackReceiver(mpsc::UnboundedReceiver<FeedbackMessage>);

impl LocalQueue {
    pub fn new() -> (Self, ObservationReceiver, FeedbackReceiver) {
        let (observations_tx, observations_rx) = mpsc::unbounded_channel();
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        (
            Self { observations_tx, feedback_tx },
            ObservationReceiver(observations_rx),
            FeedbackReceiver(feedback_rx),
        )
    }

    pub fn publish_observation(&self, obs: Observation) -> anyhow::Result<()> {
        self.observations_tx.send(obs).map_err(|e| anyhow::anyhow!("queue closed: {e}"))
    }

    pub fn publish_feedback(&self, msg: FeedbackMessage) -> anyhow::Result<()> {
        self.feedback_tx.send(msg).map_err(|e| anyhow::anyhow!("queue closed: {e}"))
    }
}

impl ObservationReceiver {
    pub async fn recv(&mut self) -> Option<Observation> {
        self.0.recv().await
    }
}

impl FeedbackReceiver {
    pub async fn recv(&mut self) -> Option<FeedbackMessage> {
        self.0.recv().await
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
