// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS-backed externalization of the ingress queue topics
//! (`raw.detections`, `feedback.updates`), for multi-process deployments.
//! Disabled by default; enabled with the `nats` feature.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::Observation;
use crate::queue::{FeedbackMessage, LocalQueue};

/// Connection settings for the NATS-backed queue.
pub struct NatsQueueConfig {
    pub url: String,
    pub prefix: String,
}

/// Publishes observations and feedback messages to NATS subjects, keyed by
/// partition so a downstream consumer group can preserve per-partition
/// order.
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub async fn connect(config: &NatsQueueConfig) -> anyhow::Result<Self> {
        let opts = async_nats::ConnectOptions::new().retry_on_initial_connect();
        info!(url = %config.url, prefix = %config.prefix, "connecting NATS ingress publisher");
        let client = opts.connect(&config.url).await?;
        info!("NATS ingress publisher connected");
        Ok(Self { client, prefix: config.prefix.clone() })
    }

    pub async fn publish_observation(&self, obs: &Observation) -> anyhow::Result<()> {
        let subject = format!("{}.raw.detections.{}:{}", self.prefix, obs.collector_id, obs.camera_id);
        let payload = serde_json::to_vec(obs)?;
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    pub async fn publish_feedback(&self, msg: &FeedbackMessage) -> anyhow::Result<()> {
        let subject = format!("{}.feedback.updates", self.prefix);
        let payload = serde_json::to_vec(msg)?;
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }
}

/// Subscribe to both topics and forward delivered messages into the local
/// in-process queue, so engine/feedback code never has to know which
/// transport produced the message.
pub async fn spawn_subscriber(
    config: NatsQueueConfig,
    local: LocalQueue,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let opts = async_nats::ConnectOptions::new().retry_on_initial_connect();
    let client = opts.connect(&config.url).await?;
    info!(url = %config.url, prefix = %config.prefix, "NATS ingress subscriber connected");

    let mut detections_sub = client.subscribe(format!("{}.raw.detections.>", config.prefix)).await?;
    let mut feedback_sub = client.subscribe(format!("{}.feedback.updates", config.prefix)).await?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = detections_sub.next() => {
                    let Some(msg) = msg else { break };
                    forward_observation(&msg.payload, &local);
                }
                msg = feedback_sub.next() => {
                    let Some(msg) = msg else { break };
                    forward_feedback(&msg.payload, &local);
                }
            }
        }
        debug!("NATS ingress subscriber shutting down");
    });

    Ok(())
}

/// Decode a `raw.detections` payload and forward it onto the local queue.
/// Malformed payloads are logged and dropped rather than killing the
/// subscriber loop.
fn forward_observation(payload: &[u8], local: &LocalQueue) {
    match serde_json::from_slice::<Observation>(payload) {
        Ok(obs) => {
            if let Err(e) = local.publish_observation(obs) {
                warn!("failed to forward NATS observation locally: {e}");
            }
        }
        Err(e) => debug!("dropping malformed NATS observation: {e}"),
    }
}

/// Decode a `feedback.updates` payload and forward it onto the local queue.
fn forward_feedback(payload: &[u8], local: &LocalQueue) {
    match serde_json::from_slice::<FeedbackMessage>(payload) {
        Ok(fb) => {
            if let Err(e) = local.publish_feedback(fb) {
                warn!("failed to forward NATS feedback locally: {e}");
            }
        }
        Err(e) => debug!("dropping malformed NATS feedback message: {e}"),
    }
}

#[cfg(test)]
#[path = "nats_tests.rs"]
mod tests;
