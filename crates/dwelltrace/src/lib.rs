// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dwelltrace: tracks physical objects across a fixed grid of cells observed
//! by multiple camera streams, maintaining each object's current cell,
//! accumulated per-cell dwell time, and a chronological enter/leave timeline.

pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod queue;
pub mod state;
pub mod store;
pub mod sweeper;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::engine::{Dispatcher, DwellEngine};
use crate::error::ApiError;
use crate::feedback::FeedbackProcessor;
use crate::metrics::Metrics;
use crate::queue::{FeedbackMessage, FeedbackReceiver, LocalQueue};
use crate::state::AppState;
use crate::store::StateStore;
use crate::sweeper::TimeoutSweeper;

/// Run the dwelltrace server until shutdown.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let store = Arc::new(StateStore::new(config.ttl(), config.recent_events_cap, config.timeline_cap));
    let metrics = Arc::new(Metrics::default());
    let (queue, obs_rx, feedback_rx) = LocalQueue::new();

    let engine = Arc::new(DwellEngine::new(Arc::clone(&store), config.timeout(), Arc::clone(&metrics)));
    let dispatcher = Dispatcher::new(Arc::clone(&engine), config.dedup_window, shutdown.clone());
    tokio::spawn(Arc::clone(&dispatcher).run(obs_rx));

    let sweeper = TimeoutSweeper::new(
        Arc::clone(&store),
        config.timeout(),
        config.sweep_interval(),
        Arc::clone(&metrics),
    );
    tokio::spawn(sweeper.run(shutdown.clone()));

    spawn_feedback_queue_consumer(Arc::clone(&store), Arc::clone(&metrics), feedback_rx, shutdown.clone());

    #[cfg(feature = "nats")]
    {
        let nats_config = crate::queue::nats::NatsQueueConfig {
            url: config.nats_url.clone(),
            prefix: config.nats_prefix.clone(),
        };
        crate::queue::nats::spawn_subscriber(nats_config, queue.clone(), shutdown.clone()).await?;
    }

    let feedback = FeedbackProcessor::new(Arc::clone(&store), Arc::clone(&metrics));
    let state = Arc::new(AppState::new(store, queue, feedback, metrics, config, shutdown.clone()));
    let router = transport::build_router(state);

    tracing::info!("dwelltrace listening on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}

/// Apply asynchronous feedback messages (the `feedback.updates` topic) as
/// they arrive, independent of the synchronous HTTP feedback path.
fn spawn_feedback_queue_consumer(
    store: Arc<StateStore>,
    metrics: Arc<Metrics>,
    mut rx: FeedbackReceiver,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let processor = FeedbackProcessor::new(store, metrics);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    apply_feedback_message(&processor, msg).await;
                }
            }
        }
        tracing::info!("feedback queue consumer shutting down");
    });
}

async fn apply_feedback_message(processor: &FeedbackProcessor, msg: FeedbackMessage) {
    let result = match msg {
        FeedbackMessage::Relabel { collector_id, camera_id, old_object_id, new_object_id } => processor
            .relabel(&collector_id, &camera_id, &old_object_id, &new_object_id)
            .await
            .map(|_| ()),
        FeedbackMessage::CorrectCell { collector_id, camera_id, object_id, frame_ts_ms, correct_cell_id } => {
            processor
                .correct_cell(&collector_id, &camera_id, &object_id, frame_ts_ms, &correct_cell_id)
                .await
                .map(|_| ())
        }
        FeedbackMessage::DeleteSpan { collector_id, camera_id, object_id, from_ts_ms, to_ts_ms } => {
            processor.delete_span(&collector_id, &camera_id, &object_id, from_ts_ms, to_ts_ms).await
        }
    };

    if let Err(e) = result {
        tracing::warn!("queued feedback operation failed: {e}");
    }
}

/// Run `fut` under `deadline`, mapping elapsed time to `ERR_TIMEOUT` per the
/// externally triggered operation deadline policy.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, ApiError>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(deadline, fut).await.map_err(|_| ApiError::Timeout)
}
