// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state handed to every transport handler.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::feedback::FeedbackProcessor;
use crate::metrics::Metrics;
use crate::queue::LocalQueue;
use crate::store::StateStore;

pub struct AppState {
    pub store: Arc<StateStore>,
    pub queue: LocalQueue,
    pub feedback: FeedbackProcessor,
    pub metrics: Arc<Metrics>,
    pub config: AppConfig,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: Arc<StateStore>,
        queue: LocalQueue,
        feedback: FeedbackProcessor,
        metrics: Arc<Metrics>,
        config: AppConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self { store, queue, feedback, metrics, config, shutdown }
    }
}
