// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the dwelltrace service.

pub mod feedback;
pub mod ingress;
pub mod query;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the axum `Router` with all dwelltrace routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/frames", post(ingress::post_frame))
        .route("/stats/cells", get(query::stats_cells))
        .route("/objects/active", get(query::active_objects))
        .route("/objects/{collector}/{camera}/{object}", get(query::object_detail))
        .route("/heatmap", get(query::heatmap))
        .route("/events/recent", get(query::recent_events))
        .route("/feedback/relabel", post(feedback::relabel))
        .route("/feedback/correct_cell", post(feedback::correct_cell))
        .route("/feedback/delete_span", post(feedback::delete_span))
        .route("/health", get(query::health))
        .route("/status", get(query::status))
        .route("/metrics", get(query::metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
