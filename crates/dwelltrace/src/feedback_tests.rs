// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use anyhow::Context;

use super::*;
use crate::model::ObjectState;

fn processor() -> (FeedbackProcessor, Arc<StateStore>) {
    let store = Arc::new(StateStore::new(Duration::from_secs(86_400), 100, 100));
    let metrics = Arc::new(Metrics::default());
    (FeedbackProcessor::new(Arc::clone(&store), metrics), store)
}

#[tokio::test]
async fn relabel_not_found_when_old_object_missing() {
    let (fb, _store) = processor();
    let err = fb.relabel("c1", "cam1", "A", "B").await.unwrap_err();
    assert_eq!(err, ApiError::NotFound);
}

#[tokio::test]
async fn relabel_conflict_when_new_object_exists() -> anyhow::Result<()> {
    let (fb, store) = processor();
    let key_a = ObjectKey::new("c1", "cam1", "A");
    let key_b = ObjectKey::new("c1", "cam1", "B");
    store.set_object_state(&key_a, ObjectState::default()).await;
    store.set_object_state(&key_b, ObjectState::default()).await;

    let err = fb.relabel("c1", "cam1", "A", "B").await.unwrap_err();
    assert_eq!(err, ApiError::Conflict);
    Ok(())
}

#[tokio::test]
async fn relabel_carries_forward_open_dwell_and_moves_timeline() -> anyhow::Result<()> {
    let (fb, store) = processor();
    let key_a = ObjectKey::new("c1", "cam1", "A");
    let cell = CellKey::new("c1", "cam1", "G_06_08");

    // Mirrors the post-transition state from the S3 scenario: entered
    // G_06_08 at 2500, already carrying 1500ms of prior accumulated dwell.
    store
        .set_object_state(
            &key_a,
            ObjectState {
                current_cell: Some("G_06_08".into()),
                enter_ts_ms: Some(2500),
                last_seen_ts_ms: 2500,
                accumulated_ms: 1500,
            },
        )
        .await;
    store
        .prepend_entry(
            &key_a,
            TimelineEntry {
                kind: TimelineEntryKind::Enter,
                cell_id: "G_06_08".into(),
                from_ts_ms: 2500,
                to_ts_ms: None,
                meta: None,
            },
        )
        .await;

    let before = crate::engine::now_ms();
    let outcome = fb.relabel("c1", "cam1", "A", "B").await.context("relabel")?;
    let after = crate::engine::now_ms();
    assert_eq!(outcome, RelabelOutcome::Applied);

    assert!(store.get_object_state(&key_a).await.is_none());
    let key_b = ObjectKey::new("c1", "cam1", "B");
    let state_b = store.get_object_state(&key_b).await.context("state b")?;
    assert_eq!(state_b.current_cell.as_deref(), Some("G_06_08"));
    assert_eq!(state_b.enter_ts_ms, Some(2500));
    assert_eq!(state_b.accumulated_ms, 1500);

    let agg = store.get_aggregate(&cell).await.context("aggregate")?;
    assert_eq!(agg.object_count, 1, "old id must have no remaining aggregate footprint");
    // The new id's contribution is only the open span's dwell (now - enter_ts_ms),
    // not accumulated_ms + open dwell — accumulated_ms was already recorded against
    // whichever cells the object occupied before this one.
    assert!(
        agg.total_dwell_ms >= before.saturating_sub(2500) && agg.total_dwell_ms <= after.saturating_sub(2500),
        "contribution should be only the open-span dwell since enter_ts_ms=2500, got {}",
        agg.total_dwell_ms
    );

    assert!(store.read_entries(&key_a, 10).await.is_empty());
    assert_eq!(store.read_entries(&key_b, 10).await.len(), 1);
    assert_eq!(store.audit_len().await, 1);
    Ok(())
}

#[tokio::test]
async fn correct_cell_is_no_op_when_cell_unchanged() -> anyhow::Result<()> {
    let (fb, store) = processor();
    let key = ObjectKey::new("c1", "cam1", "A");
    store
        .set_object_state(
            &key,
            ObjectState {
                current_cell: Some("G_05_08".into()),
                enter_ts_ms: Some(1000),
                last_seen_ts_ms: 1000,
                accumulated_ms: 0,
            },
        )
        .await;

    let outcome = fb.correct_cell("c1", "cam1", "A", 1200, "G_05_08").await.context("correct")?;
    assert_eq!(outcome, CorrectCellOutcome::NoChange);
    assert_eq!(store.audit_len().await, 0);
    Ok(())
}

#[tokio::test]
async fn correct_cell_preserves_accumulated_ms_and_zeroes_original_contribution() -> anyhow::Result<()> {
    let (fb, store) = processor();
    let key = ObjectKey::new("c1", "cam1", "A");
    let original_cell = CellKey::new("c1", "cam1", "G_05_08");
    store.add_contribution(&original_cell, "A", 500).await;
    store
        .set_object_state(
            &key,
            ObjectState {
                current_cell: Some("G_05_08".into()),
                enter_ts_ms: Some(1000),
                last_seen_ts_ms: 1000,
                accumulated_ms: 1500,
            },
        )
        .await;

    let outcome = fb.correct_cell("c1", "cam1", "A", 1200, "G_07_08").await.context("correct")?;
    assert_eq!(outcome, CorrectCellOutcome::Applied);

    let state = store.get_object_state(&key).await.context("state")?;
    assert_eq!(state.current_cell.as_deref(), Some("G_07_08"));
    assert_eq!(state.enter_ts_ms, Some(1200));
    assert_eq!(state.accumulated_ms, 1500, "correct_cell must not touch accumulated_ms");

    assert!(store.get_aggregate(&original_cell).await.is_none());
    Ok(())
}

#[tokio::test]
async fn delete_span_rejects_inverted_range() {
    let (fb, _store) = processor();
    let err = fb.delete_span("c1", "cam1", "A", 2000, 1000).await.unwrap_err();
    assert_eq!(err, ApiError::InvalidSpan);
}

#[tokio::test]
async fn delete_span_appends_audit_without_touching_aggregates() -> anyhow::Result<()> {
    let (fb, store) = processor();
    let key = ObjectKey::new("c1", "cam1", "A");
    let cell = CellKey::new("c1", "cam1", "G_05_08");
    store.add_contribution(&cell, "A", 1000).await;

    fb.delete_span("c1", "cam1", "A", 1000, 2000).await.context("delete")?;

    let agg = store.get_aggregate(&cell).await.context("aggregate")?;
    assert_eq!(agg.total_dwell_ms, 1000, "delete_span is audit-only, aggregates are untouched");

    let timeline = store.read_entries(&key, 10).await;
    assert_eq!(timeline[0].kind, TimelineEntryKind::Delete);
    assert_eq!(store.audit_len().await, 1);
    Ok(())
}
