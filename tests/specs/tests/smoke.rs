// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `dwelltrace` binary and
//! exercise its HTTP ingress, query, and feedback surfaces.

use std::time::Duration;

use dwelltrace_specs::DwelltraceProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn post_frame(
    client: &reqwest::Client,
    base: &str,
    frame_id: &str,
    ts_ms: u64,
    object_id: &str,
    cell: &str,
) -> anyhow::Result<serde_json::Value> {
    let resp = client
        .post(format!("{base}/frames"))
        .json(&serde_json::json!({
            "collector_id": "c1",
            "camera_id": "cam1",
            "timestamp_ms": ts_ms,
            "frame_id": frame_id,
            "objects": [{ "object_id": object_id, "grid_cell_id": cell }],
        }))
        .send()
        .await?;
    anyhow::ensure!(resp.status().is_success(), "post_frame failed: {}", resp.status());
    Ok(resp.json().await?)
}

#[tokio::test]
async fn health_and_status() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/health", proc.base_url())).await?.json().await?;
    assert_eq!(resp["status"], "running");

    let resp: serde_json::Value =
        reqwest::get(format!("{}/status", proc.base_url())).await?.json().await?;
    assert_eq!(resp["grid_w"], 20);
    assert_eq!(resp["grid_h"], 15);

    Ok(())
}

#[tokio::test]
async fn ingest_frame_then_query_object_detail() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = proc.base_url();

    let body = post_frame(&client, &base, "f1", 1_000, "obj-a", "G_05_08").await?;
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["dropped"], 0);

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("object detail never reflected the ingested frame");
        }
        let resp = client.get(format!("{base}/objects/c1/cam1/obj-a")).send().await?;
        if resp.status().is_success() {
            let body: serde_json::Value = resp.json().await?;
            if body["state"]["current_cell"] == "G_05_08" {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn ingest_rejects_invalid_cell() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = proc.base_url();

    let body = post_frame(&client, &base, "f1", 1_000, "obj-a", "G_99_99").await?;
    assert_eq!(body["accepted"], 0);
    assert_eq!(body["dropped"], 1);

    Ok(())
}

#[tokio::test]
async fn stats_cells_and_heatmap_reflect_dwell() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = proc.base_url();

    post_frame(&client, &base, "f1", 1_000, "obj-a", "G_05_08").await?;
    post_frame(&client, &base, "f2", 5_000, "obj-a", "G_06_08").await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("stats/cells never reflected the move-out contribution");
        }
        let resp: serde_json::Value = client
            .get(format!("{base}/stats/cells?collector=c1&camera=cam1&cell=G_05_08"))
            .send()
            .await?
            .json()
            .await?;
        if resp["cells"].as_array().is_some_and(|a| !a.is_empty()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let resp: serde_json::Value = client
        .get(format!("{base}/heatmap?collector=c1&camera=cam1&window_ms=60000"))
        .send()
        .await?
        .json()
        .await?;
    assert!(resp["cells"].as_array().is_some_and(|a| !a.is_empty()));

    Ok(())
}

#[tokio::test]
async fn active_objects_and_recent_events() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = proc.base_url();

    post_frame(&client, &base, "f1", 1_000, "obj-a", "G_05_08").await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("object never appeared in the active set");
        }
        let resp: serde_json::Value = client
            .get(format!("{base}/objects/active?collector=c1&camera=cam1"))
            .send()
            .await?
            .json()
            .await?;
        if resp["objects"].as_array().is_some_and(|a| !a.is_empty()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let resp: serde_json::Value =
        client.get(format!("{base}/events/recent?limit=10")).send().await?.json().await?;
    assert!(resp["events"].is_array());

    Ok(())
}

#[tokio::test]
async fn metrics_reflects_ingested_observations() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = proc.base_url();

    post_frame(&client, &base, "f1", 1_000, "obj-a", "G_05_08").await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("metrics never reflected the ingested observation");
        }
        let resp: serde_json::Value =
            client.get(format!("{base}/metrics")).send().await?.json().await?;
        if resp["observations_received"].as_u64().is_some_and(|n| n >= 1) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn feedback_relabel_moves_object_identity() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let base = proc.base_url();

    post_frame(&client, &base, "f1", 1_000, "obj-a", "G_05_08").await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("ingested object never became queryable")
        }
        let resp = client.get(format!("{base}/objects/c1/cam1/obj-a")).send().await?;
        if resp.status().is_success() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let resp = client
        .post(format!("{base}/feedback/relabel"))
        .json(&serde_json::json!({
            "collector_id": "c1",
            "camera_id": "cam1",
            "old_object_id": "obj-a",
            "new_object_id": "obj-b",
        }))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let resp = client.get(format!("{base}/objects/c1/cam1/obj-a")).send().await?;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = client.get(format!("{base}/objects/c1/cam1/obj-b")).send().await?;
    assert!(resp.status().is_success());

    Ok(())
}

#[tokio::test]
async fn feedback_delete_span_rejects_inverted_range() -> anyhow::Result<()> {
    let proc = DwelltraceProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/feedback/delete_span", proc.base_url()))
        .json(&serde_json::json!({
            "collector_id": "c1",
            "camera_id": "cam1",
            "object_id": "obj-a",
            "from_ts_ms": 2000,
            "to_ts_ms": 1000,
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);

    Ok(())
}
