// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide, init-time configuration.

use clap::Parser;

/// Configuration for the dwelltrace service.
#[derive(Debug, Clone, Parser)]
#[command(name = "dwelltrace")]
pub struct AppConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "DWELLTRACE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "DWELLTRACE_PORT")]
    pub port: u16,

    /// Grid width (number of cells along X).
    #[arg(long, default_value_t = 20, env = "DWELLTRACE_GRID_W")]
    pub grid_w: u32,

    /// Grid height (number of cells along Y).
    #[arg(long, default_value_t = 15, env = "DWELLTRACE_GRID_H")]
    pub grid_h: u32,

    /// Dwell timeout `T_timeout` in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "DWELLTRACE_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Recent-events ring buffer capacity `N`.
    #[arg(long, default_value_t = 100, env = "DWELLTRACE_RECENT_EVENTS_CAP")]
    pub recent_events_cap: usize,

    /// Per-object timeline entry cap `K`.
    #[arg(long, default_value_t = 100, env = "DWELLTRACE_TIMELINE_CAP")]
    pub timeline_cap: usize,

    /// State store TTL in seconds.
    #[arg(long, default_value_t = 86_400, env = "DWELLTRACE_TTL_SECS")]
    pub ttl_secs: u64,

    /// Timeout sweeper tick interval in milliseconds.
    #[arg(long, default_value_t = 5_000, env = "DWELLTRACE_SWEEP_MS")]
    pub sweep_ms: u64,

    /// Dedup window size (max ids remembered per partition worker).
    #[arg(long, default_value_t = 10_000, env = "DWELLTRACE_DEDUP_WINDOW")]
    pub dedup_window: usize,

    /// Default deadline for externally triggered operations, in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "DWELLTRACE_OP_DEADLINE_MS")]
    pub op_deadline_ms: u64,

    /// NATS server URL. Only consulted when built with the `nats` feature;
    /// required in that configuration (no default) so startup fails fast
    /// without it.
    #[cfg(feature = "nats")]
    #[arg(long, env = "DWELLTRACE_NATS_URL")]
    pub nats_url: String,

    /// Subject/queue-topic prefix for the NATS-backed ingress queue.
    #[cfg(feature = "nats")]
    #[arg(long, default_value = "dwelltrace", env = "DWELLTRACE_NATS_PREFIX")]
    pub nats_prefix: String,
}

impl AppConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_ms)
    }

    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }

    pub fn op_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.op_deadline_ms)
    }
}
