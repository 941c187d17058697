// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::{http::StatusCode, routing::get, Extension, Router};
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, HistogramVec,
    IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder,
};
use std::net::SocketAddr;
use tokio::task::JoinHandle;

const FINE_GRAINED_LATENCY_SEC_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4, 0.45, 0.5, 0.6, 0.7, 0.8, 0.9,
    1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.5, 3.0, 3.5, 4.0, 5.0, 6.0, 8.0, 10., 15., 20., 30., 60.,
];

#[derive(Clone, Debug)]
pub struct SyncMetrics {
    pub(crate) eth_rpc_queries: IntCounterVec,
    pub(crate) eth_rpc_queries_latency: HistogramVec,
    pub(crate) eth_node_connected: IntGauge,

    pub(crate) log_range_bisections: IntCounter,
    pub(crate) reorgs_detected: IntCounter,

    pub(crate) sync_batches_started: IntCounter,
    pub(crate) sync_batches_failed: IntCounter,
    pub(crate) discards_started: IntCounter,
    pub(crate) discards_failed: IntCounter,
    pub(crate) last_synced_block: IntGauge,
    pub(crate) pending_blocks: IntGauge,

    pub(crate) state_transitions_collected: IntCounter,
    pub(crate) verifiers_resolved: IntGauge,
    pub(crate) sync_errors: IntCounterVec,
}

impl SyncMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            eth_rpc_queries: register_int_counter_vec_with_registry!(
                "starkex_sync_eth_rpc_queries",
                "Total number of queries issued to eth provider, by request type",
                &["type"],
                registry,
            )
            .unwrap(),
            eth_rpc_queries_latency: register_histogram_vec_with_registry!(
                "starkex_sync_eth_rpc_queries_latency",
                "Latency of queries issued to eth provider, by request type",
                &["type"],
                FINE_GRAINED_LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            eth_node_connected: register_int_gauge_with_registry!(
                "starkex_sync_eth_node_connected",
                "Whether the last request to the eth provider succeeded (1) or not (0)",
                registry,
            )
            .unwrap(),
            log_range_bisections: register_int_counter_with_registry!(
                "starkex_sync_log_range_bisections",
                "Total number of log ranges split because the response was too large",
                registry,
            )
            .unwrap(),
            reorgs_detected: register_int_counter_with_registry!(
                "starkex_sync_reorgs_detected",
                "Total number of log queries that returned logs from foreign blocks",
                registry,
            )
            .unwrap(),
            sync_batches_started: register_int_counter_with_registry!(
                "starkex_sync_sync_batches_started",
                "Total number of sync batches handed to the data sync",
                registry,
            )
            .unwrap(),
            sync_batches_failed: register_int_counter_with_registry!(
                "starkex_sync_sync_batches_failed",
                "Total number of sync batches that failed and were re-queued",
                registry,
            )
            .unwrap(),
            discards_started: register_int_counter_with_registry!(
                "starkex_sync_discards_started",
                "Total number of discard runs after a reorg",
                registry,
            )
            .unwrap(),
            discards_failed: register_int_counter_with_registry!(
                "starkex_sync_discards_failed",
                "Total number of failed discard runs. The pending reorg is dropped on failure",
                registry,
            )
            .unwrap(),
            last_synced_block: register_int_gauge_with_registry!(
                "starkex_sync_last_synced_block",
                "Last block whose data was stored",
                registry,
            )
            .unwrap(),
            pending_blocks: register_int_gauge_with_registry!(
                "starkex_sync_pending_blocks",
                "Number of blocks waiting to be synced",
                registry,
            )
            .unwrap(),
            state_transitions_collected: register_int_counter_with_registry!(
                "starkex_sync_state_transitions_collected",
                "Total number of state transitions collected",
                registry,
            )
            .unwrap(),
            verifiers_resolved: register_int_gauge_with_registry!(
                "starkex_sync_verifiers_resolved",
                "Number of verifier addresses known after the last sync",
                registry,
            )
            .unwrap(),
            sync_errors: register_int_counter_vec_with_registry!(
                "starkex_sync_errors",
                "Total number of sync errors, by error type",
                &["error_type"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}

/// Serves the registry in the prometheus text format on `/metrics`.
pub async fn start_prometheus_server(
    addr: SocketAddr,
    registry: Registry,
) -> anyhow::Result<JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(Extension(registry));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on {}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server error: {:?}", e);
        }
    }))
}

async fn metrics_handler(Extension(registry): Extension<Registry>) -> (StatusCode, String) {
    match TextEncoder::new().encode_to_string(&registry.gather()) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
