// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::metrics::SyncMetrics;
use ethers::providers::{Http, HttpClientError, JsonRpcClient, Provider};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::{ParseError, Url};

#[derive(Debug, Clone)]
pub struct MeteredEthHttpProvider {
    inner: Http,
    metrics: Arc<SyncMetrics>,
    semaphore: Arc<Semaphore>,
}

#[async_trait::async_trait]
impl JsonRpcClient for MeteredEthHttpProvider {
    type Error = HttpClientError;

    async fn request<T: Serialize + Send + Sync + Debug, R: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: T,
    ) -> Result<R, HttpClientError> {
        // The semaphore is never closed
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("Semaphore should never be closed");

        self.metrics
            .eth_rpc_queries
            .with_label_values(&[method])
            .inc();
        let _guard = self
            .metrics
            .eth_rpc_queries_latency
            .with_label_values(&[method])
            .start_timer();

        let result = self.inner.request(method, params).await;
        match &result {
            Ok(_) => self.metrics.eth_node_connected.set(1),
            Err(e) => {
                self.metrics.eth_node_connected.set(0);
                tracing::debug!("eth provider request {} failed: {:?}", method, e);
            }
        }
        result
    }
}

impl MeteredEthHttpProvider {
    /// At most `max_concurrent_requests` requests are in flight at once
    pub fn new(
        url: impl Into<Url>,
        metrics: Arc<SyncMetrics>,
        max_concurrent_requests: usize,
    ) -> Self {
        Self {
            inner: Http::new(url),
            metrics,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }
}

pub fn new_metered_eth_provider(
    url: &str,
    metrics: Arc<SyncMetrics>,
    max_concurrent_requests: usize,
) -> Result<Provider<MeteredEthHttpProvider>, ParseError> {
    let http_provider =
        MeteredEthHttpProvider::new(Url::parse(url)?, metrics, max_concurrent_requests);
    Ok(Provider::new(http_provider))
}
