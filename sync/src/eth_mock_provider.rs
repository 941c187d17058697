// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory `JsonRpcClient` answering from registered responses

use ethers::providers::{JsonRpcClient, JsonRpcError, ProviderError, RpcError};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum EthMockError {
    #[error("{0}")]
    Rejected(String),
    #[error("No response registered for {method} with params {params}")]
    NoResponse { method: String, params: String },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl RpcError for EthMockError {
    fn as_error_response(&self) -> Option<&JsonRpcError> {
        None
    }

    fn as_serde_error(&self) -> Option<&serde_json::Error> {
        match self {
            EthMockError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EthMockError> for ProviderError {
    fn from(e: EthMockError) -> Self {
        ProviderError::JsonRpcClientError(Box::new(e))
    }
}

type Responses = HashMap<(String, String), Result<serde_json::Value, String>>;

/// Responses are keyed by method name and the JSON encoding of the params.
#[derive(Debug, Clone, Default)]
pub struct EthMockProvider {
    responses: Arc<Mutex<Responses>>,
}

impl EthMockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response<P: Serialize, R: Serialize>(
        &self,
        method: &str,
        params: P,
        response: R,
    ) -> anyhow::Result<()> {
        let key = (method.to_string(), serde_json::to_string(&params)?);
        let value = serde_json::to_value(response)?;
        self.responses.lock().unwrap().insert(key, Ok(value));
        Ok(())
    }

    /// Makes the request fail with `message` as error text
    pub fn add_error<P: Serialize>(&self, method: &str, params: P, message: &str) {
        let key = (
            method.to_string(),
            serde_json::to_string(&params).unwrap(),
        );
        self.responses
            .lock()
            .unwrap()
            .insert(key, Err(message.to_string()));
    }
}

#[async_trait::async_trait]
impl JsonRpcClient for EthMockProvider {
    type Error = EthMockError;

    async fn request<T: Serialize + Send + Sync + Debug, R: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: T,
    ) -> Result<R, EthMockError> {
        let params = serde_json::to_string(&params)?;
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), params.clone()))
            .cloned();
        match response {
            Some(Ok(value)) => Ok(serde_json::from_value(value)?),
            Some(Err(message)) => Err(EthMockError::Rejected(message)),
            None => Err(EthMockError::NoResponse {
                method: method.to_string(),
                params,
            }),
        }
    }
}
