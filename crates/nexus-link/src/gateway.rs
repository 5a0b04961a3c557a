//! Request gateway: stateless JSON-over-HTTP calls to the cognitive backend.
//!
//! Every call is a single request with the client-wide timeout. Nothing is
//! retried; any failure comes back as [`LinkError::RequestFailed`].

use std::time::Duration;

use nexus_core::{HealthResponse, ProcessRequest, ProcessResponse, StatsResponse};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ConsoleConfig;
use crate::error::{LinkError, Result};

pub const HEALTH_PATH: &str = "/health";
pub const PROCESS_PATH: &str = "/brain/process";
pub const STATS_PATH: &str = "/stats";

#[derive(Clone, Debug)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
}

impl Gateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LinkError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        Self::new(&config.api_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get(HEALTH_PATH).await
    }

    pub async fn submit_query(&self, request: &ProcessRequest) -> Result<ProcessResponse> {
        let url = format!("{}{PROCESS_PATH}", self.base_url);
        debug!(%url, emotion = %request.context.current_emotion, "submitting query");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| failed(PROCESS_PATH, e))?;
        decode(PROCESS_PATH, response).await
    }

    pub async fn stats(&self) -> Result<StatsResponse> {
        self.get(STATS_PATH).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(path, e))?;
        decode(path, response).await
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
    let response = response.error_for_status().map_err(|e| failed(path, e))?;
    response.json::<T>().await.map_err(|e| failed(path, e))
}

fn failed(path: &str, e: reqwest::Error) -> LinkError {
    let err = LinkError::request(path, e);
    warn!(error = %err, "gateway request failed");
    err
}
