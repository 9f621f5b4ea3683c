//! `etcd_discovery`: asks a discovery service for a fresh cluster token URL.
//!
//! Only creation touches the network. Read, exists and delete work on the
//! identity the host already holds.

use crate::constants::{DEFAULT_CLUSTER_SIZE, DEFAULT_DISCOVERY_ENDPOINT, DEFAULT_REQUEST_TIMEOUT};
use crate::proto::{DiscoveryConfig, DiscoveryState};
use crate::{ProviderError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Client for the discovery service.
#[derive(Debug, Clone)]
pub struct Discovery {
    client: Client,
}

impl Discovery {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Server(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Requests `<endpoint>?size=<n>` and records the trimmed body as the URL and identity.
    pub async fn create(&self, config: DiscoveryConfig) -> Result<DiscoveryState> {
        let endpoint = config
            .endpoint
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or_else(|| DEFAULT_DISCOVERY_ENDPOINT.to_string());
        let size = config.size.unwrap_or(DEFAULT_CLUSTER_SIZE);

        let request_url = format!("{}?size={}", endpoint, size);
        debug!("requesting discovery URL from {}", request_url);

        let failed = |message: String| ProviderError::Discovery {
            endpoint: endpoint.clone(),
            message,
        };

        let response = self
            .client
            .get(&request_url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        if !status.is_success() {
            return Err(failed(format!("status {}: {}", status, body.trim())));
        }

        let url = body.trim().to_string();
        if url.is_empty() {
            return Err(failed("empty response body".to_string()));
        }

        info!("obtained discovery URL {}", url);
        Ok(DiscoveryState {
            id: url.clone(),
            endpoint,
            size,
            url,
        })
    }
}

/// Reflects the held identity into `url`.
pub fn read(state: DiscoveryState) -> DiscoveryState {
    DiscoveryState {
        url: state.id.clone(),
        ..state
    }
}

pub fn exists(state: &DiscoveryState) -> bool {
    !state.id.is_empty()
}

/// Clears the identity; the discovery token itself is left alone.
pub fn delete(state: DiscoveryState) -> DiscoveryState {
    DiscoveryState {
        id: String::new(),
        ..state
    }
}
