//! etcd v2 keys API client.

use super::{key_segments, Node, Store, StoreError};
use crate::config::StoreSettings;
use crate::constants::ETCD_KEY_NOT_FOUND;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

/// Store backed by a single etcd endpoint speaking the v2 keys API.
#[derive(Debug, Clone)]
pub struct EtcdStore {
    client: Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: u64,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

impl EtcdStore {
    /// Builds a client for the configured endpoint. No request is made until the first operation.
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        info!("etcd store configured with endpoint: {}", settings.endpoint);

        let client = Client::builder().timeout(settings.request_timeout).build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }

    /// `{endpoint}/v2/keys/<path segments>`, with each segment percent-encoded
    /// and `.`/`..` already resolved.
    fn key_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::UnexpectedResponse {
                status: 0,
                body: format!("endpoint '{}' cannot carry a key path", self.endpoint),
            })?
            .pop_if_empty()
            .extend(["v2", "keys"])
            .extend(key_segments(path));
        Ok(url)
    }

    async fn expect_success(response: Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(classify(status, body))
        }
    }
}

/// Maps an error response to a [`StoreError`], picking out etcd's "Key not found".
fn classify(status: StatusCode, body: String) -> StoreError {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) if err.error_code == ETCD_KEY_NOT_FOUND => StoreError::NotFound,
        Ok(err) => StoreError::Etcd {
            code: err.error_code,
            message: err.message,
            cause: err.cause,
        },
        Err(_) => StoreError::UnexpectedResponse {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl Store for EtcdStore {
    async fn get(&self, path: &str) -> Result<Node, StoreError> {
        let url = self.key_url(path)?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = Self::expect_success(response).await?;

        match serde_json::from_str::<KeysResponse>(&body) {
            Ok(parsed) => Ok(parsed.node),
            Err(_) => Err(StoreError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            }),
        }
    }

    async fn set(&self, path: &str, value: &str) -> Result<(), StoreError> {
        let url = self.key_url(path)?;
        debug!("PUT {}", url);

        let response = self
            .client
            .put(url)
            .form(&[("value", value)])
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let url = self.key_url(path)?;
        debug!("DELETE {}", url);

        let response = self.client.delete(url).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store(endpoint: &str) -> EtcdStore {
        EtcdStore::new(&StoreSettings {
            endpoint: Url::parse(endpoint).unwrap(),
            request_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn key_url_joins_segments() {
        let store = store("http://127.0.0.1:2379");
        assert_eq!(
            store.key_url("/config/db/host").unwrap().as_str(),
            "http://127.0.0.1:2379/v2/keys/config/db/host"
        );
    }

    #[test]
    fn key_url_keeps_endpoint_prefix_and_encodes() {
        let store = store("http://etcd.local:2379/proxy/");
        assert_eq!(
            store.key_url("app/with space").unwrap().as_str(),
            "http://etcd.local:2379/proxy/v2/keys/app/with%20space"
        );
    }

    #[test]
    fn key_url_resolves_dot_segments() {
        let store = store("http://127.0.0.1:2379");
        assert_eq!(
            store.key_url("/a/../b").unwrap().as_str(),
            "http://127.0.0.1:2379/v2/keys/b"
        );
        assert_eq!(
            store.key_url("/a/./b").unwrap().as_str(),
            "http://127.0.0.1:2379/v2/keys/a/b"
        );
    }

    #[test]
    fn key_url_never_leaves_keys_prefix() {
        let store = store("http://etcd.local:2379/proxy");
        assert_eq!(
            store.key_url("/../../v2/members").unwrap().as_str(),
            "http://etcd.local:2379/proxy/v2/keys/v2/members"
        );
    }

    #[test]
    fn classify_recognises_key_not_found() {
        let body = r#"{"errorCode":100,"message":"Key not found","cause":"/missing","index":7}"#;
        assert!(classify(StatusCode::NOT_FOUND, body.to_string()).is_not_found());
    }

    #[test]
    fn classify_keeps_other_etcd_errors() {
        let body = r#"{"errorCode":102,"message":"Not a file","cause":"/dir","index":7}"#;
        match classify(StatusCode::FORBIDDEN, body.to_string()) {
            StoreError::Etcd { code, message, cause } => {
                assert_eq!(code, 102);
                assert_eq!(message, "Not a file");
                assert_eq!(cause.as_deref(), Some("/dir"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn classify_falls_back_to_raw_body() {
        match classify(StatusCode::BAD_GATEWAY, "upstream down".to_string()) {
            StoreError::UnexpectedResponse { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
