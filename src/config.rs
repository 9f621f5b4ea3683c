use crate::constants::DEFAULT_REQUEST_TIMEOUT;
use crate::proto::ProviderConfig;
use crate::{ProviderError, Result};
use reqwest::Url;
use std::time::Duration;

/// Validated provider configuration for the etcd store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub endpoint: Url,
    pub request_timeout: Duration,
}

impl StoreSettings {
    /// Settings for `endpoint` with the default request timeout.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }
}

impl TryFrom<ProviderConfig> for StoreSettings {
    type Error = ProviderError;

    fn try_from(config: ProviderConfig) -> Result<Self> {
        let request_timeout = match config.request_timeout_seconds {
            0 => DEFAULT_REQUEST_TIMEOUT,
            secs => Duration::from_secs(secs),
        };

        Ok(Self {
            endpoint: parse_endpoint(&config.endpoint)?,
            request_timeout,
        })
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProviderError::Configuration(
            "endpoint must not be empty".to_string(),
        ));
    }

    let url = Url::parse(raw)
        .map_err(|e| ProviderError::Configuration(format!("Invalid endpoint '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ProviderError::Configuration(format!(
            "Unsupported endpoint scheme '{}': expected http or https",
            scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_selects_default() {
        let settings = StoreSettings::try_from(ProviderConfig {
            endpoint: "http://127.0.0.1:2379".to_string(),
            request_timeout_seconds: 0,
        })
        .unwrap();
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(settings.endpoint.as_str(), "http://127.0.0.1:2379/");
    }

    #[test]
    fn explicit_timeout_is_kept() {
        let settings = StoreSettings::try_from(ProviderConfig {
            endpoint: " https://etcd.example.com ".to_string(),
            request_timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_endpoints() {
        for endpoint in ["", "   ", "not a url", "unix:///var/run/etcd.sock"] {
            let err = StoreSettings::new(endpoint).unwrap_err();
            assert!(
                matches!(err, ProviderError::Configuration(_)),
                "{endpoint:?} gave {err:?}"
            );
        }
    }
}
