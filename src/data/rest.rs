//! Broker gateway client
//!
//! Talks JSON over HTTP to a gateway process that wraps the broker SDK.
//!
//! Endpoints:
//! - `GET  {base}/health`
//! - `GET  {base}/options/{class}/contracts`
//! - `POST {base}/snapshots` with `{"codes": [...]}`
//! - `GET  {base}/kbars/{code}?start=..&end=..` (RFC 3339 bounds)

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::broker::{BrokerClient, BrokerContract, BrokerSnapshot};
use super::symbology::OptionClass;
use crate::config::SourceConfig;
use crate::core::{MinuteBar, OptionsError, OptionsResult};

/// HTTP broker gateway client
pub struct RestBrokerClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl RestBrokerClient {
    pub fn new(config: &SourceConfig) -> OptionsResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("option-factors/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OptionsError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> OptionsResult<T> {
        self.client
            .get(url)
            .send()
            .map_err(|e| OptionsError::network(e.to_string()))?
            .error_for_status()
            .map_err(|e| OptionsError::broker(e.to_string()))?
            .json()
            .map_err(|e| OptionsError::data(format!("Failed to parse {}: {}", url, e)))
    }
}

impl BrokerClient for RestBrokerClient {
    fn is_connected(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send() {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("Gateway health check failed: {}", e);
                false
            }
        }
    }

    fn option_contracts(&self, class: OptionClass) -> OptionsResult<Vec<BrokerContract>> {
        let url = format!("{}/options/{}/contracts", self.base_url, class.code());
        let response: ContractsResponse = self.get_json(&url)?;
        Ok(response.contracts)
    }

    fn snapshots(&self, codes: &[String]) -> OptionsResult<Vec<BrokerSnapshot>> {
        let url = format!("{}/snapshots", self.base_url);
        let response: SnapshotsResponse = self
            .client
            .post(&url)
            .json(&SnapshotsRequest { codes })
            .send()
            .map_err(|e| OptionsError::network(e.to_string()))?
            .error_for_status()
            .map_err(|e| OptionsError::broker(e.to_string()))?
            .json()
            .map_err(|e| OptionsError::data(format!("Failed to parse snapshots: {}", e)))?;
        Ok(response.snapshots)
    }

    fn minute_bars(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OptionsResult<Vec<MinuteBar>> {
        let url = format!(
            "{}/kbars/{}?start={}&end={}",
            self.base_url,
            code,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let response: BarsResponse = self.get_json(&url)?;
        Ok(response.bars)
    }
}

// Gateway wire structures

#[derive(Debug, Deserialize)]
struct ContractsResponse {
    contracts: Vec<BrokerContract>,
}

#[derive(Debug, Serialize)]
struct SnapshotsRequest<'a> {
    codes: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SnapshotsResponse {
    snapshots: Vec<BrokerSnapshot>,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    bars: Vec<MinuteBar>,
}
