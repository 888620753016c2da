// PCAP Funnel - Hostname Lookup
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Reverse hostname lookup through an ipinfo-style batch endpoint.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use super::{run_cancellable, CancellationToken};

/// Batch endpoint used when none is configured.
pub const DEFAULT_HOSTNAME_URL: &str = "https://ipinfo.io/batch?filter=1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Convert a batch response into an IP to hostname map.
///
/// Keys are `"<ip>/hostname"`; entries with empty or non-string values are
/// skipped.
pub fn parse_hostnames(response: &Value) -> HashMap<String, String> {
    let Some(entries) = response.as_object() else {
        return HashMap::new();
    };

    entries
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(hostname) if !hostname.is_empty() => {
                let ip = key.split('/').next().unwrap_or(key);
                Some((ip.to_string(), hostname.clone()))
            }
            _ => None,
        })
        .collect()
}

/// Client for the batch hostname endpoint.
#[derive(Debug, Clone)]
pub struct HostnameClient {
    client: reqwest::Client,
    url: String,
}

impl HostnameClient {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("pcap-funnel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build hostname HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Look up hostnames of `ips`; empty on error or cancellation.
    pub async fn hostnames(
        &self,
        ips: &[String],
        token: &CancellationToken,
    ) -> HashMap<String, String> {
        if ips.is_empty() {
            return HashMap::new();
        }

        match run_cancellable(token, self.fetch(ips)).await {
            Some(Ok(response)) => parse_hostnames(&response),
            Some(Err(e)) => {
                warn!("Hostname lookup failed: {:#}", e);
                HashMap::new()
            }
            None => {
                debug!("Hostname lookup cancelled");
                HashMap::new()
            }
        }
    }

    async fn fetch(&self, ips: &[String]) -> Result<Value> {
        let entries: Vec<String> = ips.iter().map(|ip| format!("{}/hostname", ip)).collect();
        debug!("Requesting hostnames of {} IPs", entries.len());

        self.client
            .post(&self.url)
            .json(&entries)
            .send()
            .await
            .context("Hostname request failed")?
            .error_for_status()
            .context("Hostname endpoint returned an error")?
            .json()
            .await
            .context("Failed to parse hostname response")
    }
}
