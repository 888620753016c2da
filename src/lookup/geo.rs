// PCAP Funnel - Geolocation Lookup
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! IP geolocation via a batch geolocation server.
//!
//! The server accepts a JSON array of IPs at `POST <base>/geoips` and answers
//! with one record per IP. Failed lookups come back with a non-`success`
//! status and are skipped.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::country_codes::iso2_to_iso3;
use super::{run_cancellable, CancellationToken};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where an IP is located.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpLocation {
    /// ISO3 country code; codes missing from the table are kept as given.
    pub country: String,
    pub city: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
}

/// One entry of the geolocation server response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub query: String,
    pub status: String,
    #[serde(default)]
    pub city: Option<Value>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub long: Option<Value>,
}

/// Convert a geolocation response into an IP to location map.
///
/// The server reports unknown coordinates and cities as `"n/a"`; those
/// become `None` and `"n/a"` respectively.
pub fn parse_locations(records: Vec<LocationRecord>) -> HashMap<String, IpLocation> {
    records
        .into_iter()
        .filter(|record| record.status == "success")
        .map(|record| {
            let code = record.country_code.unwrap_or_default();
            let country = iso2_to_iso3(&code)
                .map(str::to_string)
                .unwrap_or(code);
            let city = match record.city {
                Some(Value::String(city)) => city,
                _ => "n/a".to_string(),
            };
            let location = IpLocation {
                country,
                city,
                lat: record.lat.as_ref().and_then(Value::as_f64),
                long: record.long.as_ref().and_then(Value::as_f64),
            };
            (record.query, location)
        })
        .collect()
}

/// Client for the batch geolocation server.
#[derive(Debug, Clone)]
pub struct GeoClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeoClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("pcap-funnel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build geolocation HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Locate `ips`.
    ///
    /// Returns an empty map on any error, and when `token` is cancelled
    /// before the response is in.
    pub async fn locate(
        &self,
        ips: &[String],
        token: &CancellationToken,
    ) -> HashMap<String, IpLocation> {
        if ips.is_empty() {
            return HashMap::new();
        }

        match run_cancellable(token, self.fetch(ips)).await {
            Some(Ok(records)) => {
                let locations = parse_locations(records);
                debug!("Located {} of {} IPs", locations.len(), ips.len());
                locations
            }
            Some(Err(e)) => {
                warn!("Geolocation lookup failed: {:#}", e);
                HashMap::new()
            }
            None => {
                debug!("Geolocation lookup cancelled");
                HashMap::new()
            }
        }
    }

    async fn fetch(&self, ips: &[String]) -> Result<Vec<LocationRecord>> {
        let url = format!("{}/geoips", self.base_url);
        debug!("Requesting locations of {} IPs from {}", ips.len(), url);

        let response = self
            .client
            .post(&url)
            .json(ips)
            .send()
            .await
            .context("Geolocation request failed")?
            .error_for_status()
            .context("Geolocation server returned an error")?;

        response
            .json()
            .await
            .context("Failed to parse geolocation response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(json: &str) -> Vec<LocationRecord> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_locations() {
        let response = records(
            r#"[
                {"query": "86.49.63.166", "status": "success", "city": "Brno",
                 "country": "Czechia", "countryCode": "CZ", "lat": 49.19, "long": 16.6,
                 "accuracyRadius": 20},
                {"query": "10.0.0.1", "status": "fail", "message": "not found"},
                {"query": "1.2.3.4", "status": "success", "countryCode": "QQ",
                 "lat": "n/a", "long": "n/a"}
            ]"#,
        );

        let locations = parse_locations(response);
        assert_eq!(locations.len(), 2);

        let brno = &locations["86.49.63.166"];
        assert_eq!(brno.country, "CZE");
        assert_eq!(brno.city, "Brno");
        assert_eq!(brno.lat, Some(49.19));

        let unknown = &locations["1.2.3.4"];
        assert_eq!(unknown.country, "QQ");
        assert_eq!(unknown.city, "n/a");
        assert_eq!(unknown.lat, None);
        assert!(!locations.contains_key("10.0.0.1"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GeoClient::new("http://localhost:5001/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5001");
    }

    #[tokio::test]
    async fn test_cancelled_lookup_is_empty() {
        let client = GeoClient::new("http://127.0.0.1:9").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let locations = client.locate(&["1.1.1.1".to_string()], &token).await;
        assert!(locations.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_empty() {
        let client = GeoClient::new("http://127.0.0.1:9").unwrap();
        let token = CancellationToken::new();
        let locations = client.locate(&["1.1.1.1".to_string()], &token).await;
        assert!(locations.is_empty());
    }
}
