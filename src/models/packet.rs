// PCAP Funnel - Packet Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Parsed network frame model.
//!
//! Datasets produced by the converter are not always clean: numeric fields
//! derived from CSV output arrive as strings, ports are empty for protocols
//! without them, and `app`/`applicationProtocol` are frequently missing.
//! None of that is an error. Missing values are kept as `None` and surface
//! as [`NOT_AVAILABLE`] wherever a value is aggregated or filtered.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sentinel used for absent protocol, port, or app values.
pub const NOT_AVAILABLE: &str = "N/A";

/// One parsed network frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    /// Frame sequence number, unique within a dataset.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub index: u64,
    /// Capture time in epoch seconds.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub timestamp: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub network_protocol: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transport_protocol: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub application_protocol: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source_ip: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub destination_ip: String,
    #[serde(default, deserialize_with = "lenient_port")]
    pub source_port: Option<u32>,
    #[serde(default, deserialize_with = "lenient_port")]
    pub destination_port: Option<u32>,
    /// Frame length in bytes.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bytes: u64,
    /// Derived service name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub app: Option<String>,
}

/// Shared, immutable packet handle. Filtered views clone the handle, not the frame.
pub type PacketRef = Arc<Packet>;

/// An in-memory packet dataset.
pub type Dataset = Vec<PacketRef>;

impl Packet {
    /// Create a packet with the addressing fields set.
    pub fn new(index: u64, timestamp: f64, source_ip: &str, destination_ip: &str) -> Self {
        Self {
            index,
            timestamp,
            source_ip: source_ip.to_string(),
            destination_ip: destination_ip.to_string(),
            ..Default::default()
        }
    }

    /// Set the protocol stack (network, transport).
    pub fn with_protocols(mut self, network: &str, transport: &str) -> Self {
        self.network_protocol = Some(network.to_string());
        self.transport_protocol = Some(transport.to_string());
        self
    }

    /// Set source and destination ports.
    pub fn with_ports(mut self, source: u32, destination: u32) -> Self {
        self.source_port = Some(source);
        self.destination_port = Some(destination);
        self
    }

    /// Set the frame length.
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    /// Set the application protocol.
    pub fn with_application_protocol(mut self, protocol: &str) -> Self {
        self.application_protocol = Some(protocol.to_string());
        self
    }

    /// Set the derived application name.
    pub fn with_app(mut self, app: &str) -> Self {
        self.app = Some(app.to_string());
        self
    }
}

/// Wrap owned packets into a shareable dataset.
pub fn into_dataset(packets: Vec<Packet>) -> Dataset {
    packets.into_iter().map(Arc::new).collect()
}

/// Parse a JSON array of packets.
pub fn dataset_from_json(json: &str) -> serde_json::Result<Dataset> {
    let packets: Vec<Packet> = serde_json::from_str(json)?;
    Ok(into_dataset(packets))
}

/// Smallest and largest timestamp in the dataset.
pub fn time_extent(dataset: &[PacketRef]) -> Option<(f64, f64)> {
    dataset.iter().fold(None, |extent, packet| match extent {
        None => Some((packet.timestamp, packet.timestamp)),
        Some((min, max)) => Some((min.min(packet.timestamp), max.max(packet.timestamp))),
    })
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value).unwrap_or(0.0))
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
        .unwrap_or(0))
}

fn lenient_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_packet() {
        let json = r#"[{"index": 1, "timestamp": 1.5, "networkProtocol": "ip",
            "transportProtocol": "tcp", "applicationProtocol": "http",
            "sourceIp": "10.0.0.1", "destinationIp": "10.0.0.2",
            "sourcePort": 80, "destinationPort": 1234, "bytes": 100, "app": "web"}]"#;

        let dataset = dataset_from_json(json).unwrap();
        assert_eq!(dataset.len(), 1);
        let packet = &dataset[0];
        assert_eq!(packet.source_port, Some(80));
        assert_eq!(packet.destination_port, Some(1234));
        assert_eq!(packet.bytes, 100);
        assert_eq!(packet.app.as_deref(), Some("web"));
    }

    #[test]
    fn test_parse_csv_derived_packet() {
        // String numbers and empty ports, as produced from tshark CSV output
        let json = r#"[{"index": "7", "timestamp": "1589000000.25", "networkProtocol": "arp",
            "sourceIp": "10.0.0.1", "destinationIp": "10.0.0.255",
            "sourcePort": "", "destinationPort": "", "bytes": "60"}]"#;

        let dataset = dataset_from_json(json).unwrap();
        let packet = &dataset[0];
        assert_eq!(packet.index, 7);
        assert!((packet.timestamp - 1589000000.25).abs() < 1e-6);
        assert_eq!(packet.source_port, None);
        assert_eq!(packet.transport_protocol, None);
        assert_eq!(packet.application_protocol, None);
        assert_eq!(packet.bytes, 60);
    }

    #[test]
    fn test_time_extent() {
        let dataset = into_dataset(vec![
            Packet::new(1, 5.0, "a", "b"),
            Packet::new(2, 2.0, "a", "b"),
            Packet::new(3, 9.0, "a", "b"),
        ]);
        assert_eq!(time_extent(&dataset), Some((2.0, 9.0)));
        assert_eq!(time_extent(&[]), None);
    }
}
