// PCAP Funnel - Flow Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Flow aggregation: groups packets sharing an endpoint/protocol key.

use std::borrow::{Borrow, Cow};
use std::collections::HashMap;

use serde::Serialize;

use super::layer::{optional_port, Field, Record};
use super::packet::{Packet, NOT_AVAILABLE};

/// Packets aggregated under one (source, destination, transport) key.
///
/// `network_protocol`, `application_protocol`, and `app` come from the first
/// packet seen for the key and are not reconciled with later packets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub source_ip: String,
    pub source_port: Option<u32>,
    pub destination_ip: String,
    pub destination_port: Option<u32>,
    pub transport_protocol: Option<String>,
    /// Number of packets in the flow.
    pub count: u64,
    /// First-seen timestamp.
    pub timestamp: f64,
    pub network_protocol: Option<String>,
    pub application_protocol: Option<String>,
    pub app: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FlowKey<'a> {
    source_ip: &'a str,
    source_port: Option<u32>,
    destination_ip: &'a str,
    destination_port: Option<u32>,
    transport_protocol: Option<&'a str>,
}

impl<'a> FlowKey<'a> {
    fn forward(packet: &'a Packet) -> Self {
        Self {
            source_ip: &packet.source_ip,
            source_port: packet.source_port,
            destination_ip: &packet.destination_ip,
            destination_port: packet.destination_port,
            transport_protocol: packet.transport_protocol.as_deref(),
        }
    }

    /// Key seen from the endpoint with the lexicographically smaller IP.
    fn canonical(packet: &'a Packet) -> Self {
        if packet.source_ip <= packet.destination_ip {
            Self::forward(packet)
        } else {
            Self {
                source_ip: &packet.destination_ip,
                source_port: packet.destination_port,
                destination_ip: &packet.source_ip,
                destination_port: packet.source_port,
                transport_protocol: packet.transport_protocol.as_deref(),
            }
        }
    }

    fn seed(&self, packet: &Packet) -> Flow {
        Flow {
            source_ip: self.source_ip.to_string(),
            source_port: self.source_port,
            destination_ip: self.destination_ip.to_string(),
            destination_port: self.destination_port,
            transport_protocol: self.transport_protocol.map(str::to_string),
            count: 1,
            timestamp: packet.timestamp,
            network_protocol: packet.network_protocol.clone(),
            application_protocol: packet.application_protocol.clone(),
            app: packet
                .app
                .clone()
                .filter(|app| !app.is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }
}

fn aggregate<'a, P, K>(packets: &'a [P], key_of: K) -> Vec<Flow>
where
    P: Borrow<Packet>,
    K: Fn(&'a Packet) -> FlowKey<'a>,
{
    let mut index: HashMap<FlowKey<'a>, usize> = HashMap::new();
    let mut flows: Vec<Flow> = Vec::new();

    for packet in packets {
        let packet: &'a Packet = packet.borrow();
        let key = key_of(packet);
        if let Some(&slot) = index.get(&key) {
            let flow = &mut flows[slot];
            flow.count += 1;
            flow.timestamp = flow.timestamp.min(packet.timestamp);
        } else {
            index.insert(key, flows.len());
            flows.push(key.seed(packet));
        }
    }

    // Stable: flows with equal first-seen time keep first-occurrence order
    flows.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    flows
}

/// Aggregate packets into uni-directional flows, ordered by first-seen time.
pub fn flows_from_packets<P: Borrow<Packet>>(packets: &[P]) -> Vec<Flow> {
    aggregate(packets, FlowKey::forward)
}

/// Aggregate packets into bi-directional flows, ordered by first-seen time.
///
/// Both directions between the same endpoints collapse into one flow that
/// reports the lexicographically smaller IP as its source.
pub fn flows_from_packets_bidirectional<P: Borrow<Packet>>(packets: &[P]) -> Vec<Flow> {
    aggregate(packets, FlowKey::canonical)
}

fn flow_text(value: &Option<String>) -> Cow<'_, str> {
    match value.as_deref() {
        Some(text) if text != "undefined" => Cow::Borrowed(text),
        _ => Cow::Borrowed(NOT_AVAILABLE),
    }
}

impl Record for Flow {
    fn field(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::NetworkProtocol => flow_text(&self.network_protocol),
            Field::TransportProtocol => flow_text(&self.transport_protocol),
            Field::ApplicationProtocol => flow_text(&self.application_protocol),
            Field::SourceIp => Cow::Borrowed(self.source_ip.as_str()),
            Field::DestinationIp => Cow::Borrowed(self.destination_ip.as_str()),
            Field::SourcePort => optional_port(self.source_port),
            Field::DestinationPort => optional_port(self.destination_port),
            Field::App => Cow::Borrowed(self.app.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::packet::into_dataset;

    fn scenario() -> Vec<Packet> {
        vec![
            Packet::new(1, 1.0, "10.0.0.1", "10.0.0.2")
                .with_protocols("ip", "tcp")
                .with_ports(80, 1234)
                .with_bytes(100),
            Packet::new(2, 2.0, "10.0.0.2", "10.0.0.1")
                .with_protocols("ip", "tcp")
                .with_ports(1234, 80)
                .with_bytes(200),
            Packet::new(3, 3.0, "10.0.0.1", "10.0.0.3")
                .with_protocols("ip", "udp")
                .with_ports(53, 1111)
                .with_bytes(50),
        ]
    }

    #[test]
    fn test_uni_directional_flows_are_distinct() {
        let flows = flows_from_packets(&scenario());
        assert_eq!(flows.len(), 3);
        assert!(flows.iter().all(|flow| flow.count == 1));
        let timestamps: Vec<f64> = flows.iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_bi_directional_flows_collapse_reverse_traffic() {
        let flows = flows_from_packets_bidirectional(&scenario());
        assert_eq!(flows.len(), 2);

        let tcp = &flows[0];
        assert_eq!(tcp.count, 2);
        assert_eq!(tcp.source_ip, "10.0.0.1");
        assert_eq!(tcp.source_port, Some(80));
        assert_eq!(tcp.transport_protocol.as_deref(), Some("tcp"));

        assert_eq!(flows[1].count, 1);
        assert_eq!(flows[1].transport_protocol.as_deref(), Some("udp"));
    }

    #[test]
    fn test_reversed_packet_reports_smaller_ip_as_source() {
        let packets = vec![Packet::new(1, 4.0, "192.168.1.9", "10.1.1.1")
            .with_protocols("ip", "tcp")
            .with_ports(5555, 443)];
        let flows = flows_from_packets_bidirectional(&packets);
        assert_eq!(flows[0].source_ip, "10.1.1.1");
        assert_eq!(flows[0].source_port, Some(443));
        assert_eq!(flows[0].destination_port, Some(5555));
    }

    #[test]
    fn test_flow_count_sums_to_packet_count() {
        let mut packets = scenario();
        packets.extend(scenario());
        packets.push(Packet::new(9, 0.5, "10.0.0.9", "10.0.0.1").with_protocols("arp", ""));

        let flows = flows_from_packets(&packets);
        let total: u64 = flows.iter().map(|f| f.count).sum();
        assert_eq!(total, packets.len() as u64);

        let biflows = flows_from_packets_bidirectional(&packets);
        let total: u64 = biflows.iter().map(|f| f.count).sum();
        assert_eq!(total, packets.len() as u64);
    }

    #[test]
    fn test_first_seen_timestamp_and_first_packet_attributes() {
        let packets = vec![
            Packet::new(1, 9.0, "a", "b").with_ports(1, 2).with_app("first"),
            Packet::new(2, 3.0, "a", "b").with_ports(1, 2).with_app("second"),
        ];
        let flows = flows_from_packets(&packets);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].timestamp, 3.0);
        assert_eq!(flows[0].app, "first");
    }

    #[test]
    fn test_missing_app_becomes_not_available() {
        let flows = flows_from_packets(&into_dataset(vec![Packet::new(1, 0.0, "a", "b")]));
        assert_eq!(flows[0].app, NOT_AVAILABLE);
        assert_eq!(flows[0].field(Field::SourcePort), NOT_AVAILABLE);
    }

    #[test]
    fn test_empty_input() {
        let packets: Vec<Packet> = Vec::new();
        assert!(flows_from_packets(&packets).is_empty());
        assert!(flows_from_packets_bidirectional(&packets).is_empty());
    }
}
