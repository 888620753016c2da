// PCAP Funnel - IP Graph
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! IP communication graph and Sankey diagrams around a single IP.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{flows_from_packets, flows_from_packets_bidirectional, Mode, Packet};

/// An IP address and its traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub ip: String,
    /// Endpoint occurrences, or bytes in bytes mode.
    pub count: u64,
    /// Number of bi-directional links touching the node.
    pub link_count: u64,
}

/// Traffic between two IPs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub count: u64,
}

impl GraphLink {
    pub fn new(source: &str, target: &str, count: u64) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            count,
        }
    }

    pub fn id(&self) -> String {
        format!("{}-{}", self.source, self.target)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    /// Links with both directions merged into one.
    pub links: Vec<GraphLink>,
    pub links_single_direction: Vec<GraphLink>,
}

impl Graph {
    pub fn node(&self, ip: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.ip == ip)
    }
}

/// Build the IP graph of `dataset`, measured in `mode`.
///
/// Packet modes weigh every packet (by one, or by its bytes); flow modes
/// weigh every flow by one. Nodes and links are in first-seen order.
pub fn extract_graph<P: Borrow<Packet>>(dataset: &[P], mode: Mode) -> Graph {
    let flows;
    let edges: Vec<(&str, &str, u64)> = match mode {
        Mode::Packets | Mode::Bytes => dataset
            .iter()
            .map(|packet| {
                let packet: &Packet = packet.borrow();
                let weight = if mode == Mode::Bytes { packet.bytes } else { 1 };
                (packet.source_ip.as_str(), packet.destination_ip.as_str(), weight)
            })
            .collect(),
        Mode::Flows | Mode::Biflows => {
            flows = if mode == Mode::Flows {
                flows_from_packets(dataset)
            } else {
                flows_from_packets_bidirectional(dataset)
            };
            flows
                .iter()
                .map(|flow| (flow.source_ip.as_str(), flow.destination_ip.as_str(), 1))
                .collect()
        }
    };

    let mut node_index: HashMap<&str, usize> = HashMap::new();
    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut link_index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut single: Vec<GraphLink> = Vec::new();

    for &(source, target, weight) in &edges {
        for ip in [source, target] {
            let slot = *node_index.entry(ip).or_insert_with(|| {
                nodes.push(GraphNode {
                    ip: ip.to_string(),
                    count: 0,
                    link_count: 0,
                });
                nodes.len() - 1
            });
            nodes[slot].count += weight;
        }

        let slot = *link_index.entry((source, target)).or_insert_with(|| {
            single.push(GraphLink::new(source, target, 0));
            single.len() - 1
        });
        single[slot].count += weight;
    }

    let mut merged: HashSet<(&str, &str)> = HashSet::new();
    let mut links: Vec<GraphLink> = Vec::new();
    for link in &single {
        let key = (link.source.as_str(), link.target.as_str());
        if merged.contains(&key) {
            continue;
        }
        let reverse = (key.1, key.0);
        let mut count = link.count;
        if reverse != key {
            if let Some(&slot) = link_index.get(&reverse) {
                count += single[slot].count;
            }
        }
        merged.insert(reverse);
        links.push(GraphLink::new(key.0, key.1, count));
    }

    for link in &links {
        for ip in [link.source.as_str(), link.target.as_str()] {
            if let Some(&slot) = node_index.get(ip) {
                nodes[slot].link_count += 1;
            }
        }
    }

    Graph {
        nodes,
        links,
        links_single_direction: single,
    }
}

/// How many links a Sankey diagram shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readability {
    #[default]
    Everything,
    /// Only the `cutoff` largest links.
    JustTopNodes,
    /// The `cutoff` largest links plus one aggregate per direction for the rest.
    AggregateBelowCutoff,
}

pub const OTHER_SOURCE: &str = "Other source";
pub const OTHER_TARGET: &str = "Other target";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SankeyNode {
    /// `"<ip> source"`, `"<ip> target"`, the selected IP, or an aggregate.
    pub id: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SankeyLink {
    /// Index into the node list.
    pub source: usize,
    pub target: usize,
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SankeyGraph {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
}

#[derive(Default)]
struct SankeyBuilder {
    index: HashMap<String, usize>,
    nodes: Vec<SankeyNode>,
    links: Vec<SankeyLink>,
}

impl SankeyBuilder {
    fn node(&mut self, id: String, ip: &str) -> usize {
        if let Some(&slot) = self.index.get(&id) {
            return slot;
        }
        self.nodes.push(SankeyNode {
            id: id.clone(),
            ip: ip.to_string(),
        });
        self.index.insert(id, self.nodes.len() - 1);
        self.nodes.len() - 1
    }

    fn link(&mut self, source: usize, target: usize, value: u64) {
        self.links.push(SankeyLink {
            source,
            target,
            value,
        });
    }
}

/// Build a Sankey diagram of the traffic flowing into and out of `selected_ip`.
///
/// Peers appear twice: `"<ip> source"` on the incoming side and
/// `"<ip> target"` on the outgoing side. Links not touching `selected_ip`, and
/// self-links, are ignored. With a limiting readability, links are ranked by
/// count and only the first `cutoff` are drawn.
pub fn construct_sankey_graph(
    links: &[GraphLink],
    selected_ip: &str,
    readability: Readability,
    cutoff: usize,
) -> SankeyGraph {
    let mut relevant: Vec<&GraphLink> = links
        .iter()
        .filter(|link| (link.source == selected_ip) != (link.target == selected_ip))
        .collect();

    let rest = match readability {
        Readability::Everything => Vec::new(),
        Readability::JustTopNodes | Readability::AggregateBelowCutoff => {
            relevant.sort_by(|a, b| b.count.cmp(&a.count));
            relevant.split_off(cutoff.min(relevant.len()))
        }
    };

    let mut builder = SankeyBuilder::default();
    let center = builder.node(selected_ip.to_string(), selected_ip);

    for link in &relevant {
        if link.source == selected_ip {
            let target = builder.node(format!("{} target", link.target), &link.target);
            builder.link(center, target, link.count);
        } else {
            let source = builder.node(format!("{} source", link.source), &link.source);
            builder.link(source, center, link.count);
        }
    }

    if readability == Readability::AggregateBelowCutoff {
        let incoming: u64 = rest
            .iter()
            .filter(|link| link.target == selected_ip)
            .map(|link| link.count)
            .sum();
        let outgoing: u64 = rest
            .iter()
            .filter(|link| link.source == selected_ip)
            .map(|link| link.count)
            .sum();

        if incoming > 0 {
            let source = builder.node(OTHER_SOURCE.to_string(), "Others");
            builder.link(source, center, incoming);
        }
        if outgoing > 0 {
            let target = builder.node(OTHER_TARGET.to_string(), "Others");
            builder.link(center, target, outgoing);
        }
    }

    SankeyGraph {
        nodes: builder.nodes,
        links: builder.links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_packet_graph() {
        let graph = extract_graph(&scenario(), Mode::Packets);

        assert_eq!(graph.nodes.len(), 3);
        let hub = graph.node("10.0.0.1").unwrap();
        assert_eq!(hub.count, 3);
        assert_eq!(hub.link_count, 2);

        assert_eq!(graph.links_single_direction.len(), 3);
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.links[0], GraphLink::new("10.0.0.1", "10.0.0.2", 2));
        assert_eq!(graph.links[0].id(), "10.0.0.1-10.0.0.2");
    }

    #[test]
    fn test_byte_graph() {
        let graph = extract_graph(&scenario(), Mode::Bytes);
        assert_eq!(graph.node("10.0.0.1").unwrap().count, 350);
        assert_eq!(graph.node("10.0.0.3").unwrap().count, 50);
        assert_eq!(graph.links[0].count, 300);
    }

    #[test]
    fn test_biflow_graph_has_no_reverse_links() {
        let graph = extract_graph(&scenario(), Mode::Biflows);
        assert_eq!(graph.links_single_direction.len(), 2);
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.node("10.0.0.2").unwrap().count, 1);
    }

    #[test]
    fn test_self_link_counted_once() {
        let packets = vec![Packet::new(1, 0.0, "a", "a"), Packet::new(2, 0.0, "a", "a")];
        let graph = extract_graph(&packets, Mode::Packets);
        assert_eq!(graph.links, vec![GraphLink::new("a", "a", 2)]);
        assert_eq!(graph.node("a").unwrap().count, 4);
    }

    fn star() -> Vec<GraphLink> {
        vec![
            GraphLink::new("hub", "a", 1),
            GraphLink::new("b", "hub", 9),
            GraphLink::new("hub", "c", 5),
            GraphLink::new("d", "hub", 2),
            GraphLink::new("x", "y", 100),
        ]
    }

    #[test]
    fn test_sankey_everything() {
        let sankey = construct_sankey_graph(&star(), "hub", Readability::Everything, 2);
        assert_eq!(sankey.nodes.len(), 5);
        assert_eq!(sankey.nodes[0].id, "hub");
        assert_eq!(sankey.nodes[1].id, "a target");
        assert_eq!(sankey.nodes[2].id, "b source");
        assert_eq!(sankey.nodes[2].ip, "b");
        assert_eq!(sankey.links.len(), 4);
        assert_eq!(
            sankey.links[1],
            SankeyLink {
                source: 2,
                target: 0,
                value: 9
            }
        );
    }

    #[test]
    fn test_sankey_top_nodes() {
        let sankey = construct_sankey_graph(&star(), "hub", Readability::JustTopNodes, 2);
        let ids: Vec<&str> = sankey.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["hub", "b source", "c target"]);
        assert_eq!(sankey.links.len(), 2);
    }

    #[test]
    fn test_sankey_aggregates_below_cutoff() {
        let sankey = construct_sankey_graph(&star(), "hub", Readability::AggregateBelowCutoff, 2);
        let ids: Vec<&str> = sankey.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["hub", "b source", "c target", OTHER_SOURCE, OTHER_TARGET]);

        let other_in = &sankey.links[2];
        assert_eq!((other_in.source, other_in.target, other_in.value), (3, 0, 2));
        let other_out = &sankey.links[3];
        assert_eq!((other_out.source, other_out.target, other_out.value), (0, 4, 1));
    }

    #[test]
    fn test_sankey_skips_empty_aggregates() {
        let links = vec![GraphLink::new("hub", "a", 3), GraphLink::new("hub", "b", 1)];
        let sankey = construct_sankey_graph(&links, "hub", Readability::AggregateBelowCutoff, 5);
        assert_eq!(sankey.nodes.len(), 3);
        assert_eq!(sankey.links.len(), 2);
    }
}
