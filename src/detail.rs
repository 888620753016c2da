// PCAP Funnel - IP Detail View
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Traffic of a single IP: direction split, per-mode statistics and graphs,
//! country breakdown, and optional enrichment from lookup services.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::graph::{construct_sankey_graph, extract_graph, Graph, Readability, SankeyGraph};
use crate::lookup::{CancellationToken, GeoClient, HostnameClient, IpLocation};
use crate::models::{flows_from_packets, Dataset, Flow, Layer, Mode, PacketRef};
use crate::stats::{compute_stats, count_by_country, CountryCount, ModeCache, Stats};

/// Everything shown about one IP.
#[derive(Debug, Clone)]
pub struct IpDetail {
    ip: String,
    packets: Dataset,
    incoming: Dataset,
    outgoing: Dataset,
    incoming_flows: Vec<Flow>,
    outgoing_flows: Vec<Flow>,
    stats: ModeCache<Stats>,
    graphs: ModeCache<Graph>,
    locations: HashMap<String, IpLocation>,
    hostnames: HashMap<String, String>,
}

impl IpDetail {
    /// Detail of `ip` over `dataset`; `None` if the IP never appears.
    pub fn new(ip: &str, dataset: &[PacketRef]) -> Option<Self> {
        let packets: Dataset = dataset
            .iter()
            .filter(|packet| packet.source_ip == ip || packet.destination_ip == ip)
            .cloned()
            .collect();
        if packets.is_empty() {
            debug!("No traffic for {}", ip);
            return None;
        }

        let incoming: Dataset = packets
            .iter()
            .filter(|packet| packet.destination_ip == ip)
            .cloned()
            .collect();
        let outgoing: Dataset = packets
            .iter()
            .filter(|packet| packet.source_ip == ip)
            .cloned()
            .collect();
        let incoming_flows = flows_from_packets(&incoming);
        let outgoing_flows = flows_from_packets(&outgoing);

        Some(Self {
            ip: ip.to_string(),
            packets,
            incoming,
            outgoing,
            incoming_flows,
            outgoing_flows,
            stats: ModeCache::new(),
            graphs: ModeCache::new(),
            locations: HashMap::new(),
            hostnames: HashMap::new(),
        })
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Packets sent or received by the IP.
    pub fn packets(&self) -> &[PacketRef] {
        &self.packets
    }

    pub fn incoming(&self) -> &[PacketRef] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[PacketRef] {
        &self.outgoing
    }

    pub fn incoming_flows(&self) -> &[Flow] {
        &self.incoming_flows
    }

    pub fn outgoing_flows(&self) -> &[Flow] {
        &self.outgoing_flows
    }

    /// Statistics of every layer in `mode`, computed once per mode.
    pub fn stats(&mut self, mode: Mode) -> &Stats {
        let packets = &self.packets;
        self.stats
            .get_or_compute(mode, |mode| compute_stats(packets, mode))
    }

    /// IP graph in `mode`, computed once per mode.
    pub fn graph(&mut self, mode: Mode) -> &Graph {
        let packets = &self.packets;
        self.graphs
            .get_or_compute(mode, |mode| extract_graph(packets, mode))
    }

    /// Sankey diagram of the traffic through the IP.
    pub fn sankey(&mut self, mode: Mode, readability: Readability, cutoff: usize) -> SankeyGraph {
        let packets = &self.packets;
        let graph = self
            .graphs
            .get_or_compute(mode, |mode| extract_graph(packets, mode));
        construct_sankey_graph(&graph.links_single_direction, &self.ip, readability, cutoff)
    }

    /// Every IP this IP talks to, itself included, sorted.
    pub fn peers(&mut self) -> Vec<String> {
        let stats = self.stats(Mode::Packets);
        let peers: BTreeSet<&str> = stats
            .get(Layer::SourceIp)
            .iter()
            .chain(stats.get(Layer::DestinationIp))
            .map(|element| element.value.as_str())
            .collect();
        peers.into_iter().map(str::to_string).collect()
    }

    /// Traffic of the IP's peers grouped by country.
    pub fn countries(&mut self, mode: Mode) -> Vec<CountryCount> {
        let packets = &self.packets;
        let stats = self
            .stats
            .get_or_compute(mode, |mode| compute_stats(packets, mode));
        count_by_country(stats.get(Layer::Ip), &self.locations)
    }

    pub fn locations(&self) -> &HashMap<String, IpLocation> {
        &self.locations
    }

    pub fn hostnames(&self) -> &HashMap<String, String> {
        &self.hostnames
    }

    /// Look up locations and hostnames of every peer.
    ///
    /// Both lookups run concurrently. Results are dropped if `token` is
    /// cancelled by the time they arrive.
    pub async fn enrich(
        &mut self,
        geo: &GeoClient,
        hostnames: &HostnameClient,
        token: &CancellationToken,
    ) {
        let peers = self.peers();
        let (locations, names) = tokio::join!(
            geo.locate(&peers, token),
            hostnames.hostnames(&peers, token)
        );

        if token.is_cancelled() {
            debug!("Detail of {} closed before lookups finished", self.ip);
            return;
        }
        self.locations = locations;
        self.hostnames = names;
    }
}
