// PCAP Funnel - Dataset Summary
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

use std::borrow::Borrow;
use std::collections::HashSet;

use serde::Serialize;

use crate::models::{flows_from_packets, Packet};

/// Headline numbers of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NumberStats {
    pub packets: u64,
    pub flows: u64,
    pub bytes: u64,
    /// Distinct source and destination IPs.
    pub ips: u64,
}

impl NumberStats {
    pub fn from_dataset<P: Borrow<Packet>>(dataset: &[P]) -> Self {
        let mut ips: HashSet<&str> = HashSet::new();
        let mut bytes = 0;
        for packet in dataset {
            let packet: &Packet = packet.borrow();
            ips.insert(&packet.source_ip);
            ips.insert(&packet.destination_ip);
            bytes += packet.bytes;
        }

        Self {
            packets: dataset.len() as u64,
            flows: flows_from_packets(dataset).len() as u64,
            bytes,
            ips: ips.len() as u64,
        }
    }
}
