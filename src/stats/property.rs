// PCAP Funnel - Property Statistics
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Per-property statistics over packets or flows.

use std::borrow::{Borrow, Cow};
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{
    flows_from_packets, flows_from_packets_bidirectional, Accessor, Layer, Mode, Packet, Record,
};

/// One row of a statistic: a property value and its accumulated count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatElement {
    pub value: String,
    /// Packets, bytes, or flows, depending on the mode.
    pub count: u64,
}

impl StatElement {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// Statistics of every layer, keyed by layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    by_layer: HashMap<Layer, Vec<StatElement>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistic of `layer`, empty if never computed.
    pub fn get(&self, layer: Layer) -> &[StatElement] {
        self.by_layer.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&mut self, layer: Layer, stat: Vec<StatElement>) {
        self.by_layer.insert(layer, stat);
    }

    /// Distinct values present in the statistic of `layer`.
    pub fn values(&self, layer: Layer) -> HashSet<&str> {
        self.get(layer).iter().map(|e| e.value.as_str()).collect()
    }

    /// Sum of all counts of `layer`.
    pub fn total(&self, layer: Layer) -> u64 {
        self.get(layer).iter().map(|e| e.count).sum()
    }
}

/// Insertion-ordered accumulator; the descending sort is stable, so ties keep
/// the order in which values were first seen.
#[derive(Debug, Default)]
struct Tally {
    index: HashMap<String, usize>,
    rows: Vec<StatElement>,
}

impl Tally {
    fn add(&mut self, value: Cow<'_, str>, amount: u64) {
        if let Some(&slot) = self.index.get(value.as_ref()) {
            self.rows[slot].count += amount;
        } else {
            let value = value.into_owned();
            self.index.insert(value.clone(), self.rows.len());
            self.rows.push(StatElement::new(value, amount));
        }
    }

    fn add_record<R: Record>(&mut self, accessor: Accessor, record: &R, amount: u64) {
        match accessor {
            Accessor::Single(field) => self.add(record.field(field), amount),
            Accessor::Pair(source, destination) => {
                self.add(record.field(source), amount);
                self.add(record.field(destination), amount);
            }
        }
    }

    fn into_sorted(mut self) -> Vec<StatElement> {
        self.rows.sort_by(|a, b| b.count.cmp(&a.count));
        self.rows
    }
}

/// Compute the statistic of `layer` over `dataset`, measured in `mode`.
///
/// Combined layers count each record under both its source and destination
/// value. Flow modes count flows per value, not the packets inside them.
/// The result is sorted by count, descending.
pub fn compute_property_stat<P: Borrow<Packet>>(
    layer: Layer,
    dataset: &[P],
    mode: Mode,
) -> Vec<StatElement> {
    let accessor = layer.accessor();
    let mut tally = Tally::default();

    match mode {
        Mode::Packets => {
            for packet in dataset {
                let packet: &Packet = packet.borrow();
                tally.add_record(accessor, packet, 1);
            }
        }
        Mode::Bytes => {
            for packet in dataset {
                let packet: &Packet = packet.borrow();
                tally.add_record(accessor, packet, packet.bytes);
            }
        }
        Mode::Flows | Mode::Biflows => {
            let flows = if mode == Mode::Flows {
                flows_from_packets(dataset)
            } else {
                flows_from_packets_bidirectional(dataset)
            };
            for flow in &flows {
                tally.add_record(accessor, flow, 1);
            }
        }
    }

    tally.into_sorted()
}

/// Compute the statistic of every layer over `dataset`.
pub fn compute_stats<P: Borrow<Packet>>(dataset: &[P], mode: Mode) -> Stats {
    let mut stats = Stats::new();
    for layer in Layer::ALL {
        stats.set(layer, compute_property_stat(layer, dataset, mode));
    }
    stats
}
