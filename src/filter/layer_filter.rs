// PCAP Funnel - Layer Filter
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Reduce a dataset to the records matching a layer's selection.

use crate::models::{Accessor, Layer, PacketRef, Record};

use super::selection::Selections;

/// Records of `dataset` whose `layer` value is selected, in dataset order.
///
/// Combined layers pass a record if either endpoint is selected. Absent
/// values read as `"N/A"`, so they pass only if `"N/A"` is selected. An empty
/// selection passes nothing.
pub fn filter_layer_by_selections<R>(layer: Layer, selections: &Selections, dataset: &[R]) -> Vec<R>
where
    R: Record + Clone,
{
    let Some(selected) = selections.get(layer).filter(|values| !values.is_empty()) else {
        return Vec::new();
    };

    match layer.accessor() {
        Accessor::Single(field) => dataset
            .iter()
            .filter(|record| selected.contains(record.field(field).as_ref()))
            .cloned()
            .collect(),
        Accessor::Pair(source, destination) => dataset
            .iter()
            .filter(|record| {
                selected.contains(record.field(source).as_ref())
                    || selected.contains(record.field(destination).as_ref())
            })
            .cloned()
            .collect(),
    }
}

/// Packets whose timestamp lies in `[start, end]`.
pub fn filter_time_range(dataset: &[PacketRef], start: f64, end: f64) -> Vec<PacketRef> {
    dataset
        .iter()
        .filter(|packet| packet.timestamp >= start && packet.timestamp <= end)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{into_dataset, Packet, NOT_AVAILABLE};

    fn dataset() -> Vec<PacketRef> {
        into_dataset(vec![
            Packet::new(1, 1.0, "10.0.0.1", "10.0.0.2")
                .with_protocols("ip", "tcp")
                .with_ports(80, 1234),
            Packet::new(2, 2.0, "10.0.0.2", "10.0.0.1")
                .with_protocols("ip", "tcp")
                .with_ports(1234, 80)
                .with_app("web"),
            Packet::new(3, 3.0, "10.0.0.1", "10.0.0.3")
                .with_protocols("ip", "udp")
                .with_ports(53, 1111),
        ])
    }

    #[test]
    fn test_single_field_filter_preserves_order() {
        let mut selections = Selections::new();
        selections.set(Layer::TransportProtocol, ["tcp"]);
        let result = filter_layer_by_selections(Layer::TransportProtocol, &selections, &dataset());
        let indexes: Vec<u64> = result.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![1, 2]);
    }

    #[test]
    fn test_combined_layer_matches_either_endpoint() {
        let mut selections = Selections::new();
        selections.set(Layer::Ip, ["10.0.0.3"]);
        let result = filter_layer_by_selections(Layer::Ip, &selections, &dataset());
        assert_eq!(result.len(), 1);

        selections.set(Layer::Port, ["80"]);
        let result = filter_layer_by_selections(Layer::Port, &selections, &dataset());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_not_available_matches_missing_values() {
        let mut selections = Selections::new();
        selections.set(Layer::App, [NOT_AVAILABLE]);
        let result = filter_layer_by_selections(Layer::App, &selections, &dataset());
        let indexes: Vec<u64> = result.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![1, 3]);
    }

    #[test]
    fn test_empty_selection_filters_everything() {
        let selections = Selections::new();
        assert!(filter_layer_by_selections(Layer::Ip, &selections, &dataset()).is_empty());

        let mut selections = Selections::new();
        selections.select_none(Layer::App);
        assert!(filter_layer_by_selections(Layer::App, &selections, &dataset()).is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut selections = Selections::new();
        selections.set(Layer::Ip, ["10.0.0.2"]);
        let once = filter_layer_by_selections(Layer::Ip, &selections, &dataset());
        let twice = filter_layer_by_selections(Layer::Ip, &selections, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let result = filter_time_range(&dataset(), 2.0, 3.0);
        assert_eq!(result.len(), 2);
        assert!(filter_time_range(&dataset(), 4.0, 9.0).is_empty());
    }
}
