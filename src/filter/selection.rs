// PCAP Funnel - Layer Selections
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Checked values of every filtration layer.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Layer;
use crate::stats::StatElement;

/// Per-layer set of selected values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    by_layer: HashMap<Layer, HashSet<String>>,
}

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected values of `layer`; empty if nothing was ever selected.
    pub fn get(&self, layer: Layer) -> Option<&HashSet<String>> {
        self.by_layer.get(&layer)
    }

    /// Whether `value` is selected in `layer`.
    pub fn contains(&self, layer: Layer, value: &str) -> bool {
        self.by_layer
            .get(&layer)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    /// Number of selected values in `layer`.
    pub fn count(&self, layer: Layer) -> usize {
        self.by_layer.get(&layer).map(HashSet::len).unwrap_or(0)
    }

    pub fn set<I, S>(&mut self, layer: Layer, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_layer
            .insert(layer, values.into_iter().map(Into::into).collect());
    }

    /// Add `value` if absent, remove it if present.
    pub fn toggle(&mut self, layer: Layer, value: &str) {
        let values = self.by_layer.entry(layer).or_default();
        if !values.remove(value) {
            values.insert(value.to_string());
        }
    }

    /// Select every value of `stat`.
    pub fn select_all(&mut self, layer: Layer, stat: &[StatElement]) {
        self.set(layer, stat.iter().map(|e| e.value.clone()));
    }

    /// Clear the selection of `layer`.
    pub fn select_none(&mut self, layer: Layer) {
        self.by_layer.insert(layer, HashSet::new());
    }

    /// Selection of `layer` restricted to the values present in `stat`.
    ///
    /// Selected values that are still available are kept; values that
    /// disappeared are dropped. Nothing is added.
    pub fn pruned(&self, layer: Layer, stat: &[StatElement]) -> HashSet<String> {
        let Some(selected) = self.by_layer.get(&layer) else {
            return HashSet::new();
        };
        let available: HashSet<&str> = stat.iter().map(|e| e.value.as_str()).collect();
        selected
            .iter()
            .filter(|value| available.contains(value.as_str()))
            .cloned()
            .collect()
    }

    /// Sorted value lists, for export.
    pub fn to_sorted_lists(&self) -> BTreeMap<Layer, Vec<String>> {
        self.by_layer
            .iter()
            .map(|(layer, values)| {
                let mut values: Vec<String> = values.iter().cloned().collect();
                values.sort();
                (*layer, values)
            })
            .collect()
    }
}

impl Serialize for Selections {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_sorted_lists().serialize(serializer)
    }
}

/// Unknown layer names are skipped with a warning.
impl<'de> Deserialize<'de> for Selections {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let lists = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        let mut selections = Selections::new();
        for (name, values) in lists {
            match name.parse::<Layer>() {
                Ok(layer) => selections.set(layer, values),
                Err(_) => warn!("Ignoring selections of unknown layer {}", name),
            }
        }
        Ok(selections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_adds_and_removes() {
        let mut selections = Selections::new();
        selections.toggle(Layer::App, "dns");
        assert!(selections.contains(Layer::App, "dns"));
        selections.toggle(Layer::App, "dns");
        assert!(!selections.contains(Layer::App, "dns"));
        assert_eq!(selections.count(Layer::App), 0);
    }

    #[test]
    fn test_select_all_and_none() {
        let stat = vec![StatElement::new("tcp", 3), StatElement::new("udp", 1)];
        let mut selections = Selections::new();
        selections.select_all(Layer::TransportProtocol, &stat);
        assert_eq!(selections.count(Layer::TransportProtocol), 2);
        selections.select_none(Layer::TransportProtocol);
        assert_eq!(selections.count(Layer::TransportProtocol), 0);
    }

    #[test]
    fn test_pruned_keeps_only_available_values() {
        let mut selections = Selections::new();
        selections.set(Layer::Ip, ["10.0.0.1", "10.0.0.9"]);
        let stat = vec![StatElement::new("10.0.0.1", 4), StatElement::new("10.0.0.2", 2)];

        let pruned = selections.pruned(Layer::Ip, &stat);
        assert_eq!(pruned.len(), 1);
        assert!(pruned.contains("10.0.0.1"));
        assert!(selections.pruned(Layer::Port, &stat).is_empty());
    }

    #[test]
    fn test_serde_uses_layer_names() {
        let mut selections = Selections::new();
        selections.set(Layer::Ip, ["b", "a"]);
        let json = serde_json::to_string(&selections).unwrap();
        assert_eq!(json, r#"{"Ip":["a","b"]}"#);

        let parsed: Selections = serde_json::from_str(r#"{"app":["dns"],"Port":["80"]}"#).unwrap();
        assert!(parsed.contains(Layer::App, "dns"));
        assert!(parsed.contains(Layer::Port, "80"));
    }

    #[test]
    fn test_unknown_layer_names_are_skipped() {
        let parsed: Selections =
            serde_json::from_str(r#"{"vlan":["7"],"app":["dns"],"ip":["10.0.0.1"]}"#).unwrap();
        assert!(parsed.contains(Layer::App, "dns"));
        assert_eq!(parsed.count(Layer::Ip), 0);
        assert_eq!(parsed.to_sorted_lists().len(), 1);

        assert!(serde_json::from_str::<Selections>(r#"{"app":"dns"}"#).is_err());
    }
}
