// PCAP Funnel - Filter Cascade
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Propagation of filter changes down the chain of filtration layers.
//!
//! ```text
//! time filter → layer[0] → layer[1] → … → layer[n-1] → filtered dataset
//! ```
//!
//! Each layer has an input dataset (the previous layer's output), a statistic
//! computed from that input in the layer's own mode, and a selection that may
//! only hold values present in that statistic. When anything upstream
//! changes, every layer below the change is re-derived in order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::models::{Dataset, FiltrationLayers, Layer, LayerModes, PacketRef};
use crate::stats::{compute_property_stat, Stats};

use super::layer_filter::filter_layer_by_selections;
use super::selection::Selections;

/// Shared, read-only slice of packets.
pub type SharedDataset = Arc<[PacketRef]>;

/// Input dataset of every layer.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    by_layer: HashMap<Layer, SharedDataset>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input dataset of `layer`; empty if the layer has never been cascaded.
    pub fn get(&self, layer: Layer) -> &[PacketRef] {
        self.by_layer.get(&layer).map(|d| d.as_ref()).unwrap_or(&[])
    }

    /// Cheap handle to the input dataset of `layer`.
    pub fn shared(&self, layer: Layer) -> SharedDataset {
        self.by_layer
            .get(&layer)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn set(&mut self, layer: Layer, dataset: SharedDataset) {
        self.by_layer.insert(layer, dataset);
    }
}

/// Everything the cascade derives: one coherent snapshot, replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct CascadeState {
    pub selections: Selections,
    pub stats: Stats,
    pub filters: Filters,
    /// Output of the last layer.
    pub filtered_dataset: Dataset,
}

impl CascadeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State with every layer emptied.
    pub fn reset() -> Self {
        Self::default()
    }
}

/// Re-derive every layer after `start_from`.
///
/// `dataset_at_start` is the input of layer `start_from`. For each following
/// layer, the previous layer's output (its input filtered through its own
/// selection) becomes the layer's new input; its statistic is recomputed in
/// its own mode and its selection pruned to the values still available.
/// Finally the last layer is filtered to produce the output dataset.
///
/// The statistic of layer `start_from` itself is left untouched.
pub fn cascade_filters(
    layers: &FiltrationLayers,
    modes: &LayerModes,
    mut state: CascadeState,
    dataset_at_start: &[PacketRef],
    start_from: usize,
) -> CascadeState {
    let chain = layers.as_slice();
    let Some(&last) = chain.last() else {
        state.filtered_dataset = dataset_at_start.to_vec();
        return state;
    };
    let start = start_from.min(chain.len() - 1);

    let mut filtered: SharedDataset = Arc::from(dataset_at_start);
    for pair in chain[start..].windows(2) {
        let (updated, affected) = (pair[0], pair[1]);
        filtered = filter_layer_by_selections(updated, &state.selections, &filtered).into();

        let mode = modes.get(affected);
        let stat = compute_property_stat(affected, &filtered, mode);
        let selected = state.selections.pruned(affected, &stat);
        debug!(
            "Cascade {} -> {}: {} packets, {} values, {} selected",
            updated,
            affected,
            filtered.len(),
            stat.len(),
            selected.len()
        );

        state.selections.set(affected, selected);
        state.stats.set(affected, stat);
        state.filters.set(affected, filtered.clone());
    }

    state.filtered_dataset = filter_layer_by_selections(last, &state.selections, &filtered);
    state
}

/// Recompute the whole chain from a new time-filtered dataset.
///
/// The first layer's statistic is computed directly from `time_filtered` and
/// its selection pruned before cascading from index 0.
pub fn cascade_from_top(
    layers: &FiltrationLayers,
    modes: &LayerModes,
    mut state: CascadeState,
    time_filtered: &SharedDataset,
) -> CascadeState {
    let Some(first) = layers.first() else {
        state.filtered_dataset = time_filtered.to_vec();
        return state;
    };

    let stat = compute_property_stat(first, time_filtered, modes.get(first));
    let selected = state.selections.pruned(first, &stat);
    state.selections.set(first, selected);
    state.stats.set(first, stat);
    state.filters.set(first, time_filtered.clone());

    cascade_filters(layers, modes, state, time_filtered, 0)
}
