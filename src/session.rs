// PCAP Funnel - Dashboard Session
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Dashboard state and the triggers that update it.
//!
//! A [`Session`] owns the loaded dataset, the time selection, the chain of
//! filtration layers with their modes, and the current [`CascadeState`].
//! Every trigger derives a complete new cascade state from the previous one
//! and stores it in one assignment, so readers never observe statistics and
//! selections from different generations.

use std::fmt;
use std::mem;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::DashboardSettings;
use crate::filter::{
    cascade_filters, cascade_from_top, filter_time_range, CascadeState, Selections, SharedDataset,
};
use crate::models::{time_extent, Dataset, FiltrationLayers, Layer, LayerModes, Mode, PacketRef};
use crate::presets::{FiltersDocument, Preset};
use crate::stats::{compute_property_stat, StatElement, Stats};

/// Portion of the capture timeline under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimeSelection {
    /// Nothing selected; the time-filtered dataset is empty.
    Nothing,
    /// Packets with `start <= timestamp <= end`.
    Range { start: f64, end: f64 },
    /// The whole capture, whatever its extent.
    #[default]
    Everything,
}

impl TimeSelection {
    /// Range selection, normalising reversed bounds.
    pub fn range(start: f64, end: f64) -> Self {
        if start <= end {
            TimeSelection::Range { start, end }
        } else {
            TimeSelection::Range {
                start: end,
                end: start,
            }
        }
    }

    /// Packets of `dataset` inside the selection.
    pub fn apply(&self, dataset: &[PacketRef]) -> Dataset {
        match *self {
            TimeSelection::Nothing => Vec::new(),
            TimeSelection::Range { start, end } => filter_time_range(dataset, start, end),
            TimeSelection::Everything => dataset.to_vec(),
        }
    }

    /// Concrete bounds of the selection over `dataset`.
    pub fn bounds(&self, dataset: &[PacketRef]) -> Option<(f64, f64)> {
        match *self {
            TimeSelection::Nothing => None,
            TimeSelection::Range { start, end } => Some((start, end)),
            TimeSelection::Everything => time_extent(dataset),
        }
    }
}

impl From<Option<(f64, f64)>> for TimeSelection {
    fn from(bounds: Option<(f64, f64)>) -> Self {
        match bounds {
            Some((start, end)) => TimeSelection::range(start, end),
            None => TimeSelection::Nothing,
        }
    }
}

/// Render an epoch timestamp as UTC date and time.
pub fn format_timestamp(timestamp: f64) -> String {
    let seconds = timestamp.floor();
    let nanos = ((timestamp - seconds) * 1e9) as u32;
    match DateTime::<Utc>::from_timestamp(seconds as i64, nanos) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{}", timestamp),
    }
}

impl fmt::Display for TimeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TimeSelection::Nothing => write!(f, "nothing"),
            TimeSelection::Range { start, end } => write!(
                f,
                "{} - {}",
                format_timestamp(start),
                format_timestamp(end)
            ),
            TimeSelection::Everything => write!(f, "everything"),
        }
    }
}

/// Dashboard state: dataset, time selection, layer chain, and cascade results.
#[derive(Debug, Clone)]
pub struct Session {
    dataset: Dataset,
    time_selection: TimeSelection,
    time_filtered: SharedDataset,
    layers: FiltrationLayers,
    modes: LayerModes,
    settings: DashboardSettings,
    state: CascadeState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DashboardSettings::default())
    }
}

impl Session {
    /// Empty session with every layer in the configured default mode.
    pub fn new(settings: DashboardSettings) -> Self {
        Self {
            dataset: Vec::new(),
            time_selection: TimeSelection::default(),
            time_filtered: Arc::from(Vec::new()),
            layers: FiltrationLayers::default(),
            modes: LayerModes::new(settings.default_mode),
            settings,
            state: CascadeState::new(),
        }
    }

    pub fn dataset(&self) -> &[PacketRef] {
        &self.dataset
    }

    pub fn time_selection(&self) -> TimeSelection {
        self.time_selection
    }

    pub fn time_filtered(&self) -> &[PacketRef] {
        &self.time_filtered
    }

    pub fn layers(&self) -> &FiltrationLayers {
        &self.layers
    }

    pub fn modes(&self) -> &LayerModes {
        &self.modes
    }

    pub fn mode(&self, layer: Layer) -> Mode {
        self.modes.get(layer)
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: DashboardSettings) {
        self.settings = settings;
    }

    pub fn state(&self) -> &CascadeState {
        &self.state
    }

    pub fn selections(&self) -> &Selections {
        &self.state.selections
    }

    pub fn stats(&self) -> &Stats {
        &self.state.stats
    }

    /// Statistic shown for `layer`.
    pub fn stat(&self, layer: Layer) -> &[StatElement] {
        self.state.stats.get(layer)
    }

    /// Input dataset of `layer`.
    pub fn layer_input(&self, layer: Layer) -> &[PacketRef] {
        self.state.filters.get(layer)
    }

    /// Output of the last layer.
    pub fn filtered_dataset(&self) -> &[PacketRef] {
        &self.state.filtered_dataset
    }

    // Dataset

    /// Replace the dataset, honouring the new-dataset settings.
    pub fn change_dataset(&mut self, dataset: Dataset) {
        info!("Loaded dataset with {} packets", dataset.len());
        self.dataset = dataset;
        if self.settings.clear_layers_on_new_dataset {
            self.layers = FiltrationLayers::default();
        }
        if self.settings.select_everything_on_new_dataset {
            self.time_selection = TimeSelection::Everything;
        }
        self.recompute();
    }

    /// Append a batch of packets, keeping the time selection.
    pub fn append_to_dataset(&mut self, batch: Dataset) {
        debug!("Appending {} packets to {}", batch.len(), self.dataset.len());
        self.dataset.extend(batch);
        self.recompute();
    }

    // Time

    pub fn set_time_selection(&mut self, selection: TimeSelection) {
        debug!("Time selection: {}", selection);
        self.time_selection = selection;
        self.recompute();
    }

    /// Re-derive the time-filtered dataset and every layer from scratch.
    fn recompute(&mut self) {
        self.time_filtered = self.time_selection.apply(&self.dataset).into();

        let mut state = mem::take(&mut self.state);
        state.stats = Stats::new();
        state.filters = Default::default();
        self.state = cascade_from_top(&self.layers, &self.modes, state, &self.time_filtered);
    }

    // Selections

    /// Check or uncheck `value` in `layer`.
    pub fn toggle_selection(&mut self, layer: Layer, value: &str) {
        self.update_selection(layer, |selections, _| selections.toggle(layer, value));
    }

    /// Check every value currently shown for `layer`.
    pub fn select_all(&mut self, layer: Layer) {
        self.update_selection(layer, |selections, stats| {
            selections.select_all(layer, stats.get(layer))
        });
    }

    /// Uncheck every value of `layer`.
    pub fn select_none(&mut self, layer: Layer) {
        self.update_selection(layer, |selections, _| selections.select_none(layer));
    }

    fn update_selection<F>(&mut self, layer: Layer, change: F)
    where
        F: FnOnce(&mut Selections, &Stats),
    {
        let Some(index) = self.layers.position(layer) else {
            warn!("Ignoring selection change on inactive layer {}", layer);
            return;
        };

        let mut state = mem::take(&mut self.state);
        change(&mut state.selections, &state.stats);
        let input = state.filters.shared(layer);
        self.state = cascade_filters(&self.layers, &self.modes, state, &input, index);
    }

    // Layers

    /// Replace the whole chain and recompute.
    pub fn reset_layers(&mut self, layers: FiltrationLayers) {
        info!("Filtration layers: {:?}", layers.as_slice());
        self.layers = layers;
        self.recompute();
    }

    pub fn apply_preset(&mut self, preset: &Preset) {
        info!("Applying preset {}", preset.name);
        self.reset_layers(preset.filtration_layers());
    }

    /// Replace `old` with `new` in place.
    ///
    /// If `new` is already in the chain, the later occurrence is dropped.
    pub fn switch_layer(&mut self, old: Layer, new: Layer) {
        let Some(index) = self.layers.position(old) else {
            warn!("Ignoring switch of inactive layer {}", old);
            return;
        };
        let layers = self.layers.replaced(index, new);
        self.cascade_from_changed_layer(index, layers);
    }

    /// Remove `layer` from the chain.
    pub fn delete_layer(&mut self, layer: Layer) {
        let Some(index) = self.layers.position(layer) else {
            warn!("Ignoring deletion of inactive layer {}", layer);
            return;
        };
        let layers = self.layers.without(layer);
        if layers.is_empty() {
            self.reset_layers(layers);
        } else {
            self.cascade_from_changed_layer(index, layers);
        }
    }

    /// Re-derive the chain after the layer at `index` changed.
    ///
    /// Everything above `index` is untouched; the cascade restarts from the
    /// layer just above, or from the time-filtered dataset for index 0.
    fn cascade_from_changed_layer(&mut self, index: usize, layers: FiltrationLayers) {
        let state = mem::take(&mut self.state);
        self.state = match index.checked_sub(1).and_then(|above| layers.get(above)) {
            Some(above) => {
                let input = state.filters.shared(above);
                cascade_filters(&layers, &self.modes, state, &input, index - 1)
            }
            None => cascade_from_top(&layers, &self.modes, state, &self.time_filtered),
        };
        self.layers = layers;
    }

    // Modes

    /// Measure `layer` (and its mode group) in `mode`.
    ///
    /// Every active layer of the group gets its statistic recomputed from its
    /// current input. Selected values that no longer appear are dropped and
    /// the chain below the topmost pruned layer is re-derived.
    pub fn switch_layer_mode(&mut self, layer: Layer, mode: Mode) {
        self.modes.set(layer, mode);
        let group = layer.mode_group();
        let state = mem::take(&mut self.state);
        self.state = self.remeasure(state, |active| group.contains(&active));
    }

    /// Measure every layer in `mode` and recompute every active statistic.
    pub fn switch_all_modes(&mut self, mode: Mode) {
        self.modes = LayerModes::new(mode);
        let mut state = mem::take(&mut self.state);
        state.stats = Stats::new();
        self.state = self.remeasure(state, |_| true);
    }

    /// Recompute the statistics of the active layers matching `changed` in
    /// their current modes, keeping every selection within its statistic.
    fn remeasure<F>(&self, mut state: CascadeState, changed: F) -> CascadeState
    where
        F: Fn(Layer) -> bool,
    {
        let mut topmost_pruned = None;
        for (index, layer) in self.layers.iter().enumerate() {
            if !changed(layer) {
                continue;
            }
            let mode = self.modes.get(layer);
            let stat = compute_property_stat(layer, state.filters.get(layer), mode);
            let selected = state.selections.pruned(layer, &stat);
            if selected.len() != state.selections.count(layer) {
                debug!(
                    "Mode switch dropped {} selected values of {}",
                    state.selections.count(layer) - selected.len(),
                    layer
                );
                state.selections.set(layer, selected);
                topmost_pruned.get_or_insert(index);
            }
            state.stats.set(layer, stat);
        }

        match topmost_pruned.and_then(|index| self.layers.get(index).map(|layer| (index, layer))) {
            Some((index, layer)) => {
                let input = state.filters.shared(layer);
                cascade_filters(&self.layers, &self.modes, state, &input, index)
            }
            None => state,
        }
    }

    // Import and export

    /// Replace layers and selections, then recompute.
    pub fn apply_imported_filters(
        &mut self,
        time_selection: TimeSelection,
        selections: Selections,
        layers: FiltrationLayers,
    ) {
        self.layers = layers;
        self.state.selections = selections;
        self.time_selection = if self.settings.ignore_time_on_filters_import {
            TimeSelection::Everything
        } else {
            time_selection
        };
        self.recompute();
    }

    pub fn apply_filters_document(&mut self, document: FiltersDocument) {
        let time_selection = TimeSelection::from(document.time_range());
        self.apply_imported_filters(
            time_selection,
            document.selections,
            document.filtration_layers,
        );
    }

    /// Current layers, selections, and time bounds as an exportable document.
    pub fn export_filters(&self) -> FiltersDocument {
        FiltersDocument::new(
            self.time_selection.bounds(&self.dataset),
            self.layers.clone(),
            self.state.selections.clone(),
        )
    }
}
