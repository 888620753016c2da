// PCAP Funnel - Filter Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Selections, per-layer filtering, and the filter cascade.

mod cascade;
mod layer_filter;
mod selection;

pub use cascade::{cascade_filters, cascade_from_top, CascadeState, Filters, SharedDataset};
pub use layer_filter::{filter_layer_by_selections, filter_time_range};
pub use selection::Selections;
