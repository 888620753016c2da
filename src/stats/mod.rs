// PCAP Funnel - Statistics Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Property statistics, dataset summaries, per-mode caching, and country
//! aggregation.

mod cache;
mod geo;
mod property;
mod summary;

pub use cache::ModeCache;
pub use geo::{count_by_country, top_country, CountryCount};
pub use property::{compute_property_stat, compute_stats, StatElement, Stats};
pub use summary::NumberStats;
