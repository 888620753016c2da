// PCAP Funnel - Library Root
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Cascading filter and aggregation engine for parsed packet captures.
//!
//! A dataset is narrowed by a time selection and then by an ordered chain of
//! filtration layers. Each layer shows a statistic of its input, measured in
//! packets, bytes, flows, or bi-directional flows, and passes on only the
//! packets matching its selected values.

pub mod config;
pub mod detail;
pub mod filter;
pub mod graph;
pub mod ingest;
pub mod lookup;
pub mod models;
pub mod presets;
pub mod session;
pub mod stats;

pub use config::{DashboardSettings, Settings};
pub use session::{Session, TimeSelection};
