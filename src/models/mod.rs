// PCAP Funnel - Models
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Data models for packets, flows, and filtration layers.

mod flow;
mod layer;
mod packet;

pub use flow::{flows_from_packets, flows_from_packets_bidirectional, Flow};
pub use layer::{Accessor, Field, FiltrationLayers, Layer, LayerModes, Mode, Record};
pub use packet::{
    dataset_from_json, into_dataset, time_extent, Dataset, Packet, PacketRef, NOT_AVAILABLE,
};
