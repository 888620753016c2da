// PCAP Funnel - Layer Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Filtration layers, measurement modes, and record field access.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::packet::{Packet, NOT_AVAILABLE};

/// A single record field that statistics and filters can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    NetworkProtocol,
    TransportProtocol,
    ApplicationProtocol,
    SourceIp,
    DestinationIp,
    SourcePort,
    DestinationPort,
    App,
}

/// A filtration layer: the property a layer aggregates and filters by.
///
/// `Ip` and `Port` are combined layers that match on either the source or
/// the destination subfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    #[serde(rename = "networkProtocol")]
    NetworkProtocol,
    #[serde(rename = "transportProtocol")]
    TransportProtocol,
    #[serde(rename = "applicationProtocol")]
    ApplicationProtocol,
    #[serde(rename = "sourceIp")]
    SourceIp,
    #[serde(rename = "destinationIp")]
    DestinationIp,
    #[serde(rename = "sourcePort")]
    SourcePort,
    #[serde(rename = "destinationPort")]
    DestinationPort,
    #[serde(rename = "Ip")]
    Ip,
    #[serde(rename = "Port")]
    Port,
    #[serde(rename = "app")]
    App,
}

/// How a layer reads its value(s) from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Single(Field),
    /// Source and destination subfields of a combined layer.
    Pair(Field, Field),
}

impl Layer {
    pub const ALL: [Layer; 10] = [
        Layer::NetworkProtocol,
        Layer::TransportProtocol,
        Layer::ApplicationProtocol,
        Layer::SourceIp,
        Layer::DestinationIp,
        Layer::SourcePort,
        Layer::DestinationPort,
        Layer::Ip,
        Layer::Port,
        Layer::App,
    ];

    /// Field accessor used for aggregation and filtering.
    pub fn accessor(&self) -> Accessor {
        match self {
            Layer::NetworkProtocol => Accessor::Single(Field::NetworkProtocol),
            Layer::TransportProtocol => Accessor::Single(Field::TransportProtocol),
            Layer::ApplicationProtocol => Accessor::Single(Field::ApplicationProtocol),
            Layer::SourceIp => Accessor::Single(Field::SourceIp),
            Layer::DestinationIp => Accessor::Single(Field::DestinationIp),
            Layer::SourcePort => Accessor::Single(Field::SourcePort),
            Layer::DestinationPort => Accessor::Single(Field::DestinationPort),
            Layer::Ip => Accessor::Pair(Field::SourceIp, Field::DestinationIp),
            Layer::Port => Accessor::Pair(Field::SourcePort, Field::DestinationPort),
            Layer::App => Accessor::Single(Field::App),
        }
    }

    /// Whether this layer matches on both endpoints.
    pub fn is_combined(&self) -> bool {
        matches!(self.accessor(), Accessor::Pair(..))
    }

    /// Identifier used in exported filters and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::NetworkProtocol => "networkProtocol",
            Layer::TransportProtocol => "transportProtocol",
            Layer::ApplicationProtocol => "applicationProtocol",
            Layer::SourceIp => "sourceIp",
            Layer::DestinationIp => "destinationIp",
            Layer::SourcePort => "sourcePort",
            Layer::DestinationPort => "destinationPort",
            Layer::Ip => "Ip",
            Layer::Port => "Port",
            Layer::App => "app",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Layer::NetworkProtocol => "Network protocol",
            Layer::TransportProtocol => "Transport protocol",
            Layer::ApplicationProtocol => "Application protocol",
            Layer::SourceIp => "Source IP",
            Layer::DestinationIp => "Destination IP",
            Layer::SourcePort => "Source port",
            Layer::DestinationPort => "Destination port",
            Layer::Ip => "IP",
            Layer::Port => "Port",
            Layer::App => "Application",
        }
    }

    /// Layers whose modes are switched together with this one.
    pub fn mode_group(&self) -> &'static [Layer] {
        match self {
            Layer::SourceIp | Layer::DestinationIp | Layer::Ip => {
                &[Layer::SourceIp, Layer::DestinationIp, Layer::Ip]
            }
            Layer::SourcePort | Layer::DestinationPort | Layer::Port => {
                &[Layer::SourcePort, Layer::DestinationPort, Layer::Port]
            }
            Layer::NetworkProtocol => &[Layer::NetworkProtocol],
            Layer::TransportProtocol => &[Layer::TransportProtocol],
            Layer::ApplicationProtocol => &[Layer::ApplicationProtocol],
            Layer::App => &[Layer::App],
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layer::ALL
            .iter()
            .find(|layer| layer.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown layer: {}", s))
    }
}

/// Unit of measurement for a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Packets,
    Bytes,
    Flows,
    Biflows,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Packets, Mode::Bytes, Mode::Flows, Mode::Biflows];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Packets => "packets",
            Mode::Bytes => "bytes",
            Mode::Flows => "flows",
            Mode::Biflows => "biflows",
        }
    }

    /// Name shown next to counts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Packets => "packets",
            Mode::Bytes => "bytes",
            Mode::Flows => "connections",
            Mode::Biflows => "bi-connections",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .iter()
            .find(|mode| mode.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown mode: {}", s))
    }
}

/// Measurement mode of every layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerModes {
    modes: HashMap<Layer, Mode>,
}

impl Default for LayerModes {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl LayerModes {
    /// All layers measured in `mode`.
    pub fn new(mode: Mode) -> Self {
        Self {
            modes: Layer::ALL.iter().map(|layer| (*layer, mode)).collect(),
        }
    }

    pub fn get(&self, layer: Layer) -> Mode {
        self.modes.get(&layer).copied().unwrap_or_default()
    }

    /// Set the mode of `layer` and of every layer in its mode group.
    pub fn set(&mut self, layer: Layer, mode: Mode) {
        for grouped in layer.mode_group() {
            self.modes.insert(*grouped, mode);
        }
    }
}

/// Ordered, duplicate-free chain of filtration layers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct FiltrationLayers(Vec<Layer>);

impl From<Vec<Layer>> for FiltrationLayers {
    fn from(layers: Vec<Layer>) -> Self {
        Self::new(layers)
    }
}

impl From<FiltrationLayers> for Vec<Layer> {
    fn from(layers: FiltrationLayers) -> Self {
        layers.0
    }
}

impl FiltrationLayers {
    /// Build a chain, keeping the first occurrence of each layer.
    pub fn new(layers: impl IntoIterator<Item = Layer>) -> Self {
        let mut chain = Vec::new();
        for layer in layers {
            if !chain.contains(&layer) {
                chain.push(layer);
            }
        }
        Self(chain)
    }

    pub fn as_slice(&self) -> &[Layer] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Layer> {
        self.0.get(index).copied()
    }

    pub fn first(&self) -> Option<Layer> {
        self.0.first().copied()
    }

    pub fn position(&self, layer: Layer) -> Option<usize> {
        self.0.iter().position(|l| *l == layer)
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.0.contains(&layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = Layer> + '_ {
        self.0.iter().copied()
    }

    /// Replace the layer at `index`, deduplicating the resulting chain.
    pub fn replaced(&self, index: usize, layer: Layer) -> Self {
        let mut layers = self.0.clone();
        if let Some(slot) = layers.get_mut(index) {
            *slot = layer;
        }
        Self::new(layers)
    }

    /// Chain without `layer`.
    pub fn without(&self, layer: Layer) -> Self {
        Self(self.0.iter().copied().filter(|l| *l != layer).collect())
    }
}

/// Read access to the fields a layer aggregates on.
///
/// Absent values read as [`NOT_AVAILABLE`].
pub trait Record {
    fn field(&self, field: Field) -> Cow<'_, str>;
}

fn optional_text(value: &Option<String>) -> Cow<'_, str> {
    match value {
        Some(text) => Cow::Borrowed(text.as_str()),
        None => Cow::Borrowed(NOT_AVAILABLE),
    }
}

pub(crate) fn optional_port(value: Option<u32>) -> Cow<'static, str> {
    match value {
        Some(port) => Cow::Owned(port.to_string()),
        None => Cow::Borrowed(NOT_AVAILABLE),
    }
}

impl Record for Packet {
    fn field(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::NetworkProtocol => optional_text(&self.network_protocol),
            Field::TransportProtocol => optional_text(&self.transport_protocol),
            Field::ApplicationProtocol => optional_text(&self.application_protocol),
            Field::SourceIp => Cow::Borrowed(self.source_ip.as_str()),
            Field::DestinationIp => Cow::Borrowed(self.destination_ip.as_str()),
            Field::SourcePort => optional_port(self.source_port),
            Field::DestinationPort => optional_port(self.destination_port),
            Field::App => optional_text(&self.app),
        }
    }
}

impl<T: Record + ?Sized> Record for Arc<T> {
    fn field(&self, field: Field) -> Cow<'_, str> {
        (**self).field(field)
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn field(&self, field: Field) -> Cow<'_, str> {
        (**self).field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_names_round_trip_through_from_str() {
        for layer in Layer::ALL {
            assert_eq!(layer.as_str().parse::<Layer>(), Ok(layer));
        }
        assert!("ip".parse::<Layer>().is_err());
    }

    #[test]
    fn test_layer_serde_names() {
        let json = serde_json::to_string(&vec![Layer::Ip, Layer::App, Layer::SourcePort]).unwrap();
        assert_eq!(json, r#"["Ip","app","sourcePort"]"#);
    }

    #[test]
    fn test_filtration_layers_deduplicate() {
        let layers = FiltrationLayers::new(vec![Layer::App, Layer::Ip, Layer::App, Layer::Port]);
        assert_eq!(layers.as_slice(), &[Layer::App, Layer::Ip, Layer::Port]);

        let switched = layers.replaced(2, Layer::Ip);
        assert_eq!(switched.as_slice(), &[Layer::App, Layer::Ip]);

        let parsed: FiltrationLayers = serde_json::from_str(r#"["Ip","Ip","app"]"#).unwrap();
        assert_eq!(parsed.as_slice(), &[Layer::Ip, Layer::App]);
    }

    #[test]
    fn test_mode_groups_switch_together() {
        let mut modes = LayerModes::new(Mode::Packets);
        modes.set(Layer::Ip, Mode::Bytes);
        assert_eq!(modes.get(Layer::SourceIp), Mode::Bytes);
        assert_eq!(modes.get(Layer::DestinationIp), Mode::Bytes);
        assert_eq!(modes.get(Layer::Port), Mode::Packets);

        modes.set(Layer::DestinationPort, Mode::Flows);
        assert_eq!(modes.get(Layer::Port), Mode::Flows);
        assert_eq!(modes.get(Layer::App), Mode::Packets);
    }

    #[test]
    fn test_packet_fields_default_to_not_available() {
        let packet = Packet::new(1, 0.0, "10.0.0.1", "10.0.0.2");
        assert_eq!(packet.field(Field::App), NOT_AVAILABLE);
        assert_eq!(packet.field(Field::SourcePort), NOT_AVAILABLE);
        assert_eq!(packet.field(Field::SourceIp), "10.0.0.1");

        let packet = packet.with_ports(80, 443);
        assert_eq!(packet.field(Field::DestinationPort), "443");
    }
}
