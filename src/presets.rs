// PCAP Funnel - Filter Presets
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Predefined layer chains and the exported filter document.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::Selections;
use crate::models::{FiltrationLayers, Layer};

/// Header identifying an exported filter document.
pub const FILTERS_HEADER: &str = "PcapViz exported filters";

/// A named layer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub layers: &'static [Layer],
}

impl Preset {
    pub fn filtration_layers(&self) -> FiltrationLayers {
        FiltrationLayers::new(self.layers.iter().copied())
    }
}

pub const PRESETS: [Preset; 5] = [
    Preset {
        name: "Application -> Network (quick)",
        layers: &[Layer::App, Layer::Ip],
    },
    Preset {
        name: "Application -> Network (detailed)",
        layers: &[Layer::App, Layer::Port, Layer::Ip],
    },
    Preset {
        name: "Network -> Application (quick)",
        layers: &[Layer::Ip, Layer::Port, Layer::App],
    },
    Preset {
        name: "Network -> Application (detailed)",
        layers: &[
            Layer::NetworkProtocol,
            Layer::Ip,
            Layer::TransportProtocol,
            Layer::Port,
            Layer::App,
        ],
    },
    Preset {
        name: "No filters",
        layers: &[],
    },
];

/// Look up a preset by name, ignoring case.
pub fn preset(name: &str) -> Option<&'static Preset> {
    PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name.trim()))
}

#[derive(Debug, Error)]
pub enum FiltersError {
    #[error("Failed to read filters file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filters file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Not a filters export (header {0:?})")]
    WrongHeader(String),
}

/// Filter configuration as exported to and imported from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltersDocument {
    pub header: String,
    /// Inclusive `[start, end]`; `null` for an empty time selection.
    #[serde(default)]
    pub time_selection: Option<[f64; 2]>,
    #[serde(default)]
    pub filtration_layers: FiltrationLayers,
    #[serde(default)]
    pub selections: Selections,
}

impl FiltersDocument {
    pub fn new(
        time_selection: Option<(f64, f64)>,
        filtration_layers: FiltrationLayers,
        selections: Selections,
    ) -> Self {
        Self {
            header: FILTERS_HEADER.to_string(),
            time_selection: time_selection.map(|(start, end)| [start, end]),
            filtration_layers,
            selections,
        }
    }

    /// Parse an exported document, rejecting anything without the header.
    pub fn from_json(json: &str) -> Result<Self, FiltersError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let header = value
            .get("header")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if header != FILTERS_HEADER {
            return Err(FiltersError::WrongHeader(header.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize with selection values sorted.
    pub fn to_json(&self) -> Result<String, FiltersError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, FiltersError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), FiltersError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn time_range(&self) -> Option<(f64, f64)> {
        self.time_selection.map(|[start, end]| (start, end))
    }
}
