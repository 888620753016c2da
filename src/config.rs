// PCAP Funnel - Configuration
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Dashboard settings management using a local JSON file.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Mode;

/// Dashboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    /// Select the whole capture when a new dataset is loaded; otherwise the
    /// current time selection carries over.
    #[serde(default = "default_true")]
    pub select_everything_on_new_dataset: bool,
    /// Drop every filtration layer when a new dataset is loaded.
    #[serde(default)]
    pub clear_layers_on_new_dataset: bool,
    /// Select the whole capture instead of the exported time range on import.
    #[serde(default)]
    pub ignore_time_on_filters_import: bool,
    /// Mode every layer starts in.
    #[serde(default)]
    pub default_mode: Mode,
    /// Base URL of the geolocation server.
    #[serde(default = "default_geo_server_url")]
    pub geo_server_url: String,
    /// Rows shown per statistic.
    #[serde(default = "default_stat_limit")]
    pub stat_limit: usize,
}

fn default_true() -> bool { true }
fn default_geo_server_url() -> String { "http://localhost:5001".to_string() }
fn default_stat_limit() -> usize { 10 }

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            select_everything_on_new_dataset: true,
            clear_layers_on_new_dataset: false,
            ignore_time_on_filters_import: false,
            default_mode: Mode::default(),
            geo_server_url: default_geo_server_url(),
            stat_limit: default_stat_limit(),
        }
    }
}

/// Settings manager that persists to a JSON file.
#[derive(Debug)]
pub struct Settings {
    settings: DashboardSettings,
    path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Create a new Settings instance, loading from the user config directory.
    pub fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pcap-funnel")
            .join("settings.json");
        Self::load(path)
    }

    /// Load settings from `path`, falling back to defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => {
                    match serde_json::from_str(&content) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("Failed to parse settings: {}", e);
                            DashboardSettings::default()
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to read settings: {}", e);
                    DashboardSettings::default()
                }
            }
        } else {
            DashboardSettings::default()
        };

        Self { settings, path }
    }

    /// Save settings to disk.
    pub fn save(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        match serde_json::to_string_pretty(&self.settings) {
            Ok(content) => {
                if let Err(e) = fs::write(&self.path, content) {
                    warn!("Failed to save settings: {}", e);
                }
            }
            Err(e) => {
                warn!("Failed to serialize settings: {}", e);
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current dashboard settings.
    pub fn dashboard(&self) -> &DashboardSettings {
        &self.settings
    }

    /// Replace all settings at once.
    pub fn set_dashboard(&mut self, settings: DashboardSettings) {
        self.settings = settings;
        self.save();
    }

    /// Set the mode every layer starts in.
    pub fn set_default_mode(&mut self, mode: Mode) {
        self.settings.default_mode = mode;
        self.save();
    }

    /// Set the geolocation server URL.
    pub fn set_geo_server_url(&mut self, url: &str) {
        self.settings.geo_server_url = url.to_string();
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("pcap-funnel-test-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: DashboardSettings =
            serde_json::from_str(r#"{"clearLayersOnNewDataset": true}"#).unwrap();
        assert!(settings.clear_layers_on_new_dataset);
        assert!(settings.select_everything_on_new_dataset);
        assert_eq!(settings.stat_limit, 10);
        assert_eq!(settings.default_mode, Mode::Packets);
    }

    #[test]
    fn test_new_dataset_setting_key() {
        let settings: DashboardSettings =
            serde_json::from_str(r#"{"selectEverythingOnNewDataset": false}"#).unwrap();
        assert!(!settings.select_everything_on_new_dataset);

        let json = serde_json::to_value(DashboardSettings::default()).unwrap();
        assert_eq!(json["selectEverythingOnNewDataset"], true);
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_path("reload");
        let mut settings = Settings::load(&path);
        assert_eq!(settings.dashboard(), &DashboardSettings::default());

        settings.set_default_mode(Mode::Bytes);
        settings.set_geo_server_url("http://geo.example:5001");

        let reloaded = Settings::load(&path);
        assert_eq!(reloaded.dashboard().default_mode, Mode::Bytes);
        assert_eq!(reloaded.dashboard().geo_server_url, "http://geo.example:5001");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{broken").unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.dashboard(), &DashboardSettings::default());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
