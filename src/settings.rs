// src/settings.rs
//
// Conversion settings, partial updates, and persistence through an opaque
// key-value store.

use crate::formats::OutputFormatKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Fixed namespace key under which the last-used settings are persisted.
pub const SETTINGS_NAMESPACE: &str = "imgconv.settings.v1";

/// Quality used whenever the configured value is unset or invalid.
pub const DEFAULT_QUALITY: f32 = 0.85;

/// User-facing conversion settings, shared by every item in a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub output_format: OutputFormatKey,
    /// Quality in [0.1, 1.0]; meaningful only for lossy output formats.
    pub quality: f32,
    pub resize_enabled: bool,
    /// Target dimensions; ignored entirely while `resize_enabled` is false.
    pub resize_width: Option<u32>,
    pub resize_height: Option<u32>,
    pub lock_aspect: bool,
    /// Hex RGB background, used only when flattening alpha for opaque-only
    /// formats.
    pub background: String,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormatKey::Png,
            quality: DEFAULT_QUALITY,
            resize_enabled: false,
            resize_width: None,
            resize_height: None,
            lock_aspect: true,
            background: "#ffffff".to_string(),
        }
    }
}

impl ConversionSettings {
    /// Quality clamped to the valid range, falling back to the default for
    /// unset or invalid values.
    pub fn effective_quality(&self) -> f32 {
        if self.quality.is_finite() && (0.1..=1.0).contains(&self.quality) {
            self.quality
        } else {
            DEFAULT_QUALITY
        }
    }
}

/// Partial settings update; only the present fields are applied.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub output_format: Option<OutputFormatKey>,
    pub quality: Option<f32>,
    pub resize_enabled: Option<bool>,
    pub resize_width: Option<Option<u32>>,
    pub resize_height: Option<Option<u32>>,
    pub lock_aspect: Option<bool>,
    pub background: Option<String>,
}

impl SettingsUpdate {
    pub fn apply(self, settings: &mut ConversionSettings) {
        if let Some(v) = self.output_format {
            settings.output_format = v;
        }
        if let Some(v) = self.quality {
            settings.quality = v;
        }
        if let Some(v) = self.resize_enabled {
            settings.resize_enabled = v;
        }
        if let Some(v) = self.resize_width {
            settings.resize_width = v;
        }
        if let Some(v) = self.resize_height {
            settings.resize_height = v;
        }
        if let Some(v) = self.lock_aspect {
            settings.lock_aspect = v;
        }
        if let Some(v) = self.background {
            settings.background = v;
        }
    }
}

/// Opaque persistence for the last-used settings. Implementations may be
/// backed by anything that stores strings under keys.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory store, the default for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: HashMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// Load persisted settings; corrupt or missing data falls back to defaults.
pub fn load_settings(store: &dyn SettingsStore) -> ConversionSettings {
    match store.get(SETTINGS_NAMESPACE) {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(%err, "persisted settings are corrupt, using defaults");
                ConversionSettings::default()
            }
        },
        None => ConversionSettings::default(),
    }
}

/// Persist the settings as JSON under the fixed namespace key.
pub fn save_settings(store: &mut dyn SettingsStore, settings: &ConversionSettings) {
    match serde_json::to_string(settings) {
        Ok(raw) => store.set(SETTINGS_NAMESPACE, &raw),
        Err(err) => warn!(%err, "failed to serialize settings"),
    }
}
