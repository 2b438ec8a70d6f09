//! Settings adapter.
//!
//! Implements both [`SettingsStore`] and [`ConfigPort`] over a flat
//! string → string map, optionally backed by a JSON file.
//!
//! # Layout
//!
//! - Namespaced keys: bindings live under `script:<identifier>`, the engine
//!   config under [`CONFIG_KEY`].
//! - Config validation: all fields are range-checked before persistence.
//! - Atomic writes: [`flush`](SettingsStore::flush) writes a sibling temp
//!   file and renames it over the original.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, SettingsStore, StoreError};
use crate::config::EngineConfig;

/// Key holding the serialized [`EngineConfig`].
pub const CONFIG_KEY: &str = "engine:config";

#[derive(Debug, Default)]
pub struct SettingsAdapter {
    values: BTreeMap<String, String>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl SettingsAdapter {
    /// In-memory store with no backing file.
    pub fn in_memory() -> Self {
        info!("SettingsAdapter: in-memory backend");
        Self::default()
    }

    /// Open (or start) the settings file at `path`.
    ///
    /// A missing file yields an empty store; it is created on the first
    /// [`flush`](SettingsStore::flush).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| StoreError::Corrupted(e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("SettingsAdapter: {} not found, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            "SettingsAdapter: opened {} ({} key(s))",
            path.display(),
            values.len()
        );
        Ok(Self {
            values,
            path: Some(path),
            dirty: false,
        })
    }

    /// Remove a key.  True iff it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let existed = self.values.remove(key).is_some();
        self.dirty |= existed;
        existed
    }

    /// Keys currently held, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// True if there are writes not yet flushed to the backing file.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl SettingsStore for SettingsAdapter {
    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_value(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_owned())
    }

    fn set_value(&mut self, key: &str, value: &str) {
        if self.values.get(key).map(String::as_str) != Some(value) {
            self.values.insert(key.to_owned(), value.to_owned());
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        self.dirty = false;
        info!("SettingsAdapter: flushed {} key(s) to {}", self.values.len(), path.display());
        Ok(())
    }
}

impl ConfigPort for SettingsAdapter {
    fn load(&self) -> Result<EngineConfig, ConfigError> {
        let Some(text) = self.values.get(CONFIG_KEY) else {
            info!("SettingsAdapter: no stored config, using defaults");
            return Ok(EngineConfig::default());
        };
        let config: EngineConfig = serde_json::from_str(text).map_err(|e| {
            warn!("SettingsAdapter: stored config unreadable: {e}");
            ConfigError::Corrupted
        })?;
        config.validate()?;
        info!("SettingsAdapter: loaded config from store");
        Ok(config)
    }

    fn save(&mut self, config: &EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = serde_json::to_string(config).map_err(|_| ConfigError::Corrupted)?;
        self.set_value(CONFIG_KEY, &text);
        info!("SettingsAdapter: config saved");
        Ok(())
    }
}
