//! Positional registry of configuration entries.
//!
//! Entries are registered once at startup and never removed. Their
//! registration order is the index peers use on the wire, so every peer in
//! a session must register the same entries in the same order.

use super::value::{ConfigValue, TypeTag};
use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index-based access to configuration, as the sync code sees it.
///
/// [`ConfigRegistry`] is the in-memory implementation; a settings store
/// that persists values can implement this to take part in sync directly.
pub trait SettingsStore {
    /// Number of registered entries.
    fn count(&self) -> usize;

    /// Live value of the entry at `index`.
    fn get_value(&self, index: usize) -> Option<ConfigValue>;

    /// Parse `raw` as a value of type `tag` and store it at `index`.
    ///
    /// Returns whether the live value changed.
    fn set_value(&mut self, index: usize, raw: &str, tag: TypeTag) -> Result<bool, ConfigError>;

    fn is_sync_required(&self, index: usize) -> bool;

    fn requires_restart(&self, _index: usize) -> bool {
        false
    }

    fn key(&self, index: usize) -> Option<&str>;
}

/// One registered configuration item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Host must propagate this entry to every client.
    #[serde(default)]
    pub sync_required: bool,
    #[serde(default)]
    pub optional: bool,
    /// New values only take effect after the game restarts.
    #[serde(default)]
    pub requires_restart: bool,
    /// Value the local settings hold.
    #[serde(rename = "value")]
    configured: ConfigValue,
    /// Value in effect for the current session.
    #[serde(skip)]
    live: Option<ConfigValue>,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Self {
            key: key.into(),
            category: String::new(),
            description: String::new(),
            sync_required: false,
            optional: false,
            requires_restart: false,
            configured: value.into(),
            live: None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn sync(mut self, sync_required: bool) -> Self {
        self.sync_required = sync_required;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn requires_restart(mut self, requires_restart: bool) -> Self {
        self.requires_restart = requires_restart;
        self
    }

    /// Value in effect for the current session.
    pub fn value(&self) -> &ConfigValue {
        self.live.as_ref().unwrap_or(&self.configured)
    }

    /// Value the local settings hold.
    pub fn configured(&self) -> &ConfigValue {
        &self.configured
    }

    pub fn tag(&self) -> TypeTag {
        self.configured.tag()
    }

    /// Replace the live value. The type must not change.
    pub fn set_value(&mut self, value: ConfigValue) -> Result<bool, ConfigError> {
        self.check_type(&value)?;
        self.check_wire_safe(&value)?;
        if *self.value() == value {
            return Ok(false);
        }
        self.live = Some(value);
        Ok(true)
    }

    fn check_type(&self, value: &ConfigValue) -> Result<(), ConfigError> {
        if value.tag() != self.tag() {
            return Err(ConfigError::TypeMismatch {
                key: self.key.clone(),
                expected: self.tag(),
                found: value.tag(),
            });
        }
        Ok(())
    }

    /// Synced values travel unescaped, so they must not contain a separator.
    fn check_wire_safe(&self, value: &ConfigValue) -> Result<(), ConfigError> {
        if self.sync_required && !value.is_wire_safe() {
            return Err(ConfigError::Unencodable(self.key.clone()));
        }
        Ok(())
    }
}

/// Ordered set of every registered [`ConfigEntry`].
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    entries: Vec<ConfigEntry>,
    by_key: HashMap<String, usize>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry, returning its wire index.
    pub fn register(&mut self, entry: ConfigEntry) -> Result<usize, ConfigError> {
        if self.by_key.contains_key(&entry.key) {
            return Err(ConfigError::DuplicateKey(entry.key));
        }
        entry.check_wire_safe(entry.value())?;
        let index = self.entries.len();
        self.by_key.insert(entry.key.clone(), index);
        self.entries.push(entry);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&ConfigEntry> {
        self.entries.get(index)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigEntry> {
        self.by_key.get(key).and_then(|&i| self.entries.get(i))
    }

    /// Live value of the entry named `key`.
    pub fn value(&self, key: &str) -> Option<&ConfigValue> {
        self.get(key).map(ConfigEntry::value)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.iter()
    }

    /// Wire indices of the entries that take part in sync, in order.
    pub fn sync_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.sync_required)
            .map(|(i, _)| i)
    }

    /// Change the locally configured value of `key` (a settings reload).
    ///
    /// The live value follows unless a session has overridden it.
    pub fn set_configured(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        let index = *self
            .by_key
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let entry = &mut self.entries[index];
        entry.check_type(&value)?;
        entry.check_wire_safe(&value)?;
        entry.configured = value;
        Ok(())
    }

    /// Make every sync-required entry's live value match its configured value.
    ///
    /// Hosts call this when a session starts so values received while
    /// playing as a client never leak into a hosted session. Returns the keys
    /// that changed.
    pub fn adopt_configured(&mut self) -> Vec<String> {
        let mut changed = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| e.sync_required) {
            if let Some(live) = entry.live.take() {
                if live != entry.configured {
                    changed.push(entry.key.clone());
                }
            }
        }
        changed
    }
}

impl SettingsStore for ConfigRegistry {
    fn count(&self) -> usize {
        self.entries.len()
    }

    fn get_value(&self, index: usize) -> Option<ConfigValue> {
        self.entries.get(index).map(|e| e.value().clone())
    }

    fn set_value(&mut self, index: usize, raw: &str, tag: TypeTag) -> Result<bool, ConfigError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(ConfigError::IndexOutOfRange(index))?;
        let value = ConfigValue::parse(tag, raw)?;
        entry.set_value(value)
    }

    fn is_sync_required(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| e.sync_required)
    }

    fn requires_restart(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| e.requires_restart)
    }

    fn key(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.key.as_str())
    }
}
