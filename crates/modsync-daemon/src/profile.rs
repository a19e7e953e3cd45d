//! Profile file describing the simulated mod install.
//!
//! Stored as JSON. A missing file is created with the defaults so there is
//! something to edit.

use anyhow::{Context, Result};
use modsync_core::{BundleVersions, ClientInfo, ConfigEntry, ConfigRegistry, NodeSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Mod version, content bundles, config entries and protocol tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFile {
    #[serde(default = "default_mod_version")]
    pub mod_version: String,

    /// Bundle name → version
    #[serde(default)]
    pub bundles: BTreeMap<String, String>,

    /// Config entries in registration (wire) order
    #[serde(default = "default_entries")]
    pub entries: Vec<ConfigEntry>,

    #[serde(default)]
    pub settings: NodeSettings,
}

impl Default for ProfileFile {
    fn default() -> Self {
        Self {
            mod_version: default_mod_version(),
            bundles: BTreeMap::new(),
            entries: default_entries(),
            settings: NodeSettings::default(),
        }
    }
}

impl ProfileFile {
    /// Load the profile at `path`, writing the defaults there if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let profile = Self::default();
            profile.save(path)?;
            info!("Wrote default profile to {:?}", path);
            return Ok(profile);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {:?}", path))?;
        let profile: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile: {:?}", path))?;
        Ok(profile)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write profile: {:?}", path))?;
        Ok(())
    }

    pub fn identity(&self) -> ClientInfo {
        let bundles: BundleVersions = self.bundles.clone().into_iter().collect();
        ClientInfo::new(self.mod_version.clone(), bundles)
    }

    /// Register every entry, in file order.
    pub fn registry(&self) -> Result<ConfigRegistry> {
        let mut registry = ConfigRegistry::new();
        for entry in &self.entries {
            registry
                .register(entry.clone())
                .with_context(|| format!("Invalid config entry {:?}", entry.key))?;
        }
        Ok(registry)
    }
}

fn default_mod_version() -> String {
    "1.0.0".to_string()
}

fn default_entries() -> Vec<ConfigEntry> {
    vec![
        ConfigEntry::new("maxScrap", 30)
            .category("Scrap")
            .description("Maximum scrap items per level")
            .sync(true),
        ConfigEntry::new("scrapMultiplier", 1.5f32)
            .category("Scrap")
            .description("Scrap value multiplier")
            .sync(true),
        ConfigEntry::new("hardMode", false)
            .category("Gameplay")
            .sync(true),
        ConfigEntry::new("startingMoon", "Experimentation")
            .category("Gameplay")
            .sync(true)
            .requires_restart(true),
        ConfigEntry::new("musicVolume", 0.8f32)
            .category("Audio")
            .description("Local only")
            .optional(true),
    ]
}
