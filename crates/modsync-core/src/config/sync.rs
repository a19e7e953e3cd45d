//! `hostconfig` payloads.
//!
//! The host sends the live value of every sync-required entry, in
//! registration order, as tagged tokens joined by `&`:
//!
//! ```text
//! i5&f0.75&btrue&sRandom
//! ```
//!
//! Entries that are not sync-required are skipped on both sides, so the
//! k-th token always belongs to the k-th sync-required entry. Keys are not
//! sent; peers rely on identical registration order.

use super::registry::SettingsStore;
use super::value::TypeTag;
use super::ConfigError;
use tracing::{debug, warn};

const LIST_SEPARATOR: &str = "&";

/// What [`apply_incoming`] did with a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Tokens written to an entry (changed or not).
    pub applied: usize,
    /// Keys whose live value changed.
    pub changed: Vec<String>,
    /// Changed keys that only take effect after a restart.
    pub restart_required: Vec<String>,
    /// Tokens that could not be applied.
    pub rejected: usize,
    /// Sync-required entries the payload had no token for.
    pub missing: usize,
    /// Trailing tokens beyond the local sync-required entries.
    pub extra: usize,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

fn sync_indices(store: &dyn SettingsStore) -> Vec<usize> {
    (0..store.count())
        .filter(|&i| store.is_sync_required(i))
        .collect()
}

/// Serialize the sync-required entries of `store`.
///
/// Fails if a string value contains a character that would break framing;
/// nothing on this channel is escaped.
pub fn serialize(store: &dyn SettingsStore) -> Result<String, ConfigError> {
    let mut tokens = Vec::new();
    for index in sync_indices(store) {
        let Some(value) = store.get_value(index) else {
            continue;
        };
        if !value.is_wire_safe() {
            let key = store.key(index).unwrap_or_default().to_string();
            return Err(ConfigError::Unencodable(key));
        }
        tokens.push(value.encode());
    }
    Ok(tokens.join(LIST_SEPARATOR))
}

/// Apply a `hostconfig` payload to the sync-required entries of `store`.
///
/// Bad tokens are skipped without shifting later ones. Applying the same
/// payload twice leaves the store as applying it once.
pub fn apply_incoming(store: &mut dyn SettingsStore, payload: &str) -> ApplyReport {
    let mut report = ApplyReport::default();
    let targets = sync_indices(store);
    let tokens: Vec<&str> = if payload.is_empty() {
        Vec::new()
    } else {
        payload.split(LIST_SEPARATOR).collect()
    };

    for (position, token) in tokens.iter().enumerate() {
        let Some(&index) = targets.get(position) else {
            report.extra = tokens.len() - position;
            debug!("Ignoring {} extra config value(s)", report.extra);
            break;
        };

        match apply_token(store, index, token) {
            Ok(changed) => {
                report.applied += 1;
                if changed {
                    let key = store.key(index).unwrap_or_default().to_string();
                    if store.requires_restart(index) {
                        report.restart_required.push(key.clone());
                    }
                    report.changed.push(key);
                }
            }
            Err(e) => {
                report.rejected += 1;
                warn!(
                    "Skipping config value {:?} for {}: {}",
                    token,
                    store.key(index).unwrap_or("?"),
                    e
                );
            }
        }
    }

    if tokens.len() < targets.len() {
        report.missing = targets.len() - tokens.len();
        warn!(
            "Host sent {} config value(s), expected {}; {} entr(ies) keep their current value",
            tokens.len(),
            targets.len(),
            report.missing
        );
    }

    report
}

fn apply_token(store: &mut dyn SettingsStore, index: usize, token: &str) -> Result<bool, ConfigError> {
    let mut chars = token.chars();
    let c = chars.next().ok_or(ConfigError::EmptyValue)?;
    let tag = TypeTag::from_char(c).ok_or(ConfigError::UnknownTypeTag(c))?;
    store.set_value(index, chars.as_str(), tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigEntry, ConfigRegistry, ConfigValue};

    fn two_entry_registry(speed: i32, name: &str) -> ConfigRegistry {
        let mut registry = ConfigRegistry::new();
        registry.register(ConfigEntry::new("speed", speed).sync(true)).unwrap();
        registry.register(ConfigEntry::new("name", name)).unwrap();
        registry
    }

    fn full_registry() -> ConfigRegistry {
        let mut registry = ConfigRegistry::new();
        registry.register(ConfigEntry::new("maxScrap", 30).sync(true)).unwrap();
        registry.register(ConfigEntry::new("localVolume", 0.8f32)).unwrap();
        registry.register(ConfigEntry::new("scrapMultiplier", 1.5f32).sync(true)).unwrap();
        registry.register(ConfigEntry::new("hardMode", false).sync(true)).unwrap();
        registry
            .register(ConfigEntry::new("moonName", "Vow").sync(true).requires_restart(true))
            .unwrap();
        registry
    }

    // ==================== Serialize ====================

    #[test]
    fn test_serialize_skips_unsynced() {
        let registry = two_entry_registry(5, "x");
        assert_eq!(serialize(&registry).unwrap(), "i5");
    }

    #[test]
    fn test_serialize_all_types() {
        assert_eq!(serialize(&full_registry()).unwrap(), "i30&f1.5&bfalse&sVow");
    }

    #[test]
    fn test_serialize_ignores_reserved_characters_in_local_entries() {
        let mut registry = full_registry();
        registry.register(ConfigEntry::new("motd", "hi&bye")).unwrap();
        assert_eq!(serialize(&registry).unwrap(), "i30&f1.5&bfalse&sVow");
    }

    #[test]
    fn test_serialize_empty() {
        assert_eq!(serialize(&ConfigRegistry::new()).unwrap(), "");
    }

    // ==================== Apply ====================

    #[test]
    fn test_apply_leaves_unsynced_untouched() {
        let mut client = two_entry_registry(1, "local");
        let report = apply_incoming(&mut client, "i5");

        assert_eq!(client.value("speed"), Some(&ConfigValue::Int(5)));
        assert_eq!(client.value("name"), Some(&ConfigValue::from("local")));
        assert_eq!(report.changed, vec!["speed".to_string()]);
    }

    #[test]
    fn test_serialize_then_apply_reproduces_values() {
        let mut host = full_registry();
        host.set_configured("maxScrap", ConfigValue::Int(45)).unwrap();
        host.set_configured("hardMode", ConfigValue::Bool(true)).unwrap();
        host.set_configured("moonName", ConfigValue::from("Experimentation")).unwrap();
        let payload = serialize(&host).unwrap();

        let mut client = full_registry();
        apply_incoming(&mut client, &payload);

        for index in host.sync_indices() {
            assert_eq!(host.get_value(index), client.get_value(index));
        }
        assert_eq!(client.value("localVolume"), Some(&ConfigValue::Float(0.8)));
    }

    #[test]
    fn test_apply_twice_is_noop() {
        let mut client = full_registry();
        let first = apply_incoming(&mut client, "i45&f2&btrue&sArtifice");
        let snapshot: Vec<_> = (0..client.count()).map(|i| client.get_value(i)).collect();

        let second = apply_incoming(&mut client, "i45&f2&btrue&sArtifice");
        let after: Vec<_> = (0..client.count()).map(|i| client.get_value(i)).collect();

        assert_eq!(first.changed.len(), 4);
        assert!(second.is_noop());
        assert_eq!(second.applied, 4);
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_apply_reports_restart_required() {
        let mut client = full_registry();
        let report = apply_incoming(&mut client, "i30&f1.5&bfalse&sRend");
        assert_eq!(report.changed, vec!["moonName".to_string()]);
        assert_eq!(report.restart_required, vec!["moonName".to_string()]);
    }

    #[test]
    fn test_apply_fewer_values_keeps_defaults() {
        let mut client = full_registry();
        let report = apply_incoming(&mut client, "i10");
        assert_eq!(report.missing, 3);
        assert_eq!(client.value("maxScrap"), Some(&ConfigValue::Int(10)));
        assert_eq!(client.value("hardMode"), Some(&ConfigValue::Bool(false)));
    }

    #[test]
    fn test_apply_ignores_extra_values() {
        let mut client = two_entry_registry(1, "x");
        let report = apply_incoming(&mut client, "i2&i3&bfalse");
        assert_eq!(report.extra, 2);
        assert_eq!(client.value("speed"), Some(&ConfigValue::Int(2)));
    }

    #[test]
    fn test_apply_skips_bad_tokens_without_shifting() {
        let mut client = full_registry();
        let report = apply_incoming(&mut client, "bnope&f3&zzz&sDine");
        assert_eq!(report.rejected, 2);
        assert_eq!(client.value("maxScrap"), Some(&ConfigValue::Int(30)));
        assert_eq!(client.value("scrapMultiplier"), Some(&ConfigValue::Float(3.0)));
        assert_eq!(client.value("moonName"), Some(&ConfigValue::from("Dine")));
    }

    #[test]
    fn test_apply_empty_payload() {
        let mut client = two_entry_registry(1, "x");
        let report = apply_incoming(&mut client, "");
        assert_eq!(report.applied, 0);
        assert_eq!(report.missing, 1);
    }
}
