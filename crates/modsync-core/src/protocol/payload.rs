//! Typed bodies for `clientinfo` and `hostweathers`.
//!
//! `clientinfo` is the version handshake a client answers the host with:
//!
//! ```text
//! <modVersion>                                  (no bundles loaded)
//! <modVersion>-<name>v<version>&<name>v<version> (with bundles)
//! ```
//!
//! `hostweathers` is a `&`-separated list of integer weather codes, one per level.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use tracing::warn;

const LIST_SEPARATOR: char = '&';
const BUNDLE_SECTION_SEPARATOR: char = '-';
const BUNDLE_VERSION_SEPARATOR: char = 'v';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("empty client info")]
    EmptyClientInfo,

    #[error("bundle entry without version: {0:?}")]
    InvalidBundle(String),
}

/// Content bundle name → bundle version, kept sorted so every peer
/// renders the same list in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleVersions(BTreeMap<String, String>);

impl BundleVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.0.insert(name.into(), version.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn parse(raw: &str) -> Result<Self, PayloadError> {
        let mut bundles = Self::new();
        for item in raw.split(LIST_SEPARATOR).filter(|s| !s.is_empty()) {
            let (name, version) = item
                .rsplit_once(BUNDLE_VERSION_SEPARATOR)
                .ok_or_else(|| PayloadError::InvalidBundle(item.to_string()))?;
            bundles.insert(name, version);
        }
        Ok(bundles)
    }
}

impl Display for BundleVersions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, (name, version)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", LIST_SEPARATOR)?;
            }
            write!(f, "{}{}{}", name, BUNDLE_VERSION_SEPARATOR, version)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BundleVersions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Versions a peer runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub mod_version: String,
    pub bundles: BundleVersions,
}

/// Outcome of comparing a client's versions with the host's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    VersionMismatch { expected: String, found: String },
    BundleMismatch { expected: String, found: String },
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Compatibility::Compatible)
    }

    /// Reason shown to a rejected player.
    pub fn kick_reason(&self) -> Option<&'static str> {
        match self {
            Compatibility::Compatible => None,
            Compatibility::VersionMismatch { .. } => Some("Wrong version."),
            Compatibility::BundleMismatch { .. } => Some("Wrong bundles."),
        }
    }
}

impl ClientInfo {
    pub fn new(mod_version: impl Into<String>, bundles: BundleVersions) -> Self {
        Self {
            mod_version: mod_version.into(),
            bundles,
        }
    }

    /// Render as a `clientinfo` body.
    pub fn encode(&self) -> String {
        if self.bundles.is_empty() {
            self.mod_version.clone()
        } else {
            format!("{}{}{}", self.mod_version, BUNDLE_SECTION_SEPARATOR, self.bundles)
        }
    }

    /// Parse a `clientinfo` body. The mod version ends at the first `-`.
    pub fn parse(body: &str) -> Result<Self, PayloadError> {
        let (version, bundles) = match body.split_once(BUNDLE_SECTION_SEPARATOR) {
            Some((version, bundles)) => (version, BundleVersions::parse(bundles)?),
            None => (body, BundleVersions::new()),
        };
        if version.is_empty() {
            return Err(PayloadError::EmptyClientInfo);
        }
        Ok(Self::new(version, bundles))
    }

    /// Check a remote peer's versions against ours (the host's).
    pub fn check(&self, remote: &ClientInfo) -> Compatibility {
        self.check_body(&remote.encode())
    }

    /// Check a raw `clientinfo` body against ours (the host's).
    ///
    /// The mod version is checked first, and an empty body is a version
    /// mismatch. Bundles are only compared when the body has a bundle
    /// section; a section that does not parse is a bundle mismatch.
    pub fn check_body(&self, body: &str) -> Compatibility {
        let (version, bundles) = match body.split_once(BUNDLE_SECTION_SEPARATOR) {
            Some((version, bundles)) => (version, Some(bundles)),
            None => (body, None),
        };
        if version.is_empty() || version != self.mod_version {
            return Compatibility::VersionMismatch {
                expected: self.mod_version.clone(),
                found: version.to_string(),
            };
        }

        let Some(raw) = bundles else {
            return Compatibility::Compatible;
        };
        match BundleVersions::parse(raw) {
            Ok(remote) if remote == self.bundles => Compatibility::Compatible,
            _ => Compatibility::BundleMismatch {
                expected: self.bundles.to_string(),
                found: raw.to_string(),
            },
        }
    }
}

/// Per-level weather codes shared by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeatherList(pub Vec<i32>);

impl WeatherList {
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Parse a `hostweathers` body.
    ///
    /// Unparseable codes keep their level slot and fall back to 0 (clear
    /// weather) so later levels stay aligned.
    pub fn parse(body: &str) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        let codes = body
            .split(LIST_SEPARATOR)
            .enumerate()
            .map(|(level, raw)| {
                raw.trim().parse::<i32>().unwrap_or_else(|_| {
                    warn!("Invalid weather code {:?} for level {}", raw, level);
                    0
                })
            })
            .collect();
        Self(codes)
    }
}
