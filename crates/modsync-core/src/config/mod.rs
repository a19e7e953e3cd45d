//! Host-authoritative configuration and its positional wire encoding.
//!
//! - [`value`]: typed values and their `i`/`f`/`b`/`s` wire tags
//! - [`registry`]: the ordered entry registry and the [`SettingsStore`] interface
//! - [`sync`]: `hostconfig` payload serialization and application

pub mod registry;
pub mod sync;
pub mod value;

pub use registry::{ConfigEntry, ConfigRegistry, SettingsStore};
pub use sync::{apply_incoming, serialize, ApplyReport};
pub use value::{ConfigValue, TypeTag};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("empty config value")]
    EmptyValue,

    #[error("unknown type tag {0:?}")]
    UnknownTypeTag(char),

    #[error("invalid {tag} value: {raw:?}")]
    InvalidValue { tag: TypeTag, raw: String },

    #[error("type mismatch for {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: TypeTag,
        found: TypeTag,
    },

    #[error("value of {0} contains a reserved separator")]
    Unencodable(String),

    #[error("duplicate config key: {0}")]
    DuplicateKey(String),

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("no config entry at index {0}")]
    IndexOutOfRange(usize),
}
