//! Typed configuration values and their one-character wire tags.
//!
//! On the wire a value is its tag followed by its text: `i42`, `f3.14`,
//! `btrue`, `sHello`.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Characters a string value may not contain, since the config list and the
/// packet framing use them as separators.
const RESERVED: [char; 3] = ['&', '|', '\n'];

/// Wire type tag of a [`ConfigValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeTag {
    Int,
    Float,
    Bool,
    Str,
}

impl TypeTag {
    pub fn as_char(&self) -> char {
        match self {
            TypeTag::Int => 'i',
            TypeTag::Float => 'f',
            TypeTag::Bool => 'b',
            TypeTag::Str => 's',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'i' => Some(TypeTag::Int),
            'f' => Some(TypeTag::Float),
            'b' => Some(TypeTag::Bool),
            's' => Some(TypeTag::Str),
            _ => None,
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Bool => "bool",
            TypeTag::Str => "string",
        };
        f.write_str(name)
    }
}

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ConfigValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl ConfigValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            ConfigValue::Int(_) => TypeTag::Int,
            ConfigValue::Float(_) => TypeTag::Float,
            ConfigValue::Bool(_) => TypeTag::Bool,
            ConfigValue::Str(_) => TypeTag::Str,
        }
    }

    /// Parse the text of a value of the given type.
    ///
    /// Booleans are accepted in any case (`True`, `false`, ...).
    pub fn parse(tag: TypeTag, raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            tag,
            raw: raw.to_string(),
        };
        let value = match tag {
            TypeTag::Int => ConfigValue::Int(raw.trim().parse().map_err(|_| invalid())?),
            TypeTag::Float => ConfigValue::Float(raw.trim().parse().map_err(|_| invalid())?),
            TypeTag::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => ConfigValue::Bool(true),
                "false" => ConfigValue::Bool(false),
                _ => return Err(invalid()),
            },
            TypeTag::Str => ConfigValue::Str(raw.to_string()),
        };
        Ok(value)
    }

    /// Decode one tagged wire token such as `i42`.
    pub fn decode(token: &str) -> Result<Self, ConfigError> {
        let mut chars = token.chars();
        let c = chars.next().ok_or(ConfigError::EmptyValue)?;
        let tag = TypeTag::from_char(c).ok_or(ConfigError::UnknownTypeTag(c))?;
        Self::parse(tag, chars.as_str())
    }

    /// Encode as a tagged wire token.
    pub fn encode(&self) -> String {
        format!("{}{}", self.tag().as_char(), self)
    }

    /// Whether the value can travel inside a config list unescaped.
    pub fn is_wire_safe(&self) -> bool {
        match self {
            ConfigValue::Str(s) => !s.contains(RESERVED),
            _ => true,
        }
    }
}

impl Display for ConfigValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f32> for ConfigValue {
    fn from(v: f32) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}
