use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Configuration values are arbitrary JSON.
pub type ConfigValue = serde_json::Value;

/// Map of flag key to flag value.
pub type Flags = HashMap<String, FlagValue>;

/// Map of config key to config value.
pub type Configs = HashMap<String, ConfigValue>;

/// Value of a single feature flag as evaluated by the EdgeFlags service.
///
/// Conveniently implements `From` conversions for `bool`, `&str`, `String`, `f64`, `i32`, and JSON
/// objects.
///
/// ```
/// # use edgeflags::FlagValue;
/// let enabled: FlagValue = true.into();
/// let variant: FlagValue = "treatment".into();
/// let limit: FlagValue = 25.into();
/// assert_eq!(enabled.as_bool(), Some(true));
/// assert_eq!(variant.as_str(), Some("treatment"));
/// assert_eq!(limit.as_i64(), Some(25));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum FlagValue {
    /// A boolean flag.
    Boolean(bool),
    /// A numeric flag.
    Number(f64),
    /// A string flag.
    String(String),
    /// A JSON object flag.
    Object(serde_json::Map<String, serde_json::Value>),
}

impl FlagValue {
    /// Whether this is a [`FlagValue::Boolean`].
    pub fn is_bool(&self) -> bool {
        self.as_bool().is_some()
    }
    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this is a [`FlagValue::String`].
    pub fn is_string(&self) -> bool {
        self.as_str().is_some()
    }
    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is a [`FlagValue::Number`].
    pub fn is_number(&self) -> bool {
        self.as_f64().is_some()
    }
    /// Returns the number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FlagValue::Number(n) => Some(*n),
            _ => None,
        }
    }
    /// Returns the number if it has no fractional part and fits into `i64`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        let n = self.as_f64()?;
        if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
            Some(n as i64)
        } else {
            None
        }
    }

    /// Whether this is a [`FlagValue::Object`].
    pub fn is_object(&self) -> bool {
        self.as_object().is_some()
    }
    /// Returns the JSON object, if this is one.
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            FlagValue::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i32> for FlagValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<FlagValue> for serde_json::Value {
    fn from(value: FlagValue) -> Self {
        match value {
            FlagValue::Boolean(b) => b.into(),
            FlagValue::Number(n) => n.into(),
            FlagValue::String(s) => s.into(),
            FlagValue::Object(o) => o.into(),
        }
    }
}
