use crate::LogLevel;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A decoded duration value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationValue {
    /// The duration in milliseconds.
    pub ms: i64,
    /// The duration in seconds.
    pub seconds: f64,
}

impl DurationValue {
    /// Creates a [`DurationValue`] from a millisecond count.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::DurationValue;
    ///
    /// let duration = DurationValue::from_millis(1_884_000);
    /// assert_eq!(duration.seconds, 1884.0);
    /// ```
    pub fn from_millis(ms: i64) -> Self {
        Self {
            ms,
            seconds: ms as f64 / 1000.0,
        }
    }

    /// Converts the value into a [`std::time::Duration`]. Negative durations saturate to zero.
    pub fn as_std(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ms.max(0) as u64)
    }
}

/// Represents the decoded value of a configuration entry.
///
/// # Examples
///
/// ```rust
/// use reforge::Value;
///
/// let bool_val = Value::Bool(true);
/// let int_val = Value::Int(42);
/// ```
#[derive(PartialEq, Debug, Clone)]
pub enum Value {
    /// A feature flag's value.
    Bool(bool),
    /// A whole number value.
    Int(i64),
    /// A decimal number value.
    Float(f64),
    /// A text value.
    String(String),
    /// A binary value.
    Bytes(Vec<u8>),
    /// A list of strings.
    StringList(Vec<String>),
    /// A duration value.
    Duration(DurationValue),
    /// A log level value.
    LogLevel(LogLevel),
    /// A JSON document, also used for structured values like weighted values or int ranges.
    Json(serde_json::Value),
}

impl Value {
    /// Reads the value as `bool`. Returns [`None`] if it's not a [`Value::Bool`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::Value;
    ///
    /// let value = Value::Bool(true);
    /// assert!(value.as_bool().unwrap());
    /// ```
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(val) = self {
            return Some(*val);
        }
        None
    }

    /// Reads the value as `i64`. Returns [`None`] if it's not a [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(val) = self {
            return Some(*val);
        }
        None
    }

    /// Reads the value as `f64`. Returns [`None`] if it's not a [`Value::Float`].
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Float(val) = self {
            return Some(*val);
        }
        None
    }

    /// Reads the value as [`String`]. Returns [`None`] if it's not a [`Value::String`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::Value;
    ///
    /// let value = Value::String("foo".to_owned());
    /// assert_eq!(value.as_str().unwrap(), "foo".to_owned());
    /// ```
    pub fn as_str(&self) -> Option<String> {
        if let Value::String(val) = self {
            return Some(val.clone());
        }
        None
    }

    /// Reads the value as a list of strings. Returns [`None`] if it's not a [`Value::StringList`].
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        if let Value::StringList(val) = self {
            return Some(val.clone());
        }
        None
    }

    /// Reads the value as [`DurationValue`]. Returns [`None`] if it's not a [`Value::Duration`].
    pub fn as_duration(&self) -> Option<DurationValue> {
        if let Value::Duration(val) = self {
            return Some(*val);
        }
        None
    }

    /// Reads the value as [`LogLevel`].
    ///
    /// Besides [`Value::LogLevel`], strings holding a level name (in any case) are accepted.
    pub fn as_log_level(&self) -> Option<LogLevel> {
        match self {
            Value::LogLevel(level) => Some(*level),
            Value::String(val) => val.parse().ok(),
            _ => None,
        }
    }

    /// Reads the value as a JSON document. Returns [`None`] if it's not a [`Value::Json`].
    pub fn as_json(&self) -> Option<serde_json::Value> {
        if let Value::Json(val) = self {
            return Some(val.clone());
        }
        None
    }

    /// Creates a [`Value`] from a plain [`serde_json::Value`] that carries no type information.
    ///
    /// Objects holding numeric `ms` and `seconds` fields are read as durations, arrays of strings
    /// as string lists. Returns [`None`] for `null`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::Value;
    ///
    /// let json_str = serde_json::Value::String("foo".to_owned());
    /// assert_eq!(Value::String("foo".to_owned()), Value::from_json_val(&json_str).unwrap())
    /// ```
    pub fn from_json_val(json_val: &serde_json::Value) -> Option<Value> {
        match json_val {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(val) => Some(Value::Bool(*val)),
            serde_json::Value::String(val) => Some(Value::String(val.clone())),
            serde_json::Value::Number(val) => {
                if let Some(int_val) = val.as_i64() {
                    return Some(Value::Int(int_val));
                }
                val.as_f64().map(Value::Float)
            }
            serde_json::Value::Array(items) if items.iter().all(|i| i.is_string()) => Some(
                Value::StringList(
                    items
                        .iter()
                        .filter_map(|i| i.as_str().map(str::to_owned))
                        .collect(),
                ),
            ),
            serde_json::Value::Object(obj) if obj.len() == 2 => {
                match (
                    obj.get("ms").and_then(|v| v.as_f64()),
                    obj.get("seconds").and_then(|v| v.as_f64()),
                ) {
                    (Some(ms), Some(seconds)) => Some(Value::Duration(DurationValue {
                        ms: ms as i64,
                        seconds,
                    })),
                    _ => Some(Value::Json(json_val.clone())),
                }
            }
            other => Some(Value::Json(other.clone())),
        }
    }

    /// Converts the value into a plain [`serde_json::Value`].
    pub fn to_json_val(&self) -> serde_json::Value {
        match self {
            Value::Bool(val) => serde_json::Value::from(*val),
            Value::Int(val) => serde_json::Value::from(*val),
            Value::Float(val) => serde_json::Value::from(*val),
            Value::String(val) => serde_json::Value::from(val.as_str()),
            Value::Bytes(val) => serde_json::Value::from(val.clone()),
            Value::StringList(val) => serde_json::Value::from(val.clone()),
            Value::Duration(val) => serde_json::json!({ "ms": val.ms, "seconds": val.seconds }),
            Value::LogLevel(val) => serde_json::Value::from(val.as_str()),
            Value::Json(val) => val.clone(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(val) => write!(f, "{val}"),
            Value::Int(val) => write!(f, "{val}"),
            Value::Float(val) => write!(f, "{val}"),
            Value::String(val) => f.write_str(val),
            Value::Bytes(val) => write!(f, "<{} bytes>", val.len()),
            Value::StringList(val) => f.write_str(val.join(",").as_str()),
            Value::Duration(val) => write!(f, "{}ms", val.ms),
            Value::LogLevel(val) => write!(f, "{val}"),
            Value::Json(val) => write!(f, "{val}"),
        }
    }
}

/// Represents a primitive type that can describe the value of a configuration entry.
pub trait ValuePrimitive: Into<Value> {
    /// Reads the primitive value from a [`Value`].
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! primitive_impl {
    ($ob:ident $to:ident $as_m:ident $t:ty) => (
        from_val_to_enum!($ob $to $t);

        impl ValuePrimitive for $t {
            fn from_value(value: &Value) -> Option<Self> {
                value.$as_m()
            }
        }
    )
}

primitive_impl!(Value String as_str String);
primitive_impl!(Value Float as_float f64);
primitive_impl!(Value Int as_int i64);
primitive_impl!(Value Bool as_bool bool);
primitive_impl!(Value StringList as_string_list Vec<String>);
primitive_impl!(Value Duration as_duration DurationValue);
primitive_impl!(Value LogLevel as_log_level LogLevel);
primitive_impl!(Value Json as_json serde_json::Value);
from_val_to_enum_into!(Value String &str);
