use crate::errors::ErrorKind;
use crate::model::enums::{ConfigType, LogLevel};
use crate::value::{DurationValue, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{error, warn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON parsing failed. ({0})")]
    Parse(String),
}

/// The on-wire value of an evaluated configuration entry.
///
/// Exactly one tag is present on the wire, e.g. `{"double": 2.5}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ConfigValue {
    /// Whole number, sent either as a JSON number or as a decimal string.
    #[serde(deserialize_with = "de_lenient_i64")]
    Int(i64),
    /// Text.
    String(String),
    /// Binary data, sent base64 encoded.
    #[serde(deserialize_with = "de_base64", serialize_with = "ser_base64")]
    Bytes(Vec<u8>),
    /// Decimal number.
    Double(f64),
    /// On/off flag.
    Bool(bool),
    /// Weighted value distribution.
    WeightedValues(serde_json::Value),
    /// Rate limit definition.
    LimitDefinition(serde_json::Value),
    /// Log level.
    LogLevel(LogLevel),
    /// List of strings, sent either as a plain array or wrapped in `{"values": [...]}`.
    #[serde(deserialize_with = "de_string_list")]
    StringList(Vec<String>),
    /// Integer range.
    IntRange(serde_json::Value),
    /// Value provided by the environment.
    Provided(serde_json::Value),
    /// Duration definition.
    Duration(DurationDefinition),
    /// JSON document encoded as a string.
    Json(String),
    /// Schema definition.
    Schema(serde_json::Value),
    /// Confidential flag.
    Confidential(bool),
    /// Name of the key the value should be decrypted with.
    DecryptWith(String),
}

/// The wire shape of a duration value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DurationDefinition {
    /// ISO-8601 representation of the duration, if the server sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Length of the duration in milliseconds.
    #[serde(deserialize_with = "de_lenient_i64")]
    pub millis: i64,
}

impl ConfigValue {
    /// The tag of the value.
    pub fn config_type(&self) -> ConfigType {
        match self {
            ConfigValue::Int(_) => ConfigType::Int,
            ConfigValue::String(_) => ConfigType::String,
            ConfigValue::Bytes(_) => ConfigType::Bytes,
            ConfigValue::Double(_) => ConfigType::Double,
            ConfigValue::Bool(_) => ConfigType::Bool,
            ConfigValue::WeightedValues(_) => ConfigType::WeightedValues,
            ConfigValue::LimitDefinition(_) => ConfigType::LimitDefinition,
            ConfigValue::LogLevel(_) => ConfigType::LogLevel,
            ConfigValue::StringList(_) => ConfigType::StringList,
            ConfigValue::IntRange(_) => ConfigType::IntRange,
            ConfigValue::Provided(_) => ConfigType::Provided,
            ConfigValue::Duration(_) => ConfigType::Duration,
            ConfigValue::Json(_) => ConfigType::Json,
            ConfigValue::Schema(_) => ConfigType::Schema,
            ConfigValue::Confidential(_) => ConfigType::Confidential,
            ConfigValue::DecryptWith(_) => ConfigType::DecryptWith,
        }
    }

    pub(crate) fn decode(&self, key: &str) -> Value {
        match self {
            ConfigValue::Int(val) => Value::Int(*val),
            ConfigValue::String(val) | ConfigValue::DecryptWith(val) => Value::String(val.clone()),
            ConfigValue::Bytes(val) => Value::Bytes(val.clone()),
            ConfigValue::Double(val) => Value::Float(*val),
            ConfigValue::Bool(val) | ConfigValue::Confidential(val) => Value::Bool(*val),
            ConfigValue::LogLevel(val) => Value::LogLevel(*val),
            ConfigValue::StringList(val) => Value::StringList(val.clone()),
            ConfigValue::Duration(val) => Value::Duration(DurationValue::from_millis(val.millis)),
            ConfigValue::Json(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(json) => Value::Json(json),
                Err(err) => {
                    error!(event_id = ErrorKind::InvalidPayload.as_u16(); "Error parsing JSON from config '{key}' ({err}). Keeping the raw string.");
                    Value::String(raw.clone())
                }
            },
            ConfigValue::WeightedValues(val)
            | ConfigValue::LimitDefinition(val)
            | ConfigValue::IntRange(val)
            | ConfigValue::Provided(val)
            | ConfigValue::Schema(val) => Value::Json(val.clone()),
        }
    }
}

/// Describes how the server arrived at an evaluated value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMetadata {
    /// Index of the matching config row. Zero when omitted on the wire.
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub config_row_index: i64,
    /// Index of the matching conditional value within the row. Zero when omitted on the wire.
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub conditional_value_index: i64,
    /// Index of the selected weighted value, if the value was weighted.
    #[serde(default, deserialize_with = "de_lenient_opt_i64")]
    pub weighted_value_index: Option<i64>,
    /// The kind of the originating config, e.g. `FEATURE_FLAG` or `CONFIG`.
    #[serde(rename = "type", default)]
    pub config_type: String,
    /// The type of the evaluated value.
    #[serde(default)]
    pub value_type: String,
    /// Identifier of the originating config.
    #[serde(rename = "id", default, deserialize_with = "de_lenient_string")]
    pub config_id: String,
}

/// A resolved configuration entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The key of the entry.
    pub key: String,
    /// The decoded value.
    pub value: Value,
    /// The value as it was received, absent for untyped payloads.
    pub raw_value: Option<ConfigValue>,
    /// The kind of value the entry holds.
    pub config_type: ConfigType,
    /// Evaluation provenance, absent for untyped payloads.
    pub evaluation_metadata: Option<EvaluationMetadata>,
}

impl Config {
    pub(crate) fn from_untyped(key: &str, value: Value) -> Self {
        let config_type = match &value {
            Value::Bool(_) => ConfigType::Bool,
            Value::Int(_) => ConfigType::Int,
            Value::Float(_) => ConfigType::Double,
            Value::String(_) => ConfigType::String,
            Value::Bytes(_) => ConfigType::Bytes,
            Value::StringList(_) => ConfigType::StringList,
            Value::Duration(_) => ConfigType::Duration,
            Value::LogLevel(_) => ConfigType::LogLevel,
            Value::Json(_) => ConfigType::Json,
        };
        Self {
            key: key.to_owned(),
            value,
            raw_value: None,
            config_type,
            evaluation_metadata: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Evaluation {
    value: ConfigValue,
    #[serde(default)]
    config_evaluation_metadata: Option<serde_json::Value>,
}

fn decode_metadata(key: &str, raw: Option<serde_json::Value>) -> Option<EvaluationMetadata> {
    match EvaluationMetadata::deserialize(raw?) {
        Ok(meta) => Some(meta),
        Err(err) => {
            warn!(event_id = ErrorKind::InvalidPayload.as_u16(); "Ignoring the evaluation metadata of config '{key}'. ({err})");
            None
        }
    }
}

/// Parses a raw payload into the key to [`Config`] map.
///
/// Payloads with an `evaluations` object are read as server evaluations; any other object is
/// read as a plain `{key: value}` map.
pub(crate) fn digest(payload: &serde_json::Value) -> Result<HashMap<String, Config>, Error> {
    let obj = match payload.as_object() {
        Some(obj) => obj,
        None => return Err(Error::Parse("The payload is not a JSON object".to_owned())),
    };
    match obj.get("evaluations") {
        Some(evaluations) => digest_evaluations(evaluations),
        None => Ok(obj
            .iter()
            .filter_map(|(key, raw)| {
                Value::from_json_val(raw).map(|val| (key.clone(), Config::from_untyped(key, val)))
            })
            .collect()),
    }
}

fn digest_evaluations(
    evaluations: &serde_json::Value,
) -> Result<HashMap<String, Config>, Error> {
    let evaluations = match evaluations.as_object() {
        Some(evaluations) => evaluations,
        None => {
            return Err(Error::Parse(
                "The 'evaluations' field is not a JSON object".to_owned(),
            ))
        }
    };
    let mut configs = HashMap::with_capacity(evaluations.len());
    for (key, raw) in evaluations {
        match Evaluation::deserialize(raw) {
            Ok(evaluation) => {
                let config = Config {
                    key: key.clone(),
                    value: evaluation.value.decode(key),
                    config_type: evaluation.value.config_type(),
                    raw_value: Some(evaluation.value),
                    evaluation_metadata: decode_metadata(key, evaluation.config_evaluation_metadata),
                };
                configs.insert(key.clone(), config);
            }
            Err(err) => {
                warn!(event_id = ErrorKind::InvalidPayload.as_u16(); "Skipping config '{key}', its evaluation could not be decoded. ({err})");
            }
        }
    }
    Ok(configs)
}

fn de_lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(i64),
        Str(String),
    }
    match Repr::deserialize(deserializer)? {
        Repr::Num(val) => Ok(val),
        Repr::Str(val) => val.trim().parse().map_err(D::Error::custom),
    }
}

fn de_lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "de_lenient_i64")] i64);
    Ok(Option::<Wrap>::deserialize(deserializer)?.map(|w| w.0))
}

fn de_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(serde_json::Number),
        Str(String),
    }
    Ok(match Repr::deserialize(deserializer)? {
        Repr::Num(val) => val.to_string(),
        Repr::Str(val) => val,
    })
}

fn de_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    STANDARD.decode(raw).map_err(D::Error::custom)
}

fn ser_base64<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Plain(Vec<String>),
        Wrapped { values: Vec<String> },
    }
    Ok(match Repr::deserialize(deserializer)? {
        Repr::Plain(values) | Repr::Wrapped { values } => values,
    })
}
