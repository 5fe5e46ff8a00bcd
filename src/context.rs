use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Supported context attribute value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// Bool attribute value.
    Bool(bool),
    /// Whole number attribute value.
    Int(i64),
    /// Decimal number attribute value.
    Float(f64),
    /// String attribute value.
    String(String),
}

impl Display for ContextValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextValue::Bool(val) => write!(f, "{val}"),
            ContextValue::Int(val) => write!(f, "{val}"),
            ContextValue::Float(val) => write!(f, "{val}"),
            ContextValue::String(val) => f.write_str(val),
        }
    }
}

from_val_to_enum!(ContextValue Bool bool);
from_val_to_enum!(ContextValue Int i64);
from_val_to_enum!(ContextValue Float f64);
from_val_to_enum!(ContextValue String String);
from_val_to_enum_into!(ContextValue String &str);
from_val_to_enum_into!(ContextValue Int i32 u32);

/// Describes who or what configuration is evaluated for.
///
/// A context is a set of named namespaces (e.g. `user`, `team`, `device`), each holding
/// scalar attributes. Contexts are immutable once handed to a [`crate::Client`]; changing
/// the context means building a new one and passing it to [`crate::Client::update_context`].
///
/// Two contexts are equal when their canonical encodings are equal, so the order
/// in which attributes were added never matters.
///
/// # Examples
///
/// ```rust
/// use reforge::EvaluationContext;
///
/// let context = EvaluationContext::new()
///     .with_attribute("user", "key", "abcdefg")
///     .with_attribute("user", "device", "desktop")
///     .with_attribute("team", "isCostCenter", false);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext {
    contexts: BTreeMap<String, BTreeMap<String, ContextValue>>,
}

impl EvaluationContext {
    /// Creates an empty [`EvaluationContext`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attribute `name` of the namespace `namespace`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::EvaluationContext;
    ///
    /// let context = EvaluationContext::new()
    ///     .with_attribute("user", "id", 10001)
    ///     .with_attribute("user", "firstName", "Fred");
    /// ```
    pub fn with_attribute<T: Into<ContextValue>>(
        mut self,
        namespace: &str,
        name: &str,
        value: T,
    ) -> Self {
        self.contexts
            .entry(namespace.to_owned())
            .or_default()
            .insert(name.to_owned(), value.into());
        self
    }

    /// Returns the attributes of the given namespace.
    pub fn get(&self, namespace: &str) -> Option<&BTreeMap<String, ContextValue>> {
        self.contexts.get(namespace)
    }

    /// Returns the namespace names in sorted order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.contexts.keys().map(String::as_str)
    }

    /// Returns `true` when the context holds no namespaces.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Produces the canonical encoding of the context.
    ///
    /// The encoding is deterministic and independent of construction order, and it
    /// is safe to use as a URL path segment.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::EvaluationContext;
    ///
    /// let a = EvaluationContext::new()
    ///     .with_attribute("user", "key", "abc")
    ///     .with_attribute("user", "device", "desktop");
    /// let b = EvaluationContext::new()
    ///     .with_attribute("user", "device", "desktop")
    ///     .with_attribute("user", "key", "abc");
    /// assert_eq!(a.encode(), b.encode());
    /// ```
    pub fn encode(&self) -> String {
        let wire = WireContexts {
            contexts: self
                .contexts
                .iter()
                .map(|(name, values)| WireContext {
                    context_type: name,
                    values: values
                        .iter()
                        .map(|(k, v)| (k.as_str(), WireValue(v)))
                        .collect(),
                })
                .collect(),
        };
        // Every wire value is a plain string, number or bool, so serializing can't fail.
        let json = serde_json::to_vec(&wire).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }
}

impl PartialEq for EvaluationContext {
    fn eq(&self, other: &Self) -> bool {
        self.encode() == other.encode()
    }
}

impl Eq for EvaluationContext {}

impl<N, A, V> FromIterator<(N, A, V)> for EvaluationContext
where
    N: Into<String>,
    A: Into<String>,
    V: Into<ContextValue>,
{
    fn from_iter<I: IntoIterator<Item = (N, A, V)>>(iter: I) -> Self {
        let mut contexts = BTreeMap::<String, BTreeMap<String, ContextValue>>::new();
        for (namespace, name, value) in iter {
            contexts
                .entry(namespace.into())
                .or_default()
                .insert(name.into(), value.into());
        }
        Self { contexts }
    }
}

#[derive(Serialize)]
struct WireContexts<'a> {
    contexts: Vec<WireContext<'a>>,
}

#[derive(Serialize)]
struct WireContext<'a> {
    #[serde(rename = "type")]
    context_type: &'a str,
    values: BTreeMap<&'a str, WireValue<'a>>,
}

struct WireValue<'a>(&'a ContextValue);

impl Serialize for WireValue<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        match self.0 {
            ContextValue::Bool(val) => map.serialize_entry("bool", val)?,
            ContextValue::Int(val) => map.serialize_entry("int", val)?,
            ContextValue::Float(val) if val.is_finite() => map.serialize_entry("double", val)?,
            // proto3 JSON spelling of non-finite doubles
            ContextValue::Float(val) => map.serialize_entry(
                "double",
                if val.is_nan() {
                    "NaN"
                } else if val.is_sign_positive() {
                    "Infinity"
                } else {
                    "-Infinity"
                },
            )?,
            ContextValue::String(val) => map.serialize_entry("string", val)?,
        }
        map.end()
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;

    #[test]
    fn encode_is_order_independent() {
        let a = EvaluationContext::new()
            .with_attribute("user", "device", "desktop")
            .with_attribute("user", "key", "abcdefg")
            .with_attribute("team", "name", "Sales");
        let b = EvaluationContext::new()
            .with_attribute("team", "name", "Sales")
            .with_attribute("user", "key", "abcdefg")
            .with_attribute("user", "device", "desktop");

        assert_eq!(a.encode(), b.encode());
        assert_eq!(a, b);
    }

    #[test]
    fn encode_wire_format() {
        let context = EvaluationContext::new()
            .with_attribute("user", "key", "abcdefg")
            .with_attribute("user", "device", "desktop");

        assert_eq!(
            context.encode(),
            "eyJjb250ZXh0cyI6W3sidHlwZSI6InVzZXIiLCJ2YWx1ZXMiOnsiZGV2aWNlIjp7InN0cmluZyI6ImRlc2t0b3AifSwia2V5Ijp7InN0cmluZyI6ImFiY2RlZmcifX19XX0"
        );
    }

    #[test]
    fn encode_tags_scalar_types() {
        let context = EvaluationContext::new()
            .with_attribute("user", "id", 10001)
            .with_attribute("user", "score", 4.5)
            .with_attribute("team", "isCostCenter", false);

        let decoded = URL_SAFE_NO_PAD.decode(context.encode()).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            r#"{"contexts":[{"type":"team","values":{"isCostCenter":{"bool":false}}},{"type":"user","values":{"id":{"int":10001},"score":{"double":4.5}}}]}"#
        );
    }

    #[test]
    fn non_finite_floats_encode_distinctly() {
        let with = |val: f64| EvaluationContext::new().with_attribute("user", "score", val);

        let decoded = URL_SAFE_NO_PAD.decode(with(f64::NAN).encode()).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            r#"{"contexts":[{"type":"user","values":{"score":{"double":"NaN"}}}]}"#
        );
        assert_ne!(with(f64::NAN), with(f64::INFINITY));
        assert_ne!(with(f64::INFINITY), with(f64::NEG_INFINITY));
        assert_ne!(with(f64::NEG_INFINITY), with(f64::NAN));
        assert_eq!(with(f64::NAN), with(f64::NAN));
    }

    #[test]
    fn different_values_are_not_equal() {
        let a = EvaluationContext::new().with_attribute("user", "key", "abcdefg");
        let b = EvaluationContext::new().with_attribute("user", "key", "1324");

        assert_ne!(a, b);
    }

    #[test]
    fn deserialize_raw_map() {
        let context: EvaluationContext = serde_json::from_str(
            r#"{"user": {"key": "abcdefg", "device": "desktop", "age": 42, "beta": true}}"#,
        )
        .unwrap();

        let user = context.get("user").unwrap();
        assert_eq!(user["key"], ContextValue::String("abcdefg".to_owned()));
        assert_eq!(user["age"], ContextValue::Int(42));
        assert_eq!(user["beta"], ContextValue::Bool(true));
        assert_eq!(
            context,
            EvaluationContext::from_iter([
                ("user", "device", ContextValue::from("desktop")),
                ("user", "key", ContextValue::from("abcdefg")),
                ("user", "age", ContextValue::from(42)),
                ("user", "beta", ContextValue::from(true)),
            ])
        );
    }

    #[test]
    fn empty_context() {
        let context = EvaluationContext::new();

        assert!(context.is_empty());
        assert_eq!(context, EvaluationContext::default());
        assert_eq!(context.namespaces().count(), 0);
    }
}
