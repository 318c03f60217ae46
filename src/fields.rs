//! Field values supplied by the workflow host.
//!
//! A [`Fields`] map holds the parameters of one operation invocation, keyed by
//! the host's parameter names (`to`, `messageType`, `contactFilters`, ...).
//! Option collections are nested objects and repeatable groups are nested
//! arrays, exactly as the host resolves them.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Parameter values of a single operation invocation.
///
/// # Example
/// ```rust
/// use whaapy_rs::Fields;
/// use serde_json::json;
///
/// let fields = Fields::new()
///     .with("to", "+5215512345678")
///     .with("messageType", "text")
///     .with("additionalFields", json!({ "replyTo": "wamid.123" }));
///
/// assert_eq!(fields.str("to"), Some("+5215512345678"));
/// assert_eq!(fields.collection("additionalFields").str("replyTo"), Some("wamid.123"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    /// Creates an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, returning the map for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts or replaces a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Returns the value of a field. `null` counts as absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    /// Returns a field as a string slice, if it is a string.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns a field rendered as text. Numbers and booleans are formatted,
    /// other shapes are absent.
    pub fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        match self.get(name)? {
            Value::String(s) => Some(Cow::Borrowed(s)),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }

    /// Returns a field rendered as text, failing when it is absent.
    pub fn required_text(&self, name: &str) -> Result<Cow<'_, str>, Error> {
        self.text(name).ok_or_else(|| Error::missing(name))
    }

    /// Returns a field as text, treating an empty string as absent.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.str(name).filter(|s| !s.is_empty())
    }

    /// Returns a nested option collection. Missing or non-object values yield
    /// an empty collection.
    pub fn collection(&self, name: &str) -> Fields {
        match self.get(name) {
            Some(Value::Object(map)) => Fields(map.clone()),
            _ => Fields::default(),
        }
    }

    /// Returns the entries of a repeatable group, e.g. `buttonValues` inside
    /// `interactiveButtons`.
    pub fn group(&self, name: &str, values: &str) -> Vec<Fields> {
        match self.get(name).and_then(|group| group.get(values)) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::Object(map) => Some(Fields(map.clone())),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns a JSON-typed field: textual values are parsed, structured
    /// values are passed through unchanged.
    pub fn json(&self, name: &str) -> Result<Option<Value>, Error> {
        self.get(name).map(|value| parse_json(name, value)).transpose()
    }

    /// Iterates over all fields, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the map, returning the underlying JSON object.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Fields {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(Error::validation(format!(
                "Expected an object of fields, got {other}"
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parses a JSON-typed value. Strings are parsed once, anything else is
/// already structured.
pub(crate) fn parse_json(field: &str, value: &Value) -> Result<Value, Error> {
    match value {
        Value::String(text) => serde_json::from_str(text).map_err(|source| Error::InvalidJson {
            field: field.to_owned(),
            source,
        }),
        other => Ok(other.clone()),
    }
}

/// Truthiness as the host's expression language sees it.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `null` and the empty string are never sent.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
