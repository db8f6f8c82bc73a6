//! Read-only projection of the JSON documents returned by the API.
//!
//! API responses are sparse, so reads of absent fields yield `None` rather
//! than an error. [`Document::require`] and indexing exist for callers that
//! want a hard failure on a field they need.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::ops::Index;

/// Fields holding ISO-8601 timestamps that are coerced at construction.
const DATE_FIELDS: [&str; 2] = ["created", "modified"];

/// A JSON object fetched from the API, with its `created` and `modified`
/// fields parsed into timestamps.
///
/// Reading a document never performs network activity.
///
/// # Examples
///
/// ```
/// use h51::Document;
/// use serde_json::json;
///
/// let document = Document::from_value(json!({
///     "uid": "3owuun",
///     "created": "2024-03-01T10:00:00+00:00",
///     "modified": "2024-03-02T08:30:00+00:00",
///     "type": "image",
/// }))
/// .unwrap();
///
/// assert_eq!(document.get_str("type"), Some("image"));
/// assert!(document.get("expires").is_none());
/// assert!(document.require("expires").is_err());
/// assert!(document.created().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    fields: Map<String, Value>,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

impl Document {
    /// Wraps a JSON object, parsing its date fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a date field holds something other than an
    /// ISO-8601 timestamp.
    pub fn new(fields: Map<String, Value>) -> Result<Self> {
        let mut document = Self {
            fields,
            created: None,
            modified: None,
        };
        document.coerce_dates()?;
        Ok(document)
    }

    /// Wraps a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::new(fields),
            other => Err(Error::UnexpectedResponse(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    fn coerce_dates(&mut self) -> Result<()> {
        self.created = parse_date_field(&self.fields, DATE_FIELDS[0])?;
        self.modified = parse_date_field(&self.fields, DATE_FIELDS[1])?;
        Ok(())
    }

    /// Returns the value of a field, or `None` if the field is absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the value of a field, or `default` if the field is absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.fields.get(name).unwrap_or(default)
    }

    /// Returns the value of a field, failing if the field is absent.
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }

    /// Returns `true` if the document has a field with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns a string field, or `None` if absent or not a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Deserializes a field into `T`.
    ///
    /// Returns `Ok(None)` when the field is absent or null.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| Error::DeserializationFailed {
                    raw_response: value.to_string(),
                    serde_error: e.to_string(),
                    status: http::StatusCode::OK,
                }),
        }
    }

    /// When the resource was created.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    /// When the resource was last modified.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// The field names of the document.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Merges `patch` into the document, replacing fields it names.
    pub(crate) fn apply_patch(&mut self, patch: Map<String, Value>) -> Result<()> {
        let touches_dates = DATE_FIELDS.iter().any(|f| patch.contains_key(*f));
        self.fields.extend(patch);
        if touches_dates {
            self.coerce_dates()?;
        }
        Ok(())
    }

    pub(crate) fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }
}

impl Index<&str> for Document {
    type Output = Value;

    /// # Panics
    ///
    /// Panics if the field is absent. Use [`Document::require`] to get an
    /// error instead.
    fn index(&self, name: &str) -> &Value {
        match self.fields.get(name) {
            Some(value) => value,
            None => panic!("document has no field '{}'", name),
        }
    }
}

fn parse_date_field(fields: &Map<String, Value>, name: &str) -> Result<Option<DateTime<Utc>>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => parse_timestamp(text).map(Some).ok_or_else(|| {
            Error::InvalidTimestamp {
                field: name.to_string(),
                value: text.clone(),
            }
        }),
        Some(other) => Err(Error::InvalidTimestamp {
            field: name.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}
