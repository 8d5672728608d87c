//! Event documents and the canonical message

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::Facility;

/// A decoded JSON event document. No fixed schema.
pub type RawEvent = serde_json::Map<String, Value>;

/// Source value used when a document names no reporting host.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Name of the field identifying the producing beat family.
pub const FACILITY_FIELD: &str = "facility";

/// An undecoded event payload as handed to a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// JSON document bytes, one object or an array of objects
    pub payload: Bytes,
    /// Sequence number of the frame that carried the payload, if any
    pub sequence: Option<u32>,
}

impl RawMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into(), sequence: None }
    }

    pub fn with_sequence(payload: impl Into<Bytes>, sequence: u32) -> Self {
        Self { payload: payload.into(), sequence: Some(sequence) }
    }
}

/// The normalized, schema-uniform representation of one event.
///
/// `fields` always holds a non-empty `facility` entry and `timestamp` is
/// always UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMessage {
    pub text: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, Value>,
}

impl CanonicalMessage {
    /// Create a message tagged with its facility.
    pub fn new(
        text: impl Into<String>,
        source: Option<String>,
        timestamp: DateTime<Utc>,
        facility: Facility,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FACILITY_FIELD.to_string(), Value::from(facility.as_str()));

        Self {
            text: text.into(),
            source: source
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            timestamp,
            fields,
        }
    }

    /// Facility tag of this message.
    pub fn facility(&self) -> &str {
        self.fields.get(FACILITY_FIELD).and_then(Value::as_str).unwrap_or_default()
    }

    /// Look up a field value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a string field value.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Add a field. Nulls are ignored and `facility` cannot be overwritten.
    pub fn add_field(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if value.is_null() || name.is_empty() || name == FACILITY_FIELD {
            return;
        }
        self.fields.insert(name, value);
    }

    /// Add every entry of `fields`, with the same rules as [`add_field`](Self::add_field).
    pub fn add_fields<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (name, value) in fields {
            self.add_field(name, value);
        }
    }

    /// Like [`add_fields`](Self::add_fields), but existing fields win.
    pub fn merge_fields<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (name, value) in fields {
            if !self.fields.contains_key(&name) {
                self.add_field(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 4, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn new_message_carries_facility_and_defaults_source() {
        let message = CanonicalMessage::new("TEST", None, timestamp(), Facility::Filebeat);
        assert_eq!(message.facility(), "filebeat");
        assert_eq!(message.source, UNKNOWN_SOURCE);

        let message =
            CanonicalMessage::new("TEST", Some(String::new()), timestamp(), Facility::Generic);
        assert_eq!(message.source, UNKNOWN_SOURCE);
    }

    #[test]
    fn add_field_skips_nulls_and_protects_facility() {
        let mut message =
            CanonicalMessage::new("-", Some("host".into()), timestamp(), Facility::Topbeat);
        message.add_field("count", Value::Null);
        message.add_field("facility", Value::from("overwritten"));
        message.add_field("type", Value::from("system"));

        assert!(message.field("count").is_none());
        assert_eq!(message.facility(), "topbeat");
        assert_eq!(message.field_str("type"), Some("system"));
    }

    #[test]
    fn merge_fields_keeps_existing_entries() {
        let mut message = CanonicalMessage::new("-", None, timestamp(), Facility::Filebeat);
        message.add_field("type", Value::from("log"));
        message.merge_fields([
            ("type".to_string(), Value::from("nginx")),
            ("facility".to_string(), Value::from("other")),
            ("env".to_string(), Value::from("prod")),
        ]);

        assert_eq!(message.field_str("type"), Some("log"));
        assert_eq!(message.facility(), "filebeat");
        assert_eq!(message.field_str("env"), Some("prod"));
    }
}
