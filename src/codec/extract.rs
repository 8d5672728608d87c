//! Per-family field extraction

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::flatten::flatten;
use super::timestamp::parse_timestamp;
use crate::types::{CanonicalMessage, Facility, RawEvent};
use crate::{BeatsError, Result};

/// Text used when a family has nothing better to show.
const EMPTY_TEXT: &str = "-";

/// Fields every beat shares, detached from the document before family extraction.
struct Envelope {
    timestamp: DateTime<Utc>,
    hostname: Option<String>,
    name: Option<String>,
    declared_type: Option<String>,
    tags: Option<Value>,
    custom_fields: Option<Map<String, Value>>,
}

impl Envelope {
    fn take(event: &mut RawEvent) -> Result<Self> {
        let timestamp = match event.remove("@timestamp") {
            Some(Value::String(value)) => parse_timestamp(&value)?,
            Some(other) => {
                return Err(BeatsError::timestamp_error(other.to_string(), "timestamp is not a string"));
            }
            None => return Err(BeatsError::normalization_error("document has no @timestamp")),
        };

        let beat = match event.remove("beat") {
            Some(Value::Object(beat)) => beat,
            _ => Map::new(),
        };
        let hostname = string_field(&beat, "hostname").or_else(|| host_name(event));
        let name = string_field(&beat, "name");

        let declared_type = match event.remove("type") {
            Some(Value::String(t)) if !t.is_empty() => Some(t),
            _ => None,
        };
        let tags = event.remove("tags").filter(|t| !t.is_null());
        let custom_fields = match event.remove("fields") {
            Some(Value::Object(fields)) => Some(fields),
            _ => None,
        };

        Ok(Self { timestamp, hostname, name, declared_type, tags, custom_fields })
    }

    fn into_message(
        self,
        text: String,
        facility: Facility,
        default_type: Option<&str>,
    ) -> CanonicalMessage {
        let mut message = CanonicalMessage::new(text, self.hostname, self.timestamp, facility);
        message.add_field("name", self.name.map(Value::String).unwrap_or_default());

        let declared_type = self.declared_type.or_else(|| default_type.map(str::to_string));
        message.add_field("type", declared_type.map(Value::String).unwrap_or_default());
        message.add_field("tags", self.tags.unwrap_or_default());

        if let Some(fields) = self.custom_fields {
            message.merge_fields(fields);
        }
        message
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Newer beats report the host as `host` or `host.name`.
fn host_name(event: &RawEvent) -> Option<String> {
    match event.get("host") {
        Some(Value::String(host)) if !host.is_empty() => Some(host.clone()),
        Some(Value::Object(host)) => string_field(host, "name"),
        _ => None,
    }
}

/// Render a value as message text: strings verbatim, anything else as JSON.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the canonical message for an event already classified as `facility`.
pub fn extract(mut event: RawEvent, facility: Facility, prefix_fields: bool) -> Result<CanonicalMessage> {
    // Generic fallback text is the whole document as received.
    let snapshot = (facility == Facility::Generic && !has_text(&event, "message"))
        .then(|| Value::Object(event.clone()).to_string());

    let envelope = Envelope::take(&mut event)?;
    let prefix = prefix_fields.then(|| facility.field_prefix());

    let mut message = match facility {
        Facility::Filebeat => {
            let text = event.remove("message").map(|m| text_of(&m)).unwrap_or_default();
            let file = event.remove("source");
            let input_type = event.remove("input_type");
            let offset = event.remove("offset");
            let count = event.remove("count");

            let mut message = envelope.into_message(text, facility, Some("log"));
            message.add_field("file", file.unwrap_or_default());
            message.add_field("input_type", input_type.unwrap_or_default());
            message.add_field("offset", offset.unwrap_or_default());
            message.add_field("count", count.unwrap_or_default());
            message
        }
        Facility::Packetbeat => {
            let text = packet_summary(envelope.declared_type.as_deref(), &event);
            envelope.into_message(text, facility, None)
        }
        Facility::Topbeat => {
            let text = match envelope.declared_type.as_deref() {
                Some(metric_set) => format!("{metric_set} metrics"),
                None => EMPTY_TEXT.to_string(),
            };
            envelope.into_message(text, facility, None)
        }
        Facility::Winlogbeat => {
            let text = match event.remove("message") {
                Some(message) if !message.is_null() => text_of(&message),
                _ => windows_event_summary(&event),
            };
            let mut message = envelope.into_message(text, facility, Some("wineventlog"));
            for key in ["event_id", "log_name", "source_name"] {
                message.add_field(key, event.remove(key).unwrap_or_default());
            }
            message
        }
        Facility::Generic => {
            let text = match (event.remove("message"), snapshot) {
                (Some(message), _) if !message.is_null() => text_of(&message),
                (_, Some(snapshot)) => snapshot,
                (_, None) => EMPTY_TEXT.to_string(),
            };
            envelope.into_message(text, facility, None)
        }
    };

    message.merge_fields(flatten(prefix, &event));
    Ok(message)
}

fn has_text(event: &RawEvent, key: &str) -> bool {
    event.get(key).is_some_and(|v| !v.is_null())
}

/// Short description of a network transaction, e.g. `dns QUERY example.com OK`.
fn packet_summary(declared_type: Option<&str>, event: &RawEvent) -> String {
    let resource = event
        .get("resource")
        .and_then(Value::as_str)
        .or_else(|| event.get("query").and_then(Value::as_str));

    let parts: Vec<&str> = [
        declared_type,
        event.get("method").and_then(Value::as_str),
        resource,
        event.get("status").and_then(Value::as_str),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect();

    if parts.is_empty() { EMPTY_TEXT.to_string() } else { parts.join(" ") }
}

/// Summary used when a Windows event carries no rendered message.
fn windows_event_summary(event: &RawEvent) -> String {
    let log_name = event.get("log_name").and_then(Value::as_str).unwrap_or("unknown");
    let source_name = event.get("source_name").and_then(Value::as_str).unwrap_or("unknown");
    match event.get("event_id") {
        Some(id) if !id.is_null() => {
            format!("{log_name} event {} from {source_name}", text_of(id))
        }
        _ => format!("{log_name} event from {source_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> RawEvent {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    #[test]
    fn envelope_requires_timestamp() {
        let result = extract(event(json!({"message": "x"})), Facility::Generic, true);
        assert!(matches!(result, Err(BeatsError::Normalization { .. })));

        let result = extract(event(json!({"@timestamp": 12})), Facility::Generic, true);
        assert!(matches!(result, Err(BeatsError::Timestamp { .. })));
    }

    #[test]
    fn custom_fields_and_tags_are_kept() {
        let doc = event(json!({
            "@timestamp": "2016-04-01T00:00:00Z",
            "message": "hello",
            "source": "/var/log/app.log",
            "tags": ["web", "prod"],
            "fields": {"env": "staging"},
            "beat": {"hostname": "web-1", "name": "shipper"},
        }));

        let message = extract(doc, Facility::Filebeat, true).unwrap();
        assert_eq!(message.field("tags"), Some(&json!(["web", "prod"])));
        assert_eq!(message.field_str("env"), Some("staging"));
        assert_eq!(message.field_str("name"), Some("shipper"));
        assert_eq!(message.field_str("type"), Some("log"));
        assert_eq!(message.source, "web-1");
    }

    #[test]
    fn named_fields_win_over_user_fields() {
        let doc = event(json!({
            "@timestamp": "2016-04-01T00:00:00Z",
            "message": "hello",
            "source": "/var/log/nginx/access.log",
            "type": "log",
            "fields": {"type": "nginx", "file": "elsewhere", "team": "edge"},
        }));

        let message = extract(doc, Facility::Filebeat, true).unwrap();
        assert_eq!(message.field_str("type"), Some("log"));
        assert_eq!(message.field_str("file"), Some("/var/log/nginx/access.log"));
        assert_eq!(message.field_str("team"), Some("edge"));
    }

    #[test]
    fn unprefixed_leftovers_do_not_replace_named_fields() {
        let doc = event(json!({
            "@timestamp": "2016-04-01T00:00:00Z",
            "event_id": 4624,
            "log_name": "Security",
            "source_name": "Microsoft-Windows-Security-Auditing",
            "beat": {"hostname": "win-host", "name": "winlog-shipper"},
            "fields": {"event_id": 1},
            "name": "overwritten",
            "level": "Information",
        }));

        let message = extract(doc, Facility::Winlogbeat, false).unwrap();
        assert_eq!(message.field_str("name"), Some("winlog-shipper"));
        assert_eq!(message.field("event_id"), Some(&json!(4624)));
        assert_eq!(message.field_str("level"), Some("Information"));
    }

    #[test]
    fn host_field_is_used_when_beat_has_no_hostname() {
        let doc = event(json!({
            "@timestamp": "2016-04-01T00:00:00Z",
            "message": "hello",
            "host": {"name": "db-2"},
        }));
        let message = extract(doc, Facility::Generic, true).unwrap();
        assert_eq!(message.source, "db-2");
    }

    #[test]
    fn packet_summary_joins_available_parts() {
        let doc = event(json!({"method": "QUERY", "query": "class IN, type A", "status": "OK"}));
        assert_eq!(packet_summary(Some("dns"), &doc), "dns QUERY class IN, type A OK");
        assert_eq!(packet_summary(None, &RawEvent::new()), "-");
    }

    #[test]
    fn winlogbeat_without_message_gets_summary() {
        let doc = event(json!({
            "@timestamp": "2016-04-01T00:00:00Z",
            "event_id": 7036,
            "log_name": "System",
            "source_name": "Service Control Manager",
            "level": "Information",
        }));

        let message = extract(doc, Facility::Winlogbeat, true).unwrap();
        assert_eq!(message.text, "System event 7036 from Service Control Manager");
        assert_eq!(message.field("event_id"), Some(&json!(7036)));
        assert_eq!(message.field_str("type"), Some("wineventlog"));
        assert_eq!(message.field_str("winlogbeat_level"), Some("Information"));
    }

    #[test]
    fn prefix_can_be_disabled() {
        let doc = event(json!({
            "@timestamp": "2016-04-01T00:00:00Z",
            "type": "system",
            "load": {"load1": 1.5},
        }));

        let prefixed = extract(doc.clone(), Facility::Topbeat, true).unwrap();
        assert_eq!(prefixed.field("topbeat_load_load1"), Some(&json!(1.5)));

        let bare = extract(doc, Facility::Topbeat, false).unwrap();
        assert_eq!(bare.field("load_load1"), Some(&json!(1.5)));
        assert_eq!(bare.text, "system metrics");
    }
}
