//! Beat family classification.
//!
//! Classification is an ordered list of structural checks over the document.
//! The first check that matches decides the family; documents matching none
//! are generic. A `@metadata.beat` naming a known family takes precedence over
//! the structural checks.

use serde_json::Value;

use crate::types::{Facility, RawEvent};

/// Packetbeat transaction types.
const PACKET_TYPES: &[&str] = &[
    "amqp", "cassandra", "dhcpv4", "dns", "flow", "http", "icmp", "memcache", "mongodb", "mysql",
    "nfs", "pgsql", "redis", "thrift", "tls",
];

/// Topbeat metric-set types.
const METRIC_TYPES: &[&str] = &["system", "process", "filesystem"];

/// Sections that hold counters and gauges in a metrics document.
const METRIC_SECTIONS: &[&str] = &["cpu", "cpus", "mem", "swap", "load", "proc", "fs"];

type Rule = (Facility, fn(&RawEvent) -> bool);

/// Structural rules in priority order.
const RULES: [Rule; 4] = [
    (Facility::Filebeat, is_filebeat),
    (Facility::Packetbeat, is_packetbeat),
    (Facility::Topbeat, is_topbeat),
    (Facility::Winlogbeat, is_winlogbeat),
];

/// Decide which beat family produced `event`.
///
/// `metadata` is the document's `@metadata` object, already detached.
pub fn classify(event: &RawEvent, metadata: Option<&Value>) -> Facility {
    if let Some(facility) = metadata
        .and_then(|m| m.get("beat"))
        .and_then(Value::as_str)
        .and_then(Facility::from_beat_name)
    {
        return facility;
    }

    RULES
        .iter()
        .find(|(_, rule)| rule(event))
        .map_or(Facility::Generic, |(facility, _)| *facility)
}

fn has(event: &RawEvent, key: &str) -> bool {
    event.get(key).is_some_and(|v| !v.is_null())
}

fn declared_type(event: &RawEvent) -> Option<&str> {
    event.get("type").and_then(Value::as_str)
}

/// A log line read from a file: a file path and a message body.
fn is_filebeat(event: &RawEvent) -> bool {
    event.get("source").is_some_and(Value::is_string) && has(event, "message")
}

/// A network transaction: transport metadata or a known sub-protocol, no message body.
fn is_packetbeat(event: &RawEvent) -> bool {
    if has(event, "message") {
        return false;
    }
    has(event, "transport")
        || has(event, "proto")
        || (has(event, "client_ip") && has(event, "ip"))
        || declared_type(event).is_some_and(|t| PACKET_TYPES.contains(&t))
}

/// A metrics sample: counters grouped under metric sections, no message body.
fn is_topbeat(event: &RawEvent) -> bool {
    if has(event, "message") {
        return false;
    }
    declared_type(event).is_some_and(|t| METRIC_TYPES.contains(&t))
        || METRIC_SECTIONS.iter().any(|section| event.get(*section).is_some_and(Value::is_object))
}

/// A Windows event log record: event id plus channel or provider.
fn is_winlogbeat(event: &RawEvent) -> bool {
    has(event, "event_id") && (has(event, "log_name") || has(event, "source_name"))
}
