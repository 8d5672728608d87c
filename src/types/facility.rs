//! Beat families

use std::fmt;

/// The beat family that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facility {
    Filebeat,
    Packetbeat,
    Topbeat,
    Winlogbeat,
    Generic,
}

impl Facility {
    /// Value stored in the `facility` field of a canonical message.
    pub fn as_str(self) -> &'static str {
        match self {
            Facility::Filebeat => "filebeat",
            Facility::Packetbeat => "packetbeat",
            Facility::Topbeat => "topbeat",
            Facility::Winlogbeat => "winlogbeat",
            Facility::Generic => "genericbeat",
        }
    }

    /// Prefix for flattened beat-specific fields.
    pub fn field_prefix(self) -> &'static str {
        match self {
            Facility::Filebeat => "filebeat",
            Facility::Packetbeat => "packetbeat",
            Facility::Topbeat => "topbeat",
            Facility::Winlogbeat => "winlogbeat",
            Facility::Generic => "beat",
        }
    }

    /// Resolve a `@metadata.beat` name. Unknown names are not a family.
    pub fn from_beat_name(name: &str) -> Option<Self> {
        match name {
            "filebeat" => Some(Facility::Filebeat),
            "packetbeat" => Some(Facility::Packetbeat),
            "topbeat" => Some(Facility::Topbeat),
            "winlogbeat" => Some(Facility::Winlogbeat),
            _ => None,
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
