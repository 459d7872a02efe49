use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::schema::Schema;

/// Inferred type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Boolean,
    String,
    Integer,
    Float,
    Record,
    /// Only produced when temporal detection is enabled
    Timestamp,
    Date,
    Time,
    /// A null or empty-array value under `NullPolicy::Unknown`
    Unknown,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Boolean => "boolean",
            Kind::String => "string",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Record => "record",
            Kind::Timestamp => "timestamp",
            Kind::Date => "date",
            Kind::Time => "time",
            Kind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a line came from: source identifier plus 1-based line number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub source: Arc<str>,
    pub line: u64,
}

impl Provenance {
    pub fn new(source: impl Into<Arc<str>>, line: u64) -> Self {
        Provenance {
            source: source.into(),
            line,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// One inferred field of a schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: Kind,

    /// True if the value that introduced the field was an array
    pub repeated: bool,

    /// Reserved. Nothing in the inference path sets it.
    pub required: bool,

    /// Nested fields, present only for `Kind::Record`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Schema>,

    /// The line that first introduced this field
    pub provenance: Provenance,
}

impl FieldSchema {
    pub fn scalar(name: impl Into<String>, kind: Kind, repeated: bool, provenance: Provenance) -> Self {
        FieldSchema {
            name: name.into(),
            kind,
            repeated,
            required: false,
            children: None,
            provenance,
        }
    }

    pub fn record(
        name: impl Into<String>,
        repeated: bool,
        children: Schema,
        provenance: Provenance,
    ) -> Self {
        FieldSchema {
            name: name.into(),
            kind: Kind::Record,
            repeated,
            required: false,
            children: Some(children),
            provenance,
        }
    }
}

/// A unit of work for the pipeline: one raw line and where it came from.
///
/// The bytes are not checked for UTF-8 until the line is decoded, so a bad
/// line only fails itself.
#[derive(Debug, Clone)]
pub struct Line {
    pub bytes: Vec<u8>,
    pub provenance: Provenance,
}

impl Line {
    pub fn new(bytes: impl Into<Vec<u8>>, provenance: Provenance) -> Self {
        Line {
            bytes: bytes.into(),
            provenance,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }
}
