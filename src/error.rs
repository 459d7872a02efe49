//! Error types
//!
//! Everything below `SourceError` is local to one line or one field and never
//! stops the pipeline. Source errors stop only the source they belong to.

use thiserror::Error;

use crate::types::Provenance;

/// The type of a single JSON value could not be inferred
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferError {
    #[error("unsupported type: {found}")]
    UnsupportedType { found: &'static str },

    #[error("ambiguous array type: array is empty")]
    AmbiguousArrayType,

    #[error("ambiguous record type: object has no fields")]
    EmptyRecord,

    #[error("inconsistent array type: element {index} is {found}, expected {expected}")]
    InconsistentArrayType {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

impl InferError {
    /// True for values that carry no type information at all (null, `[]`, `[null]`, `{}`)
    pub fn is_undetermined(&self) -> bool {
        matches!(
            self,
            InferError::UnsupportedType { found: "null" } | InferError::AmbiguousArrayType | InferError::EmptyRecord
        )
    }
}

/// A field of a decoded line could not be merged into the schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError {
    #[error("{source} on field: {path}")]
    Infer { path: String, source: InferError },

    #[error("nesting deeper than {limit} levels on field: {path}")]
    TooDeep { path: String, limit: usize },

    #[error("line is not a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

impl TraversalError {
    /// Dotted path of the offending field, if the error concerns one
    pub fn path(&self) -> Option<&str> {
        match self {
            TraversalError::Infer { path, .. } | TraversalError::TooDeep { path, .. } => Some(path),
            TraversalError::NotAnObject { .. } => None,
        }
    }
}

/// A line was skipped, entirely or in part
#[derive(Debug, Clone, Error)]
#[error("{kind} at position: {provenance}")]
pub struct LineError {
    pub provenance: Provenance,
    pub kind: LineErrorKind,
}

#[derive(Debug, Clone, Error)]
pub enum LineErrorKind {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{}", join_traversal_errors(.0))]
    Traversal(Vec<TraversalError>),
}

/// A line could not be turned into a JSON value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("JSON nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

fn join_traversal_errors(errors: &[TraversalError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A source could not be opened or read to the end
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unable to open source {source_id}: {error}")]
    Open {
        source_id: String,
        #[source]
        error: std::io::Error,
    },

    #[error("unable to read source {source_id} after line {line}: {error}")]
    Read {
        source_id: String,
        line: u64,
        #[source]
        error: std::io::Error,
    },
}

impl SourceError {
    pub fn source_id(&self) -> &str {
        match self {
            SourceError::Open { source_id, .. } | SourceError::Read { source_id, .. } => source_id,
        }
    }
}

/// Invalid pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no input sources given")]
    NoSources,

    #[error("{name} must be at least 1")]
    Zero { name: &'static str },

    #[error("sampling percentage must be within 0..=100, got {0}")]
    SamplingPercentage(u8),
}

/// The schema cannot be represented in the destination format
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("record field has no nested fields: {path}")]
    EmptyRecord { path: String },

    #[error("invalid field name for destination: {path}")]
    InvalidFieldName { path: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
