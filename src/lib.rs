//! # schemagen - schema inference for NDJSON
//!
//! Infers one nested, table-oriented schema (field names, kinds, repeated
//! flags, nested records) from newline-delimited JSON, suitable for loading
//! into a columnar destination such as BigQuery.
//!
//! ## Modules
//!
//! - **schema**: per-value type inference, the concurrent first-wins schema
//!   tree, and the traversal that merges decoded lines into it
//! - **pipeline**: bounded producer/worker fan-out over many sources, with
//!   sampling and line counters
//! - **export**: BigQuery JSON field list and native tree output
//!
//! The first observation of a field fixes its type. Later lines with a
//! different type for the same field are ignored, so the schema converges no
//! matter in which order concurrent workers see the lines.
//!
//! ## Quick Start
//!
//! ```rust
//! use schemagen::infer_schema_from_lines;
//! use schemagen::Kind;
//!
//! let lines = [
//!     r#"{"ts": "2020-06-18T10:44:12", "started": {"pid": 45678}}"#,
//!     r#"{"ts": "2020-06-18T10:44:13", "sessions_ids": [123, 456]}"#,
//! ];
//!
//! let (schema, errors) = infer_schema_from_lines(lines);
//! assert!(errors.is_empty());
//! assert_eq!(schema.len(), 3);
//! assert_eq!(schema.get_path(&["started", "pid"]).unwrap().kind, Kind::Integer);
//! assert!(schema.get("sessions_ids").unwrap().repeated);
//! ```
//!
//! For many or large inputs use [`Pipeline`], which spreads lines over a
//! pool of workers sharing one [`SchemaTree`].

pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod schema;
pub mod types;

// Re-export commonly used types for convenience
pub use config::IngestConfig;
pub use error::{
    ConfigError, DecodeError, ExportError, InferError, LineError, LineErrorKind, SourceError, TraversalError,
};
pub use export::{bigquery_fields, to_json, BigQueryField, ExportFormat, ExportOptions};
pub use pipeline::{IngestReport, LineCounts, Pipeline, Source};
pub use schema::{infer, infer_type, InferOptions, Inferred, NullPolicy, Schema, SchemaTree, Traverser};
pub use types::{FieldSchema, Kind, Line, Provenance};

/// Infer a schema from lines on the current thread, with default options.
///
/// Lines are numbered from 1 under the source name `<lines>`. Blank lines
/// are skipped; undecodable lines and field errors are returned alongside
/// the schema.
pub fn infer_schema_from_lines<'a, I>(lines: I) -> (Schema, Vec<LineError>)
where
    I: IntoIterator<Item = &'a str>,
{
    let tree = SchemaTree::new();
    let traverser = Traverser::default();
    let mut errors = Vec::new();

    for (index, text) in lines.into_iter().enumerate() {
        if text.trim().is_empty() {
            continue;
        }

        let provenance = Provenance::new("<lines>", index as u64 + 1);
        let kind = match pipeline::decode_line(text.as_bytes().to_vec(), traverser.nesting_limit()) {
            Ok(value) => match traverser.traverse_value(&tree, &value, &provenance) {
                Ok(()) => continue,
                Err(failures) => LineErrorKind::Traversal(failures),
            },
            Err(e) => LineErrorKind::Decode(e),
        };
        errors.push(LineError { provenance, kind });
    }

    (tree.into_schema(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_records() {
        let lines = [
            r#"{"ts":"2020-06-18T10:44:12","started":{"pid":45678}}"#,
            r#"{"ts":"2020-06-18T10:44:13","logged_in":{"username":"foo"}}"#,
            r#"{"ts":"2020-06-18T10:44:13","sessions_ids":[123, 456]}"#,
        ];

        let (schema, errors) = infer_schema_from_lines(lines);
        assert!(errors.is_empty());
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.get("ts").unwrap().kind, Kind::String);
        assert_eq!(schema.get_path(&["logged_in", "username"]).unwrap().kind, Kind::String);
        assert_eq!(schema.get("sessions_ids").unwrap().provenance.line, 3);
    }

    #[test]
    fn test_errors_are_returned_not_raised() {
        let (schema, errors) = infer_schema_from_lines(["not json", "", r#"{"a": [1, "a"], "b": 1}"#]);
        assert_eq!(schema.len(), 1);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].provenance.line, 1);
        assert_eq!(errors[1].provenance.line, 3);
        assert!(errors[1].to_string().contains("on field: a"));
    }
}
