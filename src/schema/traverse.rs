//! Merging decoded lines into a schema
//!
//! A line is walked key by key. Keys already present are skipped without
//! inference, new keys are inferred and inserted. Record fields are built
//! depth-first into a private `Schema` and published in one insert, so only
//! the top level ever touches the shared lock.

use serde_json::{Map, Value};

use crate::error::TraversalError;
use crate::schema::infer::{infer, value_kind_name, InferOptions, NullPolicy};
use crate::schema::tree::{Schema, SchemaTree};
use crate::types::{FieldSchema, Kind, Provenance};

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Upper bound on JSON container nesting accepted by the decoder, whatever
/// `max_depth` is set to. Decoding recurses once per level.
pub const MAX_JSON_NESTING: usize = 256;

/// Somewhere fields can be inserted first-wins
trait FieldSink {
    fn exists(&self, name: &str) -> bool;
    fn insert_if_absent(&mut self, field: FieldSchema) -> bool;
}

impl FieldSink for Schema {
    fn exists(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn insert_if_absent(&mut self, field: FieldSchema) -> bool {
        Schema::insert_if_absent(self, field)
    }
}

impl FieldSink for &SchemaTree {
    fn exists(&self, name: &str) -> bool {
        (**self).exists(name)
    }

    fn insert_if_absent(&mut self, field: FieldSchema) -> bool {
        (**self).insert_if_absent(field)
    }
}

#[derive(Debug, Clone)]
pub struct Traverser {
    options: InferOptions,
    max_depth: usize,
}

impl Default for Traverser {
    fn default() -> Self {
        Traverser::new(InferOptions::default(), DEFAULT_MAX_DEPTH)
    }
}

impl Traverser {
    pub fn new(options: InferOptions, max_depth: usize) -> Self {
        Traverser { options, max_depth }
    }

    /// Deepest container nesting a line may have and still be decoded.
    ///
    /// Each record level may sit inside an array, on top of the line object
    /// itself and a trailing scalar array.
    pub fn nesting_limit(&self) -> usize {
        self.max_depth
            .saturating_mul(2)
            .saturating_add(2)
            .min(MAX_JSON_NESTING)
    }

    /// Merge one decoded line. Anything but a JSON object is an error.
    pub fn traverse_value(
        &self,
        tree: &SchemaTree,
        value: &Value,
        provenance: &Provenance,
    ) -> Result<(), Vec<TraversalError>> {
        match value {
            Value::Object(object) => self.traverse(tree, object, provenance),
            other => Err(vec![TraversalError::NotAnObject {
                found: value_kind_name(other),
            }]),
        }
    }

    /// Merge the fields of `object` into `tree`.
    ///
    /// Errors are collected per field; the remaining fields of the object are
    /// still merged. A record whose subtree had any error is not inserted.
    pub fn traverse(
        &self,
        tree: &SchemaTree,
        object: &Map<String, Value>,
        provenance: &Provenance,
    ) -> Result<(), Vec<TraversalError>> {
        let mut errors = Vec::new();
        let mut sink = tree;
        self.walk(&mut sink, object, provenance, "", 0, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn walk<S: FieldSink>(
        &self,
        sink: &mut S,
        object: &Map<String, Value>,
        provenance: &Provenance,
        prefix: &str,
        depth: usize,
        errors: &mut Vec<TraversalError>,
    ) {
        for (key, value) in object {
            if sink.exists(key) {
                continue;
            }

            let path = join_path(prefix, key);
            let inferred = match infer(value, &self.options) {
                Ok(inferred) => inferred,
                Err(e) if e.is_undetermined() && self.options.null_policy == NullPolicy::Skip => continue,
                Err(source) => {
                    errors.push(TraversalError::Infer { path, source });
                    continue;
                }
            };

            if inferred.kind != Kind::Record {
                sink.insert_if_absent(FieldSchema::scalar(
                    key.as_str(),
                    inferred.kind,
                    inferred.repeated,
                    provenance.clone(),
                ));
                continue;
            }

            if depth >= self.max_depth {
                errors.push(TraversalError::TooDeep {
                    path,
                    limit: self.max_depth,
                });
                continue;
            }

            let Some(nested) = representative(value) else {
                continue;
            };

            let mut children = Schema::new();
            let failures = errors.len();
            self.walk(&mut children, nested, provenance, &path, depth + 1, errors);
            // Nothing to publish if a child failed or every child was skipped
            if errors.len() > failures || children.is_empty() {
                continue;
            }

            sink.insert_if_absent(FieldSchema::record(
                key.as_str(),
                inferred.repeated,
                children,
                provenance.clone(),
            ));
        }
    }
}

/// The object a record field's nested schema is built from
fn representative(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(object) => Some(object),
        Value::Array(items) => items.first().and_then(Value::as_object),
        _ => None,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
