//! Schema export
//!
//! Converts a finished `Schema` into a destination representation. The
//! BigQuery form is the JSON field list accepted by `bq load --schema`; the
//! tree form is the native schema with provenance, useful for diagnostics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;

use crate::error::ExportError;
use crate::schema::Schema;
use crate::types::{FieldSchema, Kind};

static BIGQUERY_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,299}$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    BigQuery,
    Tree,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bigquery" => Ok(ExportFormat::BigQuery),
            "tree" => Ok(ExportFormat::Tree),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Reject names BigQuery's classic column naming rule does not allow
    pub strict_names: bool,
}

/// One entry of a BigQuery JSON schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BigQueryField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<BigQueryField>>,
}

fn bigquery_type(kind: Kind) -> &'static str {
    match kind {
        Kind::Boolean => "BOOLEAN",
        Kind::String | Kind::Unknown => "STRING",
        Kind::Integer => "INTEGER",
        Kind::Float => "FLOAT",
        Kind::Record => "RECORD",
        Kind::Timestamp => "TIMESTAMP",
        Kind::Date => "DATE",
        Kind::Time => "TIME",
    }
}

fn bigquery_mode(field: &FieldSchema) -> &'static str {
    if field.repeated {
        "REPEATED"
    } else if field.required {
        "REQUIRED"
    } else {
        "NULLABLE"
    }
}

/// Convert a schema into a BigQuery field list
pub fn bigquery_fields(schema: &Schema, options: &ExportOptions) -> Result<Vec<BigQueryField>, ExportError> {
    convert(schema, "", options)
}

fn convert(schema: &Schema, prefix: &str, options: &ExportOptions) -> Result<Vec<BigQueryField>, ExportError> {
    let mut fields = Vec::with_capacity(schema.len());

    for field in schema {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        if options.strict_names && !BIGQUERY_NAME_REGEX.is_match(&field.name) {
            return Err(ExportError::InvalidFieldName { path });
        }

        let nested = if field.kind == Kind::Record {
            match &field.children {
                Some(children) if !children.is_empty() => Some(convert(children, &path, options)?),
                _ => return Err(ExportError::EmptyRecord { path }),
            }
        } else {
            None
        };

        fields.push(BigQueryField {
            name: field.name.clone(),
            field_type: bigquery_type(field.kind),
            mode: bigquery_mode(field),
            fields: nested,
        });
    }

    Ok(fields)
}

/// Render a schema as JSON in the requested format
pub fn to_json(
    schema: &Schema,
    format: ExportFormat,
    options: &ExportOptions,
    pretty: bool,
) -> Result<String, ExportError> {
    let output = match (format, pretty) {
        (ExportFormat::BigQuery, true) => serde_json::to_string_pretty(&bigquery_fields(schema, options)?)?,
        (ExportFormat::BigQuery, false) => serde_json::to_string(&bigquery_fields(schema, options)?)?,
        (ExportFormat::Tree, true) => serde_json::to_string_pretty(schema)?,
        (ExportFormat::Tree, false) => serde_json::to_string(schema)?,
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provenance;
    use serde_json::{json, Value};

    fn at() -> Provenance {
        Provenance::new("t", 1)
    }

    fn sample() -> Schema {
        let mut address = Schema::new();
        address.insert_if_absent(FieldSchema::scalar("city", Kind::String, false, at()));

        let mut schema = Schema::new();
        schema.insert_if_absent(FieldSchema::scalar("ts", Kind::Timestamp, false, at()));
        schema.insert_if_absent(FieldSchema::scalar("ids", Kind::Integer, true, at()));
        schema.insert_if_absent(FieldSchema::scalar("maybe", Kind::Unknown, false, at()));
        schema.insert_if_absent(FieldSchema::record("address", true, address, at()));
        schema
    }

    #[test]
    fn test_bigquery_json() {
        let json: Value =
            serde_json::from_str(&to_json(&sample(), ExportFormat::BigQuery, &ExportOptions::default(), false).unwrap())
                .unwrap();

        assert_eq!(
            json,
            json!([
                {
                    "name": "address",
                    "type": "RECORD",
                    "mode": "REPEATED",
                    "fields": [{"name": "city", "type": "STRING", "mode": "NULLABLE"}]
                },
                {"name": "ids", "type": "INTEGER", "mode": "REPEATED"},
                {"name": "maybe", "type": "STRING", "mode": "NULLABLE"},
                {"name": "ts", "type": "TIMESTAMP", "mode": "NULLABLE"}
            ])
        );
    }

    #[test]
    fn test_required_mode() {
        let mut schema = Schema::new();
        let mut field = FieldSchema::scalar("id", Kind::Integer, false, at());
        field.required = true;
        schema.insert_if_absent(field);

        let fields = bigquery_fields(&schema, &ExportOptions::default()).unwrap();
        assert_eq!(fields[0].mode, "REQUIRED");
    }

    #[test]
    fn test_empty_record_is_rejected() {
        let mut outer = Schema::new();
        outer.insert_if_absent(FieldSchema::record("empty", false, Schema::new(), at()));
        let mut schema = Schema::new();
        schema.insert_if_absent(FieldSchema::record("outer", false, outer, at()));

        let err = bigquery_fields(&schema, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::EmptyRecord { ref path } if path == "outer.empty"));
    }

    #[test]
    fn test_strict_names() {
        let mut schema = Schema::new();
        schema.insert_if_absent(FieldSchema::scalar("user-id", Kind::String, false, at()));

        assert!(bigquery_fields(&schema, &ExportOptions::default()).is_ok());
        let err = bigquery_fields(&schema, &ExportOptions { strict_names: true }).unwrap_err();
        assert!(matches!(err, ExportError::InvalidFieldName { .. }));
    }

    #[test]
    fn test_tree_keeps_provenance() {
        let json: Value =
            serde_json::from_str(&to_json(&sample(), ExportFormat::Tree, &ExportOptions::default(), true).unwrap())
                .unwrap();
        assert_eq!(json[0]["name"], "address");
        assert_eq!(json[0]["children"][0]["kind"], "string");
        assert_eq!(json[0]["provenance"], json!({"source": "t", "line": 1}));
        assert!(json[1].get("children").is_none());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("tree".parse::<ExportFormat>().unwrap(), ExportFormat::Tree);
        assert!("avro".parse::<ExportFormat>().is_err());
    }
}
