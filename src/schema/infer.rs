//! Per-value type inference
//!
//! Maps one decoded JSON value to a field kind and a repeated flag. Pure and
//! stateless, so workers call it without any synchronization.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::InferError;
use crate::types::Kind;

static ISO_DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap()
});

static ISO_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?$").unwrap()
});

/// How to treat values that carry no type information (null, `[]`, `{}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPolicy {
    /// Report the field as an error; it stays absent so a later line can define it
    #[default]
    Reject,
    /// Leave the field absent without reporting anything
    Skip,
    /// Infer `Kind::Unknown`, which first-wins then fixes for the field
    Unknown,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InferOptions {
    pub null_policy: NullPolicy,

    /// Recognise ISO-8601 timestamps, dates and times inside strings
    pub detect_temporal: bool,
}

/// Result of inferring one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inferred {
    pub kind: Kind,
    pub repeated: bool,
}

impl Inferred {
    fn single(kind: Kind) -> Self {
        Inferred { kind, repeated: false }
    }

    fn repeated(kind: Kind) -> Self {
        Inferred { kind, repeated: true }
    }
}

/// JSON-level kind of a value, used for array homogeneity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl ValueKind {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    ValueKind::Integer
                } else {
                    ValueKind::Float
                }
            }
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    fn to_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

/// Name of the JSON kind of `value`, as used in error messages
pub fn value_kind_name(value: &Value) -> &'static str {
    ValueKind::from_value(value).to_str()
}

/// Infer with default options: no temporal detection, nulls rejected
pub fn infer_type(value: &Value) -> Result<Inferred, InferError> {
    infer(value, &InferOptions::default())
}

/// Infer the kind of a single value.
///
/// Arrays take their kind from the first element and must be homogeneous:
/// every element has to share the first element's JSON kind, with integers
/// and floats kept apart.
pub fn infer(value: &Value, options: &InferOptions) -> Result<Inferred, InferError> {
    match value {
        Value::Null => undetermined(InferError::UnsupportedType { found: "null" }, false, options),
        Value::Object(fields) if fields.is_empty() => undetermined(InferError::EmptyRecord, false, options),
        Value::Array(items) => infer_array(items, options),
        other => scalar_kind(other, options).map(Inferred::single),
    }
}

fn undetermined(error: InferError, repeated: bool, options: &InferOptions) -> Result<Inferred, InferError> {
    match options.null_policy {
        NullPolicy::Unknown => Ok(Inferred { kind: Kind::Unknown, repeated }),
        _ => Err(error),
    }
}

fn infer_array(items: &[Value], options: &InferOptions) -> Result<Inferred, InferError> {
    let Some(first) = items.first() else {
        return undetermined(InferError::AmbiguousArrayType, true, options);
    };

    let expected = ValueKind::from_value(first);
    for (index, item) in items.iter().enumerate().skip(1) {
        let found = ValueKind::from_value(item);
        if found != expected {
            return Err(InferError::InconsistentArrayType {
                index,
                expected: expected.to_str(),
                found: found.to_str(),
            });
        }
    }

    match first {
        Value::Null => undetermined(InferError::UnsupportedType { found: "null" }, true, options),
        Value::Object(fields) if fields.is_empty() => undetermined(InferError::EmptyRecord, true, options),
        Value::Array(_) => Err(InferError::UnsupportedType { found: "array of arrays" }),
        other => scalar_kind(other, options).map(Inferred::repeated),
    }
}

/// Kind of a non-null, non-array value
fn scalar_kind(value: &Value, options: &InferOptions) -> Result<Kind, InferError> {
    match value {
        Value::Bool(_) => Ok(Kind::Boolean),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(Kind::Integer)
            } else {
                Ok(Kind::Float)
            }
        }
        Value::String(s) if options.detect_temporal => Ok(detect_temporal(s).unwrap_or(Kind::String)),
        Value::String(_) => Ok(Kind::String),
        Value::Object(_) => Ok(Kind::Record),
        Value::Null | Value::Array(_) => Err(InferError::UnsupportedType {
            found: value_kind_name(value),
        }),
    }
}

/// Detect an ISO-8601 temporal shape in a string
fn detect_temporal(value: &str) -> Option<Kind> {
    let len = value.len();

    // Length and separator checks first, regex only on plausible candidates
    if len == 10 && value.as_bytes()[4] == b'-' && ISO_DATE_REGEX.is_match(value) {
        return Some(Kind::Date);
    }

    if len >= 19 && matches!(value.as_bytes()[10], b'T' | b' ') && ISO_DATETIME_REGEX.is_match(value) {
        return Some(Kind::Timestamp);
    }

    if len >= 8 && value.as_bytes()[2] == b':' && ISO_TIME_REGEX.is_match(value) {
        return Some(Kind::Time);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temporal() -> InferOptions {
        InferOptions {
            detect_temporal: true,
            ..InferOptions::default()
        }
    }

    #[test]
    fn test_scalars() {
        assert_eq!(infer_type(&json!(true)).unwrap(), Inferred::single(Kind::Boolean));
        assert_eq!(infer_type(&json!("x")).unwrap(), Inferred::single(Kind::String));
        assert_eq!(infer_type(&json!(42)).unwrap(), Inferred::single(Kind::Integer));
        assert_eq!(infer_type(&json!(-7)).unwrap(), Inferred::single(Kind::Integer));
        assert_eq!(infer_type(&json!(u64::MAX)).unwrap(), Inferred::single(Kind::Integer));
        assert_eq!(infer_type(&json!(1.5)).unwrap(), Inferred::single(Kind::Float));
        assert_eq!(infer_type(&json!({"a": 1})).unwrap(), Inferred::single(Kind::Record));
    }

    #[test]
    fn test_float_text_stays_float() {
        let value: Value = serde_json::from_str("1.0").unwrap();
        assert_eq!(infer_type(&value).unwrap().kind, Kind::Float);
    }

    #[test]
    fn test_null_rejected_by_default() {
        assert_eq!(
            infer_type(&json!(null)),
            Err(InferError::UnsupportedType { found: "null" })
        );
    }

    #[test]
    fn test_homogeneous_arrays() {
        assert_eq!(infer_type(&json!([1, 2, 3])).unwrap(), Inferred::repeated(Kind::Integer));
        assert_eq!(infer_type(&json!(["a", "b"])).unwrap(), Inferred::repeated(Kind::String));
        assert_eq!(infer_type(&json!([true])).unwrap(), Inferred::repeated(Kind::Boolean));
        assert_eq!(infer_type(&json!([0.5, 1.5])).unwrap(), Inferred::repeated(Kind::Float));
        assert_eq!(
            infer_type(&json!([{"a": 1}, {"b": 2}])).unwrap(),
            Inferred::repeated(Kind::Record)
        );
    }

    #[test]
    fn test_inconsistent_array() {
        assert_eq!(
            infer_type(&json!([1, "a"])),
            Err(InferError::InconsistentArrayType {
                index: 1,
                expected: "integer",
                found: "string",
            })
        );
    }

    #[test]
    fn test_integer_and_float_do_not_mix() {
        let err = infer_type(&json!([1, 2, 2.5])).unwrap_err();
        assert!(matches!(err, InferError::InconsistentArrayType { index: 2, .. }));
    }

    #[test]
    fn test_empty_array() {
        assert_eq!(infer_type(&json!([])), Err(InferError::AmbiguousArrayType));
        assert!(InferError::AmbiguousArrayType.is_undetermined());
    }

    #[test]
    fn test_empty_object_is_undetermined() {
        assert_eq!(infer_type(&json!({})), Err(InferError::EmptyRecord));
        assert_eq!(infer_type(&json!([{}, {"a": 1}])), Err(InferError::EmptyRecord));
        assert!(InferError::EmptyRecord.is_undetermined());

        let options = InferOptions {
            null_policy: NullPolicy::Unknown,
            ..InferOptions::default()
        };
        assert_eq!(infer(&json!({}), &options).unwrap(), Inferred::single(Kind::Unknown));
        assert_eq!(infer(&json!([{}]), &options).unwrap(), Inferred::repeated(Kind::Unknown));
    }

    #[test]
    fn test_array_of_arrays_unsupported() {
        let err = infer_type(&json!([[1], [2]])).unwrap_err();
        assert_eq!(err, InferError::UnsupportedType { found: "array of arrays" });
        assert!(!err.is_undetermined());
    }

    #[test]
    fn test_unknown_policy() {
        let options = InferOptions {
            null_policy: NullPolicy::Unknown,
            ..InferOptions::default()
        };
        assert_eq!(infer(&json!(null), &options).unwrap(), Inferred::single(Kind::Unknown));
        assert_eq!(infer(&json!([]), &options).unwrap(), Inferred::repeated(Kind::Unknown));
        assert_eq!(infer(&json!([null, null]), &options).unwrap(), Inferred::repeated(Kind::Unknown));
    }

    #[test]
    fn test_temporal_detection() {
        let options = temporal();
        assert_eq!(infer(&json!("2020-06-18T10:44:12"), &options).unwrap().kind, Kind::Timestamp);
        assert_eq!(infer(&json!("2020-06-18 10:44:12.123Z"), &options).unwrap().kind, Kind::Timestamp);
        assert_eq!(infer(&json!("2020-06-18T10:44:12+02:00"), &options).unwrap().kind, Kind::Timestamp);
        assert_eq!(infer(&json!("2020-06-18"), &options).unwrap().kind, Kind::Date);
        assert_eq!(infer(&json!("10:44:12"), &options).unwrap().kind, Kind::Time);
        assert_eq!(infer(&json!("hello"), &options).unwrap().kind, Kind::String);
        assert_eq!(infer(&json!("2020-6-18"), &options).unwrap().kind, Kind::String);
    }

    #[test]
    fn test_temporal_detection_off_by_default() {
        assert_eq!(infer_type(&json!("2020-06-18")).unwrap().kind, Kind::String);
    }

    #[test]
    fn test_temporal_array_uses_first_element() {
        let inferred = infer(&json!(["2021-01-01", "not a date"]), &temporal()).unwrap();
        assert_eq!(inferred, Inferred::repeated(Kind::Date));
    }
}
