//! Format transform seam and the built-in JSON transforms.
//!
//! [`Transform`] is the boundary behind which format-specific codecs live:
//! the orchestration layer only ever sees `(input, options) -> rows or
//! document`. The built-ins cover the generic JSON pipelines; spreadsheet
//! and document codecs plug in the same way.
//!
//! `overwrite_rows` always operates in row space: replacements are applied
//! after normalization (hierarchical→tabular) or before materialization
//! (tabular→hierarchical), and always before limit enforcement.

use serde_json::Value;

use reshape_types::error::ConvertError;
use reshape_types::limits::Limits;
use reshape_types::row::Row;
use reshape_types::wire::{ConvertOptions, InputData, RequestKind};

use crate::normalize::{
    apply_overwrites, enforce_limits, flatten_record, sanitize_record, unflatten_record,
};

/// Result of a transform: flat rows or a hierarchical document.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutput {
    Rows(Vec<Row>),
    Document(Value),
}

/// A conversion pipeline's transform function.
///
/// Implementations must be `Send + Sync`; they run on worker threads
/// inside an execution context.
pub trait Transform: Send + Sync {
    /// Convert `data` according to `options`, enforcing `limits`.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed input, `UnsupportedFormat` for shapes the
    /// pipeline cannot convert, `LimitExceeded` when a size guard fires.
    fn apply(
        &self,
        data: InputData,
        options: &ConvertOptions,
        limits: &Limits,
    ) -> Result<TransformOutput, ConvertError>;
}

/// Select the transform serving a request kind.
#[must_use]
pub fn transform_for(kind: RequestKind) -> &'static dyn Transform {
    match kind {
        RequestKind::ConvertTabularToHierarchical => &TabularToHierarchical,
        RequestKind::ConvertHierarchicalToTabular | RequestKind::PreviewHierarchicalToTabular => {
            &HierarchicalToTabular
        }
        RequestKind::PreviewTabularToHierarchical => &TabularRowPreview,
    }
}

// ── Input decoding ──────────────────────────────────────────────────

fn decode_value(data: InputData) -> Result<Value, ConvertError> {
    match data {
        InputData::Rows { rows } => Ok(Value::Array(rows.into_iter().map(Value::Object).collect())),
        InputData::Document { value } => Ok(value),
        InputData::Buffer { bytes } => serde_json::from_slice(&bytes)
            .map_err(|e| ConvertError::parse(format!("invalid JSON input: {e}"))),
    }
}

/// Interpret a document as a record sequence. A top-level array yields one
/// record per element; a top-level object yields a single record. Array
/// elements that are not objects become single-column `{"value": ...}`
/// records.
fn records_from_value(value: Value) -> Result<Vec<Row>, ConvertError> {
    match value {
        Value::Array(elements) => Ok(elements
            .into_iter()
            .map(|element| match element {
                Value::Object(record) => record,
                other => {
                    let mut record = Row::new();
                    record.insert("value".to_string(), other);
                    record
                }
            })
            .collect()),
        Value::Object(record) => Ok(vec![record]),
        other => Err(ConvertError::unsupported(format!(
            "expected a record or an array of records, got JSON {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Built-in transforms ─────────────────────────────────────────────

/// Hierarchical document → flat rows. Serves both the one-shot convert
/// and the streaming preview of the same pipeline.
pub struct HierarchicalToTabular;

impl Transform for HierarchicalToTabular {
    fn apply(
        &self,
        data: InputData,
        options: &ConvertOptions,
        limits: &Limits,
    ) -> Result<TransformOutput, ConvertError> {
        let records = records_from_value(decode_value(data)?)?;
        let delimiter = options.delimiter();
        let mut rows: Vec<Row> = records
            .iter()
            .map(|record| {
                if options.flatten {
                    flatten_record(record, delimiter)
                } else {
                    sanitize_record(record)
                }
            })
            .collect();
        if let Some(overwrites) = options.overwrite_rows.clone() {
            apply_overwrites(&mut rows, overwrites);
        }
        enforce_limits(&rows, limits, "hierarchical input")?;
        Ok(TransformOutput::Rows(rows))
    }
}

/// Flat rows → hierarchical document. With `flatten` set, dotted paths in
/// row keys are expanded back into nesting; otherwise rows pass through
/// as one flat object each.
pub struct TabularToHierarchical;

impl Transform for TabularToHierarchical {
    fn apply(
        &self,
        data: InputData,
        options: &ConvertOptions,
        limits: &Limits,
    ) -> Result<TransformOutput, ConvertError> {
        let mut rows = records_from_value(decode_value(data)?)?;
        if let Some(overwrites) = options.overwrite_rows.clone() {
            apply_overwrites(&mut rows, overwrites);
        }
        enforce_limits(&rows, limits, "tabular input")?;

        let delimiter = options.delimiter();
        let records: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                if options.flatten {
                    unflatten_record(&row, delimiter)
                } else {
                    Value::Object(row)
                }
            })
            .collect();
        Ok(TransformOutput::Document(Value::Array(records)))
    }
}

/// Row preview of the tabular→hierarchical pipeline: the sanitized,
/// overwritten source rows as the user will edit them before export.
pub struct TabularRowPreview;

impl Transform for TabularRowPreview {
    fn apply(
        &self,
        data: InputData,
        options: &ConvertOptions,
        limits: &Limits,
    ) -> Result<TransformOutput, ConvertError> {
        let records = records_from_value(decode_value(data)?)?;
        let mut rows: Vec<Row> = records.iter().map(sanitize_record).collect();
        if let Some(overwrites) = options.overwrite_rows.clone() {
            apply_overwrites(&mut rows, overwrites);
        }
        enforce_limits(&rows, limits, "tabular input")?;
        Ok(TransformOutput::Rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn doc(value: Value) -> InputData {
        InputData::Document { value }
    }

    #[test]
    fn hierarchical_to_tabular_sanitize_path() {
        let out = HierarchicalToTabular
            .apply(
                doc(json!([{"x": 1}, {"x": 2, "y": "z"}])),
                &ConvertOptions::default(),
                &Limits::default(),
            )
            .unwrap();
        let TransformOutput::Rows(rows) = out else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("x"), Some(&json!(1)));
        assert_eq!(rows[0].get("y"), None);
        assert_eq!(rows[1].get("y"), Some(&json!("z")));
    }

    #[test]
    fn hierarchical_to_tabular_flatten_path() {
        let options = ConvertOptions {
            flatten: true,
            ..ConvertOptions::default()
        };
        let out = HierarchicalToTabular
            .apply(
                doc(json!([{"a": {"b": 1, "c": [2, 3]}}])),
                &options,
                &Limits::default(),
            )
            .unwrap();
        let TransformOutput::Rows(rows) = out else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].get("a.b"), Some(&json!(1)));
        assert_eq!(rows[0].get("a.c"), Some(&json!("[2,3]")));
    }

    #[test]
    fn buffer_input_is_parsed_inside_transform() {
        let data = InputData::Buffer {
            bytes: Bytes::from_static(br#"[{"x": 1}]"#),
        };
        let out = HierarchicalToTabular
            .apply(data, &ConvertOptions::default(), &Limits::default())
            .unwrap();
        assert!(matches!(out, TransformOutput::Rows(rows) if rows.len() == 1));
    }

    #[test]
    fn malformed_buffer_is_parse_error() {
        let data = InputData::Buffer {
            bytes: Bytes::from_static(b"{not json"),
        };
        let err = HierarchicalToTabular
            .apply(data, &ConvertOptions::default(), &Limits::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Parse { .. }));
    }

    #[test]
    fn scalar_document_is_unsupported() {
        let err = HierarchicalToTabular
            .apply(doc(json!(42)), &ConvertOptions::default(), &Limits::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn scalar_array_elements_become_value_rows() {
        let out = HierarchicalToTabular
            .apply(
                doc(json!(["a", 1])),
                &ConvertOptions::default(),
                &Limits::default(),
            )
            .unwrap();
        let TransformOutput::Rows(rows) = out else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].get("value"), Some(&json!("a")));
        assert_eq!(rows[1].get("value"), Some(&json!(1)));
    }

    #[test]
    fn tabular_to_hierarchical_unflattens() {
        let options = ConvertOptions {
            flatten: true,
            ..ConvertOptions::default()
        };
        let out = TabularToHierarchical
            .apply(
                doc(json!([{"a.b": 1, "a.c": 2}])),
                &options,
                &Limits::default(),
            )
            .unwrap();
        let TransformOutput::Document(value) = out else {
            panic!("expected document");
        };
        assert_eq!(value, json!([{"a": {"b": 1, "c": 2}}]));
    }

    #[test]
    fn tabular_to_hierarchical_passthrough_without_flatten() {
        let out = TabularToHierarchical
            .apply(
                doc(json!([{"a.b": 1}])),
                &ConvertOptions::default(),
                &Limits::default(),
            )
            .unwrap();
        let TransformOutput::Document(value) = out else {
            panic!("expected document");
        };
        assert_eq!(value, json!([{"a.b": 1}]));
    }

    #[test]
    fn overwrites_replace_rows_before_materialization() {
        let mut replacement = Row::new();
        replacement.insert("n".into(), json!(99));
        let options = ConvertOptions {
            overwrite_rows: Some(vec![replacement]),
            ..ConvertOptions::default()
        };
        let out = TabularToHierarchical
            .apply(
                doc(json!([{"n": 0}, {"n": 1}])),
                &options,
                &Limits::default(),
            )
            .unwrap();
        let TransformOutput::Document(value) = out else {
            panic!("expected document");
        };
        assert_eq!(value, json!([{"n": 99}, {"n": 1}]));
    }

    #[test]
    fn limits_propagate_from_transforms() {
        let limits = Limits {
            max_rows: 1,
            ..Limits::default()
        };
        let err = HierarchicalToTabular
            .apply(
                doc(json!([{"x": 1}, {"x": 2}])),
                &ConvertOptions::default(),
                &limits,
            )
            .unwrap_err();
        assert!(matches!(err, ConvertError::LimitExceeded { .. }));
    }

    #[test]
    fn preview_transform_sanitizes_rows() {
        let out = TabularRowPreview
            .apply(
                doc(json!([{"n": 1, "nested": {"a": 2}}])),
                &ConvertOptions::default(),
                &Limits::default(),
            )
            .unwrap();
        let TransformOutput::Rows(rows) = out else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].get("nested"), Some(&json!("{\"a\":2}")));
    }

    #[test]
    fn registry_routes_kinds() {
        // Smoke-check that each kind resolves to a transform that accepts
        // a trivial record array.
        for kind in [
            RequestKind::ConvertTabularToHierarchical,
            RequestKind::ConvertHierarchicalToTabular,
            RequestKind::PreviewTabularToHierarchical,
            RequestKind::PreviewHierarchicalToTabular,
        ] {
            let out = transform_for(kind).apply(
                doc(json!([{"x": 1}])),
                &ConvertOptions::default(),
                &Limits::default(),
            );
            assert!(out.is_ok(), "kind {kind} failed: {out:?}");
        }
    }
}
