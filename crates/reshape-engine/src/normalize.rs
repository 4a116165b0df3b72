//! Tabular normalizer: flattening, sanitizing, limit enforcement, and
//! column projection for record graphs.
//!
//! All functions here are pure and synchronous; execution contexts call
//! them from worker threads.

use std::collections::HashSet;

use serde_json::{Map, Value};

use reshape_types::error::{ConvertError, LimitKind};
use reshape_types::limits::Limits;
use reshape_types::row::{Row, Table};

/// Flatten a nested record into a flat key→scalar row.
///
/// Nested object keys are joined to their parent path with `delimiter`.
/// Array values are serialized to their compact JSON string form rather
/// than recursed into; scalars pass through unchanged. Empty nested
/// objects contribute no keys. Idempotent on already-flat records.
///
/// Traversal is iterative with an explicit stack so adversarially deep
/// graphs cannot overflow the call stack.
#[must_use]
pub fn flatten_record(record: &Row, delimiter: &str) -> Row {
    let mut out = Row::new();
    let mut stack: Vec<(String, serde_json::map::Iter<'_>)> =
        vec![(String::new(), record.iter())];

    'frames: while let Some((prefix, mut entries)) = stack.pop() {
        while let Some((key, value)) = entries.next() {
            let path = join_path(&prefix, key, delimiter);
            match value {
                Value::Object(nested) => {
                    // Suspend this frame and descend.
                    stack.push((prefix, entries));
                    stack.push((path, nested.iter()));
                    continue 'frames;
                }
                Value::Array(_) => {
                    out.insert(path, Value::String(value.to_string()));
                }
                scalar => {
                    out.insert(path, scalar.clone());
                }
            }
        }
    }

    out
}

fn join_path(prefix: &str, key: &str, delimiter: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{delimiter}{key}")
    }
}

/// Sanitize a record without flattening: object- and array-valued fields
/// are serialized to their compact JSON string form, scalars pass through.
#[must_use]
pub fn sanitize_record(record: &Row) -> Row {
    let mut out = Row::new();
    for (key, value) in record {
        match value {
            Value::Object(_) | Value::Array(_) => {
                out.insert(key.clone(), Value::String(value.to_string()));
            }
            scalar => {
                out.insert(key.clone(), scalar.clone());
            }
        }
    }
    out
}

/// Rebuild a nested document from a flat row by splitting keys on
/// `delimiter`. Inverse of [`flatten_record`] for scalar leaves.
///
/// On a path conflict (a scalar already sits where a nested object is
/// needed) the later field wins and replaces the scalar.
#[must_use]
pub fn unflatten_record(row: &Row, delimiter: &str) -> Value {
    let mut root = Map::new();
    for (path, value) in row {
        let mut parts: Vec<&str> = if delimiter.is_empty() {
            vec![path.as_str()]
        } else {
            path.split(delimiter).collect()
        };
        let leaf = parts.pop().unwrap_or(path.as_str());

        let mut cursor = &mut root;
        for part in parts {
            cursor = descend(cursor, part);
        }
        cursor.insert(leaf.to_string(), value.clone());
    }
    Value::Object(root)
}

fn descend<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut().expect("slot was just made an object")
}

/// Check a row sequence against the limit policy, aborting the scan at
/// the first violation.
///
/// Violations are checked in order: row count, then the accumulated
/// distinct-column set, then individual cell lengths. `context` names the
/// dataset in the resulting error.
pub fn enforce_limits(rows: &[Row], limits: &Limits, context: &str) -> Result<(), ConvertError> {
    if rows.len() > limits.max_rows {
        return Err(ConvertError::limit(
            LimitKind::Rows,
            format!("{context}: {} rows > {}", rows.len(), limits.max_rows),
        ));
    }

    let mut columns: HashSet<&str> = HashSet::new();
    for row in rows {
        for (key, value) in row {
            if columns.insert(key.as_str()) && columns.len() > limits.max_columns {
                return Err(ConvertError::limit(
                    LimitKind::Columns,
                    format!("{context}: more than {} distinct columns", limits.max_columns),
                ));
            }
            if let Value::String(s) = value {
                // Byte length bounds char length from above, so the char
                // count is only taken when the byte check already failed.
                if s.len() > limits.max_cell_chars && s.chars().count() > limits.max_cell_chars {
                    return Err(ConvertError::limit(
                        LimitKind::CellLength,
                        format!(
                            "{context}: cell '{key}' exceeds {} characters",
                            limits.max_cell_chars
                        ),
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Union of keys across all rows, in first-seen order.
#[must_use]
pub fn column_union(rows: &[Row]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Replace the first `overwrites.len()` rows positionally. Overwrites past
/// the end of the source are appended.
pub fn apply_overwrites(rows: &mut Vec<Row>, overwrites: Vec<Row>) {
    for (index, replacement) in overwrites.into_iter().enumerate() {
        if index < rows.len() {
            rows[index] = replacement;
        } else {
            rows.push(replacement);
        }
    }
}

/// Project rows into a column-oriented [`Table`]. Columns are the
/// first-seen union; fields a row lacks become JSON `null`.
#[must_use]
pub fn project_table(rows: &[Row]) -> Table {
    let columns = column_union(rows);
    let projected = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Table {
        columns,
        rows: projected,
    }
}
