//! Row and table model for normalized tabular data.
//!
//! A [`Row`] is an ordered map from column name to JSON value. Key order
//! is insertion order (`serde_json` is built with `preserve_order`), which
//! is what makes first-seen column derivation deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single normalized row: ordered column name → scalar/string value.
pub type Row = serde_json::Map<String, Value>;

/// Column-oriented projection of a row sequence.
///
/// `columns` is the union of keys across all source rows in first-seen
/// order. Fields absent from a given row are represented as JSON `null`
/// in that row's cell vector — this is the canonical missing-field
/// convention for the whole engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Union of column names in first-seen order.
    pub columns: Vec<String>,
    /// One cell vector per source row, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows and no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }
}
