//! Limit policy for normalization and chunk emission.

use serde::{Deserialize, Serialize};

/// Size guards and chunk sizing shared by the normalizer and the emitter.
///
/// Process defaults come from the associated constants; tests shrink them
/// to keep fixtures small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum number of rows a conversion may produce.
    pub max_rows: usize,
    /// Maximum number of distinct columns across all rows.
    pub max_columns: usize,
    /// Maximum serialized length of a single string cell, in characters.
    pub max_cell_chars: usize,
    /// Total rows ever emitted by a preview stream.
    pub preview_row_cap: usize,
    /// Size of the first emitted batch (small, to shorten time to first row).
    pub first_chunk_rows: usize,
    /// Size of every batch after the first.
    pub next_chunk_rows: usize,
    /// Yield to the scheduler at least once per this many milliseconds of
    /// continuous work.
    pub yield_interval_ms: u64,
}

impl Limits {
    /// 100k row ceiling.
    pub const DEFAULT_MAX_ROWS: usize = 100_000;
    /// 500 distinct columns.
    pub const DEFAULT_MAX_COLUMNS: usize = 500;
    /// 200k character cells.
    pub const DEFAULT_MAX_CELL_CHARS: usize = 200_000;
    /// 1000 preview rows.
    pub const DEFAULT_PREVIEW_ROW_CAP: usize = 1_000;
    /// First batch: 100 rows.
    pub const DEFAULT_FIRST_CHUNK_ROWS: usize = 100;
    /// Subsequent batches: 200 rows.
    pub const DEFAULT_NEXT_CHUNK_ROWS: usize = 200;
    /// Yield roughly every 12ms of continuous work.
    pub const DEFAULT_YIELD_INTERVAL_MS: u64 = 12;
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_rows: Self::DEFAULT_MAX_ROWS,
            max_columns: Self::DEFAULT_MAX_COLUMNS,
            max_cell_chars: Self::DEFAULT_MAX_CELL_CHARS,
            preview_row_cap: Self::DEFAULT_PREVIEW_ROW_CAP,
            first_chunk_rows: Self::DEFAULT_FIRST_CHUNK_ROWS,
            next_chunk_rows: Self::DEFAULT_NEXT_CHUNK_ROWS,
            yield_interval_ms: Self::DEFAULT_YIELD_INTERVAL_MS,
        }
    }
}
