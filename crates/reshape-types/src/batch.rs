//! Streaming chunk batches and end-of-stream summaries.

use serde::{Deserialize, Serialize};

use crate::row::Row;

/// A bounded slice of a larger row sequence, streamed as one progress event.
///
/// `batch_index` is strictly increasing per stream. `total_rows` always
/// reflects the full dataset size, even when the preview cap means fewer
/// rows are ever emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkBatch {
    /// Rows in this batch. May be empty only for the single final batch of
    /// an empty stream.
    pub rows: Vec<Row>,
    /// Zero-based position of this batch in the stream.
    pub batch_index: u32,
    /// True size of the full dataset.
    pub total_rows: u64,
    /// True for the last progress batch of the stream.
    pub is_final: bool,
}

/// Terminal payload of a preview stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Full dataset size, independent of the preview cap.
    pub total_rows: u64,
    /// Rows actually delivered across all batches.
    pub emitted_rows: u64,
}
