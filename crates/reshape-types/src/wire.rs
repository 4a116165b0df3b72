//! Message envelopes crossing the execution-context boundary.
//!
//! Every request carries a kind, a correlation id, and a payload. A single
//! request produces zero or more `Progress` responses followed by exactly
//! one terminal response: `Success`, `Error`, or `StreamComplete` (which
//! terminates a preview stream as a success).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::{ChunkBatch, StreamSummary};
use crate::error::ConvertError;
use crate::row::Row;

/// Conversion pipeline a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// Materialize a hierarchical document from tabular rows.
    ConvertTabularToHierarchical,
    /// Materialize flat rows from a hierarchical document.
    ConvertHierarchicalToTabular,
    /// Stream a bounded row preview of a tabular→hierarchical conversion.
    PreviewTabularToHierarchical,
    /// Stream a bounded row preview of a hierarchical→tabular conversion.
    PreviewHierarchicalToTabular,
}

impl RequestKind {
    /// True for the streaming preview kinds.
    #[must_use]
    pub fn is_preview(self) -> bool {
        matches!(
            self,
            Self::PreviewTabularToHierarchical | Self::PreviewHierarchicalToTabular
        )
    }

    /// Short prefix used when minting correlation ids.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::ConvertTabularToHierarchical => "t2h",
            Self::ConvertHierarchicalToTabular => "h2t",
            Self::PreviewTabularToHierarchical => "t2h-preview",
            Self::PreviewHierarchicalToTabular => "h2t-preview",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Identifier binding a request to its response stream.
///
/// Unique for the lifetime of the orchestrator instance that minted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint an id from a kind prefix and a per-kind sequence number.
    #[must_use]
    pub fn new(kind: RequestKind, seq: u64) -> Self {
        Self(format!("{}-{}", kind.prefix(), seq))
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request conversion options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Flatten nested records into dotted paths instead of stringifying them.
    #[serde(default)]
    pub flatten: bool,
    /// Path separator used by flatten/unflatten (`None` = `"."`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Positional row replacements applied before further processing: row
    /// `i` of the source is replaced by `overwrite_rows[i]`. Used to carry
    /// preview-time edits back onto the full dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_rows: Option<Vec<Row>>,
}

impl ConvertOptions {
    /// Default path separator.
    pub const DEFAULT_DELIMITER: &'static str = ".";

    /// Effective delimiter for flatten/unflatten.
    #[must_use]
    pub fn delimiter(&self) -> &str {
        self.delimiter.as_deref().unwrap_or(Self::DEFAULT_DELIMITER)
    }
}

/// Input handed to a conversion pipeline.
///
/// `Buffer` is raw serialized input held as [`Bytes`], so moving it into
/// an execution context transfers ownership of the allocation instead of
/// duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum InputData {
    /// Already-materialized flat rows.
    Rows { rows: Vec<Row> },
    /// A parsed hierarchical document.
    Document { value: Value },
    /// Raw serialized input, parsed inside the context.
    Buffer { bytes: Bytes },
}

/// Request payload: input data plus options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub data: InputData,
    #[serde(default)]
    pub options: ConvertOptions,
}

/// A request envelope sent into an execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub kind: RequestKind,
    pub correlation_id: CorrelationId,
    pub payload: RequestPayload,
}

/// Fully materialized result of a non-preview conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ConvertOutput {
    /// Flat rows (hierarchical→tabular).
    Rows { rows: Vec<Row> },
    /// A hierarchical document (tabular→hierarchical).
    Document { value: Value },
    /// End-of-stream summary (preview pipelines).
    Stream { summary: StreamSummary },
}

/// Response payload, distinguished by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Terminal success carrying the materialized result.
    Success { output: ConvertOutput },
    /// Terminal failure carrying the typed error.
    Error { error: ConvertError },
    /// Incremental chunk of a preview stream.
    Progress { batch: ChunkBatch },
    /// Stream-complete marker, terminating the request as a success.
    StreamComplete { summary: StreamSummary },
}

impl ResponsePayload {
    /// True for `Success`, `Error`, and `StreamComplete`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// A response envelope sent back from an execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub correlation_id: CorrelationId,
    pub payload: ResponsePayload,
}
