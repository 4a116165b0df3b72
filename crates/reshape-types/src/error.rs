//! Typed conversion error model shared across the context boundary.
//!
//! Every failure inside an execution context is converted into a
//! [`ConvertError`] before it crosses back to the orchestrator; nothing
//! else crosses the boundary. Cancellation is a dedicated tagged variant
//! so callers classify it by type, never by message content.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which limit a dataset violated.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Row-count ceiling.
    #[error("rows")]
    Rows,
    /// Distinct-column ceiling.
    #[error("columns")]
    Columns,
    /// Serialized cell-length ceiling.
    #[error("cell_length")]
    CellLength,
}

/// Error taxonomy for conversion pipelines.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvertError {
    /// Malformed input handed to a format transform.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A row/column/cell size guard fired. No partial output is returned.
    #[error("{limit} limit exceeded ({context})")]
    LimitExceeded { limit: LimitKind, context: String },

    /// The input shape is not one the pipeline can convert.
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },

    /// Work was superseded or torn down by the orchestrator. Synthesized
    /// on the caller side, never by an execution context.
    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    /// Any other failure surfaced by a transform or the host plumbing.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ConvertError {
    /// Parse failure.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Limit violation with the dataset context that tripped it.
    pub fn limit(limit: LimitKind, context: impl Into<String>) -> Self {
        Self::LimitExceeded {
            limit,
            context: context.into(),
        }
    }

    /// Unrecognized input shape or request kind.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /// Orchestrator-level cancellation.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Host-side plumbing failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the error represents superseded/cancelled work rather
    /// than a genuine computation failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
