//! Chunk emitter: streams a row sequence to the response channel in
//! bounded, increasing-size batches with cooperative pauses.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use reshape_types::batch::{ChunkBatch, StreamSummary};
use reshape_types::error::ConvertError;
use reshape_types::limits::Limits;
use reshape_types::row::Row;
use reshape_types::wire::{CorrelationId, ResponseEnvelope, ResponsePayload};

/// Interval-based cooperative yield helper.
///
/// Call [`tick`](Self::tick) inside long loops; it yields to the
/// scheduler once the configured interval of continuous work has passed.
#[derive(Debug)]
pub struct Yielder {
    last: Instant,
    interval: Duration,
}

impl Yielder {
    /// Yielder configured from the limit policy's yield interval.
    #[must_use]
    pub fn new(limits: &Limits) -> Self {
        Self {
            last: Instant::now(),
            interval: Duration::from_millis(limits.yield_interval_ms),
        }
    }

    /// Yield if the interval has elapsed since the last yield.
    pub async fn tick(&mut self) {
        if self.last.elapsed() >= self.interval {
            self.pause().await;
        }
    }

    /// Yield unconditionally and reset the interval clock.
    pub async fn pause(&mut self) {
        tokio::task::yield_now().await;
        self.last = Instant::now();
    }
}

/// Stream `rows` as progress batches followed by a stream-complete marker.
///
/// The sequence is capped at the preview ceiling while `total_rows` keeps
/// the true dataset size. Batch 0 carries at most `first_chunk_rows` rows,
/// every later batch at most `next_chunk_rows`. Control is yielded back to
/// the scheduler between batches. An empty sequence still emits exactly
/// one empty final batch, so subscribers always observe at least one
/// progress event.
///
/// # Errors
///
/// Returns `Internal` if the response channel is closed (the receiving
/// orchestrator was torn down mid-stream).
pub async fn emit_chunks(
    mut rows: Vec<Row>,
    correlation_id: &CorrelationId,
    limits: &Limits,
    responses: &mpsc::Sender<ResponseEnvelope>,
) -> Result<StreamSummary, ConvertError> {
    let total_rows = rows.len() as u64;
    rows.truncate(limits.preview_row_cap);
    let emitted_rows = rows.len() as u64;

    let mut remaining = rows.into_iter();
    let mut yielder = Yielder::new(limits);
    let mut batch_index: u32 = 0;
    loop {
        let size = if batch_index == 0 {
            limits.first_chunk_rows
        } else {
            limits.next_chunk_rows
        };
        let batch_rows: Vec<Row> = remaining.by_ref().take(size).collect();
        let is_final = remaining.len() == 0;

        let batch = ChunkBatch {
            rows: batch_rows,
            batch_index,
            total_rows,
            is_final,
        };
        send(
            responses,
            correlation_id,
            ResponsePayload::Progress { batch },
        )
        .await?;
        yielder.pause().await;

        batch_index += 1;
        if is_final {
            break;
        }
    }

    let summary = StreamSummary {
        total_rows,
        emitted_rows,
    };
    send(
        responses,
        correlation_id,
        ResponsePayload::StreamComplete { summary },
    )
    .await?;
    Ok(summary)
}

async fn send(
    responses: &mpsc::Sender<ResponseEnvelope>,
    correlation_id: &CorrelationId,
    payload: ResponsePayload,
) -> Result<(), ConvertError> {
    responses
        .send(ResponseEnvelope {
            correlation_id: correlation_id.clone(),
            payload,
        })
        .await
        .map_err(|_| ConvertError::internal("response channel closed"))
}
