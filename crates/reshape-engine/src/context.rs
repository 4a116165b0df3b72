//! Execution context: an isolated task serving conversion requests.
//!
//! One context serves every request kind submitted to its orchestrator
//! until torn down. The lifecycle is absent → live → absent: created
//! lazily on first submission, destroyed unconditionally on `cancel_all`.
//! Every transform failure (including panics) is converted into a
//! terminal-error envelope here; nothing crosses the boundary unconverted.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use reshape_types::error::ConvertError;
use reshape_types::limits::Limits;
use reshape_types::wire::{
    ConvertOutput, RequestEnvelope, RequestPayload, ResponseEnvelope, ResponsePayload,
};

use crate::emitter::emit_chunks;
use crate::transform::{transform_for, TransformOutput};

const INBOX_CAPACITY: usize = 32;

/// Handle to a live execution context.
pub struct ExecutionContext {
    requests: mpsc::Sender<RequestEnvelope>,
    worker: JoinHandle<()>,
}

impl ExecutionContext {
    /// Spawn a fresh context that reports responses on `responses`.
    #[must_use]
    pub fn spawn(responses: mpsc::Sender<ResponseEnvelope>, limits: Limits) -> Self {
        let (requests, inbox) = mpsc::channel(INBOX_CAPACITY);
        let worker = tokio::spawn(serve(inbox, responses, limits));
        Self { requests, worker }
    }

    /// Clone of the request inbox sender.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<RequestEnvelope> {
        self.requests.clone()
    }

    /// Hard teardown: abort the serving task without draining. A transform
    /// already running on a blocking thread cannot be interrupted; its
    /// eventual response lands on a closed channel and is discarded.
    pub fn teardown(self) {
        self.worker.abort();
    }
}

async fn serve(
    mut inbox: mpsc::Receiver<RequestEnvelope>,
    responses: mpsc::Sender<ResponseEnvelope>,
    limits: Limits,
) {
    while let Some(request) = inbox.recv().await {
        handle_request(request, &responses, &limits).await;
    }
}

async fn handle_request(
    request: RequestEnvelope,
    responses: &mpsc::Sender<ResponseEnvelope>,
    limits: &Limits,
) {
    let RequestEnvelope {
        kind,
        correlation_id,
        payload,
    } = request;
    tracing::debug!(%kind, %correlation_id, "handling conversion request");

    let RequestPayload { data, options } = payload;
    let transform_limits = limits.clone();
    let joined =
        tokio::task::spawn_blocking(move || transform_for(kind).apply(data, &options, &transform_limits))
            .await;
    let result = match joined {
        Ok(result) => result,
        // A panicking transform must still become a terminal error.
        Err(join_error) => Err(ConvertError::internal(format!(
            "transform failed: {join_error}"
        ))),
    };

    let terminal = match result {
        Ok(TransformOutput::Rows(rows)) if kind.is_preview() => {
            // Batches plus the stream-complete terminal are emitted
            // directly; a closed channel means the orchestrator tore us
            // down mid-stream and there is nobody left to notify.
            if let Err(err) = emit_chunks(rows, &correlation_id, limits, responses).await {
                tracing::debug!(%correlation_id, %err, "preview stream aborted");
            }
            return;
        }
        Ok(TransformOutput::Document(_)) if kind.is_preview() => ResponsePayload::Error {
            error: ConvertError::internal("preview transform produced a document, expected rows"),
        },
        Ok(TransformOutput::Rows(rows)) => ResponsePayload::Success {
            output: ConvertOutput::Rows { rows },
        },
        Ok(TransformOutput::Document(value)) => ResponsePayload::Success {
            output: ConvertOutput::Document { value },
        },
        Err(error) => {
            tracing::debug!(%correlation_id, %error, "conversion failed");
            ResponsePayload::Error { error }
        }
    };

    let envelope = ResponseEnvelope {
        correlation_id,
        payload: terminal,
    };
    if responses.send(envelope).await.is_err() {
        tracing::debug!("response channel closed, dropping terminal response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reshape_types::wire::{ConvertOptions, CorrelationId, InputData, RequestKind};
    use serde_json::json;

    fn request(kind: RequestKind, seq: u64, value: serde_json::Value) -> RequestEnvelope {
        RequestEnvelope {
            kind,
            correlation_id: CorrelationId::new(kind, seq),
            payload: RequestPayload {
                data: InputData::Document { value },
                options: ConvertOptions::default(),
            },
        }
    }

    #[tokio::test]
    async fn serves_convert_request() {
        let (resp_tx, mut resp_rx) = mpsc::channel(16);
        let context = ExecutionContext::spawn(resp_tx, Limits::default());

        context
            .sender()
            .send(request(
                RequestKind::ConvertHierarchicalToTabular,
                1,
                json!([{"x": 1}]),
            ))
            .await
            .unwrap();

        let envelope = resp_rx.recv().await.unwrap();
        assert_eq!(envelope.correlation_id.as_str(), "h2t-1");
        assert!(matches!(
            envelope.payload,
            ResponsePayload::Success {
                output: ConvertOutput::Rows { .. }
            }
        ));
        context.teardown();
    }

    #[tokio::test]
    async fn converts_failure_to_error_envelope() {
        let (resp_tx, mut resp_rx) = mpsc::channel(16);
        let context = ExecutionContext::spawn(resp_tx, Limits::default());

        context
            .sender()
            .send(request(
                RequestKind::ConvertHierarchicalToTabular,
                1,
                json!("not a record sequence"),
            ))
            .await
            .unwrap();

        let envelope = resp_rx.recv().await.unwrap();
        assert!(matches!(
            envelope.payload,
            ResponsePayload::Error {
                error: ConvertError::UnsupportedFormat { .. }
            }
        ));
        context.teardown();
    }

    #[tokio::test]
    async fn preview_streams_batches_then_completes() {
        let (resp_tx, mut resp_rx) = mpsc::channel(64);
        let context = ExecutionContext::spawn(resp_tx, Limits::default());

        let records: Vec<serde_json::Value> = (0..150).map(|i| json!({"n": i})).collect();
        context
            .sender()
            .send(request(
                RequestKind::PreviewHierarchicalToTabular,
                1,
                serde_json::Value::Array(records),
            ))
            .await
            .unwrap();

        let mut batches = 0;
        loop {
            let envelope = resp_rx.recv().await.unwrap();
            match envelope.payload {
                ResponsePayload::Progress { .. } => batches += 1,
                ResponsePayload::StreamComplete { summary } => {
                    assert_eq!(summary.total_rows, 150);
                    assert_eq!(summary.emitted_rows, 150);
                    break;
                }
                other => panic!("unexpected payload: {other:?}"),
            }
        }
        assert_eq!(batches, 2); // 100 + 50
        context.teardown();
    }

    #[tokio::test]
    async fn interleaves_multiple_correlation_ids() {
        let (resp_tx, mut resp_rx) = mpsc::channel(16);
        let context = ExecutionContext::spawn(resp_tx, Limits::default());
        let sender = context.sender();

        for seq in 1..=3 {
            sender
                .send(request(
                    RequestKind::ConvertHierarchicalToTabular,
                    seq,
                    json!([{"n": seq}]),
                ))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            let envelope = resp_rx.recv().await.unwrap();
            assert!(envelope.payload.is_terminal());
            seen.push(envelope.correlation_id.as_str().to_string());
        }
        seen.sort();
        assert_eq!(seen, ["h2t-1", "h2t-2", "h2t-3"]);
        context.teardown();
    }

    #[tokio::test]
    async fn teardown_closes_inbox() {
        let (resp_tx, _resp_rx) = mpsc::channel(16);
        let context = ExecutionContext::spawn(resp_tx, Limits::default());
        let sender = context.sender();
        context.teardown();

        // The aborted task eventually drops its receiver.
        sender.closed().await;
        assert!(sender.is_closed());
    }
}
