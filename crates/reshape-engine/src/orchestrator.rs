//! Task orchestrator: submission, debounce, response routing, and
//! all-or-nothing cancellation for conversion pipelines.
//!
//! The orchestrator owns at most one live [`ExecutionContext`] at a time,
//! created lazily on first submission and destroyed by `cancel_all`. All
//! counters and timer state are instance-owned; two orchestrators share
//! nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use reshape_types::batch::ChunkBatch;
use reshape_types::error::ConvertError;
use reshape_types::limits::Limits;
use reshape_types::wire::{
    ConvertOutput, CorrelationId, RequestEnvelope, RequestKind, RequestPayload, ResponseEnvelope,
    ResponsePayload,
};

use crate::context::ExecutionContext;

const RESPONSE_CAPACITY: usize = 64;

/// Progress subscriber invoked for each chunk batch of a preview stream.
pub type ProgressFn = Arc<dyn Fn(ChunkBatch) + Send + Sync>;

/// Per-submission options.
#[derive(Default, Clone)]
pub struct SubmitOptions {
    /// Delay dispatch by this window. A newer submission of the same kind
    /// inside the window wins; the superseded submission fails with
    /// `Cancelled` rather than hanging forever.
    pub debounce: Option<Duration>,
    /// Subscriber for progress batches (preview kinds only).
    pub on_progress: Option<ProgressFn>,
}

impl SubmitOptions {
    /// Options with a debounce window.
    #[must_use]
    pub fn debounced(window: Duration) -> Self {
        Self {
            debounce: Some(window),
            ..Self::default()
        }
    }

    /// Attach a progress subscriber.
    #[must_use]
    pub fn with_progress(mut self, on_progress: impl Fn(ChunkBatch) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }
}

struct PendingRequest {
    result_tx: oneshot::Sender<Result<ConvertOutput, ConvertError>>,
    on_progress: Option<ProgressFn>,
}

struct DebounceEntry {
    token: u64,
    supersede_tx: oneshot::Sender<String>,
}

#[derive(Default)]
struct Inner {
    context: Option<ExecutionContext>,
    router: Option<JoinHandle<()>>,
    pending: HashMap<CorrelationId, PendingRequest>,
    debounce: HashMap<RequestKind, DebounceEntry>,
    counters: HashMap<RequestKind, u64>,
    next_debounce_token: u64,
    disposed: bool,
}

/// Coordinator for one logical conversion pipeline.
pub struct Orchestrator {
    inner: Arc<Mutex<Inner>>,
    limits: Limits,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// Orchestrator with the process-default limit policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Orchestrator with an explicit limit policy.
    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            limits,
        }
    }

    /// Submit a conversion and await its terminal result.
    ///
    /// Progress batches of preview kinds are delivered to
    /// `options.on_progress` as they arrive; the returned future resolves
    /// on the terminal response (for previews, the stream-complete
    /// summary).
    ///
    /// # Errors
    ///
    /// `Cancelled` when superseded by a newer debounced submission or by
    /// `cancel_all`; otherwise whatever typed error the transform
    /// produced.
    pub async fn submit(
        &self,
        kind: RequestKind,
        payload: RequestPayload,
        options: SubmitOptions,
    ) -> Result<ConvertOutput, ConvertError> {
        if let Some(window) = options.debounce {
            self.debounce_gate(kind, window).await?;
        }

        let (result_tx, result_rx) = oneshot::channel();
        let (sender, envelope, correlation_id) = {
            let mut inner = self.lock()?;
            if inner.disposed {
                return Err(ConvertError::cancelled("orchestrator disposed"));
            }
            let sender = self.ensure_context(&mut inner);

            let seq = inner.counters.entry(kind).or_insert(0);
            *seq += 1;
            let correlation_id = CorrelationId::new(kind, *seq);

            inner.pending.insert(
                correlation_id.clone(),
                PendingRequest {
                    result_tx,
                    on_progress: options.on_progress,
                },
            );
            let envelope = RequestEnvelope {
                kind,
                correlation_id: correlation_id.clone(),
                payload,
            };
            (sender, envelope, correlation_id)
        };
        tracing::debug!(%kind, %correlation_id, "dispatching conversion request");

        if sender.send(envelope).await.is_err() {
            if let Ok(mut inner) = self.lock() {
                inner.pending.remove(&correlation_id);
            }
            return Err(ConvertError::internal("execution context unavailable"));
        }

        result_rx
            .await
            .unwrap_or_else(|_| Err(ConvertError::cancelled("orchestrator dropped")))
    }

    /// Cancel every outstanding request and destroy the execution context.
    ///
    /// Pending futures reject with `Cancelled(reason)`; debounced
    /// submissions still waiting on their window reject the same way. The
    /// next submission transparently creates a fresh context.
    pub fn cancel_all(&self, reason: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let pending_count = inner.pending.len();

        for (_, entry) in inner.debounce.drain() {
            let _ = entry.supersede_tx.send(reason.to_string());
        }
        let rejected: Vec<PendingRequest> = inner.pending.drain().map(|(_, p)| p).collect();
        for pending in rejected {
            let _ = pending
                .result_tx
                .send(Err(ConvertError::cancelled(reason)));
        }
        if let Some(context) = inner.context.take() {
            context.teardown();
        }
        if let Some(router) = inner.router.take() {
            router.abort();
        }
        drop(inner);
        tracing::debug!(reason, pending_count, "cancelled all outstanding work");
    }

    /// `cancel_all` plus a permanent shutdown of this orchestrator.
    /// Safe to call multiple times; later submissions fail `Cancelled`.
    pub fn dispose(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.disposed = true;
        }
        self.cancel_all("orchestrator disposed");
    }

    /// True when `err` represents superseded/cancelled work rather than a
    /// genuine conversion failure.
    #[must_use]
    pub fn is_cancelled_error(err: &ConvertError) -> bool {
        err.is_cancelled()
    }

    /// Wait out the debounce window, failing if a newer submission of the
    /// same kind arrives first.
    async fn debounce_gate(&self, kind: RequestKind, window: Duration) -> Result<(), ConvertError> {
        let (supersede_tx, supersede_rx) = oneshot::channel();
        let token = {
            let mut inner = self.lock()?;
            if inner.disposed {
                return Err(ConvertError::cancelled("orchestrator disposed"));
            }
            inner.next_debounce_token += 1;
            let token = inner.next_debounce_token;
            let previous = inner.debounce.insert(kind, DebounceEntry { token, supersede_tx });
            if let Some(previous) = previous {
                let _ = previous
                    .supersede_tx
                    .send("superseded by a newer submission".to_string());
            }
            token
        };

        tokio::select! {
            reason = supersede_rx => {
                let reason = reason.unwrap_or_else(|_| "cancelled before dispatch".to_string());
                return Err(ConvertError::cancelled(reason));
            }
            () = tokio::time::sleep(window) => {}
        }

        // The window elapsed; confirm this submission still owns the slot.
        let mut inner = self.lock()?;
        match inner.debounce.get(&kind) {
            Some(entry) if entry.token == token => {
                inner.debounce.remove(&kind);
                Ok(())
            }
            Some(_) => Err(ConvertError::cancelled("superseded by a newer submission")),
            None => Err(ConvertError::cancelled("cancelled before dispatch")),
        }
    }

    /// Create the execution context and its response router on demand.
    fn ensure_context(&self, inner: &mut MutexGuard<'_, Inner>) -> mpsc::Sender<RequestEnvelope> {
        if inner.context.is_none() {
            let (response_tx, response_rx) = mpsc::channel(RESPONSE_CAPACITY);
            let context = ExecutionContext::spawn(response_tx, self.limits.clone());
            let router = tokio::spawn(route_responses(response_rx, Arc::clone(&self.inner)));
            inner.context = Some(context);
            inner.router = Some(router);
            tracing::debug!("created execution context");
        }
        inner
            .context
            .as_ref()
            .map(ExecutionContext::sender)
            .expect("context just ensured")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, ConvertError> {
        self.inner
            .lock()
            .map_err(|_| ConvertError::internal("orchestrator state mutex poisoned"))
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel_all("orchestrator dropped");
    }
}

/// What the router does with a response, decided under the lock and
/// executed outside it so subscriber callbacks cannot deadlock.
enum RouteAction {
    Progress(ProgressFn, ChunkBatch),
    Resolve(
        oneshot::Sender<Result<ConvertOutput, ConvertError>>,
        Result<ConvertOutput, ConvertError>,
    ),
    Ignore,
}

async fn route_responses(mut responses: mpsc::Receiver<ResponseEnvelope>, inner: Arc<Mutex<Inner>>) {
    while let Some(envelope) = responses.recv().await {
        let ResponseEnvelope {
            correlation_id,
            payload,
        } = envelope;

        let action = {
            let Ok(mut guard) = inner.lock() else {
                return;
            };
            match payload {
                ResponsePayload::Progress { batch } => match guard.pending.get(&correlation_id) {
                    Some(pending) => match pending.on_progress.clone() {
                        Some(subscriber) => RouteAction::Progress(subscriber, batch),
                        None => RouteAction::Ignore,
                    },
                    None => RouteAction::Ignore,
                },
                ResponsePayload::Success { output } => {
                    match guard.pending.remove(&correlation_id) {
                        Some(pending) => RouteAction::Resolve(pending.result_tx, Ok(output)),
                        None => RouteAction::Ignore,
                    }
                }
                ResponsePayload::StreamComplete { summary } => {
                    match guard.pending.remove(&correlation_id) {
                        Some(pending) => RouteAction::Resolve(
                            pending.result_tx,
                            Ok(ConvertOutput::Stream { summary }),
                        ),
                        None => RouteAction::Ignore,
                    }
                }
                ResponsePayload::Error { error } => match guard.pending.remove(&correlation_id) {
                    Some(pending) => RouteAction::Resolve(pending.result_tx, Err(error)),
                    None => RouteAction::Ignore,
                },
            }
        };

        match action {
            RouteAction::Progress(subscriber, batch) => subscriber(batch),
            RouteAction::Resolve(result_tx, result) => {
                let _ = result_tx.send(result);
            }
            // Normal after a teardown: the destroyed context cannot be
            // asked to stop mid-message.
            RouteAction::Ignore => {
                tracing::trace!(%correlation_id, "dropping response for unknown correlation id");
            }
        }
    }
}
