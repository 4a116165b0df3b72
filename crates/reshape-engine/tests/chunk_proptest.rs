//! Property tests for chunk sizing and preview capping.

use proptest::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

use reshape_engine::emitter::emit_chunks;
use reshape_types::limits::Limits;
use reshape_types::row::Row;
use reshape_types::wire::{CorrelationId, RequestKind, ResponseEnvelope, ResponsePayload};

fn rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("n".into(), json!(i));
            row
        })
        .collect()
}

fn emit(n: usize, limits: &Limits) -> Vec<ResponseEnvelope> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("test runtime");
    runtime.block_on(async {
        let (tx, mut rx) = mpsc::channel(4096);
        let cid = CorrelationId::new(RequestKind::PreviewHierarchicalToTabular, 1);
        emit_chunks(rows(n), &cid, limits, &tx).await.unwrap();
        drop(tx);

        let mut envelopes = Vec::new();
        while let Some(envelope) = rx.recv().await {
            envelopes.push(envelope);
        }
        envelopes
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chunk_sizes_follow_first_then_next_policy(n in 1usize..2_400) {
        let limits = Limits::default();
        let envelopes = emit(n, &limits);

        let capped = n.min(limits.preview_row_cap);
        let mut remaining = capped;
        let mut expected_index = 0u32;
        let mut terminal_seen = false;

        for envelope in &envelopes {
            match &envelope.payload {
                ResponsePayload::Progress { batch } => {
                    prop_assert!(!terminal_seen, "progress after terminal");
                    prop_assert_eq!(batch.batch_index, expected_index);
                    let expected_size = if expected_index == 0 {
                        remaining.min(limits.first_chunk_rows)
                    } else {
                        remaining.min(limits.next_chunk_rows)
                    };
                    prop_assert_eq!(batch.rows.len(), expected_size);
                    prop_assert_eq!(batch.total_rows, n as u64);
                    remaining -= expected_size;
                    prop_assert_eq!(batch.is_final, remaining == 0);
                    expected_index += 1;
                }
                ResponsePayload::StreamComplete { summary } => {
                    terminal_seen = true;
                    prop_assert_eq!(summary.total_rows, n as u64);
                    prop_assert_eq!(summary.emitted_rows, capped as u64);
                }
                other => prop_assert!(false, "unexpected payload: {:?}", other),
            }
        }
        prop_assert!(terminal_seen, "missing stream-complete");
        prop_assert_eq!(remaining, 0);
    }

    #[test]
    fn emitted_rows_never_exceed_preview_cap(n in 0usize..5_000) {
        let limits = Limits::default();
        let envelopes = emit(n, &limits);

        let emitted: usize = envelopes
            .iter()
            .filter_map(|e| match &e.payload {
                ResponsePayload::Progress { batch } => Some(batch.rows.len()),
                _ => None,
            })
            .sum();
        prop_assert_eq!(emitted, n.min(limits.preview_row_cap));
    }
}
