//! `reshape convert` — run a conversion through the orchestrator.

use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use serde_json::Value;

use reshape_engine::{Orchestrator, SubmitOptions};
use reshape_types::wire::{ConvertOptions, ConvertOutput, InputData, RequestKind, RequestPayload};

use crate::Direction;

pub async fn execute(
    input: &Path,
    output: Option<&Path>,
    direction: Direction,
    flatten: bool,
    delimiter: Option<String>,
    preview: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read(input)
        .with_context(|| format!("failed to read input file {}", input.display()))?;

    let kind = match (direction, preview) {
        (Direction::ToTabular, false) => RequestKind::ConvertHierarchicalToTabular,
        (Direction::ToTabular, true) => RequestKind::PreviewHierarchicalToTabular,
        (Direction::ToHierarchical, false) => RequestKind::ConvertTabularToHierarchical,
        (Direction::ToHierarchical, true) => RequestKind::PreviewTabularToHierarchical,
    };
    let payload = RequestPayload {
        data: InputData::Buffer {
            bytes: Bytes::from(raw),
        },
        options: ConvertOptions {
            flatten,
            delimiter,
            overwrite_rows: None,
        },
    };

    let submit_options = if preview {
        SubmitOptions::default().with_progress(|batch| {
            tracing::info!(
                batch_index = batch.batch_index,
                rows = batch.rows.len(),
                total_rows = batch.total_rows,
                is_final = batch.is_final,
                "preview batch"
            );
        })
    } else {
        SubmitOptions::default()
    };

    let orchestrator = Orchestrator::new();
    let result = orchestrator.submit(kind, payload, submit_options).await?;

    match result {
        ConvertOutput::Rows { rows } => {
            let value = Value::Array(rows.into_iter().map(Value::Object).collect());
            write_json(output, &value)?;
            Ok(())
        }
        ConvertOutput::Document { value } => {
            write_json(output, &value)?;
            Ok(())
        }
        ConvertOutput::Stream { summary } => {
            tracing::info!(
                total_rows = summary.total_rows,
                emitted_rows = summary.emitted_rows,
                "preview complete"
            );
            Ok(())
        }
    }
}

fn write_json(output: Option<&Path>, value: &Value) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}
