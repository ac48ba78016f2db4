//! Eager (single-document) extraction entry points.
//!
//! [`extract`] drives one document through the whole pipeline and returns
//! once the rows are ready. Use [`crate::stream::extract_stream`] for batches.
//!
//! [`fetch_run`] and [`export_json`] cover the two manual recovery paths: a
//! run that finished after the poller gave up, and a result file downloaded
//! from the dashboard by hand.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, ExtractionStats, PollSnapshot, RunHandle};
use crate::pipeline::input::{self, Document};
use crate::pipeline::submit::{self, SubmissionRequest};
use crate::pipeline::{normalize, poll, render, tabulate};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Extract a PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — local file path or HTTP/HTTPS URL to a PDF
/// * `config` — extraction configuration
///
/// # Returns
/// `Ok(ExtractionOutput)` once a result was obtained, even if it produced no
/// rows (check `output.audit`).
///
/// # Errors
/// Input, submission, workflow and poll failures. Pass the error through
/// [`crate::classify::classify`] for an operator-facing report.
pub async fn extract(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input = input.as_ref();
    info!("Starting extraction: {}", input);
    let mut document = input::load_document(input, config.download_timeout_secs).await?;
    document.name = input.to_string();
    extract_document(document, config).await
}

/// Extract PDF bytes already in memory.
///
/// `name` only labels the document in logs and progress events.
pub async fn extract_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let document = Document::from_bytes(name, bytes)?;
    extract_document(document, config).await
}

/// Extract a PDF and write the spreadsheet to `output_path`.
///
/// Fails with [`ExtractError::NothingToExport`] when the result tabulates to
/// zero rows; nothing is written in that case.
pub async fn extract_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract(input, config).await?;
    render::write_workbook(&output.rows, output_path.as_ref()).await?;
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, config))
}

/// Look up an existing run once, without polling.
///
/// Tries the primary status URL and then the alternates; returns the first
/// successful snapshot.
pub async fn fetch_run(
    run_id: impl Into<String>,
    config: &ExtractionConfig,
) -> Result<PollSnapshot, ExtractError> {
    let handle = RunHandle::new(run_id, config.workflow_id.clone());
    let transport = config.resolve_transport();
    poll::fetch_once(transport.as_ref(), config, &handle).await
}

/// Tabulate an already-downloaded result and write it to `output_path`.
///
/// `value` may be any shape [`normalize::normalize`] accepts, including a
/// JSON string.
pub async fn export_json(
    value: &Value,
    output_path: impl AsRef<Path>,
) -> Result<ExtractionOutput, ExtractError> {
    let start = Instant::now();
    let mut output = finish(None, None, value.clone(), ExtractionStats::default(), None);
    render::write_workbook(&output.rows, output_path.as_ref()).await?;
    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    Ok(output)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn extract_document(
    document: Document,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let transport = config.resolve_transport();
    let name = document.name;
    let request = SubmissionRequest::from_config(document.bytes, config);

    let submit_start = Instant::now();
    let submission = submit::submit(transport.as_ref(), config, &request).await?;
    let submit_duration_ms = submit_start.elapsed().as_millis() as u64;
    let handle = submission.handle;
    info!("{} submitted as run {}", name, handle.run_id);

    if let Some(ref cb) = config.progress_callback {
        cb.on_submitted(&name, &handle.run_id);
    }

    let mut stats = ExtractionStats {
        submit_duration_ms,
        ..ExtractionStats::default()
    };

    let raw = match submission.immediate {
        Some((output, detection)) => {
            if detection.is_heuristic() {
                warn!(
                    "Run {} treated as finished by {:?} heuristic (status: {})",
                    handle.run_id, detection, submission.status
                );
            } else {
                info!("Run {} returned its result with the submission", handle.run_id);
            }
            stats.detection = Some(detection);
            output
        }
        None => {
            let outcome = poll::poll(transport.as_ref(), config, &handle).await?;
            stats.poll_attempts = outcome.attempts;
            stats.detection = Some(outcome.detection);
            stats.endpoint = outcome.endpoint;
            stats.poll_duration_ms = outcome.elapsed_ms;
            outcome.output
        }
    };

    let mut output = finish(Some(name), Some(handle), raw, stats, Some(config));
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} rows, {}ms total",
        output.rows.len(),
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Normalize, tabulate and audit a raw result.
fn finish(
    input: Option<String>,
    run: Option<RunHandle>,
    raw: Value,
    stats: ExtractionStats,
    config: Option<&ExtractionConfig>,
) -> ExtractionOutput {
    let normalized = normalize::normalize(&raw);
    match &normalized.issue {
        Some(issue) => warn!("Result could not be interpreted: {}", issue.reason),
        None if normalized.is_empty() => warn!("Result carried no line items and no header"),
        None => {}
    }

    let rows = tabulate::tabulate(&normalized);
    let audit = tabulate::audit(&rows);
    for warning in &audit.warnings {
        warn!("{}", warning);
    }

    if let Some(cb) = config.and_then(|c| c.progress_callback.as_ref()) {
        cb.on_extraction_complete(run.as_ref().map(|h| h.run_id.as_str()), rows.len());
    }

    ExtractionOutput {
        input,
        run,
        raw,
        normalized,
        rows,
        audit,
        stats,
    }
}
