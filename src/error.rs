//! Error types for the docflow-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the extraction cannot proceed at all
//!   (bad input file, submission rejected, workflow failed remotely, poll
//!   budget exhausted). Returned as `Err(ExtractError)` from the top-level
//!   `extract*` functions.
//!
//! * [`TransportError`] — **Non-fatal inside the poll loop**: a single HTTP
//!   call timed out or could not connect. The poller logs it and moves on to
//!   the next attempt; everywhere else it is wrapped in
//!   [`ExtractError::Transport`] and propagated.
//!
//! Every `ExtractError` can be turned into an operator-facing
//! [`crate::classify::ErrorReport`] with a remediation hint.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docflow-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but could not be read as a file (a directory, an I/O
    /// fault).
    #[error("Could not read '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("Document '{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// The submission request failed local validation before any I/O.
    #[error("Invalid submission request: {0}")]
    InvalidRequest(String),

    // ── Remote workflow errors ────────────────────────────────────────────
    /// No API credential in the config or the environment.
    #[error("No API key configured.\nSet DOCFLOW_API_KEY or pass --api-key.")]
    MissingApiKey,

    /// The submission call returned a non-OK status, an undecodable body,
    /// or a body without a run identifier.
    #[error("Submission failed{}: {detail}", status_suffix(.status))]
    Submission { status: Option<u16>, detail: String },

    /// The remote service reported the run as failed.
    #[error("Workflow failed for run {run_id}: {message}")]
    WorkflowFailure { run_id: String, message: String },

    /// The poll budget ran out without a terminal status.
    #[error(
        "Workflow polling timed out after {elapsed_secs}s ({attempts} attempts) for run {run_id}.\n\
The run may still complete remotely. Retrieve it from {dashboard} (run_id: {run_id}),\n\
or re-check later with: docflow --fetch-run {run_id}"
    )]
    PollTimeout {
        run_id: String,
        elapsed_secs: u64,
        attempts: u32,
        dashboard: String,
    },

    /// No status endpoint recognised the run.
    #[error("Run {run_id} not found at any status endpoint{}", status_suffix(.status))]
    RunNotFound { run_id: String, status: Option<u16> },

    /// The caller cancelled the extraction while it was waiting.
    #[error("Extraction cancelled while waiting for run {run_id}")]
    Cancelled { run_id: String },

    /// A payload could not be decoded by any fallback.
    #[error("Could not decode {what}: {detail}")]
    Decode { what: String, detail: String },

    /// Network-level fault outside the poll loop.
    #[error(transparent)]
    Transport(#[from] TransportError),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The extraction produced no rows to put in a spreadsheet.
    #[error("No data to export: the extraction produced zero rows")]
    NothingToExport,

    /// The workbook writer rejected the data.
    #[error("Spreadsheet rendering failed: {0}")]
    SpreadsheetFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// HTTP status attached to this error, when the transport layer saw one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ExtractError::Submission { status, .. } | ExtractError::RunNotFound { status, .. } => {
                *status
            }
            _ => None,
        }
    }

    /// Run identifier carried by the error, if any.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            ExtractError::WorkflowFailure { run_id, .. }
            | ExtractError::PollTimeout { run_id, .. }
            | ExtractError::RunNotFound { run_id, .. }
            | ExtractError::Cancelled { run_id } => Some(run_id),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// A fault on one HTTP call.
///
/// Swallowed (and rate-limited in the logs) by the poll loop; propagated
/// by the submission client.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// The request did not complete within its timeout.
    #[error("Request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Connection could not be established.
    #[error("Could not connect to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// Any other request failure (TLS, body read, redirect loop, …).
    #[error("Request to {url} failed: {detail}")]
    Request { url: String, detail: String },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_display_with_status() {
        let e = ExtractError::Submission {
            status: Some(401),
            detail: "invalid token".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 401"), "got: {msg}");
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn submission_display_without_status() {
        let e = ExtractError::Submission {
            status: None,
            detail: "response has no run_id".into(),
        };
        assert!(!e.to_string().contains("HTTP"));
    }

    #[test]
    fn poll_timeout_display() {
        let e = ExtractError::PollTimeout {
            run_id: "run_42".into(),
            elapsed_secs: 600,
            attempts: 120,
            dashboard: "https://dash.example".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("600s"));
        assert!(msg.contains("run_42"));
        assert!(msg.contains("https://dash.example"));
        assert_eq!(e.run_id(), Some("run_42"));
    }

    #[test]
    fn transport_error_wraps_transparently() {
        let t = TransportError::Timeout {
            url: "https://x/y".into(),
            secs: 30,
        };
        assert!(t.is_timeout());
        let e: ExtractError = t.into();
        assert!(e.to_string().contains("timed out after 30s"));
    }
}
