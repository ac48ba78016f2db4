//! # docflow-extract
//!
//! Submit PDF documents to a remote document-extraction workflow service,
//! wait for the run to finish, and export the result as a fixed-column
//! spreadsheet (the CBP Form 7501 entry summary layout).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, check %PDF
//!  ├─ 2. Submit     base64 body, one POST, run id back
//!  ├─ 3. Poll       sleep/GET loop with status-URL fallback and cancellation
//!  ├─ 4. Normalize  any result shape → {line_items, header}
//!  ├─ 5. Tabulate   header × line items × HTS codes → 80-column rows
//!  └─ 6. Output     .xlsx workbook + audit + per-run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docflow_extract::{extract_to_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from DOCFLOW_API_KEY
//!     let config = ExtractionConfig::builder().build()?;
//!     let output = extract_to_file("entry.pdf", "entry.xlsx", &config).await?;
//!     eprintln!("{} rows after {} poll attempts",
//!         output.rows.len(),
//!         output.stats.poll_attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Failures
//!
//! Every fatal error is an [`ExtractError`]. Pass it to [`classify`] for an
//! operator-facing [`ErrorReport`] with a category, a hint and, for runs that
//! may still finish remotely, the run id and a dashboard link.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docflow` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod classify;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod extract;
pub mod instructions;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancelToken;
pub use classify::{classify, classify_message, ErrorCategory, ErrorReport};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, API_KEY_ENV};
pub use endpoints::EndpointStrategy;
pub use error::{ExtractError, TransportError};
pub use extract::{export_json, extract, extract_from_bytes, extract_sync, extract_to_file, fetch_run};
pub use output::{
    Detection, DocumentError, ExtractionOutput, ExtractionStats, NormalizeIssue,
    NormalizedExtraction, PollOutcome, PollSnapshot, Row, RunHandle, RunStatus, Submission,
    TableAudit,
};
pub use pipeline::normalize::normalize;
pub use pipeline::poll::poll;
pub use pipeline::submit::{submit, SubmissionRequest};
pub use pipeline::tabulate::{audit, tabulate, COLUMNS};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{extract_stream, ExtractionStream};
pub use transport::{HttpReply, ReqwestTransport, Transport};
