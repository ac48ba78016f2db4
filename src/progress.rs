//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to follow a
//! run as it is submitted and polled. The CLI uses this to drive its spinner;
//! a service could forward the events to a channel or a job table instead.
//!
//! # Example
//!
//! ```rust
//! use docflow_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct AttemptCounter(AtomicU32);
//!
//! impl ExtractionProgressCallback for AttemptCounter {
//!     fn on_poll_attempt(&self, _run_id: &str, attempt: u32, _max_attempts: u32) {
//!         self.0.store(attempt, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(AttemptCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as an extraction advances.
///
/// Implementations must be `Send + Sync`: batch extraction runs several
/// documents at once and their events interleave. All methods default to
/// no-ops so callers only override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// The service accepted the document and started a run.
    fn on_submitted(&self, document: &str, run_id: &str) {
        let _ = (document, run_id);
    }

    /// A poll attempt is about to be sent (1-indexed).
    fn on_poll_attempt(&self, run_id: &str, attempt: u32, max_attempts: u32) {
        let _ = (run_id, attempt, max_attempts);
    }

    /// The primary status URL answered 404 and polling moved to `url`.
    fn on_endpoint_switched(&self, run_id: &str, url: &str) {
        let _ = (run_id, url);
    }

    /// A single poll attempt failed without ending the session.
    fn on_poll_error(&self, run_id: &str, attempt: u32, error: &str) {
        let _ = (run_id, attempt, error);
    }

    /// The result was tabulated.
    ///
    /// # Arguments
    /// * `run_id` — `None` for data that never went through the service
    /// * `rows`   — number of spreadsheet rows produced
    fn on_extraction_complete(&self, run_id: Option<&str>, rows: usize) {
        let _ = (run_id, rows);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
