//! Batch extraction: many documents, bounded concurrency.
//!
//! Each document runs its own submit → poll → tabulate flow. At most
//! `config.concurrency` runs are in flight at once and results are yielded
//! in completion order, so a slow run never holds back a fast one. A failed
//! document yields a [`DocumentError`] and does not stop the batch.

use crate::config::ExtractionConfig;
use crate::extract::extract;
use crate::output::{DocumentError, ExtractionOutput};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document results.
pub type ExtractionStream =
    Pin<Box<dyn Stream<Item = Result<ExtractionOutput, DocumentError>> + Send>>;

/// Extract several PDFs concurrently.
///
/// One transport is shared by the whole batch so connections are pooled.
///
/// # Example
/// ```rust,no_run
/// use docflow_extract::{extract_stream, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::builder().concurrency(4).build()?;
/// let mut results = extract_stream(["a.pdf", "b.pdf"], &config);
/// while let Some(result) = results.next().await {
///     match result {
///         Ok(out) => println!("{} rows", out.rows.len()),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract_stream<I, S>(inputs: I, config: &ExtractionConfig) -> ExtractionStream
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
    info!(
        "Starting batch of {} documents (concurrency {})",
        inputs.len(),
        config.concurrency
    );

    let mut shared = config.clone();
    shared.transport = Some(config.resolve_transport());
    let concurrency = config.concurrency.max(1);

    let s = stream::iter(inputs.into_iter().map(move |input| {
        let cfg = shared.clone();
        async move {
            extract(&input, &cfg)
                .await
                .map_err(|error| DocumentError { input, error })
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
