//! Data types flowing through and out of the extraction pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ── Run state ────────────────────────────────────────────────────────────

/// Lifecycle state reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// A status string we do not recognise, kept verbatim.
    Unknown(String),
}

impl RunStatus {
    /// Map a remote status string (case-insensitive).
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "succeeded" | "finished" => RunStatus::Completed,
            "failed" | "error" | "cancelled" | "canceled" => RunStatus::Failed,
            "pending" | "not_started" => RunStatus::Pending,
            "running" | "in_progress" => RunStatus::Running,
            "" => RunStatus::Unknown(String::new()),
            _ => RunStatus::Unknown(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => f.write_str("pending"),
            RunStatus::Running => f.write_str("running"),
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Failed => f.write_str("failed"),
            RunStatus::Unknown(s) if s.is_empty() => f.write_str("unknown"),
            RunStatus::Unknown(s) => write!(f, "unknown({s})"),
        }
    }
}

/// Identifies one remote run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    /// Learned from the submission response, else copied from the request.
    pub workflow_id: Option<String>,
}

impl RunHandle {
    pub fn new(run_id: impl Into<String>, workflow_id: Option<String>) -> Self {
        Self {
            run_id: run_id.into(),
            workflow_id,
        }
    }
}

/// What the submission call returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub handle: RunHandle,
    pub status: RunStatus,
    /// Present when the service answered with a finished result straight
    /// away, with the rule that accepted it.
    pub immediate: Option<(Value, Detection)>,
}

/// One decoded status response. Each poll replaces the previous snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub status: RunStatus,
    /// `output` field after string decoding; `None` when absent or empty.
    pub output: Option<Value>,
    pub error_message: Option<String>,
    /// Whole decoded response body.
    pub body: Value,
}

/// Which rule decided that a run had finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detection {
    /// Remote status said completed.
    Status,
    /// Best effort: the output looked like extraction data.
    OutputShape,
    /// Best effort: the response body itself carried line items.
    EnvelopeShape,
    /// Loaded from `<manual_results_dir>/<run_id>.json` after polling gave up.
    ManualFile,
    /// The submission response already carried the result with status completed.
    Immediate,
    /// Best effort: the submission response was not completed but its output
    /// looked like extraction data.
    ImmediateShape,
}

impl Detection {
    /// `true` for the shape-guessing paths.
    pub fn is_heuristic(&self) -> bool {
        matches!(
            self,
            Detection::OutputShape | Detection::EnvelopeShape | Detection::ImmediateShape
        )
    }
}

/// Successful end of a poll session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOutcome {
    pub output: Value,
    pub detection: Detection,
    pub attempts: u32,
    /// Status URL that produced the result, if it came from the network.
    pub endpoint: Option<String>,
    pub elapsed_ms: u64,
}

// ── Normalized data ──────────────────────────────────────────────────────

/// Set when the raw result could not be interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeIssue {
    pub reason: String,
    /// Text that failed to decode (or the compact JSON of an unusable value).
    pub original: String,
}

/// Canonical `{line_items, header}` view of any supported result shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedExtraction {
    pub line_items: Vec<Value>,
    pub header: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<NormalizeIssue>,
}

impl NormalizedExtraction {
    pub fn with_issue(reason: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            issue: Some(NormalizeIssue {
                reason: reason.into(),
                original: original.into(),
            }),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty() && self.header.is_empty()
    }
}

/// One spreadsheet row keyed by column key. Missing keys render blank.
pub type Row = Map<String, Value>;

/// Summary of a tabulated row set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableAudit {
    pub rows: usize,
    pub columns: usize,
    /// Column key → number of rows where it is blank, for critical columns only.
    pub empty_critical: Vec<(String, usize)>,
    pub warnings: Vec<String>,
}

// ── Results ──────────────────────────────────────────────────────────────

/// Timing and provenance for one extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub poll_attempts: u32,
    pub detection: Option<Detection>,
    pub endpoint: Option<String>,
    pub submit_duration_ms: u64,
    pub poll_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Full result of [`crate::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Path, URL or name of the source document; `None` for JSON export.
    pub input: Option<String>,
    /// `None` for data that never went through the service (JSON export).
    pub run: Option<RunHandle>,
    pub raw: Value,
    pub normalized: NormalizedExtraction,
    pub rows: Vec<Row>,
    pub audit: TableAudit,
    pub stats: ExtractionStats,
}

/// A failed document inside a batch.
#[derive(Debug)]
pub struct DocumentError {
    pub input: String,
    pub error: crate::error::ExtractError,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.input, self.error)
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_case_insensitive() {
        assert_eq!(RunStatus::from_remote("COMPLETED"), RunStatus::Completed);
        assert_eq!(RunStatus::from_remote("Succeeded"), RunStatus::Completed);
        assert_eq!(RunStatus::from_remote("finished"), RunStatus::Completed);
        assert_eq!(RunStatus::from_remote("error"), RunStatus::Failed);
        assert_eq!(RunStatus::from_remote("cancelled"), RunStatus::Failed);
        assert_eq!(RunStatus::from_remote("not_started"), RunStatus::Pending);
        assert_eq!(RunStatus::from_remote("in_progress"), RunStatus::Running);
        assert_eq!(
            RunStatus::from_remote("paused"),
            RunStatus::Unknown("paused".into())
        );
    }

    #[test]
    fn status_display() {
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert_eq!(RunStatus::Unknown("x".into()).to_string(), "unknown(x)");
    }

    #[test]
    fn detection_heuristic_flag() {
        assert!(!Detection::Status.is_heuristic());
        assert!(Detection::OutputShape.is_heuristic());
        assert!(Detection::EnvelopeShape.is_heuristic());
        assert!(Detection::ImmediateShape.is_heuristic());
        assert!(!Detection::Immediate.is_heuristic());
    }

    #[test]
    fn issue_is_omitted_from_json_when_absent() {
        let n = NormalizedExtraction::default();
        let json = serde_json::to_string(&n).unwrap();
        assert!(!json.contains("issue"));
    }
}
