//! Operator-facing classification of failures.
//!
//! Every terminal failure is turned into an [`ErrorReport`]: a coarse
//! category, a human message and a remediation hint, plus the run id and a
//! dashboard link when the run may still be recoverable by hand.
//!
//! [`classify`] reads the structured error first (HTTP status, error
//! variant). Only opaque failures fall back to [`classify_message`], which
//! matches substrings and is best-effort by nature.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Auth,
    NotFound,
    Timeout,
    Server,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorCategory::Auth => "auth",
            ErrorCategory::NotFound => "not-found",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Server => "server",
            ErrorCategory::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub category: ErrorCategory,
    pub message: String,
    pub hint: String,
    pub run_id: Option<String>,
    pub dashboard_link: Option<String>,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.category, self.message)?;
        write!(f, "Hint: {}", self.hint)?;
        if let Some(run_id) = &self.run_id {
            write!(f, "\nRun ID: {run_id}")?;
        }
        if let Some(link) = &self.dashboard_link {
            write!(f, "\nDashboard: {link}")?;
        }
        Ok(())
    }
}

const AUTH_HINT: &str = "Check that the API key is valid and has not expired (DOCFLOW_API_KEY).";
const NOT_FOUND_HINT: &str =
    "The workflow, agent or run was not found. Check the agent name, workflow ID and base URL.";
const TIMEOUT_HINT: &str =
    "The run may still finish remotely. Retrieve the result from the dashboard using the run ID.";
const SERVER_HINT: &str = "The extraction service reported an internal error. Try again later.";
const UNKNOWN_HINT: &str = "Check the logs (RUST_LOG=debug) for details.";

/// Classify a structured error.
pub fn classify(error: &ExtractError, run_id: Option<&str>, config: &ExtractionConfig) -> ErrorReport {
    let run_id = error.run_id().or(run_id);
    let message = error.to_string();

    if let Some(status) = error.http_status() {
        let category = match status {
            401 | 403 => Some(ErrorCategory::Auth),
            404 => Some(ErrorCategory::NotFound),
            500..=599 => Some(ErrorCategory::Server),
            _ => None,
        };
        if let Some(category) = category {
            return report(category, message, run_id, config);
        }
    }

    match error {
        ExtractError::MissingApiKey => report(ErrorCategory::Auth, message, run_id, config),
        ExtractError::RunNotFound { .. } => report(ErrorCategory::NotFound, message, run_id, config),
        ExtractError::PollTimeout { .. } | ExtractError::DownloadTimeout { .. } => {
            report(ErrorCategory::Timeout, message, run_id, config)
        }
        ExtractError::Transport(t) if t.is_timeout() => {
            report(ErrorCategory::Timeout, message, run_id, config)
        }
        ExtractError::Cancelled { .. } => ErrorReport {
            category: ErrorCategory::Unknown,
            message,
            hint: "Extraction was cancelled locally; the remote run may still finish.".into(),
            run_id: run_id.map(str::to_string),
            dashboard_link: run_id.map(|id| config.dashboard_link(id)),
        },
        ExtractError::WorkflowFailure {
            message: remote, ..
        } => {
            // The remote message carries no status; only its text can tell.
            let mut r = classify_message(remote, run_id, Some(&config.dashboard_url));
            if r.category == ErrorCategory::Unknown {
                r.message = message;
                r.hint = "The service rejected the document. Inspect the run on the dashboard."
                    .into();
            }
            r.dashboard_link = run_id.map(|id| config.dashboard_link(id));
            r
        }
        _ => classify_message(&message, run_id, Some(&config.dashboard_url)),
    }
}

/// Classify an opaque failure message by substring.
///
/// Order: "401"/"unauthorized" → auth, "404" → not-found, "timeout"/"timed
/// out" → timeout, "500" → server, anything else → unknown. Matching is
/// case-insensitive. `dashboard` may contain a `{run_id}` placeholder.
pub fn classify_message(message: &str, run_id: Option<&str>, dashboard: Option<&str>) -> ErrorReport {
    let lower = message.to_lowercase();
    let (category, hint, message) = if lower.contains("401") || lower.contains("unauthorized") {
        (ErrorCategory::Auth, AUTH_HINT, "Authentication failed".to_string())
    } else if lower.contains("404") {
        (ErrorCategory::NotFound, NOT_FOUND_HINT, "Resource not found".to_string())
    } else if lower.contains("timeout") || lower.contains("timed out") {
        return ErrorReport {
            category: ErrorCategory::Timeout,
            message: "Extraction timed out".into(),
            hint: TIMEOUT_HINT.into(),
            run_id: run_id.map(str::to_string),
            dashboard_link: match (run_id, dashboard) {
                (Some(id), Some(d)) => Some(d.replace("{run_id}", id)),
                _ => None,
            },
        };
    } else if lower.contains("500") {
        (ErrorCategory::Server, SERVER_HINT, "Server error".to_string())
    } else {
        (ErrorCategory::Unknown, UNKNOWN_HINT, message.to_string())
    };

    ErrorReport {
        category,
        message,
        hint: hint.into(),
        run_id: run_id.map(str::to_string),
        dashboard_link: None,
    }
}

fn report(
    category: ErrorCategory,
    message: String,
    run_id: Option<&str>,
    config: &ExtractionConfig,
) -> ErrorReport {
    let hint = match category {
        ErrorCategory::Auth => AUTH_HINT,
        ErrorCategory::NotFound => NOT_FOUND_HINT,
        ErrorCategory::Timeout => TIMEOUT_HINT,
        ErrorCategory::Server => SERVER_HINT,
        ErrorCategory::Unknown => UNKNOWN_HINT,
    };
    let dashboard_link = match category {
        ErrorCategory::Timeout => run_id.map(|id| config.dashboard_link(id)),
        _ => None,
    };
    ErrorReport {
        category,
        message,
        hint: hint.into(),
        run_id: run_id.map(str::to_string),
        dashboard_link,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn message_order_and_categories() {
        assert_eq!(classify_message("API Error 401: bad", None, None).category, ErrorCategory::Auth);
        assert_eq!(classify_message("Unauthorized", None, None).category, ErrorCategory::Auth);
        assert_eq!(classify_message("HTTP 404", None, None).category, ErrorCategory::NotFound);
        assert_eq!(classify_message("read timeout", None, None).category, ErrorCategory::Timeout);
        assert_eq!(classify_message("HTTP 500", None, None).category, ErrorCategory::Server);
        let r = classify_message("something odd", None, None);
        assert_eq!(r.category, ErrorCategory::Unknown);
        assert_eq!(r.message, "something odd");
    }

    #[test]
    fn message_404_wins_over_timeout() {
        let r = classify_message("404 after timeout", None, None);
        assert_eq!(r.category, ErrorCategory::NotFound);
    }

    #[test]
    fn timeout_echoes_run_id_and_link() {
        let r = classify_message("Timeout waiting", Some("r7"), Some("https://dash/{run_id}"));
        assert_eq!(r.category, ErrorCategory::Timeout);
        assert_eq!(r.run_id.as_deref(), Some("r7"));
        assert_eq!(r.dashboard_link.as_deref(), Some("https://dash/r7"));
    }

    #[test]
    fn structured_status_beats_message() {
        let cfg = ExtractionConfig::default();
        let e = ExtractError::Submission {
            status: Some(403),
            detail: "forbidden".into(),
        };
        assert_eq!(classify(&e, None, &cfg).category, ErrorCategory::Auth);

        let e = ExtractError::Submission {
            status: Some(503),
            detail: "unavailable".into(),
        };
        assert_eq!(classify(&e, None, &cfg).category, ErrorCategory::Server);
    }

    #[test]
    fn poll_timeout_carries_dashboard() {
        let cfg = ExtractionConfig::default();
        let e = ExtractError::PollTimeout {
            run_id: "r1".into(),
            elapsed_secs: 600,
            attempts: 120,
            dashboard: cfg.dashboard_link("r1"),
        };
        let r = classify(&e, None, &cfg);
        assert_eq!(r.category, ErrorCategory::Timeout);
        assert_eq!(r.run_id.as_deref(), Some("r1"));
        assert!(r.dashboard_link.is_some());
        assert!(r.to_string().contains("Run ID: r1"));
    }

    #[test]
    fn transport_timeout_is_timeout() {
        let cfg = ExtractionConfig::default();
        let e = ExtractError::Transport(TransportError::Timeout {
            url: "u".into(),
            secs: 300,
        });
        assert_eq!(classify(&e, Some("r2"), &cfg).category, ErrorCategory::Timeout);
    }

    fn workflow_failure(message: &str) -> ExtractError {
        ExtractError::WorkflowFailure {
            run_id: "r9".into(),
            message: message.into(),
        }
    }

    #[test]
    fn workflow_failure_message_is_substring_classified() {
        let cfg = ExtractionConfig::default();
        let cases = [
            ("upstream returned 404", ErrorCategory::NotFound),
            ("agent timeout while parsing", ErrorCategory::Timeout),
            ("401 Unauthorized", ErrorCategory::Auth),
            ("internal error 500", ErrorCategory::Server),
        ];
        for (text, expected) in cases {
            let r = classify(&workflow_failure(text), None, &cfg);
            assert_eq!(r.category, expected, "{text}");
            assert_eq!(r.run_id.as_deref(), Some("r9"));
            assert!(r.dashboard_link.is_some());
        }
    }

    #[test]
    fn unrecognised_workflow_failure_keeps_rejection_hint() {
        let cfg = ExtractionConfig::default();
        let r = classify(&workflow_failure("document is encrypted"), None, &cfg);
        assert_eq!(r.category, ErrorCategory::Unknown);
        assert!(r.message.contains("document is encrypted"));
        assert!(r.hint.contains("rejected the document"));
    }

    #[test]
    fn opaque_errors_fall_back_to_message() {
        let cfg = ExtractionConfig::default();
        let e = ExtractError::Internal("upstream said 500".into());
        assert_eq!(classify(&e, None, &cfg).category, ErrorCategory::Server);
    }
}
