//! Result poller: wait for a remote run to finish.
//!
//! ## Loop
//!
//! Each attempt sleeps `poll_interval` first and then GETs the current status
//! URL, so a budget of N attempts at interval I waits ≈ N×I before giving up.
//! Both the sleep and the request race the configured [`CancelToken`].
//!
//! ## Endpoint fallback
//!
//! The first attempt uses the primary status URL. If that answers 404, the
//! alternates from [`EndpointStrategy`] are probed in order and the first one
//! answering 2xx becomes the primary for the rest of the session. A 404 on a
//! later attempt is treated as transient.
//!
//! ## Completion detection
//!
//! Checked in order, first match wins:
//!
//! 1. status is completed → [`Detection::Status`] (authoritative)
//! 2. status is failed → [`ExtractError::WorkflowFailure`], immediately
//! 3. `output` looks like extraction data → [`Detection::OutputShape`]
//! 4. the body itself carries line items → [`Detection::EnvelopeShape`]
//!
//! Paths 3 and 4 exist because the service has been seen to deliver a final
//! result while still reporting a non-terminal status. They are guesses and
//! are labelled as such in the returned [`PollOutcome`].
//!
//! [`CancelToken`]: crate::cancel::CancelToken
//! [`EndpointStrategy`]: crate::endpoints::EndpointStrategy

use crate::cancel::CancelToken;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{Detection, PollOutcome, PollSnapshot, RunHandle, RunStatus};
use crate::pipeline::normalize::{decode_output, decode_text, looks_like_result};
use crate::pipeline::submit::is_empty_value;
use crate::transport::{HttpReply, Transport};
use serde_json::Value;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Decode a status response body.
pub fn parse_snapshot(body: Value) -> PollSnapshot {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .map(RunStatus::from_remote)
        .unwrap_or(RunStatus::Unknown(String::new()));

    let output = body
        .get("output")
        .filter(|v| !is_empty_value(v))
        .map(decode_output);

    let error_message = ["error_msg", "error"].iter().find_map(|key| match body.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(v @ Value::Object(_)) => Some(v.to_string()),
        _ => None,
    });

    PollSnapshot {
        status,
        output,
        error_message,
        body,
    }
}

/// Decision taken on one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Done(Value, Detection),
    Failed(String),
    Pending,
}

/// Apply the completion rules to a snapshot.
pub fn detect(snapshot: &PollSnapshot) -> Verdict {
    match snapshot.status {
        RunStatus::Completed => {
            return match &snapshot.output {
                Some(output) => Verdict::Done(output.clone(), Detection::Status),
                None => {
                    warn!("Run completed without output; returning the whole response");
                    Verdict::Done(snapshot.body.clone(), Detection::Status)
                }
            };
        }
        RunStatus::Failed => {
            return Verdict::Failed(
                snapshot
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            );
        }
        _ => {}
    }

    if let Some(output) = &snapshot.output {
        if looks_like_result(output) {
            return Verdict::Done(output.clone(), Detection::OutputShape);
        }
    }

    let envelope = match &snapshot.body {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.contains_key("line_items") || map.contains_key("items"),
        _ => false,
    };
    if envelope {
        return Verdict::Done(snapshot.body.clone(), Detection::EnvelopeShape);
    }

    Verdict::Pending
}

// ── Poll session ─────────────────────────────────────────────────────────

/// Logs in-loop faults until `limit` is reached, then goes quiet.
struct FaultLog {
    seen: u32,
    limit: u32,
}

impl FaultLog {
    /// Returns `true` when the fault was logged at warn level.
    fn record(&mut self, attempt: u32, message: &str) -> bool {
        self.seen += 1;
        if self.seen <= self.limit {
            warn!("Poll attempt {} failed: {}", attempt, message);
            if self.seen == self.limit {
                warn!("Further poll errors will not be logged");
            }
            true
        } else {
            debug!("Poll attempt {} failed: {}", attempt, message);
            false
        }
    }
}

/// Poll a run until it completes, fails, is cancelled or runs out of attempts.
pub async fn poll(
    transport: &dyn Transport,
    config: &ExtractionConfig,
    handle: &RunHandle,
) -> Result<PollOutcome, ExtractError> {
    let api_key = config.resolve_api_key()?;
    let run_id = handle.run_id.as_str();
    let workflow_id = handle.workflow_id.as_deref();
    let cancel = config.cancel.as_ref();
    let progress = config.progress_callback.as_ref();
    let max_attempts = config.max_poll_attempts;

    let mut url = config
        .endpoints
        .primary_status_url(&config.base_url, run_id, workflow_id);
    let mut faults = FaultLog {
        seen: 0,
        limit: config.transport_log_limit,
    };
    let start = Instant::now();

    info!(
        "Polling run {} every {}ms (max {} attempts)",
        run_id, config.poll_interval_ms, max_attempts
    );

    for attempt in 1..=max_attempts {
        cancellable(cancel, run_id, tokio::time::sleep(config.poll_interval())).await?;
        if let Some(cb) = progress {
            cb.on_poll_attempt(run_id, attempt, max_attempts);
        }

        let sent = cancellable(
            cancel,
            run_id,
            transport.get(&url, &api_key, config.poll_request_timeout()),
        )
        .await?;

        let mut reply = match sent {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_timeout() {
                    warn!("Poll attempt {} timed out, continuing", attempt);
                } else {
                    faults.record(attempt, &e.to_string());
                }
                notify_error(config, run_id, attempt, &e.to_string());
                continue;
            }
        };

        if reply.is_not_found() {
            if attempt > 1 {
                debug!("Attempt {}: 404 from {}, treating as transient", attempt, url);
                continue;
            }
            info!("Primary status endpoint returned 404, probing alternates");
            let alternates =
                config
                    .endpoints
                    .alternate_status_urls(&config.base_url, run_id, workflow_id, &url);
            match probe(transport, config, &api_key, run_id, &alternates).await? {
                Some((alt_url, alt_reply)) => {
                    info!("Switching to status endpoint {}", alt_url);
                    if let Some(cb) = progress {
                        cb.on_endpoint_switched(run_id, &alt_url);
                    }
                    url = alt_url;
                    reply = alt_reply;
                }
                None => {
                    warn!("No alternate status endpoint answered for run {}", run_id);
                    continue;
                }
            }
        }

        if !reply.is_success() {
            let message = format!("HTTP {}: {}", reply.status, reply.body_excerpt(200));
            faults.record(attempt, &message);
            notify_error(config, run_id, attempt, &message);
            continue;
        }

        let body = match reply.json() {
            Ok(body) => body,
            Err(e) => {
                let message = format!("undecodable status body: {e}");
                faults.record(attempt, &message);
                notify_error(config, run_id, attempt, &message);
                continue;
            }
        };

        let snapshot = parse_snapshot(body);
        debug!("Attempt {}/{}: status {}", attempt, max_attempts, snapshot.status);

        match detect(&snapshot) {
            Verdict::Done(output, detection) => {
                if detection.is_heuristic() {
                    warn!(
                        "Run {} treated as finished by {:?} heuristic (status: {})",
                        run_id, detection, snapshot.status
                    );
                } else {
                    info!("Run {} completed after {} attempts", run_id, attempt);
                }
                return Ok(PollOutcome {
                    output,
                    detection,
                    attempts: attempt,
                    endpoint: Some(url),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
            Verdict::Failed(message) => {
                return Err(ExtractError::WorkflowFailure {
                    run_id: run_id.to_string(),
                    message,
                });
            }
            Verdict::Pending => {}
        }
    }

    if let Some(output) = load_manual_result(config, run_id).await {
        info!("Using manually saved result for run {}", run_id);
        return Ok(PollOutcome {
            output,
            detection: Detection::ManualFile,
            attempts: max_attempts,
            endpoint: None,
            elapsed_ms: start.elapsed().as_millis() as u64,
        });
    }

    Err(ExtractError::PollTimeout {
        run_id: run_id.to_string(),
        elapsed_secs: start.elapsed().as_secs(),
        attempts: max_attempts,
        dashboard: config.dashboard_link(run_id),
    })
}

/// One status lookup, no looping: primary first, then alternates.
pub async fn fetch_once(
    transport: &dyn Transport,
    config: &ExtractionConfig,
    handle: &RunHandle,
) -> Result<PollSnapshot, ExtractError> {
    let api_key = config.resolve_api_key()?;
    let run_id = handle.run_id.as_str();
    let workflow_id = handle.workflow_id.as_deref();
    let primary = config
        .endpoints
        .primary_status_url(&config.base_url, run_id, workflow_id);

    let mut candidates = vec![primary.clone()];
    candidates.extend(
        config
            .endpoints
            .alternate_status_urls(&config.base_url, run_id, workflow_id, &primary),
    );

    let mut last_status = None;
    for url in &candidates {
        let sent = cancellable(
            config.cancel.as_ref(),
            run_id,
            transport.get(url, &api_key, config.poll_request_timeout()),
        )
        .await?;
        match sent {
            Ok(reply) if reply.is_success() => {
                let body = reply.json().map_err(|e| ExtractError::Decode {
                    what: format!("status response from {url}"),
                    detail: e.to_string(),
                })?;
                debug!("Run {} found at {}", run_id, url);
                return Ok(parse_snapshot(body));
            }
            Ok(reply) => {
                debug!("{} → HTTP {}", url, reply.status);
                last_status = Some(reply.status);
            }
            Err(e) => debug!("{} → {}", url, e),
        }
    }

    Err(ExtractError::RunNotFound {
        run_id: run_id.to_string(),
        status: last_status,
    })
}

/// GET each URL in turn; first 2xx wins.
async fn probe(
    transport: &dyn Transport,
    config: &ExtractionConfig,
    api_key: &str,
    run_id: &str,
    urls: &[String],
) -> Result<Option<(String, HttpReply)>, ExtractError> {
    for url in urls {
        let sent = cancellable(
            config.cancel.as_ref(),
            run_id,
            transport.get(url, api_key, config.poll_request_timeout()),
        )
        .await?;
        match sent {
            Ok(reply) if reply.is_success() => return Ok(Some((url.clone(), reply))),
            Ok(reply) => debug!("Alternate {} → HTTP {}", url, reply.status),
            Err(e) => debug!("Alternate {} → {}", url, e),
        }
    }
    Ok(None)
}

async fn load_manual_result(config: &ExtractionConfig, run_id: &str) -> Option<Value> {
    let dir = config.manual_results_dir.as_ref()?;
    let path = dir.join(format!("{run_id}.json"));
    let text = tokio::fs::read_to_string(&path).await.ok()?;
    match decode_text(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable manual result {}: {}", path.display(), e);
            None
        }
    }
}

fn notify_error(config: &ExtractionConfig, run_id: &str, attempt: u32, message: &str) {
    if let Some(cb) = &config.progress_callback {
        cb.on_poll_error(run_id, attempt, message);
    }
}

/// Await `fut`, failing with [`ExtractError::Cancelled`] if the token fires first.
async fn cancellable<F: Future>(
    cancel: Option<&CancelToken>,
    run_id: &str,
    fut: F,
) -> Result<F::Output, ExtractError> {
    let Some(token) = cancel else {
        return Ok(fut.await);
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ExtractError::Cancelled { run_id: run_id.to_string() }),
        out = fut => Ok(out),
    }
}
