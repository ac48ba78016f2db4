//! Remote workflow client: one POST that starts a run.
//!
//! Two routes exist. With a workflow id the document goes to
//! `{base}/{workflow_id}/run` and the body carries only `agent_inputs`; the
//! workflow already knows which agent to run. Without one it goes to
//! `{base}/run` and the body names the agent explicitly.
//!
//! Submission is never retried here: a second POST would start a second
//! remote run.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{Detection, RunHandle, RunStatus, Submission};
use crate::pipeline::encode::encode_document;
use crate::pipeline::normalize::{decode_output, looks_like_result};
use crate::transport::Transport;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Longest error-body excerpt carried in a [`ExtractError::Submission`].
pub const ERROR_BODY_EXCERPT: usize = 200;

/// What to submit.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub document: Vec<u8>,
    pub instructions: String,
    /// Agent for agent-routed submissions. `None` uses the configured default.
    pub agent_name: Option<String>,
    /// When set, the submission is workflow-routed.
    pub workflow_id: Option<String>,
}

impl SubmissionRequest {
    /// Request for `document` using the config's instructions and routing.
    pub fn from_config(document: Vec<u8>, config: &ExtractionConfig) -> Self {
        Self {
            document,
            instructions: config.instructions_text().to_string(),
            agent_name: None,
            workflow_id: config.workflow_id.clone(),
        }
    }

    /// Agent to name in the body, or `None` for workflow-routed requests.
    fn effective_agent<'a>(&'a self, config: &'a ExtractionConfig) -> Option<&'a str> {
        if self.workflow_id.is_some() {
            return None;
        }
        Some(self.agent_name.as_deref().unwrap_or(&config.agent_name))
    }

    fn validate(&self, config: &ExtractionConfig) -> Result<(), ExtractError> {
        if self.document.is_empty() {
            return Err(ExtractError::InvalidRequest("document is empty".into()));
        }
        if self.instructions.trim().is_empty() {
            return Err(ExtractError::InvalidRequest("instructions are empty".into()));
        }
        if let Some(wf) = &self.workflow_id {
            if wf.trim().is_empty() {
                return Err(ExtractError::InvalidRequest("workflow_id is blank".into()));
            }
        } else if self.effective_agent(config).is_none_or(|a| a.trim().is_empty()) {
            return Err(ExtractError::InvalidRequest(
                "either a workflow_id or an agent_name is required".into(),
            ));
        }
        Ok(())
    }
}

/// Build the JSON body for a request.
pub fn build_body(request: &SubmissionRequest, config: &ExtractionConfig) -> Value {
    let mut body = Map::new();
    if let Some(agent) = request.effective_agent(config) {
        body.insert("agent_name".into(), json!(agent));
    }
    body.insert(
        "agent_inputs".into(),
        json!({
            "pdf_document": encode_document(&request.document),
            "custom_instructions": request.instructions,
        }),
    );
    Value::Object(body)
}

/// Submit a document and return the run handle.
///
/// Exactly one outbound call. Transport faults propagate as
/// [`ExtractError::Transport`]; non-2xx statuses and malformed bodies as
/// [`ExtractError::Submission`].
pub async fn submit(
    transport: &dyn Transport,
    config: &ExtractionConfig,
    request: &SubmissionRequest,
) -> Result<Submission, ExtractError> {
    request.validate(config)?;
    let api_key = config.resolve_api_key()?;

    let url = config
        .endpoints
        .submit_url(&config.base_url, request.workflow_id.as_deref());
    let body = build_body(request, config);

    info!(
        "Submitting {} bytes to {} ({})",
        request.document.len(),
        url,
        match request.effective_agent(config) {
            Some(agent) => format!("agent '{agent}'"),
            None => "workflow route".to_string(),
        }
    );

    let reply = transport
        .post_json(&url, &api_key, &body, config.request_timeout())
        .await?;

    if !reply.is_success() {
        warn!("Submission rejected: HTTP {}", reply.status);
        return Err(ExtractError::Submission {
            status: Some(reply.status),
            detail: reply.body_excerpt(ERROR_BODY_EXCERPT),
        });
    }

    let data = reply.json().map_err(|e| ExtractError::Submission {
        status: Some(reply.status),
        detail: format!("response is not JSON: {e}"),
    })?;

    parse_response(&data, request.workflow_id.as_deref())
}

/// Interpret a decoded submission response.
pub fn parse_response(data: &Value, requested_workflow: Option<&str>) -> Result<Submission, ExtractError> {
    let run_id = match data.get("run_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ExtractError::Submission {
                status: None,
                detail: "response has no run_id".into(),
            })
        }
    };

    let workflow_id = data
        .get("workflow_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| requested_workflow.map(str::to_string));

    let status = data
        .get("status")
        .and_then(Value::as_str)
        .map(RunStatus::from_remote)
        .unwrap_or(RunStatus::Unknown(String::new()));

    let immediate = immediate_output(data, &status);
    debug!(
        "Run {} started (workflow: {:?}, status: {}, immediate output: {:?})",
        run_id,
        workflow_id,
        status,
        immediate.as_ref().map(|(_, d)| d)
    );

    Ok(Submission {
        handle: RunHandle::new(run_id, workflow_id),
        status,
        immediate,
    })
}

/// A result carried by the submission response itself.
///
/// Taken when the run is already completed with output. Otherwise the output
/// must pass the same shape rule the poller applies, and is labelled as a
/// guess.
fn immediate_output(data: &Value, status: &RunStatus) -> Option<(Value, Detection)> {
    let raw = data.get("output").filter(|v| !is_empty_value(v))?;
    let decoded = decode_output(raw);
    match status {
        RunStatus::Completed => Some((decoded, Detection::Immediate)),
        RunStatus::Failed => None,
        _ if looks_like_result(&decoded) => Some((decoded, Detection::ImmediateShape)),
        _ => None,
    }
}

pub(crate) fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
