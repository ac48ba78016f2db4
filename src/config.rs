//! Configuration for a document extraction run.
//!
//! Every knob lives in [`ExtractionConfig`], built via
//! [`ExtractionConfigBuilder`]. The CLI maps its flags and `DOCFLOW_*`
//! environment variables onto the builder; library callers set only what they
//! need and rely on the documented defaults for the rest.

use crate::cancel::CancelToken;
use crate::endpoints::EndpointStrategy;
use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use crate::transport::{ReqwestTransport, Transport};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "DOCFLOW_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://klearnow.prod.a79.ai/api/v1/public/workflow";
pub const DEFAULT_DASHBOARD_URL: &str = "https://klearnow.prod.a79.ai";
pub const DEFAULT_AGENT_NAME: &str = "Unified PDF Parser";

/// Configuration for an extraction.
///
/// # Example
/// ```rust
/// use docflow_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_key("sk-test")
///     .poll_interval_ms(2_000)
///     .max_poll_attempts(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_poll_attempts, 60);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Bearer credential. Falls back to `DOCFLOW_API_KEY` when `None`.
    pub api_key: Option<String>,

    /// Root of the workflow API; substituted for `{base}` in every endpoint template.
    pub base_url: String,

    /// Agent used for agent-routed submissions. Default: "Unified PDF Parser".
    pub agent_name: String,

    /// When set, submissions are workflow-routed and carry no agent name.
    pub workflow_id: Option<String>,

    /// Free-text instructions sent with the document. `None` uses
    /// [`crate::instructions::DEFAULT_INSTRUCTIONS`].
    pub instructions: Option<String>,

    /// Timeout for the submission POST in seconds. Default: 300.
    ///
    /// The upload carries the whole base64 document and the service may do
    /// some work before answering, so this is much longer than a poll request.
    pub request_timeout_secs: u64,

    /// Timeout for each status GET in seconds. Default: 30.
    pub poll_request_timeout_secs: u64,

    /// Sleep before each poll attempt in milliseconds. Default: 5000.
    pub poll_interval_ms: u64,

    /// Poll attempt budget. Default: 120 (≈ 10 minutes at the default interval).
    pub max_poll_attempts: u32,

    /// How many in-loop transport faults are logged before going quiet. Default: 3.
    pub transport_log_limit: u32,

    /// Submission and status URL templates.
    pub endpoints: EndpointStrategy,

    /// Where operators can look a run up by hand. `{run_id}` is substituted
    /// when present. Default: "https://klearnow.prod.a79.ai".
    pub dashboard_url: String,

    /// Directory searched for `<run_id>.json` when polling gives up.
    pub manual_results_dir: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Documents processed concurrently by [`crate::extract_stream`]. Default: 10.
    pub concurrency: usize,

    /// Pre-constructed transport. `None` builds a [`ReqwestTransport`].
    pub transport: Option<Arc<dyn Transport>>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,

    /// Optional cancellation token observed by the poller.
    pub cancel: Option<CancelToken>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            workflow_id: None,
            instructions: None,
            request_timeout_secs: 300,
            poll_request_timeout_secs: 30,
            poll_interval_ms: 5000,
            max_poll_attempts: 120,
            transport_log_limit: 3,
            endpoints: EndpointStrategy::default(),
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            manual_results_dir: None,
            download_timeout_secs: 120,
            concurrency: 10,
            transport: None,
            progress_callback: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("agent_name", &self.agent_name)
            .field("workflow_id", &self.workflow_id)
            .field("instructions", &self.instructions.as_ref().map(|s| s.len()))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("poll_request_timeout_secs", &self.poll_request_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("endpoints", &self.endpoints)
            .field("dashboard_url", &self.dashboard_url)
            .field("manual_results_dir", &self.manual_results_dir)
            .field("concurrency", &self.concurrency)
            .field("transport", &self.transport.as_ref().map(|_| "<dyn Transport>"))
            .field("cancel", &self.cancel.as_ref().map(|c| c.is_cancelled()))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured key, else `DOCFLOW_API_KEY`, else [`ExtractError::MissingApiKey`].
    pub fn resolve_api_key(&self) -> Result<String, ExtractError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExtractError::MissingApiKey)
    }

    /// Injected transport, or a fresh `reqwest`-backed one.
    pub fn resolve_transport(&self) -> Arc<dyn Transport> {
        match &self.transport {
            Some(t) => Arc::clone(t),
            None => Arc::new(ReqwestTransport::new()),
        }
    }

    pub fn instructions_text(&self) -> &str {
        self.instructions
            .as_deref()
            .unwrap_or(crate::instructions::DEFAULT_INSTRUCTIONS)
    }

    /// Dashboard link for a run, substituting `{run_id}` when the template has one.
    pub fn dashboard_link(&self, run_id: &str) -> String {
        self.dashboard_url.replace("{run_id}", run_id)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_request_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_request_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.config.agent_name = name.into();
        self
    }

    pub fn workflow_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.config.workflow_id = (!id.trim().is_empty()).then_some(id);
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Some(text.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn poll_request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.poll_request_timeout_secs = secs.max(1);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n;
        self
    }

    pub fn transport_log_limit(mut self, n: u32) -> Self {
        self.config.transport_log_limit = n;
        self
    }

    pub fn endpoints(mut self, strategy: EndpointStrategy) -> Self {
        self.config.endpoints = strategy;
        self
    }

    pub fn dashboard_url(mut self, url: impl Into<String>) -> Self {
        self.config.dashboard_url = url.into();
        self
    }

    pub fn manual_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.manual_results_dir = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.config.cancel = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_poll_attempts == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_poll_attempts must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ExtractError::InvalidConfig(format!(
                "base_url must be an http(s) URL, got '{}'",
                c.base_url
            )));
        }
        if c.workflow_id.is_none() && c.agent_name.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "agent_name must be set when no workflow_id is given".into(),
            ));
        }
        Ok(self.config)
    }
}
