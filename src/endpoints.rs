//! URL templates for the remote workflow service.
//!
//! The service has no published discovery contract, and the status path that
//! works has varied between deployments. Instead of hardcoding guesses, every
//! URL the pipeline calls is rendered from a template held in
//! [`EndpointStrategy`]. The fallback *mechanism* (ordered candidates, first
//! success wins, sticky thereafter) lives in [`crate::pipeline::poll`]; this
//! module only decides which candidates exist.
//!
//! Placeholders: `{base}`, `{run_id}`, `{workflow_id}`.

use serde::{Deserialize, Serialize};

/// Templates for submission and status URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStrategy {
    /// Agent-routed submission. Default: `{base}/run`.
    pub submit: String,

    /// Workflow-routed submission. Default: `{base}/{workflow_id}/run`.
    pub submit_workflow: String,

    /// Status URL polled first.
    pub primary_status: String,

    /// Alternates probed, in order, when the primary answers 404 on the first
    /// attempt.
    pub alternate_status: Vec<String>,
}

impl Default for EndpointStrategy {
    fn default() -> Self {
        Self {
            submit: "{base}/run".into(),
            submit_workflow: "{base}/{workflow_id}/run".into(),
            primary_status: "{base}/{run_id}/status?output_var=final_display_output".into(),
            alternate_status: vec![
                "{base}/run/{run_id}".into(),
                "{base}/{run_id}".into(),
                "{base}/run/{run_id}/status".into(),
                "{base}/{workflow_id}/run/{run_id}".into(),
                "{base}/{workflow_id}/runs/{run_id}/status".into(),
            ],
        }
    }
}

impl EndpointStrategy {
    /// A strategy with a single documented status endpoint and no fallbacks.
    pub fn single(primary_status: impl Into<String>) -> Self {
        Self {
            primary_status: primary_status.into(),
            alternate_status: Vec::new(),
            ..Self::default()
        }
    }

    /// Submission URL: workflow-scoped when a workflow id is given.
    pub fn submit_url(&self, base: &str, workflow_id: Option<&str>) -> String {
        match workflow_id {
            Some(wf) => render(&self.submit_workflow, base, None, Some(wf)),
            None => render(&self.submit, base, None, None),
        }
        .unwrap_or_default()
    }

    pub fn primary_status_url(&self, base: &str, run_id: &str, workflow_id: Option<&str>) -> String {
        render(&self.primary_status, base, Some(run_id), workflow_id).unwrap_or_default()
    }

    /// Rendered alternates, in order.
    ///
    /// Templates needing `{workflow_id}` are dropped when it is unknown, and
    /// any alternate identical to `exclude` (the current primary) or to an
    /// earlier alternate is skipped.
    pub fn alternate_status_urls(
        &self,
        base: &str,
        run_id: &str,
        workflow_id: Option<&str>,
        exclude: &str,
    ) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(self.alternate_status.len());
        for template in &self.alternate_status {
            if let Some(url) = render(template, base, Some(run_id), workflow_id) {
                if url != exclude && !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        urls
    }
}

/// Substitute placeholders; `None` when the template needs a value we lack.
fn render(template: &str, base: &str, run_id: Option<&str>, workflow_id: Option<&str>) -> Option<String> {
    let mut out = template.replace("{base}", base.trim_end_matches('/'));
    if out.contains("{run_id}") {
        out = out.replace("{run_id}", run_id?);
    }
    if out.contains("{workflow_id}") {
        let wf = workflow_id.filter(|w| !w.is_empty())?;
        out = out.replace("{workflow_id}", wf);
    }
    Some(out)
}
