//! Pipeline integration tests against an in-memory workflow service.
//!
//! `FakeService` stands in for the remote API: the submission reply is fixed,
//! each status URL replays a scripted queue (the last reply repeats) and any
//! other URL answers 404. Every request is recorded so tests can assert on
//! the exact call sequence.

use async_trait::async_trait;
use docflow_extract::{
    classify, extract_from_bytes, extract_stream, extract_to_file, fetch_run, Detection,
    ErrorCategory, ExtractError, ExtractionConfig, ExtractionProgressCallback, HttpReply,
    RunStatus, Transport, TransportError,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const BASE: &str = "https://flow.test/api/v1/public/workflow";
const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF";

// ── Fake service ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeService {
    submit_reply: Mutex<Option<HttpReply>>,
    routes: Mutex<Vec<(String, VecDeque<HttpReply>)>>,
    posts: Mutex<Vec<(String, Value)>>,
    gets: Mutex<Vec<String>>,
}

impl FakeService {
    fn accepting(run_id: &str) -> Self {
        let svc = Self::default();
        *svc.submit_reply.lock().unwrap() = Some(HttpReply::new(
            200,
            json!({"run_id": run_id, "status": "running"}).to_string(),
        ));
        svc
    }

    fn submit_reply(self, reply: HttpReply) -> Self {
        *self.submit_reply.lock().unwrap() = Some(reply);
        self
    }

    fn status(self, url: String, bodies: Vec<Value>) -> Self {
        let replies = bodies
            .into_iter()
            .map(|b| HttpReply::new(200, b.to_string()))
            .collect();
        self.routes.lock().unwrap().push((url, replies));
        self
    }

    fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }

    fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn post_json(
        &self,
        url: &str,
        _bearer: &str,
        body: &Value,
        _timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        self.posts.lock().unwrap().push((url.to_string(), body.clone()));
        Ok(self
            .submit_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| HttpReply::new(500, "no submit reply scripted")))
    }

    async fn get(
        &self,
        url: &str,
        _bearer: &str,
        _timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        self.gets.lock().unwrap().push(url.to_string());
        let mut routes = self.routes.lock().unwrap();
        Ok(match routes.iter_mut().find(|(u, _)| u == url) {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some((_, queue)) => queue.front().cloned().unwrap(),
            None => HttpReply::new(404, "Not Found"),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn primary(run_id: &str) -> String {
    format!("{BASE}/{run_id}/status?output_var=final_display_output")
}

fn config(svc: &Arc<FakeService>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .api_key("test-key")
        .base_url(BASE)
        .poll_interval_ms(5_000)
        .max_poll_attempts(10)
        .transport(svc.clone())
        .build()
        .unwrap()
}

fn entry_summary() -> Value {
    json!({"entry_summary": {
        "filer_code_entry_no": "KX-0711108",
        "entry_type": "01",
        "line_items": [
            {"line_no": "INV1", "description_of_merchandise": "Commercial Invoice #: 4410"},
            {"line_no": "001", "description": "ceramic sinks",
             "primary_hts": {"hts_code": "6910.10.0030", "entered_value": 1200, "rate": "5.8%",
                             "additional_hts_codes": [{"hts_code": "9903.88.15", "rate": "25%"}]}},
            {"line_no": "002", "hts_code": "8486.90.0000", "entered_value": "3,400"}
        ]
    }})
}

#[derive(Default)]
struct Recorder {
    submitted: AtomicU32,
    attempts: AtomicU32,
    completed_rows: AtomicU32,
}

impl ExtractionProgressCallback for Recorder {
    fn on_submitted(&self, _document: &str, _run_id: &str) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }
    fn on_poll_attempt(&self, _run_id: &str, attempt: u32, _max: u32) {
        self.attempts.store(attempt, Ordering::SeqCst);
    }
    fn on_extraction_complete(&self, _run_id: Option<&str>, rows: usize) {
        self.completed_rows.store(rows as u32, Ordering::SeqCst);
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_flow_submits_polls_and_tabulates() {
    let svc = Arc::new(FakeService::accepting("run-1").status(
        primary("run-1"),
        vec![
            json!({"status": "running"}),
            json!({"status": "completed", "output": entry_summary().to_string()}),
        ],
    ));
    let recorder = Arc::new(Recorder::default());
    let mut cfg = config(&svc);
    cfg.progress_callback = Some(recorder.clone());

    let out = assert_ok!(extract_from_bytes("entry.pdf", PDF.to_vec(), &cfg).await);

    assert_eq!(out.run.as_ref().unwrap().run_id, "run-1");
    assert_eq!(out.stats.poll_attempts, 2);
    assert_eq!(out.stats.detection, Some(Detection::Status));
    assert_eq!(out.rows.len(), 3);
    assert!(out.rows.iter().all(|r| r["entry_number"] == "KX-0711108"));
    assert!(out.rows.iter().all(|r| r["invoice_no"] == "4410"));
    assert_eq!(out.rows[1]["hts_code"], "9903.88.15");
    assert_eq!(out.rows[2]["entered_value"], "3400");

    assert_eq!(recorder.submitted.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.completed_rows.load(Ordering::SeqCst), 3);

    let posts = svc.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, format!("{BASE}/run"));
    assert_eq!(posts[0].1["agent_name"], "Unified PDF Parser");
    assert!(posts[0].1["agent_inputs"]["pdf_document"].as_str().unwrap().starts_with("JVBERi"));
}

#[tokio::test(start_paused = true)]
async fn workflow_route_posts_to_workflow_url() {
    let svc = Arc::new(
        FakeService::accepting("run-2")
            .status(primary("run-2"), vec![json!({"status": "completed", "output": [{"line_no": "1"}]})]),
    );
    let mut cfg = config(&svc);
    cfg.workflow_id = Some("wf_9".into());

    let out = assert_ok!(extract_from_bytes("entry.pdf", PDF.to_vec(), &cfg).await);
    assert_eq!(out.run.unwrap().workflow_id.as_deref(), Some("wf_9"));

    let posts = svc.posts();
    assert_eq!(posts[0].0, format!("{BASE}/wf_9/run"));
    assert!(posts[0].1.get("agent_name").is_none());
}

#[tokio::test]
async fn immediate_output_skips_polling() {
    let svc = Arc::new(FakeService::default().submit_reply(HttpReply::new(
        200,
        json!({"run_id": "run-3", "status": "completed", "output": entry_summary()}).to_string(),
    )));
    let out = assert_ok!(extract_from_bytes("entry.pdf", PDF.to_vec(), &config(&svc)).await);
    assert_eq!(out.stats.detection, Some(Detection::Immediate));
    assert_eq!(out.stats.poll_attempts, 0);
    assert!(svc.gets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unfinished_submission_output_still_polls() {
    let svc = Arc::new(
        FakeService::default()
            .submit_reply(HttpReply::new(
                200,
                json!({"run_id": "run-4", "status": "running",
                       "output": {"message": "queued", "progress": 0}})
                .to_string(),
            ))
            .status(
                primary("run-4"),
                vec![json!({"status": "completed", "output": entry_summary()})],
            ),
    );
    let out = assert_ok!(extract_from_bytes("entry.pdf", PDF.to_vec(), &config(&svc)).await);
    assert_eq!(out.stats.detection, Some(Detection::Status));
    assert_eq!(out.stats.poll_attempts, 1);
    assert_eq!(svc.gets(), vec![primary("run-4")]);
    assert_eq!(out.rows.len(), 3);
}

#[tokio::test]
async fn unfinished_submission_with_items_is_labelled_heuristic() {
    let svc = Arc::new(FakeService::default().submit_reply(HttpReply::new(
        200,
        json!({"run_id": "run-5", "status": "running", "output": entry_summary()}).to_string(),
    )));
    let out = assert_ok!(extract_from_bytes("entry.pdf", PDF.to_vec(), &config(&svc)).await);
    let detection = out.stats.detection.unwrap();
    assert_eq!(detection, Detection::ImmediateShape);
    assert!(detection.is_heuristic());
    assert!(svc.gets().is_empty());
}

#[tokio::test]
async fn rejected_submission_is_classified_as_auth() {
    let svc = Arc::new(FakeService::default().submit_reply(HttpReply::new(401, "invalid token")));
    let cfg = config(&svc);
    let err = assert_err!(extract_from_bytes("entry.pdf", PDF.to_vec(), &cfg).await);

    assert_eq!(err.http_status(), Some(401));
    let report = classify(&err, None, &cfg);
    assert_eq!(report.category, ErrorCategory::Auth);
    assert!(svc.gets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn remote_failure_stops_polling_immediately() {
    let svc = Arc::new(FakeService::accepting("run-4").status(
        primary("run-4"),
        vec![json!({"status": "failed", "error_msg": "unreadable scan"})],
    ));
    let err = assert_err!(extract_from_bytes("entry.pdf", PDF.to_vec(), &config(&svc)).await);
    match err {
        ExtractError::WorkflowFailure { run_id, message } => {
            assert_eq!(run_id, "run-4");
            assert_eq!(message, "unreadable scan");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(svc.gets().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_reports_run_and_dashboard() {
    let svc = Arc::new(
        FakeService::accepting("run-5").status(primary("run-5"), vec![json!({"status": "running"})]),
    );
    let mut cfg = config(&svc);
    cfg.max_poll_attempts = 3;
    cfg.dashboard_url = "https://dash.test/runs/{run_id}".into();

    let err = assert_err!(extract_from_bytes("entry.pdf", PDF.to_vec(), &cfg).await);
    assert!(matches!(err, ExtractError::PollTimeout { attempts: 3, .. }));

    let report = classify(&err, None, &cfg);
    assert_eq!(report.category, ErrorCategory::Timeout);
    assert_eq!(report.run_id.as_deref(), Some("run-5"));
    assert_eq!(report.dashboard_link.as_deref(), Some("https://dash.test/runs/run-5"));
}

#[tokio::test(start_paused = true)]
async fn extract_to_file_writes_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("entry.pdf");
    std::fs::write(&pdf, PDF).unwrap();
    let out_path = dir.path().join("out").join("entry.xlsx");

    let svc = Arc::new(FakeService::accepting("run-6").status(
        primary("run-6"),
        vec![json!({"status": "completed", "output": entry_summary()})],
    ));
    let out = assert_ok!(extract_to_file(pdf.to_str().unwrap(), &out_path, &config(&svc)).await);

    assert_eq!(out.input.as_deref(), pdf.to_str());
    let bytes = std::fs::read(&out_path).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn batch_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.pdf");
    std::fs::write(&good, PDF).unwrap();
    let missing = dir.path().join("missing.pdf");

    let svc = Arc::new(FakeService::accepting("run-7").status(
        primary("run-7"),
        vec![json!({"status": "completed", "output": {"items": [{"line_no": "1"}]}})],
    ));
    let mut cfg = config(&svc);
    cfg.poll_interval_ms = 1;

    let inputs = [good.display().to_string(), missing.display().to_string()];
    let results: Vec<_> = extract_stream(inputs, &cfg).collect().await;

    assert_eq!(results.len(), 2);
    let (ok, err): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    assert_eq!(ok.len(), 1);
    let err = err.into_iter().next().unwrap().unwrap_err();
    assert!(err.input.ends_with("missing.pdf"));
    assert!(matches!(err.error, ExtractError::FileNotFound { .. }));
}

#[tokio::test]
async fn fetch_run_falls_back_to_alternate() {
    let svc = Arc::new(FakeService::default().status(
        format!("{BASE}/run/run-8"),
        vec![json!({"status": "completed", "output": "{\"items\": []}"})],
    ));
    let snapshot = assert_ok!(fetch_run("run-8", &config(&svc)).await);
    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.output, Some(json!({"items": []})));
    assert_eq!(svc.gets()[0], primary("run-8"));
}

#[tokio::test]
async fn fetch_run_unknown_everywhere_is_not_found() {
    let svc = Arc::new(FakeService::default());
    let cfg = config(&svc);
    let err = assert_err!(fetch_run("nope", &cfg).await);
    assert!(matches!(err, ExtractError::RunNotFound { .. }));
    assert_eq!(classify(&err, None, &cfg).category, ErrorCategory::NotFound);
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    if std::env::var("DOCFLOW_API_KEY").is_ok() {
        return;
    }
    let svc = Arc::new(FakeService::accepting("run-9"));
    let mut cfg = config(&svc);
    cfg.api_key = None;
    let err = assert_err!(extract_from_bytes("entry.pdf", PDF.to_vec(), &cfg).await);
    assert!(matches!(err, ExtractError::MissingApiKey));
    assert!(svc.posts().is_empty());
}
