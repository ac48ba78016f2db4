//! End-to-end tests against the live workflow service.
//!
//! These tests upload real PDFs from `./test_cases/` and wait for real runs,
//! which takes minutes and needs `DOCFLOW_API_KEY`. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DOCFLOW_API_KEY=... cargo test --test e2e -- --nocapture

use docflow_extract::{
    classify, extract, extract_to_file, fetch_run, ErrorCategory, ExtractionConfig, COLUMNS,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Route library logs to the test output; `RUST_LOG` picks the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn live_config() -> ExtractionConfig {
    init_tracing();
    let mut builder = ExtractionConfig::builder().max_poll_attempts(120);
    if let Ok(wf) = std::env::var("DOCFLOW_WORKFLOW_ID") {
        builder = builder.workflow_id(wf);
    }
    builder.build().expect("valid config")
}

// ── Live extraction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_entry_summary() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("entry_summary.pdf"));
    let config = live_config();

    let out = match extract(pdf.to_str().unwrap(), &config).await {
        Ok(o) => o,
        Err(e) => panic!("extraction failed:\n{}", classify(&e, None, &config)),
    };

    println!(
        "run {:?}: {} rows, {} attempts, detection {:?}",
        out.run.as_ref().map(|r| &r.run_id),
        out.rows.len(),
        out.stats.poll_attempts,
        out.stats.detection
    );
    assert!(out.normalized.issue.is_none(), "{:?}", out.normalized.issue);
    assert!(!out.rows.is_empty());
    assert_eq!(out.audit.columns, COLUMNS.len());
}

#[tokio::test]
async fn test_extract_to_file() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("entry_summary.pdf"));
    let out_path = output_dir().join("entry_summary.xlsx");
    let config = live_config();

    let out = extract_to_file(pdf.to_str().unwrap(), &out_path, &config)
        .await
        .unwrap_or_else(|e| panic!("{}", classify(&e, None, &config)));

    assert!(out_path.exists());
    println!("wrote {} rows to {}", out.rows.len(), out_path.display());
}

#[tokio::test]
async fn test_fetch_unknown_run() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let config = live_config();
    let err = fetch_run("00000000-0000-0000-0000-000000000000", &config)
        .await
        .expect_err("unknown run must not resolve");
    let report = classify(&err, None, &config);
    println!("{report}");
    assert!(matches!(
        report.category,
        ErrorCategory::NotFound | ErrorCategory::Server | ErrorCategory::Unknown
    ));
}

#[tokio::test]
async fn test_bad_key_is_auth() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("entry_summary.pdf"));
    let config = ExtractionConfig::builder()
        .api_key("definitely-not-a-key")
        .build()
        .unwrap();
    let err = extract(pdf.to_str().unwrap(), &config)
        .await
        .expect_err("bad key must be rejected");
    assert_eq!(classify(&err, None, &config).category, ErrorCategory::Auth);
}
