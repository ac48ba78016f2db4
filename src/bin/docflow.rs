//! CLI binary for docflow-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, drives a spinner from progress events and prints a
//! classified report on failure.

use anyhow::{Context, Result};
use clap::Parser;
use docflow_extract::pipeline::input::default_output_path;
use docflow_extract::pipeline::normalize::decode_text;
use docflow_extract::pipeline::poll::{detect, Verdict};
use docflow_extract::{
    classify, export_json, extract, extract_stream, fetch_run, CancelToken, ExtractError,
    ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, ProgressCallback,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that shows the current poll attempt and prints one line per
/// milestone above itself.
struct CliProgressCallback {
    bar: ProgressBar,
    poll_errors: AtomicU32,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.set_message("sending document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            poll_errors: AtomicU32::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let errors = self.poll_errors.load(Ordering::SeqCst);
        if errors > 0 {
            eprintln!("{} {} poll attempts failed in transit", cyan("⚠"), errors);
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_submitted(&self, document: &str, run_id: &str) {
        self.bar.println(format!(
            "{} {} submitted  {}",
            cyan("◆"),
            bold(document),
            dim(&format!("run {run_id}"))
        ));
        self.bar.set_prefix("Waiting");
    }

    fn on_poll_attempt(&self, run_id: &str, attempt: u32, max_attempts: u32) {
        self.bar
            .set_message(format!("run {run_id}  poll {attempt}/{max_attempts}"));
    }

    fn on_endpoint_switched(&self, _run_id: &str, url: &str) {
        self.bar
            .println(format!("  {} status endpoint → {}", cyan("↻"), dim(url)));
    }

    fn on_poll_error(&self, _run_id: &str, attempt: u32, error: &str) {
        self.poll_errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} attempt {:>3}  {}", red("✗"), attempt, dim(&msg)));
    }

    fn on_extraction_complete(&self, run_id: Option<&str>, rows: usize) {
        self.bar.println(format!(
            "  {} {} rows tabulated  {}",
            green("✓"),
            rows,
            dim(run_id.unwrap_or("local"))
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one entry summary to entry.xlsx
  docflow entry.pdf

  # Choose the output file
  docflow entry.pdf -o out/entry.xlsx

  # Several documents at once (one .xlsx next to each)
  docflow -c 4 a.pdf b.pdf c.pdf

  # Route through a specific workflow instead of the default agent
  docflow --workflow-id wf_123 entry.pdf

  # The poller gave up but the run finished later: fetch it by run ID
  docflow --fetch-run 6f1c0d2e -o entry.xlsx

  # Convert a result JSON downloaded from the dashboard
  docflow --from-json result.json -o entry.xlsx

  # Structured output
  docflow --json entry.pdf > entry.json

ENVIRONMENT VARIABLES:
  DOCFLOW_API_KEY           Bearer token for the workflow service (required)
  DOCFLOW_BASE_URL          Workflow API root
  DOCFLOW_AGENT             Agent used when no workflow ID is given
  DOCFLOW_WORKFLOW_ID       Submit through this workflow
  DOCFLOW_DASHBOARD_URL     Dashboard link template; {run_id} is substituted
  DOCFLOW_MANUAL_RESULTS_DIR  Directory searched for <run_id>.json after polling gives up
  RUST_LOG                  Overrides --verbose / --quiet log filtering

EXIT STATUS:
  0  success
  1  extraction failed (a classified report is printed to stderr)
  2  --fetch-run found the run still in progress
"#;

/// Extract customs entry data from PDFs through a remote extraction workflow.
#[derive(Parser, Debug)]
#[command(
    name = "docflow",
    version,
    about = "Extract customs entry data from PDFs into a spreadsheet",
    long_about = "Upload PDF documents to a remote document-extraction workflow, wait for \
the run to finish and export the result as a fixed-column CBP 7501 spreadsheet.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present_any = ["fetch_run", "from_json"])]
    inputs: Vec<String>,

    /// Spreadsheet path (single input only). Default: input name with `.xlsx`.
    #[arg(short, long, env = "DOCFLOW_OUTPUT")]
    output: Option<PathBuf>,

    /// API key for the workflow service.
    #[arg(long, env = "DOCFLOW_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Workflow API root.
    #[arg(long, env = "DOCFLOW_BASE_URL")]
    base_url: Option<String>,

    /// Agent name used when no workflow ID is given.
    #[arg(long, env = "DOCFLOW_AGENT")]
    agent: Option<String>,

    /// Submit through this workflow instead of naming an agent.
    #[arg(long, env = "DOCFLOW_WORKFLOW_ID")]
    workflow_id: Option<String>,

    /// Path to a text file replacing the built-in extraction instructions.
    #[arg(long, env = "DOCFLOW_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Delay before each status request, in milliseconds.
    #[arg(long, env = "DOCFLOW_POLL_INTERVAL_MS", default_value_t = 5000)]
    poll_interval_ms: u64,

    /// Status requests before giving up.
    #[arg(long, env = "DOCFLOW_MAX_POLL_ATTEMPTS", default_value_t = 120,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_poll_attempts: u32,

    /// Submission request timeout in seconds.
    #[arg(long, env = "DOCFLOW_REQUEST_TIMEOUT", default_value_t = 300)]
    request_timeout: u64,

    /// Per-status-request timeout in seconds.
    #[arg(long, env = "DOCFLOW_POLL_TIMEOUT", default_value_t = 30)]
    poll_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "DOCFLOW_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Dashboard link template shown when a run times out.
    #[arg(long, env = "DOCFLOW_DASHBOARD_URL")]
    dashboard_url: Option<String>,

    /// Directory searched for `<run_id>.json` once polling is exhausted.
    #[arg(long, env = "DOCFLOW_MANUAL_RESULTS_DIR")]
    manual_results_dir: Option<PathBuf>,

    /// Documents processed at once in batch mode.
    #[arg(short, long, env = "DOCFLOW_CONCURRENCY", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..))]
    concurrency: u32,

    /// Look up an existing run once and export its result.
    #[arg(long, conflicts_with = "from_json")]
    fetch_run: Option<String>,

    /// Export a downloaded result JSON file without contacting the service.
    #[arg(long)]
    from_json: Option<PathBuf>,

    /// Print the full extraction result as JSON on stdout.
    #[arg(long, env = "DOCFLOW_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "DOCFLOW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCFLOW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCFLOW_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the progress; library INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Export a downloaded result ───────────────────────────────────────
    if let Some(ref path) = cli.from_json {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = decode_text(&text)
            .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {e}", path.display()))?;
        let out = cli.output.clone().unwrap_or_else(|| path.with_extension("xlsx"));
        let config = ExtractionConfig::default();
        match export_json(&value, &out).await {
            Ok(output) => report_success(&cli, &output, &out)?,
            Err(e) => fail(&e, None, &config),
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
        cancel,
    )
    .await?;

    // ── Fetch an existing run ────────────────────────────────────────────
    if let Some(ref run_id) = cli.fetch_run {
        let run_id = run_id.as_str();
        let snapshot = fetch_run(run_id, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let snapshot = match snapshot {
            Ok(s) => s,
            Err(e) => fail(&e, Some(run_id), &config),
        };
        match detect(&snapshot) {
            Verdict::Done(value, detection) => {
                let out = cli
                    .output
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(format!("{run_id}.xlsx")));
                if !cli.quiet && detection.is_heuristic() {
                    eprintln!("{} status is '{}'; result detected by shape", cyan("⚠"), snapshot.status);
                }
                match export_json(&value, &out).await {
                    Ok(output) => report_success(&cli, &output, &out)?,
                    Err(e) => fail(&e, Some(run_id), &config),
                }
            }
            Verdict::Failed(message) => {
                let e = ExtractError::WorkflowFailure {
                    run_id: run_id.to_string(),
                    message,
                };
                fail(&e, Some(run_id), &config)
            }
            Verdict::Pending => {
                eprintln!(
                    "{} run {} is still {}\n   {}",
                    cyan("…"),
                    bold(run_id),
                    snapshot.status,
                    dim(&config.dashboard_link(run_id))
                );
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    // ── Single document ──────────────────────────────────────────────────
    if cli.inputs.len() == 1 {
        let input = &cli.inputs[0];
        let out = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(input));
        let result = extract(input, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let output = match result {
            Ok(o) => o,
            Err(e) => fail(&e, None, &config),
        };
        if let Err(e) = docflow_extract::pipeline::render::write_workbook(&output.rows, &out).await {
            fail(&e, output.run.as_ref().map(|r| r.run_id.as_str()), &config);
        }
        return report_success(&cli, &output, &out);
    }

    // ── Batch ────────────────────────────────────────────────────────────
    anyhow::ensure!(
        cli.output.is_none(),
        "--output accepts a single input; batch outputs are written next to each input"
    );

    let mut results = extract_stream(cli.inputs.clone(), &config);
    let mut failed = 0usize;
    while let Some(result) = results.next().await {
        match result {
            Ok(output) => {
                let input = output.input.clone().unwrap_or_default();
                let out = default_output_path(&input);
                let run_id = output.run.as_ref().map(|r| r.run_id.as_str());
                match docflow_extract::pipeline::render::write_workbook(&output.rows, &out).await {
                    Ok(()) => report_success(&cli, &output, &out)?,
                    Err(e) => {
                        failed += 1;
                        eprintln!("{} {}\n{}", red("✘"), bold(&input), classify(&e, run_id, &config));
                    }
                }
            }
            Err(doc_err) => {
                failed += 1;
                let report = classify(&doc_err.error, None, &config);
                eprintln!("{} {}\n{}", red("✘"), bold(&doc_err.input), report);
            }
        }
    }
    if let Some(ref cb) = progress {
        cb.finish();
    }

    if !cli.quiet {
        eprintln!(
            "{} {}/{} documents extracted",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            cli.inputs.len() - failed,
            cli.inputs.len()
        );
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Print a classified report and exit with status 1.
fn fail(error: &ExtractError, run_id: Option<&str>, config: &ExtractionConfig) -> ! {
    let report = classify(error, run_id, config);
    eprintln!("{} {}", red("✘"), report);
    std::process::exit(1);
}

fn report_success(cli: &Cli, output: &ExtractionOutput, path: &Path) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    eprintln!(
        "{}  {} rows  {}ms  →  {}",
        if output.audit.warnings.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        output.rows.len(),
        output.stats.total_duration_ms,
        bold(&path.display().to_string()),
    );
    if let Some(detection) = output.stats.detection {
        eprintln!(
            "   {}",
            dim(&format!(
                "detected by {:?} after {} poll attempts",
                detection, output.stats.poll_attempts
            ))
        );
    }
    for warning in &output.audit.warnings {
        eprintln!("   {} {}", cyan("⚠"), warning);
    }
    if let Some(ref issue) = output.normalized.issue {
        eprintln!("   {} {}", red("✗"), issue.reason);
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancelToken,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .poll_interval_ms(cli.poll_interval_ms)
        .max_poll_attempts(cli.max_poll_attempts)
        .request_timeout_secs(cli.request_timeout)
        .poll_request_timeout_secs(cli.poll_timeout)
        .download_timeout_secs(cli.download_timeout)
        .concurrency(cli.concurrency as usize)
        .cancel_token(cancel);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref agent) = cli.agent {
        builder = builder.agent_name(agent);
    }
    if let Some(ref wf) = cli.workflow_id {
        builder = builder.workflow_id(wf);
    }
    if let Some(ref url) = cli.dashboard_url {
        builder = builder.dashboard_url(url);
    }
    if let Some(ref dir) = cli.manual_results_dir {
        builder = builder.manual_results_dir(dir);
    }
    if let Some(ref path) = cli.instructions {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.instructions(text);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
