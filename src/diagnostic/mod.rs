//! Sustained stress sessions: a fixed worker pool issuing periodic requests
//! against one provider for a bounded wall-clock window.
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, interval, sleep_until};

use crate::args::TestMode;
use crate::error::AppResult;
use crate::metrics::{DiagnosticSummary, RunRecord, format_duration};
use crate::providers::ProviderConfig;
use crate::runner::{RunDeadline, StreamRunner};
use crate::sinks::{
    ProviderLog, SessionPaths, save_diagnostic_summary, save_response_artifact, setup_provider_log,
};

const RESULT_CHANNEL_CAPACITY: usize = 1000;

/// Tuning of one diagnostic session.
#[derive(Debug, Clone)]
pub struct DiagnosticOptions {
    pub session_duration: Duration,
    pub workers: usize,
    /// Period between request starts within one worker.
    pub interval: Duration,
    pub request_timeout: Duration,
    /// Margin on top of the request timeout a new request must fit into the
    /// remaining session time.
    pub grace: Duration,
    pub save_responses: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            session_duration: Duration::from_secs(90),
            workers: 10,
            interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(5),
            save_responses: false,
        }
    }
}

/// Whether a worker may start another request: the remaining session time
/// must cover a full request timeout plus the grace margin, otherwise the
/// request would be cut off mid-flight.
#[must_use]
pub fn should_start_next(remaining: Duration, request_timeout: Duration, grace: Duration) -> bool {
    remaining >= request_timeout.saturating_add(grace)
}

struct WorkerContext {
    runner: Arc<StreamRunner>,
    provider: Arc<ProviderConfig>,
    mode: TestMode,
    options: DiagnosticOptions,
    session_start: Instant,
    session_deadline: Instant,
    log: Arc<ProviderLog>,
    log_dir: std::path::PathBuf,
    tx: mpsc::Sender<RunRecord>,
}

/// One worker: request immediately, then once per tick until the session
/// ends or too little time remains for another bounded request.
async fn worker_loop(id: usize, ctx: WorkerContext) {
    let mut ticker = interval(ctx.options.interval);
    // The first tick completes immediately; requests start with no initial
    // wait.
    ticker.tick().await;

    let mut request_num = 0usize;
    loop {
        request_num += 1;
        let kind = ctx.mode.kind_for_request(request_num);
        let deadline = RunDeadline::clamped(ctx.session_deadline, ctx.options.request_timeout);

        ctx.log
            .log(format!("[Worker {id}] Request #{request_num} starting"));
        let outcome = ctx
            .runner
            .execute(&ctx.provider, kind, deadline, &ctx.log)
            .await;

        match &outcome {
            Ok(metrics) => {
                if ctx.options.save_responses && !metrics.response.is_empty() {
                    let file_name = format!(
                        "{}-worker{id}-req{request_num}-{kind}-response.txt",
                        ctx.provider.name
                    );
                    if let Err(err) =
                        save_response_artifact(&ctx.log_dir, &file_name, &metrics.response)
                    {
                        ctx.log.log(format!(
                            "[Worker {id}] Warning: Failed to save response for request #{request_num}: {err}"
                        ));
                    }
                }
                ctx.log.log(format!(
                    "[Worker {id}] Request #{request_num} ({kind}) success: E2E={} TTFT={} Throughput={:.2} tok/s Tokens={}",
                    format_duration(metrics.e2e),
                    format_duration(metrics.ttft),
                    metrics.throughput,
                    metrics.tokens
                ));
            }
            Err(err) => {
                ctx.log.log(format!(
                    "[Worker {id}] Request #{request_num} ({kind}) failed: {err}"
                ));
            }
        }

        let _ = ctx
            .tx
            .send(RunRecord {
                sequence: request_num,
                kind,
                outcome,
            })
            .await;

        tokio::select! {
            () = sleep_until(ctx.session_deadline) => {
                ctx.log.log(format!(
                    "[Worker {id}] Session ended, completed {request_num} requests"
                ));
                return;
            }
            _ = ticker.tick() => {
                let remaining = ctx
                    .options
                    .session_duration
                    .saturating_sub(ctx.session_start.elapsed());
                if !should_start_next(remaining, ctx.options.request_timeout, ctx.options.grace) {
                    ctx.log.log(format!(
                        "[Worker {id}] Stopping - insufficient time remaining for next request ({:.1}s left, need {:.1}s)",
                        remaining.as_secs_f64(),
                        ctx.options.request_timeout.saturating_add(ctx.options.grace).as_secs_f64()
                    ));
                    ctx.log
                        .log(format!("[Worker {id}] Completed {request_num} requests"));
                    return;
                }
            }
        }
    }
}

/// Runs one diagnostic session for one provider and persists the summary.
///
/// Workers never abort the session on individual failures; the collector
/// drains every outcome after all workers finish, then splits it into
/// success sums and an error-frequency table.
///
/// # Errors
///
/// Returns an error when the session log or the summary file cannot be
/// written.
pub async fn run_diagnostic(
    runner: &Arc<StreamRunner>,
    provider: &Arc<ProviderConfig>,
    mode: TestMode,
    options: &DiagnosticOptions,
    session: &SessionPaths,
) -> AppResult<DiagnosticSummary> {
    let log_handle = setup_provider_log(
        session
            .log_dir
            .join(format!("{}-diagnostic-{}.log", provider.name, session.timestamp)),
    );
    let log = Arc::clone(&log_handle.sink);

    log.log(format!(
        "=== DIAGNOSTIC MODE: {} ({}) - Mode: {} ===",
        provider.name, provider.model, mode
    ));
    log.log(format!(
        "Running {} workers for {} seconds with requests every {} seconds",
        options.workers,
        options.session_duration.as_secs(),
        options.interval.as_secs()
    ));
    log.log(format!(
        "Timeout per request: {} seconds",
        options.request_timeout.as_secs()
    ));

    let session_start = Instant::now();
    let session_deadline = session_start + options.session_duration;

    let (tx, mut rx) = mpsc::channel::<RunRecord>(RESULT_CHANNEL_CAPACITY);
    let mut workers = JoinSet::new();
    for id in 1..=options.workers {
        let ctx = WorkerContext {
            runner: Arc::clone(runner),
            provider: Arc::clone(provider),
            mode,
            options: options.clone(),
            session_start,
            session_deadline,
            log: Arc::clone(&log),
            log_dir: session.log_dir.clone(),
            tx: tx.clone(),
        };
        workers.spawn(worker_loop(id, ctx));
    }
    drop(tx);

    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut e2e_sum = Duration::ZERO;
    let mut ttft_sum = Duration::ZERO;
    let mut throughput_sum = 0.0f64;
    let mut tokens_sum = 0usize;
    let mut errors: HashMap<String, usize> = HashMap::new();

    while let Some(record) = rx.recv().await {
        match record.outcome {
            Ok(metrics) => {
                successful += 1;
                e2e_sum += metrics.e2e;
                ttft_sum += metrics.ttft;
                throughput_sum += metrics.throughput;
                tokens_sum += metrics.tokens;
            }
            Err(err) => {
                failed += 1;
                *errors.entry(err.to_string()).or_insert(0) += 1;
            }
        }
    }
    // The channel only closes after every worker dropped its sender.
    while workers.join_next().await.is_some() {}

    let mut summary = DiagnosticSummary {
        provider: provider.name.clone(),
        model: provider.model.clone(),
        mode,
        timestamp: Utc::now(),
        total_requests: successful + failed,
        successful,
        failed,
        avg_e2e_latency: Duration::ZERO,
        avg_ttft: Duration::ZERO,
        avg_throughput: 0.0,
        avg_tokens: 0,
        errors,
    };
    if successful > 0 {
        let count = u32::try_from(successful).unwrap_or(u32::MAX);
        summary.avg_e2e_latency = e2e_sum / count;
        summary.avg_ttft = ttft_sum / count;
        summary.avg_throughput = throughput_sum / successful as f64;
        summary.avg_tokens = tokens_sum / successful;
    }

    log.log("");
    log.log("========================================");
    log.log("   DIAGNOSTIC MODE SUMMARY");
    log.log("========================================");
    log.log(format!("Provider: {}", summary.provider));
    log.log(format!("Model: {}", summary.model));
    log.log(format!("Mode: {}", summary.mode));
    log.log(format!("Total Requests: {}", summary.total_requests));
    log.log(format!("Successful: {}", summary.successful));
    log.log(format!("Failed: {}", summary.failed));
    if summary.successful > 0 {
        log.log("--------------------------------------");
        log.log(format!(
            "Average E2E Latency: {}",
            format_duration(summary.avg_e2e_latency)
        ));
        log.log(format!(
            "Average TTFT: {}",
            format_duration(summary.avg_ttft)
        ));
        log.log(format!(
            "Average Throughput: {:.2} tokens/s",
            summary.avg_throughput
        ));
        log.log(format!("Average Tokens: {}", summary.avg_tokens));
    }
    if !summary.errors.is_empty() {
        log.log("--------------------------------------");
        log.log("Errors encountered:");
        let mut entries: Vec<(&String, &usize)> = summary.errors.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (message, count) in entries {
            log.log(format!("  - {message} (x{count})"));
        }
    }
    log.log("========================================");

    save_diagnostic_summary(&session.results_dir, &summary)?;

    drop(log);
    log_handle.close().await?;
    Ok(summary)
}
