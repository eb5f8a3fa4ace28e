//! Concurrent iteration batches: N timed runs per mode under one shared
//! deadline, reduced to a single averaged result per provider.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::args::TestMode;
use crate::error::{AppResult, RunError};
use crate::metrics::{RunMetrics, RunRecord, TestResult, format_duration};
use crate::providers::ProviderConfig;
use crate::runner::{RunDeadline, StreamRunner};
use crate::sinks::{SessionPaths, save_response_artifact, save_test_result, setup_provider_log};

/// Tuning of one iteration batch.
#[derive(Debug, Clone)]
pub struct IterationOptions {
    /// Repetitions per constituent request kind.
    pub iterations: usize,
    /// Shared wall-clock budget for the whole batch. Generous because
    /// reasoning models can be slow.
    pub batch_deadline: Duration,
    pub save_responses: bool,
    /// Log whether reasoning content was observed across the batch.
    pub reasoning_check: bool,
}

impl Default for IterationOptions {
    fn default() -> Self {
        Self {
            iterations: 3,
            batch_deadline: Duration::from_secs(300),
            save_responses: false,
            reasoning_check: false,
        }
    }
}

/// Commutative reduction of run outcomes into batch sums. Arrival order does
/// not matter; only successful runs contribute to the sums.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    e2e_sum: Duration,
    ttft_sum: Duration,
    throughput_sum: f64,
    tokens_sum: usize,
    successes: usize,
    failures: usize,
    reasoning_runs: usize,
    first_error: Option<String>,
}

impl BatchAccumulator {
    pub fn record(&mut self, outcome: &Result<RunMetrics, RunError>) {
        match outcome {
            Ok(metrics) => {
                self.e2e_sum += metrics.e2e;
                self.ttft_sum += metrics.ttft;
                self.throughput_sum += metrics.throughput;
                self.tokens_sum += metrics.tokens;
                self.successes += 1;
                if metrics.saw_reasoning {
                    self.reasoning_runs += 1;
                }
            }
            Err(err) => {
                self.failures += 1;
                if self.first_error.is_none() {
                    self.first_error = Some(err.to_string());
                }
            }
        }
    }

    #[must_use]
    pub const fn successes(&self) -> usize {
        self.successes
    }

    #[must_use]
    pub const fn failures(&self) -> usize {
        self.failures
    }

    #[must_use]
    pub const fn reasoning_runs(&self) -> usize {
        self.reasoning_runs
    }

    /// Builds the averaged record. Divides only by the success count; with
    /// zero successes this is an error-only record carrying the first
    /// observed failure.
    #[must_use]
    pub fn into_result(self, provider: &ProviderConfig, mode: TestMode) -> TestResult {
        if self.successes == 0 {
            let error = self
                .first_error
                .unwrap_or_else(|| "no runs completed".to_owned());
            return TestResult::failure(&provider.name, &provider.model, mode, error);
        }
        let count = u32::try_from(self.successes).unwrap_or(u32::MAX);
        TestResult {
            provider: provider.name.clone(),
            model: provider.model.clone(),
            mode,
            timestamp: Utc::now(),
            e2e_latency: self.e2e_sum / count,
            ttft: self.ttft_sum / count,
            throughput: self.throughput_sum / self.successes as f64,
            completion_tokens: self.tokens_sum / self.successes,
            success: true,
            error: None,
        }
    }
}

/// Runs one full iteration batch for one provider and persists the averaged
/// result.
///
/// All repetitions execute concurrently under one shared deadline and feed a
/// channel sized to the repetition count, so no producer ever blocks on a
/// lagging consumer. The channel closes once every repetition task has
/// finished; aggregation completes only after the join barrier.
///
/// # Errors
///
/// Returns an error when the per-provider log or the result file cannot be
/// written. Request failures never error the batch; they degrade it to a
/// partial or error-only result.
pub async fn run_provider_benchmark(
    runner: &Arc<StreamRunner>,
    provider: &Arc<ProviderConfig>,
    mode: TestMode,
    options: &IterationOptions,
    session: &SessionPaths,
) -> AppResult<TestResult> {
    let log_handle = setup_provider_log(
        session
            .log_dir
            .join(format!("{}-{}.log", provider.name, session.timestamp)),
    );
    let log = Arc::clone(&log_handle.sink);

    let kinds = mode.kinds();
    let total_runs = kinds.len() * options.iterations;
    log.log(format!(
        "--- Testing: {} ({}) - Mode: {} - Running {total_runs} concurrent iterations ---",
        provider.name, provider.model, mode
    ));

    let deadline = RunDeadline::session(Instant::now() + options.batch_deadline);
    let (tx, mut rx) = mpsc::channel::<RunRecord>(total_runs.max(1));
    let mut tasks = JoinSet::new();

    let mut run_num = 0usize;
    for &kind in kinds {
        for _ in 0..options.iterations {
            run_num += 1;
            let runner = Arc::clone(runner);
            let provider = Arc::clone(provider);
            let log = Arc::clone(&log);
            let tx = tx.clone();
            let log_dir = session.log_dir.clone();
            let save_responses = options.save_responses;

            tasks.spawn(async move {
                log.log(format!(
                    "[{}] Run {run_num}/{total_runs} ({kind}) starting",
                    provider.name
                ));
                let outcome = runner.execute(&provider, kind, deadline, &log).await;
                match &outcome {
                    Ok(metrics) => {
                        if save_responses && !metrics.response.is_empty() {
                            let file_name = format!(
                                "{}-run{run_num}-{kind}-response.txt",
                                provider.name
                            );
                            if let Err(err) =
                                save_response_artifact(&log_dir, &file_name, &metrics.response)
                            {
                                log.log(format!(
                                    "[{}] Warning: Failed to save response for run {run_num}: {err}",
                                    provider.name
                                ));
                            }
                        }
                        log.log(format!(
                            "[{}] Run {run_num} ({kind}) complete: E2E={} TTFT={} Throughput={:.2} tok/s",
                            provider.name,
                            format_duration(metrics.e2e),
                            format_duration(metrics.ttft),
                            metrics.throughput
                        ));
                    }
                    Err(err) => {
                        log.log(format!(
                            "[{}] Run {run_num} ({kind}) failed: {err}",
                            provider.name
                        ));
                    }
                }
                let _ = tx
                    .send(RunRecord {
                        sequence: run_num,
                        kind,
                        outcome,
                    })
                    .await;
            });
        }
    }
    drop(tx);

    let mut batch = BatchAccumulator::default();
    while let Some(record) = rx.recv().await {
        batch.record(&record.outcome);
    }
    // Aggregate only after every repetition task has terminated.
    while tasks.join_next().await.is_some() {}

    if options.reasoning_check {
        log.log(format!(
            "[{}] Reasoning content observed in {}/{} successful run(s)",
            provider.name,
            batch.reasoning_runs(),
            batch.successes()
        ));
    }

    let successes = batch.successes();
    let result = batch.into_result(provider, mode);

    if result.success {
        log.log("==============================================");
        log.log(format!(
            "   LLM Metrics for: {} (averaged over {successes} run(s))",
            provider.name
        ));
        log.log(format!("   Model: {}", provider.model));
        log.log(format!("   Mode: {mode}"));
        log.log(format!(
            "   Avg Output Tokens: {}",
            result.completion_tokens
        ));
        log.log("----------------------------------------------");
        log.log(format!(
            "   End-to-End Latency: {}",
            format_duration(result.e2e_latency)
        ));
        log.log(format!(
            "   Latency (TTFT):     {}",
            format_duration(result.ttft)
        ));
        log.log(format!(
            "   Throughput (Tokens/sec): {:.2} tokens/s",
            result.throughput
        ));
        log.log("==============================================");
    } else {
        log.log(format!("[{}] All runs failed", provider.name));
    }

    save_test_result(&session.results_dir, &result)?;

    drop(log);
    log_handle.close().await?;
    Ok(result)
}
