//! End-to-end engine flows driven through the public API with a scripted
//! transport instead of a live endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::time::{Duration, sleep};

use llmspeed::api::{ChatEventStream, ChatRequest, ChatStreamChunk, ChatTransport, StreamChoice};
use llmspeed::args::TestMode;
use llmspeed::bench::{IterationOptions, run_provider_benchmark};
use llmspeed::diagnostic::{DiagnosticOptions, run_diagnostic};
use llmspeed::error::{AppResult, RunError};
use llmspeed::metrics::by_throughput;
use llmspeed::providers::ProviderConfig;
use llmspeed::runner::StreamRunner;
use llmspeed::sinks::SessionPaths;
use llmspeed::tokenizer::TokenCounter;

fn chunk(text: &str) -> ChatStreamChunk {
    ChatStreamChunk {
        choices: vec![StreamChoice {
            delta: llmspeed::api::Delta {
                content: Some(text.to_owned()),
                ..llmspeed::api::Delta::default()
            },
            ..StreamChoice::default()
        }],
        ..ChatStreamChunk::default()
    }
}

/// Streams a fixed completion after a configurable first-token delay.
struct FixedTransport {
    first_token_delay: Duration,
    text: &'static str,
}

#[async_trait]
impl ChatTransport for FixedTransport {
    async fn open_stream(
        &self,
        _provider: &ProviderConfig,
        _request: &ChatRequest,
    ) -> Result<ChatEventStream, RunError> {
        let delay = self.first_token_delay;
        let text = self.text;
        let stream = futures_util::stream::once(async move {
            sleep(delay).await;
            Ok(chunk(text))
        })
        .boxed();
        Ok(stream)
    }
}

struct WordTokenizer;

impl TokenCounter for WordTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

fn provider(name: &str) -> Arc<ProviderConfig> {
    Arc::new(ProviderConfig {
        name: name.to_owned(),
        base_url: "https://api.example.com/v1".to_owned(),
        api_key: "key".to_owned(),
        model: "test-model".to_owned(),
    })
}

fn session(root: &tempfile::TempDir, timestamp: &str) -> AppResult<SessionPaths> {
    let root_str = root.path().to_string_lossy().into_owned();
    SessionPaths::create_with_timestamp(&root_str, timestamp.to_owned())
}

#[tokio::test(start_paused = true)]
async fn benchmark_batch_produces_result_log_and_artifacts() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-080000")?;

    let transport = Arc::new(FixedTransport {
        first_token_delay: Duration::from_millis(250),
        text: "a steady stream of generated words",
    });
    let runner = Arc::new(StreamRunner::new(transport, Arc::new(WordTokenizer)));
    let options = IterationOptions {
        save_responses: true,
        ..IterationOptions::default()
    };

    let result = run_provider_benchmark(
        &runner,
        &provider("alpha"),
        TestMode::Streaming,
        &options,
        &session,
    )
    .await?;

    assert!(result.success);
    assert_eq!(result.ttft, Duration::from_millis(250));
    assert_eq!(result.e2e_latency, Duration::from_millis(250));
    assert!(result.ttft <= result.e2e_latency);
    assert_eq!(result.completion_tokens, 6);

    // Per-provider log file.
    assert!(session.log_dir.join("alpha-20260101-080000.log").is_file());
    // One response artifact per repetition.
    for run in 1..=3 {
        assert!(
            session
                .log_dir
                .join(format!("alpha-run{run}-streaming-response.txt"))
                .is_file()
        );
    }
    // One persisted result record.
    let saved = std::fs::read_dir(&session.results_dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .count();
    assert_eq!(saved, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn diagnostic_session_runs_the_full_worker_pool() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-090000")?;

    let transport = Arc::new(FixedTransport {
        first_token_delay: Duration::from_millis(100),
        text: "short diagnostic completion",
    });
    let runner = Arc::new(StreamRunner::new(transport, Arc::new(WordTokenizer)));

    let summary = run_diagnostic(
        &runner,
        &provider("alpha"),
        TestMode::Streaming,
        &DiagnosticOptions::default(),
        &session,
    )
    .await?;

    // 10 workers, 4 requests each before the stop rule fires.
    assert_eq!(summary.total_requests, 40);
    assert_eq!(summary.successful, 40);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.avg_ttft, Duration::from_millis(100));
    assert!(
        session
            .log_dir
            .join("alpha-diagnostic-20260101-090000.log")
            .is_file()
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn results_from_multiple_providers_rank_by_throughput() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-100000")?;
    let options = IterationOptions::default();

    let mut results = Vec::new();
    for (name, delay_ms) in [("slow", 2000u64), ("fast", 100u64)] {
        let transport = Arc::new(FixedTransport {
            first_token_delay: Duration::from_millis(delay_ms),
            text: "same completion text every time",
        });
        let runner = Arc::new(StreamRunner::new(transport, Arc::new(WordTokenizer)));
        results.push(
            run_provider_benchmark(&runner, &provider(name), TestMode::Streaming, &options, &session)
                .await?,
        );
    }

    let ranked = by_throughput(&results);
    assert_eq!(ranked.len(), 2);
    // Identical zero-interval throughput: stable sort keeps insertion order.
    assert_eq!(ranked.first().map(|r| r.provider.as_str()), Some("slow"));

    let by_first = llmspeed::metrics::by_ttft(&results);
    assert_eq!(by_first.first().map(|r| r.provider.as_str()), Some("fast"));
    Ok(())
}
