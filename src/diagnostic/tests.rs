use std::sync::Arc;
use std::sync::Mutex;

use tokio::time::Duration;

use super::*;
use crate::api::ChatRequest;
use crate::test_support::{FnTransport, Step, WhitespaceTokenizer, content_chunk, test_provider};

#[test]
fn stop_rule_follows_timeout_plus_grace() {
    let timeout = Duration::from_secs(30);
    let grace = Duration::from_secs(5);

    assert!(should_start_next(Duration::from_secs(35), timeout, grace));
    assert!(should_start_next(Duration::from_secs(40), timeout, grace));
    assert!(!should_start_next(Duration::from_secs(34), timeout, grace));
    assert!(!should_start_next(Duration::from_secs(30), timeout, grace));
    assert!(!should_start_next(Duration::ZERO, timeout, grace));
}

fn instant_success_transport() -> Arc<dyn crate::api::ChatTransport> {
    Arc::new(FnTransport(
        |_request: &ChatRequest| -> Result<Vec<Step>, crate::error::RunError> {
            Ok(vec![Step::Yield(content_chunk("quick brown fox"))])
        },
    ))
}

fn session(root: &tempfile::TempDir, timestamp: &str) -> AppResult<SessionPaths> {
    let root_str = root.path().to_string_lossy().into_owned();
    SessionPaths::create_with_timestamp(&root_str, timestamp.to_owned())
}

#[tokio::test(start_paused = true)]
async fn each_worker_issues_four_requests_in_a_standard_session() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-150000")?;

    let runner = Arc::new(StreamRunner::new(
        instant_success_transport(),
        Arc::new(WhitespaceTokenizer),
    ));
    let provider = Arc::new(test_provider());
    let options = DiagnosticOptions {
        workers: 2,
        save_responses: false,
        ..DiagnosticOptions::default()
    };

    let summary = run_diagnostic(&runner, &provider, TestMode::Streaming, &options, &session)
        .await?;

    // 90s session, 15s interval, 30s timeout, 5s grace: requests at t=0, 15,
    // 30 and 45, then the t=60 tick finds 30s remaining < 35s required.
    assert_eq!(summary.total_requests, 8);
    assert_eq!(summary.successful, 8);
    assert_eq!(summary.failed, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.avg_tokens, 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn mixed_mode_alternates_kinds_per_worker() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-160000")?;

    // Record whether each request carried the tool definition, in order.
    let tool_flags = Arc::new(Mutex::new(Vec::new()));
    let transport = {
        let tool_flags = Arc::clone(&tool_flags);
        Arc::new(FnTransport(move |request: &ChatRequest| {
            if let Ok(mut flags) = tool_flags.lock() {
                flags.push(request.tools.is_some());
            }
            Ok(vec![Step::Yield(content_chunk("steady output"))])
        }))
    };
    let runner = Arc::new(StreamRunner::new(transport, Arc::new(WhitespaceTokenizer)));
    let provider = Arc::new(test_provider());
    let options = DiagnosticOptions {
        workers: 1,
        ..DiagnosticOptions::default()
    };

    let summary = run_diagnostic(&runner, &provider, TestMode::Mixed, &options, &session).await?;

    assert_eq!(summary.total_requests, 4);
    let flags = tool_flags.lock().map(|flags| flags.clone()).unwrap_or_default();
    // Odd request numbers stream, even ones call the tool.
    assert_eq!(flags, vec![false, true, false, true]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn identical_error_texts_share_one_counter() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-170000")?;

    let transport = Arc::new(FnTransport(
        |_request: &ChatRequest| -> Result<Vec<Step>, crate::error::RunError> {
            Err(crate::error::RunError::StreamCreation(
                "connection refused".to_owned(),
            ))
        },
    ));
    let runner = Arc::new(StreamRunner::new(transport, Arc::new(WhitespaceTokenizer)));
    let provider = Arc::new(test_provider());
    let options = DiagnosticOptions {
        workers: 2,
        ..DiagnosticOptions::default()
    };

    let summary = run_diagnostic(&runner, &provider, TestMode::Streaming, &options, &session)
        .await?;

    assert_eq!(summary.successful, 0);
    assert_eq!(summary.failed, summary.total_requests);
    // Zero successes: averages stay zero, the error table carries the story.
    assert_eq!(summary.avg_e2e_latency, Duration::ZERO);
    assert!(summary.avg_throughput.abs() < f64::EPSILON);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(
        summary
            .errors
            .get("error creating stream: connection refused")
            .copied(),
        Some(summary.total_requests)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn distinct_error_texts_get_distinct_keys() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-180000")?;

    // Streaming requests fail one way, tool requests another.
    let transport = Arc::new(FnTransport(
        |request: &ChatRequest| -> Result<Vec<Step>, crate::error::RunError> {
            if request.tools.is_some() {
                Err(crate::error::RunError::StreamCreation(
                    "tool endpoint down".to_owned(),
                ))
            } else {
                Err(crate::error::RunError::StreamCreation(
                    "connection refused".to_owned(),
                ))
            }
        },
    ));
    let runner = Arc::new(StreamRunner::new(transport, Arc::new(WhitespaceTokenizer)));
    let provider = Arc::new(test_provider());
    let options = DiagnosticOptions {
        workers: 1,
        ..DiagnosticOptions::default()
    };

    let summary = run_diagnostic(&runner, &provider, TestMode::Mixed, &options, &session).await?;

    assert_eq!(summary.errors.len(), 2);
    assert_eq!(
        summary
            .errors
            .get("error creating stream: connection refused")
            .copied(),
        Some(2)
    );
    assert_eq!(
        summary
            .errors
            .get("error creating stream: tool endpoint down")
            .copied(),
        Some(2)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn summary_file_is_saved() -> AppResult<()> {
    let root = tempfile::tempdir()?;
    let session = session(&root, "20260101-190000")?;

    let runner = Arc::new(StreamRunner::new(
        instant_success_transport(),
        Arc::new(WhitespaceTokenizer),
    ));
    let provider = Arc::new(test_provider());
    let options = DiagnosticOptions {
        workers: 1,
        ..DiagnosticOptions::default()
    };

    run_diagnostic(&runner, &provider, TestMode::Streaming, &options, &session).await?;

    let saved = std::fs::read_dir(&session.results_dir)?
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("test-diagnostic-summary-")
        })
        .count();
    assert_eq!(saved, 1);
    let log_path = session
        .log_dir
        .join("test-diagnostic-20260101-190000.log");
    assert!(log_path.is_file());
    Ok(())
}
