use std::sync::Arc;

use tokio::time::{Duration, Instant};

use super::*;
use crate::error::AppResult;
use crate::sinks::{ProviderLogHandle, setup_provider_log};
use crate::test_support::{
    ScriptedTransport, StalledTransport, Step, WhitespaceTokenizer, content_chunk,
    empty_choices_chunk, reasoning_chunk, test_provider, tool_chunk,
};

fn test_log(dir: &tempfile::TempDir) -> ProviderLogHandle {
    setup_provider_log(dir.path().join("test.log"))
}

fn runner(transport: Arc<dyn ChatTransport>) -> StreamRunner {
    StreamRunner::new(transport, Arc::new(WhitespaceTokenizer))
}

fn far_deadline() -> RunDeadline {
    RunDeadline::session(Instant::now() + Duration::from_secs(300))
}

#[tokio::test(start_paused = true)]
async fn measures_ttft_and_e2e_from_event_arrival() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![
        Step::Sleep(Duration::from_millis(200)),
        Step::Yield(content_chunk("three word story")),
        Step::Sleep(Duration::from_millis(800)),
        Step::Yield(content_chunk(" ends")),
    ]);

    let metrics = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await?;

    assert_eq!(metrics.ttft, Duration::from_millis(200));
    assert_eq!(metrics.e2e, Duration::from_millis(1000));
    assert!(metrics.ttft <= metrics.e2e);
    assert_eq!(metrics.tokens, 4);
    // (4 - 1) tokens over the 0.8s generation interval.
    assert!((metrics.throughput - 3.75).abs() < 1e-9);
    assert_eq!(metrics.response, "three word story ends");
    assert!(!metrics.saw_reasoning);
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn tool_only_stream_sets_first_token() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![
        Step::Sleep(Duration::from_millis(150)),
        Step::Yield(tool_chunk(Some("get_weather"), Some(""))),
        Step::Yield(tool_chunk(None, Some("{\"location\": \"Tokyo\"}"))),
    ]);

    let metrics = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::ToolCalling,
            far_deadline(),
            &log.sink,
        )
        .await?;

    assert_eq!(metrics.ttft, Duration::from_millis(150));
    assert!(metrics.response.starts_with("get_weather"));
    assert!(metrics.response.contains("Tokyo"));
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reasoning_counts_as_first_token_and_content() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![
        Step::Sleep(Duration::from_millis(100)),
        Step::Yield(reasoning_chunk("thinking about it ")),
        Step::Yield(content_chunk("answer")),
    ]);

    let metrics = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await?;

    assert_eq!(metrics.ttft, Duration::from_millis(100));
    assert!(metrics.saw_reasoning);
    assert_eq!(metrics.response, "thinking about it answer");
    log.close().await?;
    Ok(())
}

#[tokio::test]
async fn stream_with_no_payload_is_no_content() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![
        Step::Yield(empty_choices_chunk()),
        Step::Yield(empty_choices_chunk()),
    ]);

    let outcome = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await;

    assert!(matches!(outcome, Err(RunError::NoContent { chunks: 2 })));
    log.close().await?;
    Ok(())
}

#[tokio::test]
async fn noise_that_tokenizes_to_nothing_is_empty_completion() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![Step::Yield(content_chunk("   "))]);

    let outcome = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await;

    assert!(matches!(
        outcome,
        Err(RunError::EmptyCompletion { bytes: 3 })
    ));
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn single_token_completion_has_zero_throughput() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![
        Step::Sleep(Duration::from_millis(50)),
        Step::Yield(content_chunk("one")),
        Step::Sleep(Duration::from_millis(500)),
    ]);

    let metrics = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await?;

    assert_eq!(metrics.tokens, 1);
    assert!(metrics.throughput.abs() < f64::EPSILON);
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn instant_completion_clamps_throughput_to_zero() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    // Every event arrives at the same paused-clock instant, so the
    // generation interval is exactly zero.
    let transport = ScriptedTransport::single(vec![
        Step::Yield(content_chunk("a few tokens here")),
        Step::Yield(content_chunk(" and more")),
    ]);

    let metrics = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await?;

    assert!(metrics.tokens > 1);
    assert!(metrics.throughput.abs() < f64::EPSILON);
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn session_deadline_expiry_is_a_timeout() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let deadline = RunDeadline::session(Instant::now() + Duration::from_millis(50));

    let outcome = runner(Arc::new(StalledTransport))
        .execute(&test_provider(), RequestKind::Streaming, deadline, &log.sink)
        .await;

    assert!(matches!(
        outcome,
        Err(RunError::Timeout {
            scope: DeadlineScope::Session
        })
    ));
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn clamped_deadline_reports_request_scope() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let session_end = Instant::now() + Duration::from_secs(90);
    let deadline = RunDeadline::clamped(session_end, Duration::from_secs(30));
    assert_eq!(deadline.scope, DeadlineScope::Request);

    let outcome = runner(Arc::new(StalledTransport))
        .execute(&test_provider(), RequestKind::Streaming, deadline, &log.sink)
        .await;

    assert!(matches!(
        outcome,
        Err(RunError::Timeout {
            scope: DeadlineScope::Request
        })
    ));
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn clamp_falls_back_to_session_when_budget_is_short() {
    let session_end = Instant::now() + Duration::from_secs(10);
    let deadline = RunDeadline::clamped(session_end, Duration::from_secs(30));
    assert_eq!(deadline.scope, DeadlineScope::Session);
    assert_eq!(deadline.at, session_end);
}

#[tokio::test]
async fn mid_stream_failure_propagates() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![
        Step::Yield(content_chunk("partial")),
        Step::Fail("connection reset by peer".to_owned()),
    ]);

    let outcome = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await;

    assert!(matches!(
        outcome,
        Err(RunError::StreamReceive(ref message)) if message == "connection reset by peer"
    ));
    log.close().await?;
    Ok(())
}

#[tokio::test]
async fn stream_creation_failure_propagates() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::new(Vec::new());

    let outcome = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await;

    assert!(matches!(outcome, Err(RunError::StreamCreation(_))));
    log.close().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_choices_do_not_set_first_token() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let log = test_log(&dir);
    let transport = ScriptedTransport::single(vec![
        Step::Yield(empty_choices_chunk()),
        Step::Sleep(Duration::from_millis(400)),
        Step::Yield(content_chunk("late words arrive")),
    ]);

    let metrics = runner(transport)
        .execute(
            &test_provider(),
            RequestKind::Streaming,
            far_deadline(),
            &log.sink,
        )
        .await?;

    assert_eq!(metrics.ttft, Duration::from_millis(400));
    log.close().await?;
    Ok(())
}

#[test]
fn long_story_flag_switches_the_streaming_prompt() {
    let plain = runner(ScriptedTransport::new(Vec::new()));
    let request = plain.build_request(&test_provider(), RequestKind::Streaming);
    assert_eq!(request.messages.len(), 1);

    let long = runner(ScriptedTransport::new(Vec::new())).with_long_story(true);
    let request = long.build_request(&test_provider(), RequestKind::Streaming);
    assert_eq!(request.messages.len(), 2);
    assert_eq!(
        request.messages.first().map(|m| m.role.as_str()),
        Some("system")
    );

    // Tool-calling requests are unaffected and carry the tool definition.
    let request = long.build_request(&test_provider(), RequestKind::ToolCalling);
    assert_eq!(request.messages.len(), 1);
    assert!(request.tools.is_some());
}
