//! Execution of one timed streaming request.
#[cfg(test)]
mod tests;

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::time::{Duration, Instant, sleep_until};

use crate::api::{ChatMessage, ChatRequest, ChatTransport};
use crate::args::RequestKind;
use crate::error::{DeadlineScope, RunError};
use crate::metrics::RunMetrics;
use crate::prompts;
use crate::providers::ProviderConfig;
use crate::sinks::ProviderLog;
use crate::tokenizer::TokenCounter;

const MAX_COMPLETION_TOKENS: u32 = 512;

/// A point in time a run must not outlive, tagged with which of the nested
/// deadlines it represents.
#[derive(Debug, Clone, Copy)]
pub struct RunDeadline {
    pub at: Instant,
    pub scope: DeadlineScope,
}

impl RunDeadline {
    /// Outer batch/session deadline.
    #[must_use]
    pub const fn session(at: Instant) -> Self {
        Self {
            at,
            scope: DeadlineScope::Session,
        }
    }

    /// Per-request deadline clamped to the remaining session budget: the
    /// request gets `per_request` from now unless the session ends sooner.
    #[must_use]
    pub fn clamped(session_deadline: Instant, per_request: Duration) -> Self {
        let request_at = Instant::now() + per_request;
        if request_at < session_deadline {
            Self {
                at: request_at,
                scope: DeadlineScope::Request,
            }
        } else {
            Self::session(session_deadline)
        }
    }

    fn expired(self) -> RunError {
        RunError::Timeout { scope: self.scope }
    }
}

/// Issues one streaming request at a time and reduces the incremental
/// response into timing metrics. Stateless across runs; one instance is
/// shared by every concurrent repetition and worker.
pub struct StreamRunner {
    transport: Arc<dyn ChatTransport>,
    tokenizer: Arc<dyn TokenCounter>,
    long_story: bool,
}

impl StreamRunner {
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, tokenizer: Arc<dyn TokenCounter>) -> Self {
        Self {
            transport,
            tokenizer,
            long_story: false,
        }
    }

    /// Use the long-story prompt pair for streaming runs.
    #[must_use]
    pub const fn with_long_story(mut self, long_story: bool) -> Self {
        self.long_story = long_story;
        self
    }

    fn build_request(&self, provider: &ProviderConfig, kind: RequestKind) -> ChatRequest {
        let (messages, tools) = match kind {
            RequestKind::Streaming if self.long_story => (
                vec![
                    ChatMessage::system(prompts::LONG_STORY_SYSTEM_PROMPT),
                    ChatMessage::user(prompts::LONG_STORY_USER_PROMPT),
                ],
                None,
            ),
            RequestKind::Streaming => (vec![ChatMessage::user(prompts::STORY_PROMPT)], None),
            RequestKind::ToolCalling => (
                vec![ChatMessage::user(prompts::WEATHER_PROMPT)],
                Some(vec![prompts::weather_tool()]),
            ),
        };
        ChatRequest {
            model: provider.model.clone(),
            messages,
            max_tokens: MAX_COMPLETION_TOKENS,
            stream: true,
            tools,
        }
    }

    /// Performs one timed request and returns its metrics.
    ///
    /// Events are consumed strictly in arrival order; the first event
    /// carrying content, reasoning or a tool-call fragment fixes the TTFT
    /// timestamp exactly once. The deadline is observed between every
    /// suspension point, so an expired context aborts the run promptly
    /// instead of hanging on the next event.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] describing the failure; no valid timing fields
    /// exist for a failed run.
    pub async fn execute(
        &self,
        provider: &ProviderConfig,
        kind: RequestKind,
        deadline: RunDeadline,
        log: &ProviderLog,
    ) -> Result<RunMetrics, RunError> {
        let request = self.build_request(provider, kind);
        let name = provider.name.as_str();

        let started = Instant::now();
        let open = self.transport.open_stream(provider, &request);
        tokio::pin!(open);
        let mut stream = tokio::select! {
            () = sleep_until(deadline.at) => return Err(deadline.expired()),
            opened = &mut open => opened?,
        };

        match kind {
            RequestKind::Streaming => {
                log.log(format!("[{name}] ... Request sent. Waiting for stream ..."));
            }
            RequestKind::ToolCalling => {
                log.log(format!(
                    "[{name}] ... Tool calling request sent. Waiting for stream ..."
                ));
            }
        }

        let mut first_token_at: Option<Instant> = None;
        let mut response = String::new();
        let mut chunk_count: u64 = 0;
        let mut content_chunks: u64 = 0;
        let mut reasoning_chunks: u64 = 0;
        let mut tool_chunks: u64 = 0;

        loop {
            let item = tokio::select! {
                () = sleep_until(deadline.at) => return Err(deadline.expired()),
                item = stream.next() => item,
            };
            let chunk = match item {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => return Err(err),
            };
            chunk_count += 1;

            let Some(choice) = chunk.choices.first() else {
                if chunk_count % 100 == 0 {
                    log.log(format!(
                        "[{name}] ... Chunk {chunk_count}: Empty Choices array (diagnostic: ID={}, Model={})",
                        chunk.id, chunk.model
                    ));
                }
                continue;
            };
            let delta = &choice.delta;

            let content = delta.content_text();
            let reasoning = delta.reasoning_text();
            let tool_fragments = delta.tool_call_fragments();

            if (content.is_some() || reasoning.is_some() || !tool_fragments.is_empty())
                && first_token_at.is_none()
            {
                first_token_at = Some(Instant::now());
                if reasoning.is_some() {
                    log.log(format!(
                        "[{name}] ... First token received (reasoning)! (chunk {chunk_count})"
                    ));
                } else if !tool_fragments.is_empty() {
                    log.log(format!(
                        "[{name}] ... First token received (tool-call)! (chunk {chunk_count})"
                    ));
                } else {
                    log.log(format!(
                        "[{name}] ... First token received! (chunk {chunk_count})"
                    ));
                }
            }

            if let Some(text) = content {
                content_chunks += 1;
                response.push_str(text);
            }
            if let Some(text) = reasoning {
                reasoning_chunks += 1;
                response.push_str(text);
            }
            if !tool_fragments.is_empty() {
                tool_chunks += 1;
                for fragment in tool_fragments {
                    if let Some(function) = fragment.function.as_ref() {
                        if let Some(tool_name) = function.name.as_deref() {
                            response.push_str(tool_name);
                        }
                        if let Some(arguments) = function.arguments.as_deref() {
                            response.push_str(arguments);
                        }
                    }
                }
            }
        }

        let ended = Instant::now();
        log.log(format!(
            "[{name}] ... Stream complete. Received {chunk_count} chunks \
             ({content_chunks} content, {reasoning_chunks} reasoning, {tool_chunks} tool)"
        ));

        let Some(first_token) = first_token_at else {
            return Err(RunError::NoContent {
                chunks: chunk_count,
            });
        };

        let tokens = self.tokenizer.count(&response);
        log.log(format!(
            "[{name}] ... Total content length: {} bytes, {tokens} tokens",
            response.len()
        ));
        if tokens == 0 {
            return Err(RunError::EmptyCompletion {
                bytes: response.len(),
            });
        }

        let e2e = ended.duration_since(started);
        let ttft = first_token.duration_since(started);
        let generation_secs = e2e.saturating_sub(ttft).as_secs_f64();
        let throughput = if generation_secs <= 0.0 {
            0.0
        } else {
            (tokens as f64 - 1.0) / generation_secs
        };

        Ok(RunMetrics {
            e2e,
            ttft,
            throughput,
            tokens,
            response,
            kind,
            saw_reasoning: reasoning_chunks > 0,
        })
    }
}
