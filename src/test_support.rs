//! Shared fixtures for engine tests: scripted transports and a trivial
//! tokenizer.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{StreamExt, future, stream};
use tokio::time::{Duration, sleep};

use crate::api::{
    ChatEventStream, ChatRequest, ChatStreamChunk, ChatTransport, Delta, DeltaFunction,
    DeltaToolCall, StreamChoice,
};
use crate::error::RunError;
use crate::providers::ProviderConfig;
use crate::tokenizer::TokenCounter;

/// One scripted stream event: a delay, a chunk, or a mid-stream failure.
#[derive(Clone)]
pub(crate) enum Step {
    Sleep(Duration),
    Yield(ChatStreamChunk),
    Fail(String),
}

pub(crate) fn content_chunk(text: &str) -> ChatStreamChunk {
    ChatStreamChunk {
        choices: vec![StreamChoice {
            delta: Delta {
                content: Some(text.to_owned()),
                ..Delta::default()
            },
            ..StreamChoice::default()
        }],
        ..ChatStreamChunk::default()
    }
}

pub(crate) fn reasoning_chunk(text: &str) -> ChatStreamChunk {
    ChatStreamChunk {
        choices: vec![StreamChoice {
            delta: Delta {
                reasoning_content: Some(text.to_owned()),
                ..Delta::default()
            },
            ..StreamChoice::default()
        }],
        ..ChatStreamChunk::default()
    }
}

pub(crate) fn tool_chunk(name: Option<&str>, arguments: Option<&str>) -> ChatStreamChunk {
    ChatStreamChunk {
        choices: vec![StreamChoice {
            delta: Delta {
                tool_calls: Some(vec![DeltaToolCall {
                    index: Some(0),
                    id: None,
                    function: Some(DeltaFunction {
                        name: name.map(str::to_owned),
                        arguments: arguments.map(str::to_owned),
                    }),
                }]),
                ..Delta::default()
            },
            ..StreamChoice::default()
        }],
        ..ChatStreamChunk::default()
    }
}

pub(crate) fn empty_choices_chunk() -> ChatStreamChunk {
    ChatStreamChunk::default()
}

pub(crate) fn scripted_stream(steps: Vec<Step>) -> ChatEventStream {
    stream::iter(steps)
        .then(|step| async move {
            match step {
                Step::Sleep(duration) => {
                    sleep(duration).await;
                    None
                }
                Step::Yield(chunk) => Some(Ok(chunk)),
                Step::Fail(message) => Some(Err(RunError::StreamReceive(message))),
            }
        })
        .filter_map(future::ready)
        .boxed()
}

/// Transport that replays one scripted stream per call, in push order.
pub(crate) struct ScriptedTransport {
    scripts: Mutex<std::collections::VecDeque<Vec<Step>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(scripts: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
        })
    }

    pub(crate) fn single(steps: Vec<Step>) -> Arc<Self> {
        Self::new(vec![steps])
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        _provider: &ProviderConfig,
        _request: &ChatRequest,
    ) -> Result<ChatEventStream, RunError> {
        let steps = self
            .scripts
            .lock()
            .map_err(|_| RunError::StreamCreation("script mutex poisoned".to_owned()))?
            .pop_front();
        match steps {
            Some(steps) => Ok(scripted_stream(steps)),
            None => Err(RunError::StreamCreation(
                "no scripted stream left".to_owned(),
            )),
        }
    }
}

/// Transport that scripts each stream from the request it receives; lets a
/// test react to request shape (e.g. whether tools are attached).
pub(crate) struct FnTransport<F>(pub(crate) F);

#[async_trait]
impl<F> ChatTransport for FnTransport<F>
where
    F: Fn(&ChatRequest) -> Result<Vec<Step>, RunError> + Send + Sync,
{
    async fn open_stream(
        &self,
        _provider: &ProviderConfig,
        request: &ChatRequest,
    ) -> Result<ChatEventStream, RunError> {
        (self.0)(request).map(scripted_stream)
    }
}

/// Transport whose stream never yields, to exercise deadline expiry.
pub(crate) struct StalledTransport;

#[async_trait]
impl ChatTransport for StalledTransport {
    async fn open_stream(
        &self,
        _provider: &ProviderConfig,
        _request: &ChatRequest,
    ) -> Result<ChatEventStream, RunError> {
        Ok(stream::pending().boxed())
    }
}

/// Deterministic stand-in for the real encoder.
pub(crate) struct WhitespaceTokenizer;

impl TokenCounter for WhitespaceTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

pub(crate) fn test_provider() -> ProviderConfig {
    ProviderConfig {
        name: "test".to_owned(),
        base_url: "https://api.example.com/v1".to_owned(),
        api_key: "test-key".to_owned(),
        model: "test-model".to_owned(),
    }
}
