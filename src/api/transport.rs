use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, future};
use reqwest::Client;
use tracing::debug;

use crate::error::{AppResult, RunError};
use crate::providers::ProviderConfig;

use super::types::{ChatRequest, ChatStreamChunk};

/// Decoded chunks of one streaming response, ending at the `[DONE]` marker.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<ChatStreamChunk, RunError>> + Send>>;

/// Opens streaming chat-completion requests. The runner only depends on this
/// seam, so tests drive it with scripted streams instead of a live endpoint.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`RunError::StreamCreation`] when the stream cannot be
    /// established.
    async fn open_stream(
        &self,
        provider: &ProviderConfig,
        request: &ChatRequest,
    ) -> Result<ChatEventStream, RunError>;
}

/// Production transport: POSTs to `<base_url>/chat/completions` and decodes
/// the SSE body.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: Client,
}

impl HttpChatTransport {
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new() -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open_stream(
        &self,
        provider: &ProviderConfig,
        request: &ChatRequest,
    ) -> Result<ChatEventStream, RunError> {
        let url = format!(
            "{}/chat/completions",
            provider.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&provider.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| RunError::StreamCreation(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RunError::StreamCreation(format!(
                "HTTP {status}: {}",
                body.trim()
            )));
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                let done = matches!(event, Ok(inner) if inner.data == "[DONE]");
                future::ready(!done)
            })
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => match serde_json::from_str::<ChatStreamChunk>(&event.data) {
                        Ok(chunk) => Some(Ok(chunk)),
                        Err(err) => {
                            // Keep-alives and vendor extensions are skipped,
                            // not treated as stream failures.
                            debug!("skipping undecodable stream chunk: {err}");
                            None
                        }
                    },
                    Err(err) => Some(Err(RunError::StreamReceive(err.to_string()))),
                })
            })
            .boxed();

        Ok(stream)
    }
}
