use thiserror::Error;

/// Which of the two nested deadlines expired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineScope {
    Session,
    Request,
}

impl DeadlineScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DeadlineScope::Session => "session",
            DeadlineScope::Request => "request",
        }
    }
}

impl std::fmt::Display for DeadlineScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single timed request. Every variant is captured inside the
/// stream runner and returned as a value; nothing crosses a task boundary as
/// a panic.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("error creating stream: {0}")]
    StreamCreation(String),
    #[error("stream error: {0}")]
    StreamReceive(String),
    #[error("timeout exceeded ({scope} deadline)")]
    Timeout { scope: DeadlineScope },
    #[error("no content received from API (received {chunks} chunks)")]
    NoContent { chunks: u64 },
    #[error("received 0 tokens (content length: {bytes} bytes)")]
    EmptyCompletion { bytes: usize },
}
