use serde::{Deserialize, Serialize};

/// How one request is shaped: a plain streamed completion or a streamed
/// completion with a function-calling tool attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    Streaming,
    ToolCalling,
}

impl RequestKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestKind::Streaming => "streaming",
            RequestKind::ToolCalling => "tool-calling",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall test mode for a provider invocation. Mixed expands into both
/// request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestMode {
    Streaming,
    ToolCalling,
    Mixed,
}

impl TestMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TestMode::Streaming => "streaming",
            TestMode::ToolCalling => "tool-calling",
            TestMode::Mixed => "mixed",
        }
    }

    /// The request kinds a single invocation of this mode runs.
    #[must_use]
    pub const fn kinds(self) -> &'static [RequestKind] {
        match self {
            TestMode::Streaming => &[RequestKind::Streaming],
            TestMode::ToolCalling => &[RequestKind::ToolCalling],
            TestMode::Mixed => &[RequestKind::Streaming, RequestKind::ToolCalling],
        }
    }

    /// Request kind for the n-th request (1-based) a diagnostic worker
    /// issues. Mixed alternates: odd requests stream, even requests call the
    /// tool.
    #[must_use]
    pub const fn kind_for_request(self, request_num: usize) -> RequestKind {
        match self {
            TestMode::Streaming => RequestKind::Streaming,
            TestMode::ToolCalling => RequestKind::ToolCalling,
            TestMode::Mixed => {
                if request_num % 2 == 1 {
                    RequestKind::Streaming
                } else {
                    RequestKind::ToolCalling
                }
            }
        }
    }
}

impl std::fmt::Display for TestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the flag triple into a test mode.
///
/// Returns `(mode, reasoning_check, forced_tool_calling)`. A reasoning check
/// needs tool traffic to observe reasoning deltas, so `--reasoning` without
/// an explicit mode forces tool-calling and reports that it did.
#[must_use]
pub const fn resolve_test_mode(
    tool_calling: bool,
    mixed: bool,
    reasoning: bool,
) -> (TestMode, bool, bool) {
    if mixed {
        return (TestMode::Mixed, reasoning, false);
    }
    if tool_calling {
        return (TestMode::ToolCalling, reasoning, false);
    }
    if reasoning {
        return (TestMode::ToolCalling, true, true);
    }
    (TestMode::Streaming, false, false)
}
