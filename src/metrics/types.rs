use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::args::{RequestKind, TestMode};
use crate::error::RunError;

/// Formats a duration as decimal seconds, e.g. `1.234s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

/// Measurements of one successful timed request. Failures are carried as
/// [`RunError`] instead; a failed run has no valid timing fields.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub e2e: Duration,
    pub ttft: Duration,
    /// Generated tokens per second, excluding the first token. Zero when the
    /// completion has at most one token or the generation interval is empty.
    pub throughput: f64,
    pub tokens: usize,
    pub response: String,
    pub kind: RequestKind,
    pub saw_reasoning: bool,
}

impl RunMetrics {
    /// Time spent generating after the first token arrived.
    #[must_use]
    pub fn generation_interval(&self) -> Duration {
        self.e2e.saturating_sub(self.ttft)
    }
}

/// One run's result as it travels from a repetition/worker task to the
/// aggregation step.
#[derive(Debug)]
pub struct RunRecord {
    pub sequence: usize,
    pub kind: RequestKind,
    pub outcome: Result<RunMetrics, RunError>,
}

/// Averaged benchmark result for one (provider, mode) invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub provider: String,
    pub model: String,
    pub mode: TestMode,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "e2eLatencyMs", with = "duration_millis")]
    pub e2e_latency: Duration,
    #[serde(rename = "ttftMs", with = "duration_millis")]
    pub ttft: Duration,
    #[serde(rename = "throughputTokensPerSec")]
    pub throughput: f64,
    pub completion_tokens: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    /// An error-only record for a batch with zero successful runs.
    #[must_use]
    pub fn failure(provider: &str, model: &str, mode: TestMode, error: String) -> Self {
        Self {
            provider: provider.to_owned(),
            model: model.to_owned(),
            mode,
            timestamp: Utc::now(),
            e2e_latency: Duration::ZERO,
            ttft: Duration::ZERO,
            throughput: 0.0,
            completion_tokens: 0,
            success: false,
            error: Some(error),
        }
    }
}

/// Aggregate of one sustained diagnostic session for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSummary {
    pub provider: String,
    pub model: String,
    pub mode: TestMode,
    pub timestamp: DateTime<Utc>,
    pub total_requests: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(rename = "avgE2eLatencyMs", with = "duration_millis")]
    pub avg_e2e_latency: Duration,
    #[serde(rename = "avgTtftMs", with = "duration_millis")]
    pub avg_ttft: Duration,
    pub avg_throughput: f64,
    pub avg_tokens: usize,
    /// Distinct error message -> occurrence count over failed requests.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, usize>,
}

impl DiagnosticSummary {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        100.0 * self.successful as f64 / self.total_requests as f64
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
