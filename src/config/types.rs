use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::args::TestMode;
use crate::bench::IterationOptions;
use crate::diagnostic::DiagnosticOptions;

/// Root of a TOML config file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub global: GlobalSettings,
    /// Provider name -> API key; values may reference environment variables
    /// as `${VAR}` or `$VAR`.
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
    #[serde(default)]
    pub groups: Vec<TestGroup>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub save_responses: bool,
    pub log_level: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub results_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub mode: GroupMode,
    #[serde(default)]
    pub concurrent: bool,
    #[serde(default)]
    pub providers: Vec<GroupProvider>,
    pub test_params: Option<TestParams>,
    pub diagnostic_params: Option<DiagnosticParams>,
}

/// Modes a config group can select. Unlike the CLI, `diagnostic` is a mode
/// here rather than a separate switch; diagnostic groups stream by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupMode {
    Streaming,
    ToolCalling,
    Mixed,
    Diagnostic,
}

impl GroupMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            GroupMode::Streaming => "streaming",
            GroupMode::ToolCalling => "tool-calling",
            GroupMode::Mixed => "mixed",
            GroupMode::Diagnostic => "diagnostic",
        }
    }

    #[must_use]
    pub const fn is_diagnostic(self) -> bool {
        matches!(self, GroupMode::Diagnostic)
    }

    #[must_use]
    pub const fn test_mode(self) -> TestMode {
        match self {
            GroupMode::Streaming | GroupMode::Diagnostic => TestMode::Streaming,
            GroupMode::ToolCalling => TestMode::ToolCalling,
            GroupMode::Mixed => TestMode::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupProvider {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct TestParams {
    pub iterations: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub save_responses: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DiagnosticParams {
    pub duration_seconds: Option<u64>,
    pub workers: Option<usize>,
    pub interval_seconds: Option<u64>,
    pub timeout_per_request_seconds: Option<u64>,
    pub save_responses: Option<bool>,
}

impl TestGroup {
    /// Iteration tuning for this group after defaults were merged.
    #[must_use]
    pub fn iteration_options(&self, global: &GlobalSettings) -> IterationOptions {
        let params = self.test_params.clone().unwrap_or_default();
        let defaults = IterationOptions::default();
        IterationOptions {
            iterations: params.iterations.unwrap_or(defaults.iterations),
            batch_deadline: params
                .timeout_seconds
                .or(global.timeout_seconds)
                .map_or(defaults.batch_deadline, Duration::from_secs),
            save_responses: params.save_responses.unwrap_or(global.save_responses),
            reasoning_check: false,
        }
    }

    /// Diagnostic tuning for this group after defaults were merged.
    #[must_use]
    pub fn diagnostic_options(&self, global: &GlobalSettings) -> DiagnosticOptions {
        let params = self.diagnostic_params.clone().unwrap_or_default();
        let defaults = DiagnosticOptions::default();
        DiagnosticOptions {
            session_duration: params
                .duration_seconds
                .map_or(defaults.session_duration, Duration::from_secs),
            workers: params.workers.unwrap_or(defaults.workers),
            interval: params
                .interval_seconds
                .map_or(defaults.interval, Duration::from_secs),
            request_timeout: params
                .timeout_per_request_seconds
                .map_or(defaults.request_timeout, Duration::from_secs),
            grace: defaults.grace,
            save_responses: params.save_responses.unwrap_or(global.save_responses),
        }
    }
}
