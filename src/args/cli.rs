use clap::Parser;

/// Speed tester for streaming LLM chat-completion endpoints.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "llmspeed",
    version,
    about = "Measures TTFT, end-to-end latency and token throughput of streaming chat-completion endpoints."
)]
pub struct BenchArgs {
    /// Specific provider to test (e.g., nim, novita). If empty, tests the
    /// 'generic' provider.
    #[arg(long)]
    pub provider: Option<String>,

    /// Test all configured providers concurrently.
    #[arg(long)]
    pub all: bool,

    /// Override base URL for the 'generic' provider.
    #[arg(long)]
    pub url: Option<String>,

    /// Model name for the 'generic' provider (required if --provider is not
    /// set).
    #[arg(long)]
    pub model: Option<String>,

    /// Use tool-calling mode instead of regular streaming.
    #[arg(long)]
    pub tool_calling: bool,

    /// Run both streaming and tool-calling modes (3 runs each).
    #[arg(long)]
    pub mixed: bool,

    /// Check whether the model streams reasoning content (implies
    /// tool-calling unless another mode is selected).
    #[arg(long)]
    pub reasoning: bool,

    /// Run diagnostic mode: 10 workers making requests every 15s for 90s
    /// with a 30s timeout per request.
    #[arg(long)]
    pub diagnostic: bool,

    /// Save all API responses to the session log directory.
    #[arg(long)]
    pub save_responses: bool,

    /// Use the long-story prompt pair for streaming runs instead of the
    /// short story prompt.
    #[arg(long)]
    pub long_story: bool,

    /// Path to a TOML config file describing test groups.
    #[arg(long)]
    pub config: Option<String>,

    /// Run only the named group from the config file.
    #[arg(long, requires = "config")]
    pub group: Option<String>,

    /// List the groups defined in the config file and exit.
    #[arg(long, requires = "config")]
    pub list_groups: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}
