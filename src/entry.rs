use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::api::HttpChatTransport;
use crate::args::{BenchArgs, TestMode, resolve_test_mode};
use crate::bench::{IterationOptions, run_provider_benchmark};
use crate::config::{ConfigFile, group_provider_config, load_config};
use crate::diagnostic::{DiagnosticOptions, run_diagnostic};
use crate::error::{AppError, AppResult, ConfigError};
use crate::metrics::{DiagnosticSummary, TestResult};
use crate::providers::{ProviderConfig, builtin_providers, select_providers};
use crate::report::{write_benchmark_report, write_diagnostic_report};
use crate::runner::StreamRunner;
use crate::sinks::SessionPaths;
use crate::tokenizer::Cl100kCounter;

/// Parses the CLI and runs the selected session to completion.
///
/// # Errors
///
/// Returns an error for configuration-level fatal conditions (no providers
/// selected, unreadable config) and for I/O failures creating the session
/// layout. Per-provider request failures never error the process.
pub fn run() -> AppResult<()> {
    let args = BenchArgs::parse();
    crate::logger::init_logging(args.verbose);

    if dotenvy::dotenv().is_err() {
        info!("Note: .env file not found, reading from system environment.");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_async(args))
}

async fn run_async(args: BenchArgs) -> AppResult<()> {
    if args.config.is_some() {
        return run_config_session(&args).await;
    }

    let (mode, reasoning_check, forced_tool) =
        resolve_test_mode(args.tool_calling, args.mixed, args.reasoning);
    match mode {
        TestMode::Mixed => info!("Test mode: Mixed (streaming + tool-calling)"),
        TestMode::ToolCalling => info!("Test mode: Tool-calling"),
        TestMode::Streaming => info!("Test mode: Streaming"),
    }
    if forced_tool {
        info!("--reasoning selected tool-calling mode to observe reasoning deltas");
    }

    let configs = builtin_providers(&args);
    let selected = select_providers(&args, &configs)?;

    let session = SessionPaths::create("results")?;
    info!("Session folder: {}/", session.session_dir.display());
    info!("Logs will be saved to: {}/", session.log_dir.display());
    info!("Results will be saved to: {}/", session.results_dir.display());

    let runner = build_runner(&args)?;

    if args.diagnostic {
        info!("=== RUNNING IN DIAGNOSTIC MODE ===");
        let options = DiagnosticOptions {
            save_responses: args.save_responses,
            ..DiagnosticOptions::default()
        };
        let summaries = run_diagnostics(
            &runner,
            &selected,
            mode,
            &options,
            &session,
            selected.len() > 1,
        )
        .await;
        info!("--- All diagnostic tests complete. ---");

        info!("Generating diagnostic summary report...");
        if let Err(err) =
            write_diagnostic_report(&session.results_dir, &summaries, &session.timestamp)
        {
            warn!("Failed to generate diagnostic report: {err}");
        }
        info!(
            "Diagnostic tests complete. Results saved to: {}/",
            session.session_dir.display()
        );
        return Ok(());
    }

    let options = IterationOptions {
        save_responses: args.save_responses,
        reasoning_check,
        ..IterationOptions::default()
    };
    let results = run_benchmarks(&runner, &selected, mode, &options, &session, args.all).await;
    if args.all {
        info!("--- All provider tests complete. ---");
    }

    info!("Generating summary report...");
    if let Err(err) = write_benchmark_report(&session.results_dir, &results, &session.timestamp) {
        warn!("Failed to generate report: {err}");
    }
    info!(
        "All tests complete. Results saved to: {}/",
        session.session_dir.display()
    );
    Ok(())
}

fn build_runner(args: &BenchArgs) -> AppResult<Arc<StreamRunner>> {
    let tokenizer = Arc::new(Cl100kCounter::new()?);
    let transport = Arc::new(HttpChatTransport::new()?);
    Ok(Arc::new(
        StreamRunner::new(transport, tokenizer).with_long_story(args.long_story),
    ))
}

/// Runs the iteration batch for each provider, concurrently when requested.
/// A failing provider is logged and skipped; it never aborts the others.
async fn run_benchmarks(
    runner: &Arc<StreamRunner>,
    selected: &[ProviderConfig],
    mode: TestMode,
    options: &IterationOptions,
    session: &SessionPaths,
    concurrent: bool,
) -> Vec<TestResult> {
    let mut results = Vec::with_capacity(selected.len());
    if concurrent && selected.len() > 1 {
        let mut tasks = JoinSet::new();
        for provider in selected {
            let runner = Arc::clone(runner);
            let provider = Arc::new(provider.clone());
            let options = options.clone();
            let session = session.clone();
            tasks.spawn(async move {
                run_provider_benchmark(&runner, &provider, mode, &options, &session).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(err)) => warn!("Provider benchmark failed: {err}"),
                Err(err) => warn!("Benchmark task failed: {err}"),
            }
        }
    } else {
        for provider in selected {
            let provider = Arc::new(provider.clone());
            match run_provider_benchmark(runner, &provider, mode, options, session).await {
                Ok(result) => results.push(result),
                Err(err) => warn!("Provider benchmark failed: {err}"),
            }
        }
    }
    results
}

/// Runs the diagnostic session for each provider, concurrently when there is
/// more than one.
async fn run_diagnostics(
    runner: &Arc<StreamRunner>,
    selected: &[ProviderConfig],
    mode: TestMode,
    options: &DiagnosticOptions,
    session: &SessionPaths,
    concurrent: bool,
) -> Vec<DiagnosticSummary> {
    let mut summaries = Vec::with_capacity(selected.len());
    if concurrent && selected.len() > 1 {
        let mut tasks = JoinSet::new();
        for provider in selected {
            let runner = Arc::clone(runner);
            let provider = Arc::new(provider.clone());
            let options = options.clone();
            let session = session.clone();
            tasks.spawn(async move {
                run_diagnostic(&runner, &provider, mode, &options, &session).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(err)) => warn!("Provider diagnostic failed: {err}"),
                Err(err) => warn!("Diagnostic task failed: {err}"),
            }
        }
    } else {
        for provider in selected {
            let provider = Arc::new(provider.clone());
            match run_diagnostic(runner, &provider, mode, options, session).await {
                Ok(summary) => summaries.push(summary),
                Err(err) => warn!("Provider diagnostic failed: {err}"),
            }
        }
    }
    summaries
}

async fn run_config_session(args: &BenchArgs) -> AppResult<()> {
    let path = args.config.as_deref().unwrap_or_default();
    let config = load_config(Path::new(path))?;

    if args.list_groups {
        print_groups(&config);
        return Ok(());
    }

    let groups: Vec<&crate::config::TestGroup> = match args.group.as_deref() {
        Some(name) => {
            let group = config
                .groups
                .iter()
                .find(|group| group.name == name)
                .ok_or_else(|| {
                    AppError::config(ConfigError::GroupNotFound {
                        name: name.to_owned(),
                    })
                })?;
            vec![group]
        }
        None => config.groups.iter().collect(),
    };

    let results_root = config
        .global
        .results_dir
        .clone()
        .unwrap_or_else(|| "results".to_owned());
    let session = SessionPaths::create(&results_root)?;
    info!("Session folder: {}/", session.session_dir.display());
    info!("Logs will be saved to: {}/", session.log_dir.display());

    let runner = build_runner(args)?;

    let mut results = Vec::new();
    let mut summaries = Vec::new();
    for group in groups {
        info!(
            "--- Running group '{}' ({} provider(s), mode: {}) ---",
            group.name,
            group.providers.len(),
            group.mode.as_str()
        );
        if !group.description.is_empty() {
            info!("{}", group.description);
        }

        let mut providers = Vec::new();
        for entry in &group.providers {
            match group_provider_config(entry, &config.api_keys) {
                Ok(provider) => providers.push(provider),
                Err(err) => warn!("Skipping provider '{}': {err}", entry.provider),
            }
        }

        if group.mode.is_diagnostic() {
            let options = group.diagnostic_options(&config.global);
            summaries.extend(
                run_diagnostics(
                    &runner,
                    &providers,
                    group.mode.test_mode(),
                    &options,
                    &session,
                    group.concurrent,
                )
                .await,
            );
        } else {
            let options = group.iteration_options(&config.global);
            results.extend(
                run_benchmarks(
                    &runner,
                    &providers,
                    group.mode.test_mode(),
                    &options,
                    &session,
                    group.concurrent,
                )
                .await,
            );
        }
    }

    if !results.is_empty() {
        info!("Generating summary report...");
        if let Err(err) = write_benchmark_report(&session.results_dir, &results, &session.timestamp)
        {
            warn!("Failed to generate report: {err}");
        }
    }
    if !summaries.is_empty() {
        info!("Generating diagnostic summary report...");
        if let Err(err) =
            write_diagnostic_report(&session.results_dir, &summaries, &session.timestamp)
        {
            warn!("Failed to generate diagnostic report: {err}");
        }
    }
    info!(
        "All tests complete. Results saved to: {}/",
        session.session_dir.display()
    );
    Ok(())
}

fn print_groups(config: &ConfigFile) {
    println!();
    println!("Available Test Groups:");
    println!("======================");
    for group in &config.groups {
        println!();
        println!("\u{2022} {}", group.name);
        if !group.description.is_empty() {
            println!("  Description: {}", group.description);
        }
        println!("  Mode: {}", group.mode.as_str());
        println!("  Providers: {}", group.providers.len());
        println!("  Concurrent: {}", group.concurrent);
        if let Some(params) = group
            .diagnostic_params
            .as_ref()
            .filter(|_| group.mode.is_diagnostic())
        {
            println!(
                "  Duration: {}s | Workers: {} | Interval: {}s",
                params.duration_seconds.unwrap_or(60),
                params.workers.unwrap_or(10),
                params.interval_seconds.unwrap_or(15)
            );
        } else if let Some(params) = group.test_params.as_ref() {
            println!(
                "  Iterations: {} | Timeout: {}s",
                params.iterations.unwrap_or(3),
                params.timeout_seconds.unwrap_or(120)
            );
        }
    }
    println!();
}
