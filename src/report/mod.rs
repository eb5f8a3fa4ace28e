//! Markdown summary reports rendered from the aggregated records.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::AppResult;
use crate::metrics::{
    DiagnosticSummary, TestResult, by_e2e_latency, by_throughput, by_ttft, failures,
    format_duration,
};

const NOT_AVAILABLE: &str = "N/A";

/// Writes `REPORT.md` summarizing one benchmark session.
///
/// # Errors
///
/// Returns an error when the report cannot be rendered or written.
pub fn write_benchmark_report(
    results_dir: &Path,
    results: &[TestResult],
    session_timestamp: &str,
) -> AppResult<PathBuf> {
    let path = results_dir.join("REPORT.md");
    let mut report = String::new();

    writeln!(report, "# LLM API Speed Test Results\n")?;
    writeln!(report, "**Test Session:** {session_timestamp}\n")?;
    writeln!(report, "---\n")?;

    let successful = results.iter().filter(|r| r.success).count();
    let failed = results.len() - successful;

    writeln!(report, "## Summary\n")?;
    writeln!(report, "- **Total Providers Tested:** {}", results.len())?;
    writeln!(report, "- **Successful:** {successful}")?;
    writeln!(report, "- **Failed:** {failed}\n")?;

    if successful > 0 {
        writeln!(report, "## Successful Tests\n")?;
        writeln!(
            report,
            "| Provider | Model | Mode | E2E Latency | TTFT | Throughput | Tokens |"
        )?;
        writeln!(
            report,
            "|----------|-------|------|-------------|------|------------|--------|"
        )?;
        for result in results.iter().filter(|r| r.success) {
            writeln!(
                report,
                "| {} | {} | {} | {} | {} | {:.2} tok/s | {} |",
                result.provider,
                result.model,
                result.mode,
                format_duration(result.e2e_latency),
                format_duration(result.ttft),
                result.throughput,
                result.completion_tokens
            )?;
        }
        writeln!(report)?;
    }

    if failed > 0 {
        writeln!(report, "## Failed Tests\n")?;
        writeln!(report, "| Provider | Model | Mode | Error |")?;
        writeln!(report, "|----------|-------|------|-------|")?;
        for result in failures(results) {
            writeln!(
                report,
                "| {} | {} | {} | {} |",
                result.provider,
                result.model,
                result.mode,
                result.error.as_deref().unwrap_or(NOT_AVAILABLE)
            )?;
        }
        writeln!(report)?;
    }

    if successful > 0 {
        writeln!(report, "## Performance Leaderboard\n")?;

        writeln!(report, "### By Throughput (Tokens/sec)\n")?;
        writeln!(report, "| Rank | Provider | Throughput | TTFT | E2E Latency |")?;
        writeln!(report, "|------|----------|------------|------|-------------|")?;
        for (rank, result) in by_throughput(results).iter().enumerate() {
            writeln!(
                report,
                "| {} | {} | {:.2} tok/s | {} | {} |",
                rank + 1,
                result.provider,
                result.throughput,
                format_duration(result.ttft),
                format_duration(result.e2e_latency)
            )?;
        }
        writeln!(report)?;

        writeln!(report, "### By Time to First Token (TTFT)\n")?;
        writeln!(report, "| Rank | Provider | TTFT | Throughput | E2E Latency |")?;
        writeln!(report, "|------|----------|------|------------|-------------|")?;
        for (rank, result) in by_ttft(results).iter().enumerate() {
            writeln!(
                report,
                "| {} | {} | {} | {:.2} tok/s | {} |",
                rank + 1,
                result.provider,
                format_duration(result.ttft),
                result.throughput,
                format_duration(result.e2e_latency)
            )?;
        }
        writeln!(report)?;

        writeln!(report, "### By End-to-End Latency\n")?;
        writeln!(report, "| Rank | Provider | E2E Latency | TTFT | Throughput |")?;
        writeln!(report, "|------|----------|-------------|------|------------|")?;
        for (rank, result) in by_e2e_latency(results).iter().enumerate() {
            writeln!(
                report,
                "| {} | {} | {} | {} | {:.2} tok/s |",
                rank + 1,
                result.provider,
                format_duration(result.e2e_latency),
                format_duration(result.ttft),
                result.throughput
            )?;
        }
        writeln!(report)?;
    }

    writeln!(report, "---\n")?;
    writeln!(
        report,
        "*Report generated at {}*",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    std::fs::write(&path, report)?;
    info!("Report generated: {}", path.display());
    Ok(path)
}

/// Writes `DIAGNOSTIC-REPORT.md` summarizing one diagnostic session.
///
/// # Errors
///
/// Returns an error when the report cannot be rendered or written.
pub fn write_diagnostic_report(
    results_dir: &Path,
    summaries: &[DiagnosticSummary],
    session_timestamp: &str,
) -> AppResult<PathBuf> {
    let path = results_dir.join("DIAGNOSTIC-REPORT.md");
    let mut report = String::new();

    writeln!(report, "# LLM API Diagnostic Mode Results\n")?;
    writeln!(report, "**Test Session:** {session_timestamp}\n")?;
    writeln!(report, "**Test Duration:** 90 seconds per provider")?;
    writeln!(report, "**Workers:** 10 concurrent workers")?;
    writeln!(report, "**Request Frequency:** Every 15 seconds per worker")?;
    writeln!(report, "**Timeout:** 30 seconds per request\n")?;
    writeln!(report, "---\n")?;

    let total_requests: usize = summaries.iter().map(|s| s.total_requests).sum();
    let total_successful: usize = summaries.iter().map(|s| s.successful).sum();
    let total_failed: usize = summaries.iter().map(|s| s.failed).sum();
    let percent = |part: usize| {
        if total_requests == 0 {
            0.0
        } else {
            100.0 * part as f64 / total_requests as f64
        }
    };

    writeln!(report, "## Summary\n")?;
    writeln!(report, "- **Providers Tested:** {}", summaries.len())?;
    writeln!(report, "- **Total Requests:** {total_requests}")?;
    writeln!(
        report,
        "- **Successful:** {total_successful} ({:.1}%)",
        percent(total_successful)
    )?;
    writeln!(
        report,
        "- **Failed:** {total_failed} ({:.1}%)\n",
        percent(total_failed)
    )?;

    if !summaries.is_empty() {
        writeln!(report, "## Detailed Results\n")?;
        writeln!(
            report,
            "| Provider | Model | Mode | Total Requests | Success | Failed | Avg E2E | Avg TTFT | Avg Throughput |"
        )?;
        writeln!(
            report,
            "|----------|-------|------|----------------|---------|--------|---------|----------|----------------|"
        )?;
        for summary in summaries {
            let (avg_e2e, avg_ttft, avg_throughput) = if summary.successful > 0 {
                (
                    format_duration(summary.avg_e2e_latency),
                    format_duration(summary.avg_ttft),
                    format!("{:.2} tok/s", summary.avg_throughput),
                )
            } else {
                (
                    NOT_AVAILABLE.to_owned(),
                    NOT_AVAILABLE.to_owned(),
                    NOT_AVAILABLE.to_owned(),
                )
            };
            writeln!(
                report,
                "| {} | {} | {} | {} | {}/{} | {} | {} | {} | {} |",
                summary.provider,
                summary.model,
                summary.mode,
                summary.total_requests,
                summary.successful,
                summary.total_requests,
                summary.failed,
                avg_e2e,
                avg_ttft,
                avg_throughput
            )?;
        }
        writeln!(report)?;
    }

    let ranked = by_throughput(summaries);
    if !ranked.is_empty() {
        writeln!(report, "## Performance Leaderboard\n")?;

        writeln!(report, "### By Throughput (Tokens/sec)\n")?;
        writeln!(
            report,
            "| Rank | Provider | Throughput | TTFT | E2E Latency | Success Rate |"
        )?;
        writeln!(
            report,
            "|------|----------|------------|------|-------------|-------------|"
        )?;
        for (rank, summary) in ranked.iter().enumerate() {
            writeln!(
                report,
                "| {} | {} | {:.2} tok/s | {} | {} | {:.1}% |",
                rank + 1,
                summary.provider,
                summary.avg_throughput,
                format_duration(summary.avg_ttft),
                format_duration(summary.avg_e2e_latency),
                summary.success_rate()
            )?;
        }
        writeln!(report)?;

        writeln!(report, "### By Time to First Token (TTFT)\n")?;
        writeln!(
            report,
            "| Rank | Provider | TTFT | Throughput | E2E Latency | Success Rate |"
        )?;
        writeln!(
            report,
            "|------|----------|------|------------|-------------|-------------|"
        )?;
        for (rank, summary) in by_ttft(summaries).iter().enumerate() {
            writeln!(
                report,
                "| {} | {} | {} | {:.2} tok/s | {} | {:.1}% |",
                rank + 1,
                summary.provider,
                format_duration(summary.avg_ttft),
                summary.avg_throughput,
                format_duration(summary.avg_e2e_latency),
                summary.success_rate()
            )?;
        }
        writeln!(report)?;
    }

    if summaries.iter().any(|s| !s.errors.is_empty()) {
        writeln!(report, "## Error Analysis\n")?;
        for summary in summaries {
            if summary.errors.is_empty() {
                continue;
            }
            writeln!(report, "### {} Errors\n", summary.provider)?;
            writeln!(report, "| Error | Count |")?;
            writeln!(report, "|-------|-------|")?;
            let mut entries: Vec<(&String, &usize)> = summary.errors.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (message, count) in entries {
                writeln!(report, "| {message} | {count} |")?;
            }
            writeln!(report)?;
        }
    }

    writeln!(report, "---\n")?;
    writeln!(
        report,
        "*Report generated at {}*",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    std::fs::write(&path, report)?;
    info!("Diagnostic report generated: {}", path.display());
    Ok(path)
}
