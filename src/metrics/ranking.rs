use std::time::Duration;

use super::types::{DiagnosticSummary, TestResult};

/// A record that can appear on the leaderboards. Only records with at least
/// one successful run are ranked; the rest are reported separately.
pub trait RankedRecord {
    fn throughput(&self) -> f64;
    fn ttft(&self) -> Duration;
    fn e2e_latency(&self) -> Duration;
    fn is_ranked(&self) -> bool;
}

impl RankedRecord for TestResult {
    fn throughput(&self) -> f64 {
        self.throughput
    }

    fn ttft(&self) -> Duration {
        self.ttft
    }

    fn e2e_latency(&self) -> Duration {
        self.e2e_latency
    }

    fn is_ranked(&self) -> bool {
        self.success
    }
}

impl RankedRecord for DiagnosticSummary {
    fn throughput(&self) -> f64 {
        self.avg_throughput
    }

    fn ttft(&self) -> Duration {
        self.avg_ttft
    }

    fn e2e_latency(&self) -> Duration {
        self.avg_e2e_latency
    }

    fn is_ranked(&self) -> bool {
        self.successful > 0
    }
}

fn ranked<R: RankedRecord>(records: &[R]) -> Vec<&R> {
    records.iter().filter(|record| record.is_ranked()).collect()
}

/// Highest generation throughput first. The sort is stable: equal
/// throughputs keep their input order.
pub fn by_throughput<R: RankedRecord>(records: &[R]) -> Vec<&R> {
    let mut ordered = ranked(records);
    ordered.sort_by(|a, b| b.throughput().total_cmp(&a.throughput()));
    ordered
}

/// Lowest time-to-first-token first; ties keep input order.
pub fn by_ttft<R: RankedRecord>(records: &[R]) -> Vec<&R> {
    let mut ordered = ranked(records);
    ordered.sort_by_key(|record| record.ttft());
    ordered
}

/// Lowest end-to-end latency first; ties keep input order.
pub fn by_e2e_latency<R: RankedRecord>(records: &[R]) -> Vec<&R> {
    let mut ordered = ranked(records);
    ordered.sort_by_key(|record| record.e2e_latency());
    ordered
}

/// Records excluded from ranking, in input order.
pub fn failures<R: RankedRecord>(records: &[R]) -> Vec<&R> {
    records
        .iter()
        .filter(|record| !record.is_ranked())
        .collect()
}
