//! Outcome aggregation and report rendering.
mod collector;
mod histogram;
mod outcome;
mod render;

#[cfg(test)]
mod tests;

pub use collector::{OutcomeSink, ProgressSnapshot, ReportEvent, Reporter};
pub use histogram::LatencyHistogram;
pub use outcome::{Failure, FailureKind, Outcome, RequestSummary};
pub use render::{render_json, render_text};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A success with its path, kept for the slowest/fastest lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub path: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub message: String,
    pub request: Arc<RequestSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Percentiles {
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
}

/// Scheduling counters attached to the report once the crew stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrewStats {
    pub stages: usize,
    pub waves: u64,
    pub dispatched: u64,
    pub discarded: u64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub hits: u64,
    pub successes: u64,
    pub failures: u64,
    pub elapsed_total: Duration,
    pub average: Duration,
    pub slowest: Option<Timing>,
    pub fastest: Option<Timing>,
    pub percentiles: Percentiles,
    pub failures_by_path: BTreeMap<String, Vec<FailureRecord>>,
    pub wall_time: Duration,
    pub crew: CrewStats,
}
