use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::{FailureRecord, LatencyHistogram, Outcome, Percentiles, Report, Timing};
use crate::error::{AppError, AppResult};

/// Buffered outcomes kept for late progress subscribers.
const OUTCOME_BROADCAST_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum ReportEvent {
    Outcome(Outcome),
    Done,
}

/// Running counters published after every outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub hits: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Cloneable handle workers use to hand outcomes to the reporter.
#[derive(Debug, Clone)]
pub struct OutcomeSink {
    tx: mpsc::UnboundedSender<ReportEvent>,
}

impl OutcomeSink {
    pub fn send(&self, outcome: Outcome) {
        if self.tx.send(ReportEvent::Outcome(outcome)).is_err() {
            tracing::warn!("Reporter stopped; dropping outcome.");
        }
    }
}

/// Single consumer of every outcome of a run.
///
/// `finish` consumes the handle, so `Done` is sent exactly once.
#[derive(Debug)]
pub struct Reporter {
    tx: mpsc::UnboundedSender<ReportEvent>,
    progress_rx: watch::Receiver<ProgressSnapshot>,
    outcomes_tx: broadcast::Sender<Outcome>,
    handle: JoinHandle<Report>,
}

impl Reporter {
    /// Spawns the aggregation task on the current runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReportEvent>();
        let (progress_tx, progress_rx) = watch::channel(ProgressSnapshot::default());
        let (outcomes_tx, _) = broadcast::channel::<Outcome>(OUTCOME_BROADCAST_CAPACITY);
        let rebroadcast = outcomes_tx.clone();

        let handle = tokio::spawn(async move {
            let mut tally = Tally::new();
            while let Some(event) = rx.recv().await {
                match event {
                    ReportEvent::Outcome(outcome) => {
                        tally.record(&outcome);
                        let snapshot = tally.progress();
                        progress_tx.send_modify(|current| *current = snapshot);
                        // No subscribers is fine.
                        drop(rebroadcast.send(outcome));
                    }
                    ReportEvent::Done => break,
                }
            }
            tally.finalize()
        });

        Self {
            tx,
            progress_rx,
            outcomes_tx,
            handle,
        }
    }

    #[must_use]
    pub fn sink(&self) -> OutcomeSink {
        OutcomeSink {
            tx: self.tx.clone(),
        }
    }

    #[must_use]
    pub fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_rx.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Outcome> {
        self.outcomes_tx.subscribe()
    }

    /// Signals the end of the run and waits for the final report.
    ///
    /// Outcomes sent before this call are always counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregation task panicked.
    pub async fn finish(self) -> AppResult<Report> {
        let Reporter { tx, handle, .. } = self;
        if tx.send(ReportEvent::Done).is_err() {
            tracing::warn!("Reporter already stopped before the run finished.");
        }
        drop(tx);
        handle.await.map_err(AppError::from)
    }
}

struct Tally {
    hits: u64,
    successes: u64,
    failures: u64,
    elapsed_total: Duration,
    slowest: Option<Timing>,
    fastest: Option<Timing>,
    failures_by_path: BTreeMap<String, Vec<FailureRecord>>,
    histogram: Option<LatencyHistogram>,
    started: Instant,
}

impl Tally {
    fn new() -> Self {
        let histogram = match LatencyHistogram::new() {
            Ok(histogram) => Some(histogram),
            Err(err) => {
                tracing::warn!("Percentiles disabled: {}", err);
                None
            }
        };
        Self {
            hits: 0,
            successes: 0,
            failures: 0,
            elapsed_total: Duration::ZERO,
            slowest: None,
            fastest: None,
            failures_by_path: BTreeMap::new(),
            histogram,
            started: Instant::now(),
        }
    }

    fn record(&mut self, outcome: &Outcome) {
        self.hits = self.hits.saturating_add(1);
        self.elapsed_total = self.elapsed_total.saturating_add(outcome.elapsed());
        if let Some(histogram) = self.histogram.as_mut()
            && let Err(err) = histogram.record(outcome.elapsed())
        {
            tracing::debug!("{}", err);
        }

        match outcome {
            Outcome::Success { path, elapsed } => {
                self.successes = self.successes.saturating_add(1);
                if self
                    .slowest
                    .as_ref()
                    .is_none_or(|slowest| *elapsed > slowest.elapsed)
                {
                    self.slowest = Some(Timing {
                        path: path.clone(),
                        elapsed: *elapsed,
                    });
                }
                if self
                    .fastest
                    .as_ref()
                    .is_none_or(|fastest| *elapsed < fastest.elapsed)
                {
                    self.fastest = Some(Timing {
                        path: path.clone(),
                        elapsed: *elapsed,
                    });
                }
            }
            Outcome::Failure(failure) => {
                self.failures = self.failures.saturating_add(1);
                self.failures_by_path
                    .entry(failure.path.clone())
                    .or_default()
                    .push(FailureRecord {
                        kind: failure.kind,
                        message: failure.message.clone(),
                        request: failure.request.clone(),
                    });
            }
        }
    }

    const fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            hits: self.hits,
            successes: self.successes,
            failures: self.failures,
        }
    }

    fn finalize(self) -> Report {
        let average = if self.hits == 0 {
            Duration::ZERO
        } else {
            let nanos = self
                .elapsed_total
                .as_nanos()
                .checked_div(u128::from(self.hits))
                .unwrap_or(0);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };
        let (p50, p90, p99) = self
            .histogram
            .as_ref()
            .map_or((Duration::ZERO, Duration::ZERO, Duration::ZERO), |histogram| {
                histogram.percentiles()
            });

        Report {
            hits: self.hits,
            successes: self.successes,
            failures: self.failures,
            elapsed_total: self.elapsed_total,
            average,
            slowest: self.slowest,
            fastest: self.fastest,
            percentiles: Percentiles { p50, p90, p99 },
            failures_by_path: self.failures_by_path,
            wall_time: self.started.elapsed(),
            crew: super::CrewStats::default(),
        }
    }
}
