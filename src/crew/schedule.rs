use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinSet;

use super::picker::Picker;
use super::summary::{CrewSummary, StagePolicy, StageSummary};
use crate::error::{AppError, AppResult, HttpError};
use crate::http::{BuildContext, PreparedRequest, Worker, build_transaction_request};
use crate::report::{Outcome, OutcomeSink, RequestSummary};
use crate::scenario::{RunConfig, Scenario, Stage, Transaction};
use crate::session::{FileCache, SessionPool, SessionState};
use crate::shutdown::ShutdownReceiver;

/// Concurrent stage duration used when neither a duration nor a request
/// budget is configured.
pub const DEFAULT_STAGE_DURATION: Duration = Duration::from_secs(30);

/// Walks a scenario stage by stage, dispatching synchronized waves.
pub struct Crew {
    client: Client,
    run: Arc<RunConfig>,
    sessions: SessionPool,
    files: Arc<FileCache>,
    sink: OutcomeSink,
    shutdown_rx: Option<ShutdownReceiver>,
    picker: Picker,
    interrupted: bool,
}

impl Crew {
    #[must_use]
    pub fn new(client: Client, run: Arc<RunConfig>, files: Arc<FileCache>, sink: OutcomeSink) -> Self {
        let sessions = SessionPool::new(run.session, run.users.get());
        let picker = Picker::new(run.seed);
        Self {
            client,
            run,
            sessions,
            files,
            sink,
            shutdown_rx: None,
            picker,
            interrupted: false,
        }
    }

    /// Stops scheduling new waves once anything arrives on `shutdown_rx`.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown_rx: ShutdownReceiver) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Runs every stage in order and returns what was dispatched.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while building a transaction, or a
    /// worker task failure. Outcomes already dispatched stay reported.
    pub async fn run(&mut self, scenario: &Scenario) -> AppResult<CrewSummary> {
        let mut summary = CrewSummary::default();
        for (index, stage) in scenario.stages.iter().enumerate() {
            if self.shutdown_requested() {
                break;
            }
            let policy = if self.run.sequential || stage.kind.is_sequential() {
                StagePolicy::Sequential
            } else {
                StagePolicy::Concurrent
            };
            tracing::info!(
                "Stage {} ({}) started: {} transactions, {:?}",
                index,
                stage.kind,
                stage.transactions.len(),
                policy
            );
            let stage_summary = match policy {
                StagePolicy::Sequential => self.run_sequential(stage).await?,
                StagePolicy::Concurrent => self.run_concurrent(stage).await?,
            };
            tracing::info!(
                "Stage {} ({}) finished: {} waves, {} requests",
                index,
                stage.kind,
                stage_summary.waves.len(),
                stage_summary.dispatched()
            );
            summary.stages.push(stage_summary);
        }
        summary.interrupted = self.interrupted;
        Ok(summary)
    }

    async fn run_sequential(&mut self, stage: &Stage) -> AppResult<StageSummary> {
        let mut summary = StageSummary::new(stage.kind, StagePolicy::Sequential);
        for transaction in &stage.transactions {
            if self.shutdown_requested() {
                summary.interrupted = true;
                break;
            }
            summary.selections = summary.selections.saturating_add(1);
            let workers = self.replicate(transaction)?;
            let size = self.dispatch(workers).await?;
            summary.waves.push(size);
        }
        Ok(summary)
    }

    async fn run_concurrent(&mut self, stage: &Stage) -> AppResult<StageSummary> {
        let mut summary = StageSummary::new(stage.kind, StagePolicy::Concurrent);
        let users = self.run.users.get();
        let duration = self.stage_duration();
        let budget = self.run.limit.requests;

        let mut batch: Vec<Worker> = Vec::with_capacity(users);
        let mut started: Option<Instant> = None;
        let mut dispatched: u64 = 0;

        loop {
            if budget.is_some_and(|budget| dispatched >= budget) {
                break;
            }
            if self.shutdown_requested() {
                summary.interrupted = true;
                summary.discarded = summary.discarded.saturating_add(batch.len());
                break;
            }
            let Some(transaction) = self.picker.pick(&stage.transactions) else {
                break;
            };
            summary.selections = summary.selections.saturating_add(1);
            let session = self.sessions.slot(batch.len());
            batch.push(self.build_worker(transaction, &session)?);

            // The clock starts at the first selection and is re-checked after
            // every one.
            if let Some(duration) = duration {
                let started = *started.get_or_insert_with(Instant::now);
                if started.elapsed() >= duration {
                    tracing::debug!("Deadline reached; discarding {} selections.", batch.len());
                    summary.discarded = summary.discarded.saturating_add(batch.len());
                    batch.clear();
                    break;
                }
            }

            let wave_target = budget.map_or(users, |budget| {
                let remaining = budget.saturating_sub(dispatched);
                usize::try_from(remaining).map_or(users, |remaining| remaining.min(users))
            });
            if batch.len() >= wave_target {
                let size = self.dispatch(std::mem::take(&mut batch)).await?;
                dispatched = dispatched.saturating_add(u64::try_from(size).unwrap_or(u64::MAX));
                summary.waves.push(size);
            }
        }

        Ok(summary)
    }

    fn stage_duration(&self) -> Option<Duration> {
        match (self.run.limit.duration, self.run.limit.requests) {
            (Some(duration), _) => Some(duration),
            (None, Some(_)) => None,
            (None, None) => Some(DEFAULT_STAGE_DURATION),
        }
    }

    /// One wave of `users` workers for a sequential stage. A shared session
    /// builds once and replicates; per-user sessions build per slot.
    fn replicate(&self, transaction: &Arc<Transaction>) -> AppResult<Vec<Worker>> {
        let users = self.run.users.get();
        let mut workers = Vec::with_capacity(users);
        if self.sessions.is_shared() {
            let session = self.sessions.slot(0);
            let prepared = self.prepare(transaction, &session)?;
            let summary = Arc::new(prepared.summary());
            for _ in 0..users {
                workers.push(self.materialize(&prepared, &summary, transaction, &session)?);
            }
        } else {
            for slot in 0..users {
                let session = self.sessions.slot(slot);
                workers.push(self.build_worker(transaction, &session)?);
            }
        }
        Ok(workers)
    }

    fn build_worker(
        &self,
        transaction: &Arc<Transaction>,
        session: &Arc<SessionState>,
    ) -> AppResult<Worker> {
        let prepared = self.prepare(transaction, session)?;
        let summary = Arc::new(prepared.summary());
        self.materialize(&prepared, &summary, transaction, session)
    }

    fn prepare(
        &self,
        transaction: &Transaction,
        session: &SessionState,
    ) -> AppResult<PreparedRequest> {
        let context = BuildContext {
            run: &self.run,
            session,
            files: &self.files,
        };
        build_transaction_request(transaction, &context)
    }

    fn materialize(
        &self,
        prepared: &PreparedRequest,
        summary: &Arc<RequestSummary>,
        transaction: &Arc<Transaction>,
        session: &Arc<SessionState>,
    ) -> AppResult<Worker> {
        let request = prepared.to_request(&self.client).map_err(|err| {
            AppError::http(HttpError::Transaction {
                label: transaction.label(),
                source: Box::new(err),
            })
        })?;
        Ok(Worker {
            client: self.client.clone(),
            request,
            path: prepared.path.clone(),
            summary: Arc::clone(summary),
            transaction: Arc::clone(transaction),
            session: Arc::clone(session),
        })
    }

    /// Runs one wave to completion and forwards its outcomes.
    async fn dispatch(&self, workers: Vec<Worker>) -> AppResult<usize> {
        let size = workers.len();
        let mut wave: JoinSet<Outcome> = JoinSet::new();
        for worker in workers {
            wave.spawn(worker.run());
        }
        while let Some(result) = wave.join_next().await {
            self.sink.send(result?);
        }
        tracing::debug!("Wave of {} finished.", size);
        Ok(size)
    }

    fn shutdown_requested(&mut self) -> bool {
        if self.interrupted {
            return true;
        }
        if let Some(shutdown_rx) = self.shutdown_rx.as_mut() {
            match shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Lagged(_)) => {
                    tracing::info!("Shutdown requested; no further waves will be scheduled.");
                    self.interrupted = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => {}
            }
        }
        self.interrupted
    }
}
