use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use crate::crew::{Crew, CrewSummary};
use crate::error::AppResult;
use crate::report::{Report, Reporter};
use crate::scenario::{RunConfig, Scenario, validate_scenario};
use crate::session::FileCache;
use crate::shutdown::ShutdownSender;

use super::progress::setup_progress_logger;

#[derive(Debug)]
pub struct RunOutput {
    pub report: Report,
    pub crew: CrewSummary,
}

/// Validates `scenario`, runs it to completion, and returns the final report.
///
/// The reporter is finalized even when the crew aborts, so every outcome
/// dispatched before the failure is counted and logged.
///
/// # Errors
///
/// Returns a validation error before any request is sent, or the first
/// build error raised while the crew is running.
pub async fn run_scenario(
    scenario: &Scenario,
    run: RunConfig,
    client: Client,
    files: Arc<FileCache>,
    shutdown_tx: &ShutdownSender,
) -> AppResult<RunOutput> {
    validate_scenario(scenario, &files)?;

    let reporter = Reporter::spawn();
    let progress_handle = setup_progress_logger(reporter.progress(), shutdown_tx);
    let mut crew = Crew::new(client, Arc::new(run), files, reporter.sink())
        .with_shutdown(shutdown_tx.subscribe());

    let result = crew.run(scenario).await;
    progress_handle.abort();
    let mut report = reporter.finish().await?;

    let crew_summary = result.inspect_err(|_| {
        warn!(
            "Run aborted after {} requests ({} failed).",
            report.hits, report.failures
        );
    })?;
    report.crew = crew_summary.stats();
    info!(
        "Run finished: {} hits, {} success, {} fails.",
        report.hits, report.successes, report.failures
    );

    Ok(RunOutput {
        report,
        crew: crew_summary,
    })
}
