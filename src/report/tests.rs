use super::*;
use crate::error::{AppError, AppResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

fn failure(path: &str, millis: u64, kind: FailureKind, message: &str) -> Outcome {
    Outcome::failure(
        path.to_owned(),
        Duration::from_millis(millis),
        kind,
        message.to_owned(),
        Arc::new(RequestSummary {
            method: "GET".to_owned(),
            url: format!("http://127.0.0.1{}", path),
            version: "HTTP/1.1".to_owned(),
            headers: vec![("cookie".to_owned(), "session=abc".to_owned())],
            body: String::new(),
        }),
    )
}

#[test]
fn reporter_tallies_outcomes() -> AppResult<()> {
    run_async_test(async {
        let reporter = Reporter::spawn();
        let sink = reporter.sink();
        sink.send(Outcome::success("/fast".to_owned(), Duration::from_millis(10)));
        sink.send(Outcome::success("/slow".to_owned(), Duration::from_millis(30)));
        sink.send(failure(
            "/missing",
            20,
            FailureKind::Assertion,
            "Expected status code is 200 but it returned as 404.",
        ));
        sink.send(failure("/missing", 20, FailureKind::Transport, "connection refused"));

        let report = reporter.finish().await?;
        if report.hits != 4 || report.successes != 2 || report.failures != 2 {
            return Err(AppError::validation(format!(
                "Unexpected counts: {} {} {}",
                report.hits, report.successes, report.failures
            )));
        }
        if report.elapsed_total != Duration::from_millis(80) {
            return Err(AppError::validation("Expected failures to count toward elapsed"));
        }
        if report.average != Duration::from_millis(20) {
            return Err(AppError::validation(format!(
                "Unexpected average: {:?}",
                report.average
            )));
        }
        if report.slowest.as_ref().map(|t| t.path.as_str()) != Some("/slow") {
            return Err(AppError::validation("Expected /slow to be slowest"));
        }
        if report.fastest.as_ref().map(|t| t.path.as_str()) != Some("/fast") {
            return Err(AppError::validation("Expected /fast to be fastest"));
        }
        let reasons = report
            .failures_by_path
            .get("/missing")
            .ok_or_else(|| AppError::validation("Expected failures under /missing"))?;
        if reasons.len() != 2 {
            return Err(AppError::validation("Expected two failure reasons"));
        }
        Ok(())
    })
}

#[test]
fn reporter_without_outcomes_reports_zero_average() -> AppResult<()> {
    run_async_test(async {
        let report = Reporter::spawn().finish().await?;
        if report.hits != 0 || report.average != Duration::ZERO {
            return Err(AppError::validation("Expected an empty report"));
        }
        if report.slowest.is_some() || report.percentiles != Percentiles::default() {
            return Err(AppError::validation("Expected no timings"));
        }
        Ok(())
    })
}

#[test]
fn reporter_publishes_progress_and_outcomes() -> AppResult<()> {
    run_async_test(async {
        let reporter = Reporter::spawn();
        let mut progress = reporter.progress();
        let mut outcomes = reporter.subscribe();

        reporter
            .sink()
            .send(Outcome::success("/".to_owned(), Duration::from_millis(1)));

        let received = tokio::time::timeout(Duration::from_secs(1), outcomes.recv())
            .await
            .map_err(|err| AppError::validation(format!("Timed out: {}", err)))?
            .map_err(|err| AppError::validation(format!("Broadcast error: {}", err)))?;
        if !received.is_success() || received.path() != "/" {
            return Err(AppError::validation("Unexpected rebroadcast outcome"));
        }

        let snapshot = *progress.borrow_and_update();
        if snapshot.hits != 1 || snapshot.successes != 1 {
            return Err(AppError::validation(format!(
                "Unexpected progress: {:?}",
                snapshot
            )));
        }

        reporter.finish().await?;
        Ok(())
    })
}

#[test]
fn text_report_lists_failures_by_path() -> AppResult<()> {
    run_async_test(async {
        let reporter = Reporter::spawn();
        let sink = reporter.sink();
        sink.send(Outcome::success("/".to_owned(), Duration::from_micros(1500)));
        sink.send(failure(
            "/admin",
            3,
            FailureKind::Assertion,
            "No cookie named session.",
        ));
        let report = reporter.finish().await?;

        let text = render_text(&report);
        for expected in [
            "Hits: 2 Success: 1 Fails: 1",
            "Fastest Time: 1.500 ms",
            "Failed Transactions:",
            "\tPath: /admin",
            "Response Error: No cookie named session.",
            "Request: GET http://127.0.0.1/admin HTTP/1.1",
        ] {
            if !text.contains(expected) {
                return Err(AppError::validation(format!(
                    "Missing '{}' in report:\n{}",
                    expected, text
                )));
            }
        }
        Ok(())
    })
}

#[test]
fn json_report_is_machine_readable() -> AppResult<()> {
    let mut report = Report {
        hits: 1,
        failures: 1,
        ..Report::default()
    };
    report.failures_by_path.insert(
        "/".to_owned(),
        vec![FailureRecord {
            kind: FailureKind::Transport,
            message: "timed out".to_owned(),
            request: Arc::new(RequestSummary::default()),
        }],
    );
    report.crew.waves = 3;

    let rendered = render_json(&report)?;
    let value: serde_json::Value = serde_json::from_str(&rendered)?;
    if value["hits"] != 1 || value["crew"]["waves"] != 3 {
        return Err(AppError::validation(format!("Unexpected JSON: {}", rendered)));
    }
    if value["failed"]["/"][0]["kind"] != "TRANSPORT" {
        return Err(AppError::validation("Expected failure kind in JSON"));
    }
    if !value["generated_at"].is_string() {
        return Err(AppError::validation("Expected a timestamp"));
    }
    Ok(())
}
