use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use super::{FailureKind, Report, RequestSummary, Timing};
use crate::error::AppResult;

const MICROS_PER_MILLI: u128 = 1000;

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// `12.345 ms` style rendering without going through floats.
fn millis(duration: Duration) -> String {
    let total = duration.as_micros();
    let whole = total.checked_div(MICROS_PER_MILLI).unwrap_or(0);
    let frac = total.checked_rem(MICROS_PER_MILLI).unwrap_or(0);
    format!("{}.{:03} ms", whole, frac)
}

/// Plain-text report, one section per concern.
#[must_use]
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    write_text(&mut out, report).unwrap_or_default();
    out
}

fn write_text(out: &mut String, report: &Report) -> std::fmt::Result {
    writeln!(out, "Summary:")?;
    writeln!(
        out,
        "Hits: {} Success: {} Fails: {}",
        report.hits, report.successes, report.failures
    )?;
    writeln!(out)?;
    writeln!(out, "Elapsed Time: {}", millis(report.elapsed_total))?;
    writeln!(out, "Average Time: {}", millis(report.average))?;
    writeln!(
        out,
        "Slowest Time: {}",
        millis(report.slowest.as_ref().map_or(Duration::ZERO, |t| t.elapsed))
    )?;
    writeln!(
        out,
        "Fastest Time: {}",
        millis(report.fastest.as_ref().map_or(Duration::ZERO, |t| t.elapsed))
    )?;
    writeln!(
        out,
        "Percentiles: p50 {}, p90 {}, p99 {}",
        millis(report.percentiles.p50),
        millis(report.percentiles.p90),
        millis(report.percentiles.p99)
    )?;
    writeln!(out, "Wall Time: {}", millis(report.wall_time))?;
    writeln!(
        out,
        "Crew: {} stages, {} waves, {} requests dispatched, {} selections discarded{}",
        report.crew.stages,
        report.crew.waves,
        report.crew.dispatched,
        report.crew.discarded,
        if report.crew.interrupted {
            " (interrupted)"
        } else {
            ""
        }
    )?;
    writeln!(out)?;

    write_timing(out, "Slowest Transaction:", report.slowest.as_ref())?;
    write_timing(out, "Fastest Transaction:", report.fastest.as_ref())?;

    if !report.failures_by_path.is_empty() {
        writeln!(out, "Failed Transactions:")?;
        for (path, reasons) in &report.failures_by_path {
            writeln!(out, "\tPath: {}", path)?;
            writeln!(out, "\tReasons:")?;
            for reason in reasons {
                writeln!(out, "\t\t{}: {}", reason.kind.label(), reason.message)?;
                writeln!(out, "\t\tRequest: {}", reason.request)?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_timing(out: &mut String, title: &str, timing: Option<&Timing>) -> std::fmt::Result {
    if let Some(timing) = timing {
        writeln!(out, "{}", title)?;
        writeln!(out, "\tPath: {}", timing.path)?;
        writeln!(out, "\tElapsed Time: {}", millis(timing.elapsed))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonTiming<'rep> {
    path: &'rep str,
    elapsed_us: u64,
}

#[derive(Serialize)]
struct JsonFailure<'rep> {
    kind: FailureKind,
    message: &'rep str,
    request: &'rep RequestSummary,
}

#[derive(Serialize)]
struct JsonCrew {
    stages: usize,
    waves: u64,
    dispatched: u64,
    discarded: u64,
    interrupted: bool,
}

#[derive(Serialize)]
struct JsonReport<'rep> {
    generated_at: String,
    hits: u64,
    successes: u64,
    failures: u64,
    elapsed_us: u64,
    average_us: u64,
    p50_us: u64,
    p90_us: u64,
    p99_us: u64,
    wall_time_us: u64,
    slowest: Option<JsonTiming<'rep>>,
    fastest: Option<JsonTiming<'rep>>,
    failed: std::collections::BTreeMap<&'rep str, Vec<JsonFailure<'rep>>>,
    crew: JsonCrew,
}

fn json_timing(timing: Option<&Timing>) -> Option<JsonTiming<'_>> {
    timing.map(|timing| JsonTiming {
        path: &timing.path,
        elapsed_us: micros(timing.elapsed),
    })
}

/// Pretty-printed JSON report with an RFC 3339 generation timestamp.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(report: &Report) -> AppResult<String> {
    let failed = report
        .failures_by_path
        .iter()
        .map(|(path, reasons)| {
            (
                path.as_str(),
                reasons
                    .iter()
                    .map(|reason| JsonFailure {
                        kind: reason.kind,
                        message: &reason.message,
                        request: &reason.request,
                    })
                    .collect(),
            )
        })
        .collect();

    let json = JsonReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        hits: report.hits,
        successes: report.successes,
        failures: report.failures,
        elapsed_us: micros(report.elapsed_total),
        average_us: micros(report.average),
        p50_us: micros(report.percentiles.p50),
        p90_us: micros(report.percentiles.p90),
        p99_us: micros(report.percentiles.p99),
        wall_time_us: micros(report.wall_time),
        slowest: json_timing(report.slowest.as_ref()),
        fastest: json_timing(report.fastest.as_ref()),
        failed,
        crew: JsonCrew {
            stages: report.crew.stages,
            waves: report.crew.waves,
            dispatched: report.crew.dispatched,
            discarded: report.crew.discarded,
            interrupted: report.crew.interrupted,
        },
    };

    Ok(serde_json::to_string_pretty(&json)?)
}
