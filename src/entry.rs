use std::ffi::OsString;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use tracing::info;

use crate::app::run_scenario;
use crate::args::{OutputFormat, TesterArgs};
use crate::config::{ResolvedRun, has_default_config, load_config, resolve_run};
use crate::error::{AppError, AppResult, ValidationError};
use crate::http::build_client;
use crate::report::{render_json, render_text};
use crate::scenario::{RunConfig, Scenario, validate_scenario};
use crate::session::FileCache;
use crate::shutdown::{setup_signal_shutdown_handler, shutdown_channel};

/// CLI entry point: parse flags, set up logging and the runtime, run.
///
/// # Errors
///
/// Returns configuration, validation, and build errors, and failures to
/// write the report.
pub fn run() -> AppResult<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    crate::logger::init_logging(args.verbose, args.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(&args))
}

fn parse_args() -> AppResult<Option<TesterArgs>> {
    let mut cmd = TesterArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    Ok(Some(TesterArgs::from_arg_matches(&matches)?))
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    treat_as_empty && !has_default_config()
}

async fn run_async(args: &TesterArgs) -> AppResult<()> {
    let config = load_config(args.config.as_deref())?;
    let ResolvedRun {
        scenario,
        run,
        client: client_settings,
    } = resolve_run(args, config)?;

    let files = Arc::new(FileCache::new());
    if args.dump {
        validate_scenario(&scenario, &files)?;
        println!("{}", dump_scenario(&scenario, &run)?);
        return Ok(());
    }

    let client = build_client(&client_settings)?;
    info!(
        "Running {} stages against {} with {} users.",
        scenario.stages.len(),
        run.base_url,
        run.users.get()
    );

    let (shutdown_tx, _) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);
    let result = run_scenario(&scenario, run, client, files, &shutdown_tx).await;
    if shutdown_tx.send(()).is_err() {
        tracing::debug!("Signal handler already stopped.");
    }
    if let Err(err) = signal_handle.await {
        tracing::debug!("Signal handler task failed: {}", err);
    }

    let output = result?;
    let rendered = match args.format {
        OutputFormat::Text => render_text(&output.report),
        OutputFormat::Json => render_json(&output.report)?,
    };
    write_report(args.output.as_deref(), &rendered)
}

fn dump_scenario(scenario: &Scenario, run: &RunConfig) -> AppResult<String> {
    let duration_ms = run
        .limit
        .duration
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
    let dump = serde_json::json!({
        "host": run.base_url.as_str(),
        "protocol": run.protocol,
        "users": run.users.get(),
        "duration_ms": duration_ms,
        "requests": run.limit.requests,
        "sequential": run.sequential,
        "session": run.session,
        "seed": run.seed,
        "initial": {
            "headers": run.initial_headers,
            "cookies": run.initial_cookies,
        },
        "stages": scenario.stages,
    });
    Ok(serde_json::to_string_pretty(&dump)?)
}

fn write_report(output: Option<&str>, rendered: &str) -> AppResult<()> {
    let Some(path) = output else {
        println!("{}", rendered);
        return Ok(());
    };
    std::fs::write(path, rendered).map_err(|err| {
        AppError::validation(ValidationError::OutputNotWritable {
            path: path.to_owned(),
            source: err,
        })
    })?;
    info!("Report written to {}", path);
    Ok(())
}
