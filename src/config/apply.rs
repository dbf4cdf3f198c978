use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::args::{PositiveU64, PositiveUsize, TesterArgs};
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{ClientSettings, DEFAULT_REQUEST_TIMEOUT};
use crate::scenario::{
    ExpectedConditions, FetchRef, FieldValue, RequestOptions, RunConfig, RunLimit, Scenario,
    Stage, StageKind, Transaction,
};

use super::types::{
    ConfigFile, DiskConfig, DurationValue, ExpectConfig, FetchConfig, FieldConfig, OptionConfig,
    StageKindConfig, TransactionConfig,
};

/// Users per wave when neither the CLI nor the file sets them.
const DEFAULT_USERS: usize = 10;

/// Everything the engine needs, with CLI values layered over the file.
#[derive(Debug)]
pub struct ResolvedRun {
    pub scenario: Scenario,
    pub run: RunConfig,
    pub client: ClientSettings,
}

/// Merges CLI overrides into the scenario file and builds the graph.
///
/// Stage rules: `cases` runs as `then`, and every `finally` stage is
/// folded, in declaration order, into one stage placed last.
///
/// # Errors
///
/// Returns an error for a missing or malformed host, a zero user count or
/// request budget, or an invalid duration.
pub fn resolve_run(args: &TesterArgs, config: ConfigFile) -> AppResult<ResolvedRun> {
    let ConfigFile {
        host,
        protocol,
        users,
        duration,
        requests,
        sequential,
        insecure,
        cacert,
        timeout,
        session,
        seed,
        initial,
        stages,
    } = config;

    let host = args
        .host
        .clone()
        .or(host)
        .ok_or_else(|| AppError::config(ConfigError::MissingHost))?;
    let base_url = parse_host(&host)?;

    let users = match (args.users, users) {
        (Some(users), _) => users,
        (None, Some(users)) => PositiveUsize::try_from(users).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "users",
                source: err,
            })
        })?,
        (None, None) => PositiveUsize::try_from(DEFAULT_USERS).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "users",
                source: err,
            })
        })?,
    };

    let requests = match (args.requests, requests) {
        (Some(requests), _) => Some(requests.get()),
        (None, Some(requests)) => Some(
            PositiveU64::try_from(requests)
                .map_err(|err| {
                    AppError::config(ConfigError::FieldMustBePositive {
                        field: "requests",
                        source: err,
                    })
                })?
                .get(),
        ),
        (None, None) => None,
    };
    let duration = match (args.duration, duration.as_ref()) {
        (Some(duration), _) => Some(duration),
        (None, Some(value)) => Some(config_duration("duration", value)?),
        (None, None) => None,
    };
    // Without any limit a concurrent stage runs for the default duration.
    let duration = if duration.is_none() && requests.is_none() {
        Some(crate::crew::DEFAULT_STAGE_DURATION)
    } else {
        duration
    };

    let timeout = match (args.timeout, timeout.as_ref()) {
        (Some(timeout), _) => timeout,
        (None, Some(value)) => config_duration("timeout", value)?,
        (None, None) => DEFAULT_REQUEST_TIMEOUT,
    };

    let run = RunConfig {
        base_url,
        protocol: protocol.unwrap_or_default(),
        users,
        limit: RunLimit { duration, requests },
        sequential: args.sequential || sequential.unwrap_or(false),
        initial_headers: initial.headers.into_iter().collect(),
        initial_cookies: initial.cookies.into_iter().collect(),
        session: args.session.or(session).unwrap_or_default(),
        seed: args.seed.or(seed),
    };

    let client = ClientSettings {
        timeout,
        insecure: args.insecure || insecure.unwrap_or(false),
        cacert: args.cacert.clone().or(cacert).map(PathBuf::from),
    };

    let mut ordered = Vec::with_capacity(stages.len());
    let mut finally: Vec<Arc<Transaction>> = Vec::new();
    for stage in stages {
        let transactions = stage
            .transactions
            .into_iter()
            .map(|transaction| Arc::new(build_transaction(transaction)))
            .collect::<Vec<_>>();
        match stage.kind {
            StageKindConfig::Every => ordered.push(Stage::new(StageKind::Every, transactions)),
            StageKindConfig::Then | StageKindConfig::Cases => {
                ordered.push(Stage::new(StageKind::Then, transactions));
            }
            StageKindConfig::Finally => finally.extend(transactions),
        }
    }
    if !finally.is_empty() {
        ordered.push(Stage::new(StageKind::Finally, finally));
    }

    Ok(ResolvedRun {
        scenario: Scenario::new(ordered),
        run,
        client,
    })
}

fn parse_host(host: &str) -> AppResult<Url> {
    let candidate = if host.contains("://") {
        host.to_owned()
    } else {
        format!("http://{}", host)
    };
    let url = Url::parse(&candidate).map_err(|err| {
        AppError::config(ConfigError::InvalidHost {
            host: host.to_owned(),
            source: err,
        })
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(AppError::config(ConfigError::UnsupportedScheme {
            host: host.to_owned(),
        })),
    }
}

fn config_duration(field: &'static str, value: &DurationValue) -> AppResult<std::time::Duration> {
    value.to_duration().map_err(|err| {
        AppError::config(ConfigError::InvalidDuration {
            field,
            source: Box::new(err),
        })
    })
}

fn build_transaction(config: TransactionConfig) -> Transaction {
    let TransactionConfig {
        verb,
        path,
        headers,
        cookies,
        body,
        options,
        expect,
    } = config;

    let mut transaction = Transaction::new(verb, path);
    transaction.headers = convert_fields(headers);
    transaction.cookies = convert_fields(cookies);
    transaction.body = convert_fields(body);
    transaction.options = build_options(&options);
    transaction.expect = build_expect(expect);
    transaction
}

fn convert_fields(fields: BTreeMap<String, FieldConfig>) -> BTreeMap<String, FieldValue> {
    fields
        .into_iter()
        .map(|(name, value)| (name, convert_field(value)))
        .collect()
}

fn convert_field(value: FieldConfig) -> FieldValue {
    match value {
        FieldConfig::Text(text) => FieldValue::Literal(text),
        FieldConfig::Integer(number) => FieldValue::Literal(number.to_string()),
        FieldConfig::Bool(flag) => FieldValue::Literal(flag.to_string()),
        FieldConfig::Fetch(FetchConfig::FromCookie(name)) => {
            FieldValue::Fetch(FetchRef::FromCookie(name))
        }
        FieldConfig::Fetch(FetchConfig::FromHeader(name)) => {
            FieldValue::Fetch(FetchRef::FromHeader(name))
        }
        FieldConfig::Fetch(FetchConfig::FromDisk(disk)) => {
            let (path, mime) = match disk {
                DiskConfig::Path(path) => (path, None),
                DiskConfig::Detailed { path, mime } => (path, mime),
            };
            FieldValue::Fetch(FetchRef::FromDisk {
                path: PathBuf::from(path),
                mime,
            })
        }
    }
}

fn build_options(options: &[OptionConfig]) -> RequestOptions {
    let mut resolved = RequestOptions::default();
    for option in options {
        match option {
            OptionConfig::ClearCookies => resolved.clear_cookies = true,
            OptionConfig::ClearHeaders => resolved.clear_headers = true,
            OptionConfig::ClearInitials => {
                resolved.clear_cookies = true;
                resolved.clear_headers = true;
            }
            OptionConfig::RejectCookies => resolved.reject_cookies = true,
        }
    }
    resolved
}

fn build_expect(expect: ExpectConfig) -> ExpectedConditions {
    ExpectedConditions {
        status: expect.status,
        headers: expect.headers,
        cookies: expect.cookies,
        body_contains: expect.body_contains,
    }
}
