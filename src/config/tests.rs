use super::types::{ConfigFile, DiskConfig, FetchConfig, FieldConfig, StageKindConfig};
use super::{load_config_file, resolve_run};
use crate::args::TesterArgs;
use crate::error::{AppError, AppResult, ConfigError};
use crate::scenario::{FetchRef, FieldValue, Protocol, SessionMode, StageKind, Verb};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

const SCENARIO_TOML: &str = r#"
host = "http://127.0.0.1:8080"
protocol = "HTTP/1.0"
users = 5
duration = "2m"
session = "per-user"

[initial.headers]
X-Sortie = "v1"

[initial.cookies]
lang = "en"

[[stages]]
kind = "finally"

[[stages.transactions]]
verb = "GET"
path = "/logout"

[[stages]]
kind = "every"

[[stages.transactions]]
verb = "POST"
path = "/auth"
options = ["reject_cookies", "clear_initials"]
body = { user = "root", pin = 1234, remember = true, _xsrf = { from_cookie = "_xsrf" } }
expect = { status = 200, cookies = { session = "abc" } }

[[stages]]
kind = "cases"

[[stages.transactions]]
verb = "put"
path = "/files"
headers = { If-Match = { from_header = "ETag" } }
body = { doc = { from_disk = { path = "notes.md", mime = "text/markdown" } }, raw = { from_disk = "raw.bin" } }
expect = { body_contains = "stored" }

[[stages]]
kind = "FINALLY"

[[stages.transactions]]
verb = "DELETE"
path = "/session"
"#;

fn args(argv: &[&str]) -> AppResult<TesterArgs> {
    let mut full = vec!["sortie"];
    full.extend_from_slice(argv);
    TesterArgs::try_parse_from(full).map_err(AppError::from)
}

fn write_config(name: &str, content: &str) -> AppResult<(tempfile::TempDir, PathBuf)> {
    let dir = tempdir()?;
    let path = dir.path().join(name);
    std::fs::write(&path, content)?;
    Ok((dir, path))
}

#[test]
fn parse_toml_scenario_with_fetch_values() -> AppResult<()> {
    let (_dir, path) = write_config("sortie.toml", SCENARIO_TOML)?;
    let config = load_config_file(&path)?;

    if config.stages.len() != 4 {
        return Err(AppError::config("Expected four declared stages"));
    }
    let auth = config
        .stages
        .get(1)
        .and_then(|stage| stage.transactions.first())
        .ok_or_else(|| AppError::config("Missing auth transaction"))?;
    if auth.body.get("_xsrf") != Some(&FieldConfig::Fetch(FetchConfig::FromCookie("_xsrf".to_owned()))) {
        return Err(AppError::config("Expected cookie fetch in body"));
    }
    if auth.body.get("pin") != Some(&FieldConfig::Integer(1234)) {
        return Err(AppError::config("Expected integer literal"));
    }

    let upload = config
        .stages
        .get(2)
        .ok_or_else(|| AppError::config("Missing cases stage"))?;
    if upload.kind != StageKindConfig::Cases {
        return Err(AppError::config("Expected cases stage"));
    }
    let files = upload
        .transactions
        .first()
        .ok_or_else(|| AppError::config("Missing upload transaction"))?;
    if files.verb != Verb::Put {
        return Err(AppError::config("Expected lowercase verb alias"));
    }
    if files.body.get("raw")
        != Some(&FieldConfig::Fetch(FetchConfig::FromDisk(DiskConfig::Path(
            "raw.bin".to_owned(),
        ))))
    {
        return Err(AppError::config("Expected bare disk path"));
    }
    Ok(())
}

#[test]
fn parse_json_scenario() -> AppResult<()> {
    let content = r#"{
        "host": "https://example.test",
        "requests": 100,
        "stages": [
            {
                "kind": "then",
                "transactions": [
                    { "verb": "GET", "path": "/", "expect": { "status": 200 } }
                ]
            }
        ]
    }"#;
    let (_dir, path) = write_config("sortie.json", content)?;
    let config = load_config_file(&path)?;
    if config.requests != Some(100) || config.stages.len() != 1 {
        return Err(AppError::config("Unexpected JSON config"));
    }
    Ok(())
}

#[test]
fn unsupported_extension_is_rejected() -> AppResult<()> {
    let (_dir, path) = write_config("sortie.yaml", "host: x")?;
    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        other => Err(AppError::config(format!(
            "Expected unsupported extension, got {:?}",
            other
        ))),
    }
}

#[test]
fn resolve_merges_finally_stages_last() -> AppResult<()> {
    let (_dir, path) = write_config("sortie.toml", SCENARIO_TOML)?;
    let config = load_config_file(&path)?;
    let resolved = resolve_run(&args(&[])?, config)?;

    let kinds: Vec<StageKind> = resolved
        .scenario
        .stages
        .iter()
        .map(|stage| stage.kind)
        .collect();
    if kinds != vec![StageKind::Every, StageKind::Then, StageKind::Finally] {
        return Err(AppError::config(format!("Unexpected stage order: {:?}", kinds)));
    }
    let finally_paths: Vec<&str> = resolved
        .scenario
        .stages
        .last()
        .map(|stage| {
            stage
                .transactions
                .iter()
                .map(|transaction| transaction.path.as_str())
                .collect()
        })
        .unwrap_or_default();
    if finally_paths != vec!["/logout", "/session"] {
        return Err(AppError::config(format!(
            "Unexpected finally order: {:?}",
            finally_paths
        )));
    }

    let auth = resolved
        .scenario
        .stages
        .first()
        .and_then(|stage| stage.transactions.first())
        .ok_or_else(|| AppError::config("Missing auth transaction"))?;
    if !auth.options.clear_cookies || !auth.options.clear_headers || !auth.options.reject_cookies {
        return Err(AppError::config("Expected clear_initials to set both flags"));
    }
    if auth.body.get("remember") != Some(&FieldValue::Literal("true".to_owned())) {
        return Err(AppError::config("Expected bool literal to become text"));
    }
    if auth.expect.status != Some(200) || auth.expect.cookies.get("session").map(String::as_str) != Some("abc") {
        return Err(AppError::config("Unexpected expectations"));
    }

    let upload = resolved
        .scenario
        .stages
        .get(1)
        .and_then(|stage| stage.transactions.first())
        .ok_or_else(|| AppError::config("Missing upload transaction"))?;
    let expected_doc = FieldValue::Fetch(FetchRef::FromDisk {
        path: PathBuf::from("notes.md"),
        mime: Some("text/markdown".to_owned()),
    });
    if upload.body.get("doc") != Some(&expected_doc) || !upload.is_multipart() {
        return Err(AppError::config("Expected disk fetch with mime"));
    }

    let run = &resolved.run;
    if run.protocol != Protocol::Http10 || run.session != SessionMode::PerUser {
        return Err(AppError::config("Expected file protocol and session mode"));
    }
    if run.users.get() != 5 || run.limit.duration != Some(Duration::from_secs(120)) {
        return Err(AppError::config("Expected file users and duration"));
    }
    if run.initial_headers != vec![("X-Sortie".to_owned(), "v1".to_owned())] {
        return Err(AppError::config("Expected initial headers"));
    }
    Ok(())
}

#[test]
fn cli_values_override_the_file() -> AppResult<()> {
    let (_dir, path) = write_config("sortie.toml", SCENARIO_TOML)?;
    let config = load_config_file(&path)?;
    let cli = args(&[
        "-u",
        "3",
        "-t",
        "10s",
        "-r",
        "50",
        "-s",
        "--host",
        "https://staging.example.test",
        "--session",
        "shared",
        "--timeout",
        "5s",
        "--insecure",
    ])?;
    let resolved = resolve_run(&cli, config)?;
    let run = &resolved.run;

    if run.users.get() != 3 || !run.sequential {
        return Err(AppError::config("Expected CLI users and sequential"));
    }
    if run.limit.duration != Some(Duration::from_secs(10)) || run.limit.requests != Some(50) {
        return Err(AppError::config("Expected CLI limits"));
    }
    if run.base_url.as_str() != "https://staging.example.test/" {
        return Err(AppError::config(format!("Unexpected host: {}", run.base_url)));
    }
    if run.session != SessionMode::Shared {
        return Err(AppError::config("Expected CLI session mode"));
    }
    if resolved.client.timeout != Duration::from_secs(5) || !resolved.client.insecure {
        return Err(AppError::config("Expected CLI client settings"));
    }
    Ok(())
}

#[test]
fn resolve_applies_defaults() -> AppResult<()> {
    let config = ConfigFile {
        host: Some("localhost:3000".to_owned()),
        ..ConfigFile::default()
    };
    let resolved = resolve_run(&args(&[])?, config)?;
    let run = &resolved.run;
    if run.base_url.as_str() != "http://localhost:3000/" {
        return Err(AppError::config(format!("Unexpected host: {}", run.base_url)));
    }
    if run.users.get() != 10 || run.limit.duration != Some(Duration::from_secs(30)) {
        return Err(AppError::config("Expected default users and duration"));
    }
    if run.protocol != Protocol::Http11 || run.session != SessionMode::Shared {
        return Err(AppError::config("Expected default protocol and session"));
    }

    let budget_only = ConfigFile {
        host: Some("http://localhost".to_owned()),
        requests: Some(10),
        ..ConfigFile::default()
    };
    let resolved = resolve_run(&args(&[])?, budget_only)?;
    if resolved.run.limit.duration.is_some() {
        return Err(AppError::config("Expected no default duration with a budget"));
    }
    Ok(())
}

#[test]
fn resolve_rejects_bad_values() -> AppResult<()> {
    match resolve_run(&args(&[])?, ConfigFile::default()) {
        Err(AppError::Config(ConfigError::MissingHost)) => {}
        other => {
            return Err(AppError::config(format!("Expected MissingHost, got {:?}", other)));
        }
    }

    let ftp = ConfigFile {
        host: Some("ftp://example.test".to_owned()),
        ..ConfigFile::default()
    };
    if !matches!(
        resolve_run(&args(&[])?, ftp),
        Err(AppError::Config(ConfigError::UnsupportedScheme { .. }))
    ) {
        return Err(AppError::config("Expected unsupported scheme"));
    }

    let zero_users = ConfigFile {
        host: Some("http://localhost".to_owned()),
        users: Some(0),
        ..ConfigFile::default()
    };
    if !matches!(
        resolve_run(&args(&[])?, zero_users),
        Err(AppError::Config(ConfigError::FieldMustBePositive { field: "users", .. }))
    ) {
        return Err(AppError::config("Expected zero users to be rejected"));
    }
    Ok(())
}
