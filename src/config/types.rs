use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::args::parse_duration_arg;
use crate::error::AppResult;
use crate::scenario::{Protocol, SessionMode, Verb};

/// Top-level scenario file (`sortie.toml` / `sortie.json`).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub protocol: Option<Protocol>,
    pub users: Option<usize>,
    pub duration: Option<DurationValue>,
    pub requests: Option<u64>,
    pub sequential: Option<bool>,
    pub insecure: Option<bool>,
    pub cacert: Option<String>,
    pub timeout: Option<DurationValue>,
    pub session: Option<SessionMode>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub initial: InitialConfig,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitialConfig {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKindConfig {
    #[serde(alias = "EVERY")]
    Every,
    #[serde(alias = "THEN")]
    Then,
    /// Same behavior as `then`.
    #[serde(alias = "CASES")]
    Cases,
    #[serde(alias = "FINALLY")]
    Finally,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub kind: StageKindConfig,
    #[serde(default)]
    pub transactions: Vec<TransactionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionConfig {
    ClearCookies,
    ClearHeaders,
    ClearInitials,
    RejectCookies,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectConfig {
    pub status: Option<u16>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    pub body_contains: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionConfig {
    pub verb: Verb,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, FieldConfig>,
    #[serde(default)]
    pub cookies: BTreeMap<String, FieldConfig>,
    #[serde(default)]
    pub body: BTreeMap<String, FieldConfig>,
    #[serde(default)]
    pub options: Vec<OptionConfig>,
    #[serde(default)]
    pub expect: ExpectConfig,
}

/// A field value: a scalar literal or a fetch table such as
/// `{ from_cookie = "_xsrf" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldConfig {
    Text(String),
    Integer(i64),
    Bool(bool),
    Fetch(FetchConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum FetchConfig {
    FromCookie(String),
    FromHeader(String),
    FromDisk(DiskConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DiskConfig {
    Path(String),
    Detailed { path: String, mime: Option<String> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> AppResult<Duration> {
        match self {
            DurationValue::Seconds(secs) => parse_duration_arg(&secs.to_string()),
            DurationValue::Text(value) => parse_duration_arg(value),
        }
    }
}
