use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StageKind {
    Every,
    Then,
    Finally,
}

impl StageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StageKind::Every => "EVERY",
            StageKind::Then => "THEN",
            StageKind::Finally => "FINALLY",
        }
    }

    /// EVERY and FINALLY stages replay each transaction once per user;
    /// THEN stages pick transactions at random until the limit is hit.
    #[must_use]
    pub const fn is_sequential(self) -> bool {
        matches!(self, StageKind::Every | StageKind::Finally)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Verb {
    #[serde(rename = "GET", alias = "get")]
    Get,
    #[serde(rename = "HEAD", alias = "head")]
    Head,
    #[serde(rename = "OPTIONS", alias = "options")]
    Options,
    #[serde(rename = "POST", alias = "post")]
    Post,
    #[serde(rename = "PUT", alias = "put")]
    Put,
    #[serde(rename = "PATCH", alias = "patch")]
    Patch,
    #[serde(rename = "DELETE", alias = "delete")]
    Delete,
}

impl Verb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Verbs whose form data travels in the request body rather than the
    /// query string.
    #[must_use]
    pub const fn carries_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch | Verb::Delete)
    }

    #[must_use]
    pub const fn method(self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Head => reqwest::Method::HEAD,
            Verb::Options => reqwest::Method::OPTIONS,
            Verb::Post => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value resolved when the request is built rather than when the
/// scenario is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchRef {
    FromCookie(String),
    FromHeader(String),
    FromDisk {
        path: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
    },
}

impl FetchRef {
    #[must_use]
    pub const fn is_disk(&self) -> bool {
        matches!(self, FetchRef::FromDisk { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Literal(String),
    Fetch(FetchRef),
}

impl FieldValue {
    #[must_use]
    pub const fn is_disk(&self) -> bool {
        match self {
            FieldValue::Literal(_) => false,
            FieldValue::Fetch(fetch) => fetch.is_disk(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Literal(value.to_owned())
    }
}

impl From<FetchRef> for FieldValue {
    fn from(value: FetchRef) -> Self {
        FieldValue::Fetch(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpectedConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_contains: Option<String>,
}

impl ExpectedConditions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.headers.is_empty()
            && self.cookies.is_empty()
            && self.body_contains.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestOptions {
    pub clear_cookies: bool,
    pub clear_headers: bool,
    pub reject_cookies: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub verb: Verb,
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub body: BTreeMap<String, FieldValue>,
    pub expect: ExpectedConditions,
    pub options: RequestOptions,
}

impl Transaction {
    #[must_use]
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            body: BTreeMap::new(),
            expect: ExpectedConditions::default(),
            options: RequestOptions::default(),
        }
    }

    /// True when any body field is read from disk.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.body.values().any(FieldValue::is_disk)
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.verb, self.path)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub kind: StageKind,
    pub transactions: Vec<Arc<Transaction>>,
}

impl Stage {
    #[must_use]
    pub const fn new(kind: StageKind, transactions: Vec<Arc<Transaction>>) -> Self {
        Self { kind, transactions }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scenario {
    pub stages: Vec<Stage>,
}

impl Scenario {
    #[must_use]
    pub const fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}
