use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::args::PositiveUsize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Protocol {
    #[default]
    #[serde(rename = "HTTP/1.1")]
    Http11,
    #[serde(rename = "HTTP/1.0")]
    Http10,
}

impl Protocol {
    #[must_use]
    pub const fn version(self) -> reqwest::Version {
        match self {
            Protocol::Http11 => reqwest::Version::HTTP_11,
            Protocol::Http10 => reqwest::Version::HTTP_10,
        }
    }
}

/// Whether simulated users share one cookie jar and header cache or each
/// user slot of a wave keeps its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    #[default]
    Shared,
    PerUser,
}

/// Cutoffs applied to every concurrent stage. Either or both may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimit {
    pub duration: Option<Duration>,
    pub requests: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: Url,
    pub protocol: Protocol,
    pub users: PositiveUsize,
    pub limit: RunLimit,
    pub sequential: bool,
    pub initial_headers: Vec<(String, String)>,
    pub initial_cookies: Vec<(String, String)>,
    pub session: SessionMode,
    pub seed: Option<u64>,
}

impl RunConfig {
    #[must_use]
    pub fn new(base_url: Url, users: PositiveUsize) -> Self {
        Self {
            base_url,
            protocol: Protocol::default(),
            users,
            limit: RunLimit::default(),
            sequential: false,
            initial_headers: Vec::new(),
            initial_cookies: Vec::new(),
            session: SessionMode::default(),
            seed: None,
        }
    }
}
