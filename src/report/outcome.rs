use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailureKind {
    /// Connect, timeout, or body read failure.
    Transport,
    /// The response arrived but broke an expectation.
    Assertion,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::Transport => "TRANSPORT",
            FailureKind::Assertion => "ASSERTION",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FailureKind::Transport => "Transaction Error",
            FailureKind::Assertion => "Response Error",
        }
    }
}

/// What was sent, kept alongside a failure for the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.url, self.version)?;
        for (name, value) in &self.headers {
            write!(f, " | {}: {}", name, value)?;
        }
        if !self.body.is_empty() {
            write!(f, " | {}", self.body)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Failure {
    pub path: String,
    pub elapsed: Duration,
    pub kind: FailureKind,
    pub message: String,
    pub request: Arc<RequestSummary>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Success { path: String, elapsed: Duration },
    Failure(Failure),
}

impl Outcome {
    #[must_use]
    pub const fn success(path: String, elapsed: Duration) -> Self {
        Outcome::Success { path, elapsed }
    }

    #[must_use]
    pub const fn failure(
        path: String,
        elapsed: Duration,
        kind: FailureKind,
        message: String,
        request: Arc<RequestSummary>,
    ) -> Self {
        Outcome::Failure(Failure {
            path,
            elapsed,
            kind,
            message,
            request,
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Outcome::Success { path, .. } => path,
            Outcome::Failure(failure) => &failure.path,
        }
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Outcome::Success { elapsed, .. } => *elapsed,
            Outcome::Failure(failure) => failure.elapsed,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
