use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;

use super::check::{ResponseSnapshot, check_response};
use crate::report::{FailureKind, Outcome, RequestSummary};
use crate::scenario::Transaction;
use crate::session::SessionState;

/// One crew member: a materialized request plus the state it reports into.
#[derive(Debug)]
pub struct Worker {
    pub client: Client,
    pub request: reqwest::Request,
    pub path: String,
    pub summary: Arc<RequestSummary>,
    pub transaction: Arc<Transaction>,
    pub session: Arc<SessionState>,
}

impl Worker {
    /// Sends the request, records session state, and checks expectations.
    ///
    /// Elapsed time covers the round trip up to the response head; body
    /// reading is not counted.
    pub async fn run(self) -> Outcome {
        let Worker {
            client,
            request,
            path,
            summary,
            transaction,
            session,
        } = self;

        let start = Instant::now();
        let result = client.execute(request).await;
        let elapsed = start.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!("{} failed: {}", transaction.label(), err);
                return Outcome::failure(path, elapsed, FailureKind::Transport, err.to_string(), summary);
            }
        };

        let snapshot = match ResponseSnapshot::capture(response).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return Outcome::failure(path, elapsed, FailureKind::Transport, err.to_string(), summary);
            }
        };

        session.cache_headers(&path, snapshot.header_pairs());
        if !transaction.options.reject_cookies {
            session.set_cookies(
                snapshot
                    .cookies
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            );
        }

        match check_response(&snapshot, &transaction.expect) {
            Ok(()) => Outcome::success(path, elapsed),
            Err(message) => {
                Outcome::failure(path, elapsed, FailureKind::Assertion, message, summary)
            }
        }
    }
}
