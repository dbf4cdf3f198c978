use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use crate::error::{AppError, AppResult, HttpError};

/// Per-request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("sortie/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub insecure: bool,
    pub cacert: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            insecure: false,
            cacert: None,
        }
    }
}

/// Builds the client shared by every worker of a run.
///
/// Cookies are managed by the session store, so the client keeps no jar of
/// its own.
///
/// # Errors
///
/// Returns an error when the trust bundle cannot be read or parsed, or the
/// client cannot be constructed.
pub fn build_client(settings: &ClientSettings) -> AppResult<Client> {
    let mut client_builder = Client::builder()
        .timeout(settings.timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .http1_only();

    if let Some(path) = settings.cacert.as_ref() {
        let bytes = std::fs::read(path).map_err(|err| {
            AppError::http(HttpError::ReadCacert {
                path: path.clone(),
                source: err,
            })
        })?;
        let cert = reqwest::Certificate::from_pem(&bytes).map_err(|err| {
            AppError::http(HttpError::InvalidCacert {
                path: path.clone(),
                source: err,
            })
        })?;
        client_builder = client_builder.add_root_certificate(cert);
    }

    if settings.insecure {
        tracing::warn!("TLS certificate verification is disabled.");
        client_builder = client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    client_builder
        .build()
        .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))
}
