use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Cookie '{name}' not found in session.")]
    CookieNotFound { name: String },
    #[error("No cached header '{name}' for {path}.")]
    NoCachedHeader { name: String, path: String },
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{path}' is not a regular file.")]
    NotAFile { path: PathBuf },
}
