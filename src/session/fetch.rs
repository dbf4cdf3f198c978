use bytes::Bytes;

use super::{FileCache, SessionState};
use crate::error::FetchError;
use crate::scenario::FetchRef;

/// Resolves a deferred value for a request to `path`.
///
/// # Errors
///
/// Returns an error when the cookie is not in the jar, nothing is cached for
/// the header under `path`, or the disk file cannot be read.
pub fn resolve(
    fetch: &FetchRef,
    path: &str,
    session: &SessionState,
    files: &FileCache,
) -> Result<Bytes, FetchError> {
    match fetch {
        FetchRef::FromCookie(name) => session
            .cookie(name)
            .map(Bytes::from)
            .ok_or_else(|| FetchError::CookieNotFound { name: name.clone() }),
        FetchRef::FromHeader(name) => session
            .cached_header(path, name)
            .map(Bytes::from)
            .ok_or_else(|| FetchError::NoCachedHeader {
                name: name.clone(),
                path: path.to_owned(),
            }),
        FetchRef::FromDisk { path: file, .. } => files.load(file),
    }
}
