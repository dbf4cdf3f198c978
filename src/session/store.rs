use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::scenario::SessionMode;

/// Response headers remembered per request path.
pub const CACHED_HEADERS: [&str; 2] = ["etag", "last-modified"];

#[derive(Debug, Default)]
struct SessionInner {
    cookies: BTreeMap<String, String>,
    headers: HashMap<String, BTreeMap<String, String>>,
}

/// Cookie jar plus the ETag / Last-Modified cache, keyed by path.
///
/// Every accessor takes the lock for the duration of one call only, so the
/// guard never lives across an `.await`.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<SessionInner>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        // A panicking worker cannot leave the maps half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.lock().cookies.get(name).cloned()
    }

    /// Snapshot of the jar in name order.
    #[must_use]
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.lock()
            .cookies
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Upserts each cookie; an empty value removes it from the jar.
    pub fn set_cookies<I, K, V>(&self, cookies: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut inner = self.lock();
        for (name, value) in cookies {
            let name = name.into();
            let value = value.into();
            if value.is_empty() {
                inner.cookies.remove(&name);
            } else {
                inner.cookies.insert(name, value);
            }
        }
    }

    /// Remembers ETag and Last-Modified for `path`; other headers are ignored.
    pub fn cache_headers<'hdr, I>(&self, path: &str, headers: I)
    where
        I: IntoIterator<Item = (&'hdr str, &'hdr str)>,
    {
        let mut inner = self.lock();
        for (name, value) in headers {
            let name = name.to_ascii_lowercase();
            if !CACHED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            inner
                .headers
                .entry(path.to_owned())
                .or_default()
                .insert(name, value.to_owned());
        }
    }

    #[must_use]
    pub fn cached_header(&self, path: &str, name: &str) -> Option<String> {
        let inner = self.lock();
        inner
            .headers
            .get(path)
            .and_then(|headers| headers.get(&name.to_ascii_lowercase()))
            .cloned()
    }
}

/// Hands out the session a given user slot should use.
#[derive(Debug, Clone)]
pub struct SessionPool {
    primary: Arc<SessionState>,
    per_user: Vec<Arc<SessionState>>,
}

impl SessionPool {
    #[must_use]
    pub fn new(mode: SessionMode, users: usize) -> Self {
        let per_user = match mode {
            SessionMode::Shared => Vec::new(),
            SessionMode::PerUser => (0..users).map(|_| Arc::new(SessionState::new())).collect(),
        };
        Self {
            primary: Arc::new(SessionState::new()),
            per_user,
        }
    }

    #[must_use]
    pub const fn is_shared(&self) -> bool {
        self.per_user.is_empty()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Arc<SessionState> {
        self.per_user
            .get(index)
            .map_or_else(|| Arc::clone(&self.primary), Arc::clone)
    }
}
