//! Session state shared between workers: cookie jar, per-path header
//! cache, and the disk file cache used by fetch references.
mod fetch;
mod files;
mod store;


pub use fetch::resolve;
pub use files::FileCache;
pub use store::{CACHED_HEADERS, SessionPool, SessionState};
