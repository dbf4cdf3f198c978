//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;
mod types;


pub use cli::{OutputFormat, TesterArgs};
pub use types::{PositiveU64, PositiveUsize};

pub(crate) use parsers::parse_duration_arg;
