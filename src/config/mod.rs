//! Scenario file loading and resolution into a runnable graph.
mod apply;
mod loader;
pub mod types;

#[cfg(test)]
mod tests;

pub use apply::{ResolvedRun, resolve_run};
pub use loader::{has_default_config, load_config, load_config_file};
