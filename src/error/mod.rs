mod app;
mod config;
mod fetch;
mod http;
mod scenario;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use fetch::FetchError;
pub use http::HttpError;
pub use scenario::ScenarioError;
pub use validation::ValidationError;
