mod progress;
mod runner;

pub use runner::{RunOutput, run_scenario};
