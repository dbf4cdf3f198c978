use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scenario::SessionMode;

use super::parsers::{parse_bool_env, parse_duration_arg, parse_positive_u64, parse_positive_usize};
use super::types::{PositiveU64, PositiveUsize};

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Scenario-driven HTTP load and assertion tester - replays staged transaction graphs with shared session state across waves of concurrent users."
)]
pub struct TesterArgs {
    /// Scenario file (.toml or .json); defaults to sortie.toml or sortie.json
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Target host including scheme (overrides the scenario file)
    #[arg(long)]
    pub host: Option<String>,

    /// Concurrent users per wave
    #[arg(long, short = 'u', value_parser = parse_positive_usize)]
    pub users: Option<PositiveUsize>,

    /// Duration of each concurrent stage (supports ms/s/m/h)
    #[arg(long, short = 't', value_parser = parse_duration_arg)]
    pub duration: Option<Duration>,

    /// Stop each concurrent stage after N dispatched requests
    #[arg(long, short = 'r', value_parser = parse_positive_u64)]
    pub requests: Option<PositiveU64>,

    /// Run every stage sequentially (each transaction replicated per user)
    #[arg(long, short = 's')]
    pub sequential: bool,

    /// Write the final report to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// PEM bundle to trust in addition to the system roots
    #[arg(long)]
    pub cacert: Option<String>,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long, value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// Session isolation between simulated users
    #[arg(long, value_enum)]
    pub session: Option<SessionMode>,

    /// Seed for random transaction selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the resolved scenario graph as JSON and exit
    #[arg(long)]
    pub dump: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env)]
    pub no_color: bool,
}
