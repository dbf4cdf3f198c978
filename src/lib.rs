//! Core library for the `sortie` CLI.
//!
//! A scenario is an ordered graph of stages, each holding HTTP transactions
//! with expected response conditions. The crew replays it against a host
//! with waves of concurrent simulated users, carrying cookies and cached
//! validators between requests, and the reporter aggregates every outcome
//! into a final report.
pub mod app;
pub mod args;
pub mod config;
pub mod crew;
pub mod entry;
pub mod error;
pub mod http;
mod logger;
pub mod report;
pub mod scenario;
pub mod session;
pub mod shutdown;
