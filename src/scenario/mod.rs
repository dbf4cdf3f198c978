//! Scenario graph: stages of transactions plus the run configuration they
//! execute under.
mod run;
mod types;
mod validate;


pub use run::{Protocol, RunConfig, RunLimit, SessionMode};
pub use types::{
    ExpectedConditions, FetchRef, FieldValue, RequestOptions, Scenario, Stage, StageKind,
    Transaction, Verb,
};
pub use validate::validate_scenario;
