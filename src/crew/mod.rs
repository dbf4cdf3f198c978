//! Stage-by-stage scheduler that turns transactions into waves of
//! concurrent workers.
mod picker;
mod schedule;
mod summary;


pub use schedule::{Crew, DEFAULT_STAGE_DURATION};
pub use summary::{CrewSummary, StagePolicy, StageSummary};
