use crate::report::CrewStats;
use crate::scenario::StageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Each transaction in order, replicated once per user.
    Sequential,
    /// Random selection until the deadline or request budget is reached.
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub kind: StageKind,
    pub policy: StagePolicy,
    /// Size of every wave dispatched, in order.
    pub waves: Vec<usize>,
    pub selections: u64,
    /// Members of the partial batch dropped when the deadline passed.
    pub discarded: usize,
    pub interrupted: bool,
}

impl StageSummary {
    #[must_use]
    pub const fn new(kind: StageKind, policy: StagePolicy) -> Self {
        Self {
            kind,
            policy,
            waves: Vec::new(),
            selections: 0,
            discarded: 0,
            interrupted: false,
        }
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.waves
            .iter()
            .map(|size| u64::try_from(*size).unwrap_or(u64::MAX))
            .fold(0u64, u64::saturating_add)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrewSummary {
    pub stages: Vec<StageSummary>,
    /// A shutdown signal stopped scheduling before the graph was done.
    pub interrupted: bool,
}

impl CrewSummary {
    #[must_use]
    pub fn stats(&self) -> CrewStats {
        let mut stats = CrewStats {
            stages: self.stages.len(),
            interrupted: self.interrupted,
            ..CrewStats::default()
        };
        for stage in &self.stages {
            let waves = u64::try_from(stage.waves.len()).unwrap_or(u64::MAX);
            let discarded = u64::try_from(stage.discarded).unwrap_or(u64::MAX);
            stats.waves = stats.waves.saturating_add(waves);
            stats.dispatched = stats.dispatched.saturating_add(stage.dispatched());
            stats.discarded = stats.discarded.saturating_add(discarded);
        }
        stats
    }
}
