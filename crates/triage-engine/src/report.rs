use serde::Serialize;
use triage_core::{Action, ReconciliationOutcome};

#[derive(Debug, Clone, Copy, Default, Serialize, Eq, PartialEq)]
pub struct RunCounts {
    pub created: usize,
    pub reopened: usize,
    pub commented: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Append-only log of one run's outcomes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Set when the run could not start (missing results, bad credentials).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_error: Option<String>,
    pub outcomes: Vec<ReconciliationOutcome>,
}

impl RunReport {
    #[must_use]
    pub fn environment_failure(message: impl Into<String>) -> Self {
        Self { environment_error: Some(message.into()), outcomes: Vec::new() }
    }

    pub fn push(&mut self, outcome: ReconciliationOutcome) {
        self.outcomes.push(outcome);
    }

    #[must_use]
    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts::default();
        for outcome in &self.outcomes {
            match outcome.action {
                Action::Created(_) => counts.created += 1,
                Action::Reopened(_) => counts.reopened += 1,
                Action::Commented(_) => counts.commented += 1,
                Action::Skipped(_) => counts.skipped += 1,
                Action::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.action.is_failed())
    }

    #[must_use]
    pub fn summary_line(&self) -> String {
        let counts = self.counts();
        format!(
            "done: {} created, {} reopened, {} commented, {} skipped, {} failed",
            counts.created, counts.reopened, counts.commented, counts.skipped, counts.failed
        )
    }
}
