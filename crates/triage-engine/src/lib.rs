//! Reconciliation of failed tests against an issue tracker.
//!
//! For each failed test the engine looks up the newest ticket carrying the
//! test's title. No ticket means a new one is created. An existing ticket gets
//! a comment; if it was done or closed, a reopen transition is tried first.
//! Artifacts are attached last, once the ticket is known.
//!
//! A failure while reconciling one test becomes that test's outcome and never
//! stops the rest of the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use triage_core::{
    select_reopen_transition, ticket_title, Action, FailedTestRecord, NewTicket, OutcomeWarning,
    ReconciliationOutcome, TicketKey, TicketSummary, Tracker, TrackerError, DEFAULT_ISSUE_TYPE,
};

pub mod confirm;
mod directory;
mod report;

#[cfg(test)]
mod fake;

pub use confirm::{AlwaysNo, AlwaysYes, Confirm, Prompt};
pub use directory::{TicketDirectory, TicketLookup, DEFAULT_SEARCH_LIMIT};
pub use report::{RunCounts, RunReport};

pub const OPERATOR_DECLINED: &str = "operator declined";

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub project_key: String,
    /// External test report linked from descriptions and comments.
    pub report_url: Option<String>,
    pub issue_type: String,
    pub search_limit: usize,
}

impl ReconcileConfig {
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            report_url: None,
            issue_type: DEFAULT_ISSUE_TYPE.to_string(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    #[must_use]
    pub fn with_report_url(mut self, report_url: Option<String>) -> Self {
        self.report_url = report_url.filter(|url| !url.trim().is_empty());
        self
    }
}

pub struct Reconciler<T> {
    tracker: T,
    config: ReconcileConfig,
    directory: TicketDirectory,
}

impl<T: Tracker> Reconciler<T> {
    pub fn new(tracker: T, config: ReconcileConfig) -> Self {
        let directory = TicketDirectory::new(config.project_key.clone(), config.search_limit);
        Self { tracker, config, directory }
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile every record in order, asking `confirm` before each one.
    pub async fn run<I, C>(&self, records: I, confirm: &mut C) -> RunReport
    where
        I: IntoIterator<Item = FailedTestRecord>,
        C: Confirm + ?Sized,
    {
        let mut report = RunReport::default();
        for record in records {
            let outcome = match confirm.confirm(&record) {
                Ok(true) => self.reconcile(&record).await,
                Ok(false) => ReconciliationOutcome::new(&record.name, Action::Skipped(OPERATOR_DECLINED.to_string())),
                Err(err) => ReconciliationOutcome::new(
                    &record.name,
                    Action::Skipped(format!("confirmation unavailable: {err}")),
                ),
            };
            log_outcome(&outcome);
            report.push(outcome);
        }
        report
    }

    /// Reconcile one failed test. Never returns an error: tracker failures
    /// become [`Action::Failed`].
    pub async fn reconcile(&self, record: &FailedTestRecord) -> ReconciliationOutcome {
        let mut warnings = Vec::new();
        let action = match self.try_reconcile(record, &mut warnings).await {
            Ok(action) => action,
            Err(err) => {
                tracing::error!(test = %record.name, error = %err, "reconciliation failed");
                Action::Failed(err.to_string())
            }
        };
        ReconciliationOutcome { test_name: record.name.clone(), action, warnings }
    }

    async fn try_reconcile(
        &self,
        record: &FailedTestRecord,
        warnings: &mut Vec<OutcomeWarning>,
    ) -> Result<Action, TrackerError> {
        let lookup = self.directory.find_latest(&self.tracker, &record.name).await?;

        let action = match lookup.latest {
            None => Action::Created(self.create_ticket(record).await?),
            Some(ticket) => {
                if !lookup.ignored.is_empty() {
                    tracing::warn!(
                        test = %record.name,
                        chosen = %ticket.key,
                        ignored = lookup.ignored.len(),
                        "several tickets match this test; using the closest newest one"
                    );
                    warnings.push(OutcomeWarning::AmbiguousMatch {
                        chosen: ticket.key.clone(),
                        ignored: lookup.ignored,
                    });
                }
                self.update_ticket(record, ticket, warnings).await?
            }
        };

        if let Some(key) = action.ticket() {
            self.attach_artifacts(key, &record.artifact_refs, warnings).await;
        }
        Ok(action)
    }

    async fn create_ticket(&self, record: &FailedTestRecord) -> Result<TicketKey, TrackerError> {
        let ticket = NewTicket {
            project_key: self.config.project_key.clone(),
            title: ticket_title(&record.name),
            description: self.description(record),
            issue_type: self.config.issue_type.clone(),
        };
        let key = self.tracker.create(&ticket).await?;
        tracing::info!(test = %record.name, ticket = %key, "created ticket");
        Ok(key)
    }

    async fn update_ticket(
        &self,
        record: &FailedTestRecord,
        ticket: TicketSummary,
        warnings: &mut Vec<OutcomeWarning>,
    ) -> Result<Action, TrackerError> {
        let reopened = if ticket.status.is_terminal() {
            self.try_reopen(&ticket, warnings).await?
        } else {
            false
        };

        self.tracker.add_comment(&ticket.key, &self.comment(record)).await?;
        tracing::info!(test = %record.name, ticket = %ticket.key, "commented on ticket");

        Ok(if reopened { Action::Reopened(ticket.key) } else { Action::Commented(ticket.key) })
    }

    /// `Ok(false)` when the workflow offers no reopen transition; the ticket
    /// then stays in its terminal status.
    async fn try_reopen(
        &self,
        ticket: &TicketSummary,
        warnings: &mut Vec<OutcomeWarning>,
    ) -> Result<bool, TrackerError> {
        let transitions = self.tracker.list_transitions(&ticket.key).await?;
        let Some(transition) = select_reopen_transition(&transitions) else {
            let available = transitions.iter().map(|transition| transition.name.clone()).collect::<Vec<_>>();
            tracing::warn!(
                ticket = %ticket.key,
                status = %ticket.status,
                available = ?available,
                "no reopen transition available; commenting only"
            );
            warnings.push(OutcomeWarning::NoReopenTransition { available });
            return Ok(false);
        };

        self.tracker.apply_transition(&ticket.key, &transition.id).await?;
        tracing::info!(ticket = %ticket.key, transition = %transition.name, "reopened ticket");
        Ok(true)
    }

    /// Upload each distinct artifact once. Problems are recorded as warnings.
    async fn attach_artifacts(&self, key: &TicketKey, artifacts: &[PathBuf], warnings: &mut Vec<OutcomeWarning>) {
        if artifacts.is_empty() {
            tracing::warn!(ticket = %key, "no artifacts to attach");
            warnings.push(OutcomeWarning::NoArtifacts);
            return;
        }

        let mut seen: HashSet<&Path> = HashSet::new();
        for path in artifacts {
            if !seen.insert(path.as_path()) {
                continue;
            }
            if !path.is_file() {
                tracing::warn!(ticket = %key, path = %path.display(), "artifact vanished before upload");
                warnings.push(OutcomeWarning::ArtifactMissing { path: path.clone() });
                continue;
            }

            match self.tracker.add_attachment(key, path).await {
                Ok(()) => tracing::info!(ticket = %key, path = %path.display(), "attached artifact"),
                Err(err) if err.is_missing_file() => {
                    tracing::warn!(ticket = %key, path = %path.display(), "artifact vanished before upload");
                    warnings.push(OutcomeWarning::ArtifactMissing { path: path.clone() });
                }
                Err(err) => {
                    tracing::warn!(ticket = %key, path = %path.display(), error = %err, "attachment failed");
                    warnings.push(OutcomeWarning::AttachmentFailed { path: path.clone(), error: err.to_string() });
                }
            }
        }
    }

    fn description(&self, record: &FailedTestRecord) -> String {
        format!(
            "Automated test **{}** failed.\n\n**Steps to Reproduce:**\n{}\n\nTest Report: {}",
            record.name,
            record.failure_detail.trim_end(),
            self.config.report_url.as_deref().unwrap_or("N/A")
        )
    }

    fn comment(&self, record: &FailedTestRecord) -> String {
        let mut comment = format!(
            "Automated test **{}** failed again on retest.\n\n**Failure detail:**\n{}",
            record.name,
            record.failure_detail.trim_end()
        );
        if let Some(report_url) = &self.config.report_url {
            comment.push_str(&format!("\n\nTest Report: {report_url}"));
        }
        comment
    }
}

fn log_outcome(outcome: &ReconciliationOutcome) {
    if outcome.action.is_failed() {
        tracing::error!(test = %outcome.test_name, outcome = %outcome.action, "test reconciled");
    } else {
        tracing::info!(test = %outcome.test_name, outcome = %outcome.action, "test reconciled");
    }
    for warning in &outcome.warnings {
        tracing::warn!(test = %outcome.test_name, "{warning}");
    }
}

#[cfg(test)]
mod tests;
