//! Shared data model for failed-test triage.
//!
//! Everything here is tracker-agnostic: the naming rule that ties a test to
//! its ticket, the reopen-transition rule, and the records that flow from a
//! result store through reconciliation into a run report.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod tracker;

pub use tracker::{NewTicket, TicketQuery, Tracker, TrackerError};

/// Prefix shared by every ticket this tool files.
pub const TITLE_PREFIX: &str = "[Automation Bug] ";

/// Issue type used for new tickets.
pub const DEFAULT_ISSUE_TYPE: &str = "Bug";

/// Ticket title for a test. Lookup and creation both go through here so the
/// two can never disagree.
#[must_use]
pub fn ticket_title(test_name: &str) -> String {
    format!("{TITLE_PREFIX}{test_name}")
}

/// Whether a workflow transition name expresses "reopen" intent.
///
/// Case-insensitive substring match on `reopen` or `open`. The tracker's
/// workflow vocabulary is configured outside this tool, so this stays a
/// loose textual rule.
#[must_use]
pub fn is_reopen_transition(name: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered.contains("reopen") || lowered.contains("open")
}

/// Pick the transition to apply when reopening. A name containing `reopen`
/// wins over one that merely contains `open`; ties keep tracker order.
#[must_use]
pub fn select_reopen_transition(transitions: &[Transition]) -> Option<&Transition> {
    transitions
        .iter()
        .find(|transition| transition.name.to_lowercase().contains("reopen"))
        .or_else(|| transitions.iter().find(|transition| is_reopen_transition(&transition.name)))
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct TicketKey(pub String);

impl TicketKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TicketKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Done,
    Closed,
    Other(String),
}

impl TicketStatus {
    /// Done and Closed tickets must be reopened before a new failure is
    /// recorded on them.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Closed)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Closed => "closed",
            Self::Other(name) => name,
        }
    }
}

impl Display for TicketStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only snapshot of a tracker ticket.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TicketSummary {
    pub key: TicketKey,
    pub title: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Transition {
    pub id: String,
    pub name: String,
}

/// One failed test from one run.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FailedTestRecord {
    pub name: String,
    pub failure_detail: String,
    pub artifact_refs: Vec<PathBuf>,
}

impl FailedTestRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, failure_detail: impl Into<String>) -> Self {
        Self { name: name.into(), failure_detail: failure_detail.into(), artifact_refs: Vec::new() }
    }

    #[must_use]
    pub fn with_artifacts(mut self, artifact_refs: Vec<PathBuf>) -> Self {
        self.artifact_refs = artifact_refs;
        self
    }

    #[must_use]
    pub fn title(&self) -> String {
        ticket_title(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "action", content = "detail", rename_all = "snake_case")]
pub enum Action {
    Created(TicketKey),
    Reopened(TicketKey),
    Commented(TicketKey),
    Skipped(String),
    Failed(String),
}

impl Action {
    #[must_use]
    pub fn ticket(&self) -> Option<&TicketKey> {
        match self {
            Self::Created(key) | Self::Reopened(key) | Self::Commented(key) => Some(key),
            Self::Skipped(_) | Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created(key) => write!(f, "created {key}"),
            Self::Reopened(key) => write!(f, "reopened {key}"),
            Self::Commented(key) => write!(f, "commented on {key}"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

/// Soft conditions met while reconciling one test. None of them change the
/// action taken.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeWarning {
    /// More than one ticket carried the test's title; only the newest was used.
    AmbiguousMatch { chosen: TicketKey, ignored: Vec<TicketKey> },
    /// The ticket was terminal but its workflow offered no reopen transition.
    NoReopenTransition { available: Vec<String> },
    NoArtifacts,
    ArtifactMissing { path: PathBuf },
    AttachmentFailed { path: PathBuf, error: String },
}

impl Display for OutcomeWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmbiguousMatch { chosen, ignored } => {
                let ignored = ignored.iter().map(TicketKey::as_str).collect::<Vec<_>>();
                write!(f, "{} tickets matched; used {chosen}, ignored {}", ignored.len() + 1, ignored.join(", "))
            }
            Self::NoReopenTransition { available } => {
                write!(f, "no reopen transition available (offered: {})", available.join(", "))
            }
            Self::NoArtifacts => f.write_str("no artifacts found"),
            Self::ArtifactMissing { path } => write!(f, "artifact vanished: {}", path.display()),
            Self::AttachmentFailed { path, error } => {
                write!(f, "attachment {} failed: {error}", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ReconciliationOutcome {
    pub test_name: String,
    #[serde(flatten)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<OutcomeWarning>,
}

impl ReconciliationOutcome {
    #[must_use]
    pub fn new(test_name: impl Into<String>, action: Action) -> Self {
        Self { test_name: test_name.into(), action, warnings: Vec::new() }
    }
}
