use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{TicketKey, TicketSummary, Transition};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("tracker API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("authentication failed - check the tracker credential")]
    AuthFailed,
    #[error("rate limited by tracker - try again later")]
    RateLimited,
    #[error("tracker request timed out")]
    Timeout,
    #[error("malformed tracker response: {0}")]
    Parse(String),
    /// Reading a local file for upload failed.
    #[error("cannot read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrackerError {
    /// The local file behind an upload no longer exists.
    #[must_use]
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::Attachment { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Search for tickets in one project whose title contains a fragment.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TicketQuery {
    pub project_key: String,
    pub title_contains: String,
    /// Upper bound on returned tickets, newest first.
    pub limit: usize,
}

/// Fields for a ticket about to be created.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct NewTicket {
    pub project_key: String,
    pub title: String,
    pub description: String,
    pub issue_type: String,
}

/// Remote issue tracker operations used by reconciliation.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Tickets matching `query`, ordered by creation time, newest first.
    async fn search(&self, query: &TicketQuery) -> Result<Vec<TicketSummary>, TrackerError>;

    async fn create(&self, ticket: &NewTicket) -> Result<TicketKey, TrackerError>;

    async fn add_comment(&self, key: &TicketKey, body: &str) -> Result<(), TrackerError>;

    async fn list_transitions(&self, key: &TicketKey) -> Result<Vec<Transition>, TrackerError>;

    async fn apply_transition(&self, key: &TicketKey, transition_id: &str)
        -> Result<(), TrackerError>;

    async fn add_attachment(&self, key: &TicketKey, path: &Path) -> Result<(), TrackerError>;
}
