//! In-memory tracker that records every call.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use triage_core::{
    NewTicket, TicketKey, TicketQuery, TicketStatus, TicketSummary, Tracker, TrackerError, Transition,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Call {
    Search(String),
    Create(String),
    Comment(String, String),
    ListTransitions(String),
    ApplyTransition(String, String),
    Attach(String, PathBuf),
}

#[derive(Debug, Default)]
struct State {
    tickets: Vec<TicketSummary>,
    transitions: HashMap<String, Vec<Transition>>,
    fail_create: HashSet<String>,
    fail_search: bool,
    fail_attach: HashSet<PathBuf>,
    calls: Vec<Call>,
    next_id: u32,
}

#[derive(Debug, Default)]
pub(crate) struct FakeTracker {
    state: Mutex<State>,
}

pub(crate) fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).single().unwrap_or_else(|| panic!("invalid fixture day {day}"))
}

impl FakeTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_ticket(self, key: &str, title: &str, status: TicketStatus, day: u32) -> Self {
        self.state.lock().tickets.push(TicketSummary {
            key: TicketKey::new(key),
            title: title.to_string(),
            status,
            created_at: at(day),
        });
        self
    }

    pub(crate) fn with_transitions(self, key: &str, transitions: &[(&str, &str)]) -> Self {
        let transitions = transitions
            .iter()
            .map(|(id, name)| Transition { id: (*id).to_string(), name: (*name).to_string() })
            .collect();
        self.state.lock().transitions.insert(key.to_string(), transitions);
        self
    }

    /// `create` fails for this exact title.
    pub(crate) fn failing_create(self, title: &str) -> Self {
        self.state.lock().fail_create.insert(title.to_string());
        self
    }

    pub(crate) fn failing_search(self) -> Self {
        self.state.lock().fail_search = true;
        self
    }

    /// Uploading this file is rejected by the server.
    pub(crate) fn failing_attachment(self, path: &Path) -> Self {
        self.state.lock().fail_attach.insert(path.to_path_buf());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn status_of(&self, key: &str) -> Option<TicketStatus> {
        self.state.lock().tickets.iter().find(|ticket| ticket.key.as_str() == key).map(|ticket| ticket.status.clone())
    }

    pub(crate) fn ticket_count(&self) -> usize {
        self.state.lock().tickets.len()
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    async fn search(&self, query: &TicketQuery) -> Result<Vec<TicketSummary>, TrackerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Search(query.title_contains.clone()));
        if state.fail_search {
            return Err(TrackerError::Transport("connection refused".to_string()));
        }
        let mut found = state
            .tickets
            .iter()
            .filter(|ticket| ticket.title.contains(&query.title_contains))
            .cloned()
            .collect::<Vec<_>>();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(query.limit);
        Ok(found)
    }

    async fn create(&self, ticket: &NewTicket) -> Result<TicketKey, TrackerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Create(ticket.title.clone()));
        if state.fail_create.contains(&ticket.title) {
            return Err(TrackerError::Api { status: 500, message: "create exploded".to_string() });
        }
        state.next_id += 1;
        let key = TicketKey::new(format!("{}-{}", ticket.project_key, 100 + state.next_id));
        let created_at = at(28);
        state.tickets.push(TicketSummary {
            key: key.clone(),
            title: ticket.title.clone(),
            status: TicketStatus::Open,
            created_at,
        });
        Ok(key)
    }

    async fn add_comment(&self, key: &TicketKey, body: &str) -> Result<(), TrackerError> {
        self.state.lock().calls.push(Call::Comment(key.to_string(), body.to_string()));
        Ok(())
    }

    async fn list_transitions(&self, key: &TicketKey) -> Result<Vec<Transition>, TrackerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ListTransitions(key.to_string()));
        Ok(state.transitions.get(key.as_str()).cloned().unwrap_or_default())
    }

    async fn apply_transition(&self, key: &TicketKey, transition_id: &str) -> Result<(), TrackerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ApplyTransition(key.to_string(), transition_id.to_string()));
        if let Some(ticket) = state.tickets.iter_mut().find(|ticket| &ticket.key == key) {
            ticket.status = TicketStatus::Open;
        }
        Ok(())
    }

    async fn add_attachment(&self, key: &TicketKey, path: &Path) -> Result<(), TrackerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Attach(key.to_string(), path.to_path_buf()));
        if state.fail_attach.contains(path) {
            return Err(TrackerError::Api { status: 500, message: "attachment rejected".to_string() });
        }
        if !path.exists() {
            return Err(TrackerError::Attachment {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            });
        }
        Ok(())
    }
}
