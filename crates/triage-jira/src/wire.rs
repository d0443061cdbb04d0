//! Jira REST v2 payload shapes.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use triage_core::{NewTicket, TicketKey, TicketQuery, TicketStatus, TicketSummary, Transition};

use crate::JiraError;

pub(crate) const SEARCH_FIELDS: &str = "summary,status,created";

/// Quote a value for use inside a JQL string literal.
pub(crate) fn escape_jql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `summary ~` is a text search, so the title is sent as an exact phrase and
/// the newest ticket comes first.
pub(crate) fn search_jql(query: &TicketQuery) -> String {
    format!(
        "project = \"{}\" AND summary ~ \"\\\"{}\\\"\" ORDER BY created DESC",
        escape_jql(&query.project_key),
        escape_jql(&query.title_contains)
    )
}

pub(crate) fn create_body(ticket: &NewTicket) -> Value {
    json!({
        "fields": {
            "project": { "key": ticket.project_key },
            "summary": ticket.title,
            "description": ticket.description,
            "issuetype": { "name": ticket.issue_type },
        }
    })
}

pub(crate) fn comment_body(body: &str) -> Value {
    json!({ "body": body })
}

pub(crate) fn transition_body(transition_id: &str) -> Value {
    json!({ "transition": { "id": transition_id } })
}

/// Map a Jira status to the workflow states reconciliation cares about.
///
/// Names are matched case-insensitively. Unknown names fall back to the
/// status category, so a custom "Verified" status in the done category still
/// counts as done.
pub(crate) fn parse_status(name: &str, category_key: Option<&str>) -> TicketStatus {
    match name.trim().to_lowercase().as_str() {
        "open" | "reopened" | "to do" | "new" | "backlog" => TicketStatus::Open,
        "in progress" => TicketStatus::InProgress,
        "done" | "resolved" => TicketStatus::Done,
        "closed" => TicketStatus::Closed,
        _ if category_key.is_some_and(|key| key.eq_ignore_ascii_case("done")) => TicketStatus::Done,
        _ => TicketStatus::Other(name.to_string()),
    }
}

/// Jira timestamps look like `2024-01-15T10:30:00.000+0000`.
pub(crate) fn parse_created(value: &str) -> Result<DateTime<Utc>, JiraError> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|created| created.with_timezone(&Utc))
        .map_err(|err| JiraError::Parse(format!("invalid created timestamp `{value}`: {err}")))
}

pub(crate) fn parse_issue(issue: &Value) -> Result<TicketSummary, JiraError> {
    let key = issue["key"]
        .as_str()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| JiraError::Parse("issue without key".to_string()))?;
    let fields = &issue["fields"];
    let status = parse_status(
        fields["status"]["name"].as_str().unwrap_or(""),
        fields["status"]["statusCategory"]["key"].as_str(),
    );
    let created = fields["created"]
        .as_str()
        .ok_or_else(|| JiraError::Parse(format!("issue {key} without created timestamp")))?;

    Ok(TicketSummary {
        key: TicketKey::new(key),
        title: fields["summary"].as_str().unwrap_or("").to_string(),
        status,
        created_at: parse_created(created)?,
    })
}

/// Parse a search response, keep exact title matches, newest first.
pub(crate) fn parse_search(json: &Value, title_contains: &str) -> Result<Vec<TicketSummary>, JiraError> {
    let issues = json["issues"]
        .as_array()
        .ok_or_else(|| JiraError::Parse("search response without issues".to_string()))?;

    let mut tickets = issues
        .iter()
        .map(parse_issue)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|ticket| ticket.title.contains(title_contains))
        .collect::<Vec<_>>();
    tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(tickets)
}

pub(crate) fn parse_created_key(json: &Value) -> Result<TicketKey, JiraError> {
    json["key"]
        .as_str()
        .filter(|key| !key.is_empty())
        .map(TicketKey::new)
        .ok_or_else(|| JiraError::Parse("create response without key".to_string()))
}

pub(crate) fn parse_transitions(json: &Value) -> Result<Vec<Transition>, JiraError> {
    let transitions = json["transitions"]
        .as_array()
        .ok_or_else(|| JiraError::Parse("transitions response without transitions".to_string()))?;

    Ok(transitions
        .iter()
        .filter_map(|transition| {
            let id = match &transition["id"] {
                Value::String(id) => id.clone(),
                Value::Number(id) => id.to_string(),
                _ => return None,
            };
            let name = transition["name"].as_str().unwrap_or("").to_string();
            Some(Transition { id, name })
        })
        .collect())
}
