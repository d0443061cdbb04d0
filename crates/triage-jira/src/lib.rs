//! Jira integration: REST v2 client implementing the triage [`Tracker`].
//!
//! Requests carry basic auth built from the user and API token; the encoded
//! header is zeroed when the client is dropped. Transient failures (5xx,
//! timeouts, connection errors) are retried with a linear backoff.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use triage_core::{NewTicket, TicketKey, TicketQuery, TicketSummary, Tracker, TrackerError, Transition};
use zeroize::Zeroize;

mod secret;
mod wire;

pub use secret::SecureString;

#[derive(Debug, Error)]
pub enum JiraError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Authentication failed - check your API token")]
    AuthFailed,
    #[error("Rate limited - try again later")]
    RateLimited,
    #[error("Request timeout")]
    Timeout,
    #[error("Cannot read attachment {}: {source}", path.display())]
    Attachment {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<JiraError> for TrackerError {
    fn from(err: JiraError) -> Self {
        match err {
            JiraError::Request(err) => Self::Transport(err.to_string()),
            JiraError::Api { status, message } => Self::Api { status, message },
            JiraError::Parse(message) => Self::Parse(message),
            JiraError::AuthFailed => Self::AuthFailed,
            JiraError::RateLimited => Self::RateLimited,
            JiraError::Timeout => Self::Timeout,
            JiraError::Attachment { path, source } => Self::Attachment { path, source },
        }
    }
}

/// Jira request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraRequestConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Number of retries for transient errors (default: 2)
    pub max_retries: u32,
    /// Retry delay in milliseconds (default: 1000)
    pub retry_delay_ms: u64,
}

impl Default for JiraRequestConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, max_retries: 2, retry_delay_ms: 1000 }
    }
}

/// Jira API client with secure token handling
/// Auth credentials are zeroed when the client is dropped
pub struct JiraClient {
    client: Client,
    base_url: String,
    auth_header: SecureString,
    config: JiraRequestConfig,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("auth_header", &self.auth_header)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    pub fn new(base_url: &str, user: &str, api_token: &str) -> Self {
        Self::with_config(base_url, user, api_token, JiraRequestConfig::default())
    }

    /// The api_token is immediately encoded and the intermediate cleared
    pub fn with_config(base_url: &str, user: &str, api_token: &str, config: JiraRequestConfig) -> Self {
        let mut auth = format!("{user}:{api_token}");
        let auth_header = SecureString::new(format!("Basic {}", general_purpose::STANDARD.encode(&auth)));
        auth.zeroize();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, base_url: base_url.trim_end_matches('/').to_string(), auth_header, config }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{path}", self.base_url)
    }

    pub async fn search_tickets(&self, query: &TicketQuery) -> Result<Vec<TicketSummary>, JiraError> {
        let url = self.url("search");
        let jql = wire::search_jql(query);
        let max_results = query.limit.max(1).to_string();
        tracing::debug!(jql = %jql, "searching tickets");

        let response = self
            .execute_with_retry(|| async {
                self.client
                    .get(&url)
                    .header(header::AUTHORIZATION, self.auth_header.as_str())
                    .header(header::ACCEPT, "application/json")
                    .query(&[
                        ("jql", jql.as_str()),
                        ("maxResults", max_results.as_str()),
                        ("fields", wire::SEARCH_FIELDS),
                    ])
                    .send()
                    .await
            })
            .await?;

        let json: serde_json::Value = response.json().await?;
        let mut tickets = wire::parse_search(&json, &query.title_contains)?;
        tickets.truncate(query.limit.max(1));
        Ok(tickets)
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<TicketKey, JiraError> {
        let url = self.url("issue");
        let body = wire::create_body(ticket);

        let response = self
            .execute_with_retry(|| async {
                self.client
                    .post(&url)
                    .header(header::AUTHORIZATION, self.auth_header.as_str())
                    .header(header::ACCEPT, "application/json")
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        let json: serde_json::Value = response.json().await?;
        wire::parse_created_key(&json)
    }

    pub async fn post_comment(&self, ticket_key: &TicketKey, body: &str) -> Result<(), JiraError> {
        let url = self.url(&format!("issue/{ticket_key}/comment"));
        let payload = wire::comment_body(body);

        self.execute_with_retry(|| async {
            self.client
                .post(&url)
                .header(header::AUTHORIZATION, self.auth_header.as_str())
                .header(header::ACCEPT, "application/json")
                .json(&payload)
                .send()
                .await
        })
        .await?;
        Ok(())
    }

    pub async fn get_transitions(&self, ticket_key: &TicketKey) -> Result<Vec<Transition>, JiraError> {
        let url = self.url(&format!("issue/{ticket_key}/transitions"));

        let response = self
            .execute_with_retry(|| async {
                self.client
                    .get(&url)
                    .header(header::AUTHORIZATION, self.auth_header.as_str())
                    .header(header::ACCEPT, "application/json")
                    .send()
                    .await
            })
            .await?;

        let json: serde_json::Value = response.json().await?;
        wire::parse_transitions(&json)
    }

    pub async fn do_transition(&self, ticket_key: &TicketKey, transition_id: &str) -> Result<(), JiraError> {
        let url = self.url(&format!("issue/{ticket_key}/transitions"));
        let payload = wire::transition_body(transition_id);

        self.execute_with_retry(|| async {
            self.client
                .post(&url)
                .header(header::AUTHORIZATION, self.auth_header.as_str())
                .json(&payload)
                .send()
                .await
        })
        .await?;
        Ok(())
    }

    pub async fn upload_attachment(&self, ticket_key: &TicketKey, path: &Path) -> Result<(), JiraError> {
        let url = self.url(&format!("issue/{ticket_key}/attachments"));
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| JiraError::Attachment { path: path.to_path_buf(), source })?;
        let file_name =
            path.file_name().map_or_else(|| "attachment".to_string(), |name| name.to_string_lossy().into_owned());
        tracing::debug!(ticket = %ticket_key, file = %file_name, bytes = bytes.len(), "uploading attachment");

        // multipart bodies are consumed on send, so each attempt rebuilds one
        self.execute_with_retry(|| {
            let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
            self.client
                .post(&url)
                .header(header::AUTHORIZATION, self.auth_header.as_str())
                .header("X-Atlassian-Token", "no-check")
                .multipart(Form::new().part("file", part))
                .send()
        })
        .await?;
        Ok(())
    }

    /// Execute a request with retry logic for transient errors
    /// Does NOT retry on auth errors (401/403)
    async fn execute_with_retry<F, Fut>(&self, request_fn: F) -> Result<reqwest::Response, JiraError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(JiraError::AuthFailed);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(JiraError::RateLimited);
                    }

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.is_server_error() {
                        last_error = Some(JiraError::Api {
                            status: status.as_u16(),
                            message: "server error".to_string(),
                        });
                        if attempt < self.config.max_retries {
                            tracing::warn!(status = %status, attempt, "Jira server error, retrying");
                            self.backoff(attempt).await;
                            continue;
                        }
                        break;
                    }

                    // Log size only to avoid leaking ticket contents
                    let body = response.text().await.unwrap_or_default();
                    tracing::debug!(status = %status, bytes = body.len(), "Jira API error response received");
                    return Err(JiraError::Api { status: status.as_u16(), message: summarize_error_body(&body) });
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(JiraError::Timeout);
                    } else if e.is_connect() || e.is_request() {
                        last_error = Some(JiraError::Request(e));
                    } else {
                        return Err(JiraError::Request(e));
                    }

                    if attempt < self.config.max_retries {
                        tracing::warn!(attempt, "Jira request failed, retrying");
                        self.backoff(attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(JiraError::Api { status: 0, message: "Unknown error".to_string() }))
    }

    async fn backoff(&self, attempt: u32) {
        tokio::time::sleep(self.backoff_delay(attempt)).await;
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.retry_delay_ms.saturating_mul(u64::from(attempt) + 1))
    }
}

/// Jira error bodies carry `errorMessages` and a per-field `errors` map.
fn summarize_error_body(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return "unexpected response".to_string();
    };
    let mut messages = json["errorMessages"]
        .as_array()
        .map(|items| items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect::<Vec<_>>())
        .unwrap_or_default();
    if let Some(errors) = json["errors"].as_object() {
        for (field, message) in errors {
            if let Some(message) = message.as_str() {
                messages.push(format!("{field}: {message}"));
            }
        }
    }
    if messages.is_empty() {
        "unexpected response".to_string()
    } else {
        messages.join("; ")
    }
}

#[async_trait]
impl Tracker for JiraClient {
    async fn search(&self, query: &TicketQuery) -> Result<Vec<TicketSummary>, TrackerError> {
        Ok(self.search_tickets(query).await?)
    }

    async fn create(&self, ticket: &NewTicket) -> Result<TicketKey, TrackerError> {
        Ok(self.create_ticket(ticket).await?)
    }

    async fn add_comment(&self, key: &TicketKey, body: &str) -> Result<(), TrackerError> {
        Ok(self.post_comment(key, body).await?)
    }

    async fn list_transitions(&self, key: &TicketKey) -> Result<Vec<Transition>, TrackerError> {
        Ok(self.get_transitions(key).await?)
    }

    async fn apply_transition(&self, key: &TicketKey, transition_id: &str) -> Result<(), TrackerError> {
        Ok(self.do_transition(key, transition_id).await?)
    }

    async fn add_attachment(&self, key: &TicketKey, path: &Path) -> Result<(), TrackerError> {
        Ok(self.upload_attachment(key, path).await?)
    }
}
