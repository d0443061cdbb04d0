//! Tracker settings from flags, with environment fallbacks.

use clap::Args;
use triage_jira::{JiraClient, JiraRequestConfig, SecureString};
use url::Url;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("missing tracker setting {flag} (or {env})")]
    Missing { flag: &'static str, env: &'static str },
    #[error("invalid tracker address {value:?}: {message}")]
    InvalidUrl { value: String, message: String },
    #[error(
        "HTTPS is required for tracker connections; pass --allow-http to use {0} anyway"
    )]
    InsecureHttp(String),
}

#[derive(Debug, Clone, Args)]
pub struct TrackerArgs {
    #[arg(long, env = "JIRA_HOST")]
    pub jira_host: Option<String>,
    #[arg(long, env = "JIRA_USER")]
    pub jira_user: Option<String>,
    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    pub jira_token: Option<String>,
    #[arg(long, env = "JIRA_PROJECT_KEY")]
    pub project_key: Option<String>,
    #[arg(long, env = "ALLURE_REPORT_URL")]
    pub report_url: Option<String>,
    #[arg(long, default_value_t = false)]
    pub allow_http: bool,
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,
}

/// Everything needed to talk to Jira for one run.
pub struct JiraSettings {
    pub host: String,
    pub user: String,
    token: SecureString,
    pub project_key: String,
    pub report_url: Option<String>,
    pub request: JiraRequestConfig,
}

impl std::fmt::Debug for JiraSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraSettings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("token", &self.token)
            .field("project_key", &self.project_key)
            .field("report_url", &self.report_url)
            .field("request", &self.request)
            .finish()
    }
}

impl JiraSettings {
    pub fn from_args(args: &TrackerArgs) -> Result<Self, ConfigError> {
        let host = required(args.jira_host.as_deref(), "--jira-host", "JIRA_HOST")?;
        let user = required(args.jira_user.as_deref(), "--jira-user", "JIRA_USER")?;
        let token = required(args.jira_token.as_deref(), "--jira-token", "JIRA_TOKEN")?;
        let project_key = required(args.project_key.as_deref(), "--project-key", "JIRA_PROJECT_KEY")?;

        let host = validate_host(&host, args.allow_http)?;

        Ok(Self {
            host,
            user,
            token: SecureString::new(token),
            project_key,
            report_url: args.report_url.clone().filter(|url| !url.trim().is_empty()),
            request: JiraRequestConfig {
                timeout_secs: args.timeout_secs,
                max_retries: args.max_retries,
                retry_delay_ms: args.retry_delay_ms,
            },
        })
    }

    #[must_use]
    pub fn client(&self) -> JiraClient {
        JiraClient::with_config(&self.host, &self.user, self.token.as_str(), self.request.clone())
    }
}

fn required(value: Option<&str>, flag: &'static str, env: &'static str) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ConfigError::Missing { flag, env }),
    }
}

/// Only http(s) addresses; plain HTTP needs an explicit opt-in.
fn validate_host(value: &str, allow_http: bool) -> Result<String, ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|err| ConfigError::InvalidUrl { value: value.to_string(), message: err.to_string() })?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {
            tracing::warn!(host = %value, "using plain HTTP for the tracker; credentials travel unencrypted");
        }
        "http" => return Err(ConfigError::InsecureHttp(value.to_string())),
        other => {
            return Err(ConfigError::InvalidUrl {
                value: value.to_string(),
                message: format!("unsupported scheme {other:?}"),
            })
        }
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl { value: value.to_string(), message: "no host".to_string() });
    }

    Ok(value.trim_end_matches('/').to_string())
}
