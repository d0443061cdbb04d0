use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "triage=info,triage_engine=info,triage_jira=info,triage_results=info";
const VERBOSE_FILTER: &str = "triage=debug,triage_engine=debug,triage_jira=debug,triage_results=debug";

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
///
/// Events go to stderr; stdout carries only command output.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
