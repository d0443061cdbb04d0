use triage_core::{ticket_title, TicketKey, TicketQuery, TicketSummary, Tracker, TrackerError};

/// How many candidates to fetch; enough to notice duplicates.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Result of looking a test up in the tracker.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TicketLookup {
    /// Newest ticket titled exactly for the test, else the newest whose
    /// title contains it.
    pub latest: Option<TicketSummary>,
    /// Older matches. They are reported, never merged or touched.
    pub ignored: Vec<TicketKey>,
}

/// Finds the ticket that represents a test in one project.
#[derive(Debug, Clone)]
pub struct TicketDirectory {
    project_key: String,
    search_limit: usize,
}

impl TicketDirectory {
    pub fn new(project_key: impl Into<String>, search_limit: usize) -> Self {
        Self { project_key: project_key.into(), search_limit: search_limit.max(1) }
    }

    pub async fn find_latest<T>(&self, tracker: &T, test_name: &str) -> Result<TicketLookup, TrackerError>
    where
        T: Tracker + ?Sized,
    {
        let title = ticket_title(test_name);
        let query = TicketQuery {
            project_key: self.project_key.clone(),
            title_contains: title.clone(),
            limit: self.search_limit,
        };

        let mut tickets = tracker.search(&query).await?;
        tickets.retain(|ticket| ticket.title.contains(&title));
        // exact titles first, each group newest first
        tickets.sort_by(|a, b| {
            is_exact(b, &title).cmp(&is_exact(a, &title)).then_with(|| b.created_at.cmp(&a.created_at))
        });

        let mut tickets = tickets.into_iter();
        let latest = tickets.next();
        let ignored = tickets.map(|ticket| ticket.key).collect();
        Ok(TicketLookup { latest, ignored })
    }
}

fn is_exact(ticket: &TicketSummary, title: &str) -> bool {
    ticket.title.trim() == title
}
