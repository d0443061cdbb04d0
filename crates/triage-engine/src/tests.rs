use std::fs;
use std::io::Cursor;

use tempfile::TempDir;
use triage_core::{Action, OutcomeWarning, TicketKey, TicketStatus};

use super::*;
use crate::fake::{Call, FakeTracker};

fn reconciler(tracker: FakeTracker) -> Reconciler<FakeTracker> {
    Reconciler::new(tracker, ReconcileConfig::new("QA"))
}

fn record(name: &str) -> FailedTestRecord {
    FailedTestRecord::new(name, "Navigate to \"/login\"\nClick Submit\n")
}

fn artifacts_dir(names: &[&str]) -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("failed to create temp dir: {err}"));
    let paths = names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            fs::write(&path, name.as_bytes()).unwrap_or_else(|err| panic!("failed to write {name}: {err}"));
            path
        })
        .collect();
    (dir, paths)
}

fn transition_calls(calls: &[Call]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, Call::ListTransitions(_) | Call::ApplyTransition(_, _)))
        .count()
}

#[tokio::test]
async fn no_match_creates_ticket_with_generated_title() {
    let engine = reconciler(FakeTracker::new());
    let (_dir, paths) = artifacts_dir(&["trace.zip"]);

    let outcome = engine.reconcile(&record("login works").with_artifacts(paths.clone())).await;

    assert_eq!(outcome.action, Action::Created(TicketKey::new("QA-101")));
    assert!(outcome.warnings.is_empty(), "unexpected warnings: {:?}", outcome.warnings);
    assert_eq!(
        engine.tracker().calls(),
        vec![
            Call::Search("[Automation Bug] login works".to_string()),
            Call::Create("[Automation Bug] login works".to_string()),
            Call::Attach("QA-101".to_string(), paths[0].clone()),
        ]
    );
}

#[tokio::test]
async fn open_ticket_is_commented_without_transitions() {
    let tracker = FakeTracker::new().with_ticket("QA-7", "[Automation Bug] cart", TicketStatus::Open, 3);
    let engine = reconciler(tracker);

    let outcome = engine.reconcile(&record("cart")).await;

    assert_eq!(outcome.action, Action::Commented(TicketKey::new("QA-7")));
    let calls = engine.tracker().calls();
    assert_eq!(transition_calls(&calls), 0);
    assert!(calls.iter().any(|call| matches!(call, Call::Comment(key, _) if key == "QA-7")));
}

#[tokio::test]
async fn in_progress_and_other_statuses_are_commented() {
    for status in [TicketStatus::InProgress, TicketStatus::Other("Blocked".to_string())] {
        let tracker = FakeTracker::new().with_ticket("QA-7", "[Automation Bug] cart", status, 3);
        let engine = reconciler(tracker);

        let outcome = engine.reconcile(&record("cart")).await;

        assert_eq!(outcome.action, Action::Commented(TicketKey::new("QA-7")));
        assert_eq!(transition_calls(&engine.tracker().calls()), 0);
    }
}

#[tokio::test]
async fn closed_ticket_is_reopened_then_commented() {
    let tracker = FakeTracker::new()
        .with_ticket("QA-9", "[Automation Bug] admin login", TicketStatus::Closed, 5)
        .with_transitions("QA-9", &[("31", "Reopen Issue")]);
    let engine = reconciler(tracker);

    let outcome = engine.reconcile(&record("admin login")).await;

    assert_eq!(outcome.action, Action::Reopened(TicketKey::new("QA-9")));
    let calls = engine.tracker().calls();
    let apply = calls.iter().position(|call| *call == Call::ApplyTransition("QA-9".to_string(), "31".to_string()));
    let comment = calls.iter().position(|call| matches!(call, Call::Comment(key, _) if key == "QA-9"));
    assert!(apply.is_some() && comment.is_some() && apply < comment, "unexpected call order: {calls:?}");
    assert_eq!(engine.tracker().status_of("QA-9"), Some(TicketStatus::Open));
}

#[tokio::test]
async fn done_ticket_without_reopen_transition_is_only_commented() {
    let tracker = FakeTracker::new()
        .with_ticket("QA-4", "[Automation Bug] export", TicketStatus::Done, 2)
        .with_transitions("QA-4", &[("2", "Close Issue"), ("5", "Archive")]);
    let engine = reconciler(tracker);

    let outcome = engine.reconcile(&record("export")).await;

    assert_eq!(outcome.action, Action::Commented(TicketKey::new("QA-4")));
    assert_eq!(engine.tracker().status_of("QA-4"), Some(TicketStatus::Done));
    assert!(!engine.tracker().calls().iter().any(|call| matches!(call, Call::ApplyTransition(_, _))));
    assert!(outcome.warnings.contains(&OutcomeWarning::NoReopenTransition {
        available: vec!["Close Issue".to_string(), "Archive".to_string()],
    }));
}

#[tokio::test]
async fn missing_artifacts_do_not_block_the_outcome() {
    let engine = reconciler(FakeTracker::new());

    let outcome = engine.reconcile(&record("no evidence")).await;

    assert!(matches!(outcome.action, Action::Created(_)));
    assert_eq!(outcome.warnings, vec![OutcomeWarning::NoArtifacts]);
}

#[tokio::test]
async fn one_failing_record_does_not_suppress_the_others() {
    let tracker = FakeTracker::new()
        .failing_create("[Automation Bug] second")
        .with_ticket("QA-50", "[Automation Bug] third", TicketStatus::Open, 9);
    let engine = reconciler(tracker);
    let records = vec![record("first"), record("second"), record("third")];

    let report = engine.run(records, &mut AlwaysYes).await;

    let actions = report.outcomes.iter().map(|outcome| outcome.action.clone()).collect::<Vec<_>>();
    assert!(matches!(actions[0], Action::Created(_)));
    assert!(matches!(&actions[1], Action::Failed(message) if message.contains("create exploded")));
    assert_eq!(actions[2], Action::Commented(TicketKey::new("QA-50")));
    assert!(report.has_failures());
}

#[tokio::test]
async fn search_failure_is_recorded_as_failed() {
    let engine = reconciler(FakeTracker::new().failing_search());

    let outcome = engine.reconcile(&record("login")).await;

    assert!(matches!(&outcome.action, Action::Failed(message) if message.contains("connection refused")));
    assert_eq!(engine.tracker().calls().len(), 1);
}

#[tokio::test]
async fn rerunning_never_creates_a_second_ticket() {
    let engine = reconciler(FakeTracker::new());
    let failing = record("checkout");

    let first = engine.reconcile(&failing).await;
    let second = engine.reconcile(&failing).await;
    let third = engine.reconcile(&failing).await;

    let key = first.action.ticket().cloned().unwrap_or_else(|| panic!("first run should file a ticket"));
    assert_eq!(second.action, Action::Commented(key.clone()));
    assert_eq!(third.action, Action::Commented(key));
    assert_eq!(engine.tracker().ticket_count(), 1);
}

#[tokio::test]
async fn newest_of_several_matches_wins_and_is_flagged() {
    let tracker = FakeTracker::new()
        .with_ticket("QA-1", "[Automation Bug] search", TicketStatus::Closed, 1)
        .with_ticket("QA-6", "[Automation Bug] search", TicketStatus::Open, 6)
        .with_ticket("QA-3", "[Automation Bug] search", TicketStatus::Done, 3);
    let engine = reconciler(tracker);

    let outcome = engine.reconcile(&record("search")).await;

    assert_eq!(outcome.action, Action::Commented(TicketKey::new("QA-6")));
    assert!(outcome.warnings.contains(&OutcomeWarning::AmbiguousMatch {
        chosen: TicketKey::new("QA-6"),
        ignored: vec![TicketKey::new("QA-3"), TicketKey::new("QA-1")],
    }));
    assert_eq!(engine.tracker().status_of("QA-1"), Some(TicketStatus::Closed));
}

#[tokio::test]
async fn exact_title_wins_over_a_newer_longer_title() {
    let tracker = FakeTracker::new()
        .with_ticket("QA-20", "[Automation Bug] login", TicketStatus::Open, 2)
        .with_ticket("QA-21", "[Automation Bug] login page", TicketStatus::Open, 9);
    let engine = reconciler(tracker);

    let outcome = engine.reconcile(&record("login")).await;

    assert_eq!(outcome.action, Action::Commented(TicketKey::new("QA-20")));
    assert!(outcome.warnings.contains(&OutcomeWarning::AmbiguousMatch {
        chosen: TicketKey::new("QA-20"),
        ignored: vec![TicketKey::new("QA-21")],
    }));
}

#[tokio::test]
async fn containing_title_is_used_when_no_exact_title_exists() {
    let tracker = FakeTracker::new().with_ticket("QA-21", "[Automation Bug] login page", TicketStatus::Open, 9);
    let engine = reconciler(tracker);

    let outcome = engine.reconcile(&record("login")).await;

    assert_eq!(outcome.action, Action::Commented(TicketKey::new("QA-21")));
    assert_eq!(engine.tracker().ticket_count(), 1);
}

#[tokio::test]
async fn artifacts_are_attached_once_and_vanished_files_are_skipped() {
    let engine = reconciler(FakeTracker::new());
    let (dir, paths) = artifacts_dir(&["a.png", "b.webm"]);
    let vanished = dir.path().join("trace.zip");
    let refs = vec![paths[0].clone(), paths[1].clone(), paths[0].clone(), vanished.clone()];

    let outcome = engine.reconcile(&record("upload").with_artifacts(refs)).await;

    let attaches = engine
        .tracker()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Attach(_, path) => Some(path),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(attaches, paths);
    assert_eq!(outcome.warnings, vec![OutcomeWarning::ArtifactMissing { path: vanished }]);
    assert!(matches!(outcome.action, Action::Created(_)));
}

#[tokio::test]
async fn rejected_upload_is_a_warning_and_later_artifacts_still_upload() {
    let (_dir, paths) = artifacts_dir(&["a.png", "b.webm", "trace.zip"]);
    let tracker = FakeTracker::new()
        .with_ticket("QA-11", "[Automation Bug] upload", TicketStatus::Open, 4)
        .failing_attachment(&paths[1]);
    let engine = reconciler(tracker);

    let outcome = engine.reconcile(&record("upload").with_artifacts(paths.clone())).await;

    assert_eq!(outcome.action, Action::Commented(TicketKey::new("QA-11")));
    assert_eq!(outcome.warnings.len(), 1);
    assert!(
        matches!(&outcome.warnings[0], OutcomeWarning::AttachmentFailed { path, error }
            if *path == paths[1] && error.contains("attachment rejected")),
        "unexpected warnings: {:?}",
        outcome.warnings
    );
    let attached = engine
        .tracker()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Attach(key, path) if key == "QA-11" => Some(path),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(attached, paths);
}

#[tokio::test]
async fn rejected_upload_does_not_undo_a_created_ticket() {
    let (_dir, paths) = artifacts_dir(&["a.png"]);
    let engine = reconciler(FakeTracker::new().failing_attachment(&paths[0]));

    let outcome = engine.reconcile(&record("fresh").with_artifacts(paths.clone())).await;

    assert_eq!(outcome.action, Action::Created(TicketKey::new("QA-101")));
    assert!(matches!(outcome.warnings.as_slice(), [OutcomeWarning::AttachmentFailed { .. }]));
}

#[tokio::test]
async fn declined_tests_are_skipped_without_tracker_calls() {
    let engine = reconciler(FakeTracker::new());

    let report = engine.run(vec![record("login"), record("cart")], &mut AlwaysNo).await;

    assert!(report
        .outcomes
        .iter()
        .all(|outcome| outcome.action == Action::Skipped(OPERATOR_DECLINED.to_string())));
    assert!(engine.tracker().calls().is_empty());
}

#[tokio::test]
async fn prompt_answers_drive_each_test() {
    let engine = reconciler(FakeTracker::new());
    let mut prompt = Prompt::new(Cursor::new("y\nn\n"), Vec::new());

    let report = engine.run(vec![record("login"), record("cart")], &mut prompt).await;

    assert!(matches!(report.outcomes[0].action, Action::Created(_)));
    assert_eq!(report.outcomes[1].action, Action::Skipped(OPERATOR_DECLINED.to_string()));
    assert_eq!(report.summary_line(), "done: 1 created, 0 reopened, 0 commented, 1 skipped, 0 failed");
}

#[tokio::test]
async fn comments_and_descriptions_link_the_report() {
    let tracker = FakeTracker::new().with_ticket("QA-2", "[Automation Bug] login", TicketStatus::Open, 2);
    let config = ReconcileConfig::new("QA").with_report_url(Some("https://ci.example/allure/42".to_string()));
    let engine = Reconciler::new(tracker, config);

    engine.reconcile(&record("login")).await;

    let comment = engine
        .tracker()
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Comment(_, body) => Some(body),
            _ => None,
        })
        .unwrap_or_else(|| panic!("a comment should have been posted"));
    assert!(comment.contains("**login** failed again on retest"));
    assert!(comment.contains("Click Submit"));
    assert!(comment.ends_with("Test Report: https://ci.example/allure/42"));

    let description = engine.description(&record("checkout"));
    assert!(description.starts_with("Automated test **checkout** failed."));
    assert!(description.contains("**Steps to Reproduce:**\nNavigate to \"/login\"\nClick Submit\n\n"));
}

#[tokio::test]
async fn description_without_report_url_says_not_available() {
    let engine = reconciler(FakeTracker::new());
    let description = engine.description(&record("x"));
    assert!(description.ends_with("Test Report: N/A"));
    let comment = engine.comment(&record("x"));
    assert!(!comment.contains("Test Report"));
}
