//! Integration tests: the history pipeline over in-memory sources.

use std::sync::Mutex;
use std::time::Duration;

use changelens_core::{
    progress_channel, Change, ChangeKind, ChangelensError, DiffResult, ErrorEvent, ObjectChanges,
    ObjectKind, ProgressEvent, RevisionDescriptor,
};
use changelens_history::engine::DiffEngine;
use changelens_history::pipeline::{HistoryPipeline, PipelineOptions, PipelineOutcome};
use changelens_history::source::{RevisionSource, SourceMode};
use chrono::{TimeZone, Utc};

struct FakeSource {
    mode: SourceMode,
    /// newest first
    revisions: Vec<(RevisionDescriptor, Vec<u8>)>,
    fail_on: Option<String>,
    fail_list: bool,
    fetched: Mutex<Vec<String>>,
}

impl FakeSource {
    /// `count` revisions `c1..=count`, content `v1..`, newest first.
    fn new(mode: SourceMode, count: usize) -> Self {
        let revisions = (1..=count)
            .rev()
            .map(|n| {
                let desc = RevisionDescriptor {
                    id: format!("c{n}"),
                    message: format!("commit {n}"),
                    author: "dana".into(),
                    author_email: "dana@example.com".into(),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, n as u32, 12, 0, 0).unwrap(),
                };
                (desc, format!("v{n}").into_bytes())
            })
            .collect();
        Self {
            mode,
            revisions,
            fail_on: None,
            fail_list: false,
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, id: &str) -> Self {
        self.fail_on = Some(id.into());
        self
    }

    fn set_content(mut self, id: &str, content: &[u8]) -> Self {
        for (desc, bytes) in &mut self.revisions {
            if desc.id == id {
                *bytes = content.to_vec();
            }
        }
        self
    }
}

impl RevisionSource for FakeSource {
    fn mode(&self) -> SourceMode {
        self.mode
    }

    fn describe(&self) -> String {
        "fake".into()
    }

    async fn list(&self) -> Result<Vec<RevisionDescriptor>, ChangelensError> {
        if self.fail_list {
            return Err(ChangelensError::Github("HTTP 404".into()));
        }
        Ok(self.revisions.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, ChangelensError> {
        // later commits resolve first so completion order differs from input order
        let n: u64 = id.trim_start_matches('c').parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(n * 3))).await;
        self.fetched.lock().unwrap().push(id.to_string());
        if self.fail_on.as_deref() == Some(id) {
            return Err(ChangelensError::Github(format!("connection reset fetching {id}")));
        }
        self.revisions
            .iter()
            .find(|(d, _)| d.id == id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| ChangelensError::InvalidReference(id.into()))
    }
}

/// Records the compared pair as a single modification; rejects "bad" input.
struct FakeEngine;

impl DiffEngine for FakeEngine {
    fn compare(&self, old: &[u8], new: &[u8]) -> Result<DiffResult, ChangelensError> {
        if new == b"bad" {
            return Err(ChangelensError::Engine("unable to parse document".into()));
        }
        let old = String::from_utf8_lossy(old);
        let new = String::from_utf8_lossy(new);
        Ok(ObjectChanges::new(ObjectKind::Document).with_properties(
            "changes",
            vec![Change::new("content", ChangeKind::Modified).with_values(Some(&old), Some(&new))],
        ))
    }
}

/// Reports one known change next to an object of a kind this version
/// does not understand.
struct FutureEngine;

impl DiffEngine for FutureEngine {
    fn compare(&self, _old: &[u8], _new: &[u8]) -> Result<DiffResult, ChangelensError> {
        let hologram = ObjectChanges::new(ObjectKind::Unknown).with_properties(
            "changes",
            vec![
                Change::new("beam", ChangeKind::Modified).breaking(),
                Change::new("glow", ChangeKind::PropertyAdded),
            ],
        );
        Ok(ObjectChanges::new(ObjectKind::Document)
            .with_properties("changes", vec![Change::new("openapi", ChangeKind::Modified)])
            .with_object("hologram", hologram))
    }
}

async fn run(
    source: &FakeSource,
    options: PipelineOptions,
) -> (PipelineOutcome, Vec<ProgressEvent>, Vec<ErrorEvent>) {
    run_with(source, FakeEngine, options).await
}

async fn run_with<E: DiffEngine>(
    source: &FakeSource,
    engine: E,
    options: PipelineOptions,
) -> (PipelineOutcome, Vec<ProgressEvent>, Vec<ErrorEvent>) {
    let (reporter, channels) = progress_channel(2);
    let consumer = tokio::spawn(channels.drain());
    let pipeline = HistoryPipeline::new(engine, options);
    let outcome = pipeline.run(source, reporter).await;
    let (events, errors) = consumer.await.unwrap();
    (outcome, events, errors)
}

fn options() -> PipelineOptions {
    PipelineOptions {
        concurrency: 3,
        ..PipelineOptions::default()
    }
}

fn diff_pair(outcome: &PipelineOutcome, idx: usize) -> Option<(String, String)> {
    let diff = outcome.revisions[idx].diff.as_ref()?;
    let change = diff.all_changes().next()?;
    Some((change.original.clone()?, change.new.clone()?))
}

#[tokio::test]
async fn single_revision_has_no_diff() {
    let source = FakeSource::new(SourceMode::Local, 1);
    let (outcome, events, errors) = run(&source, options()).await;
    assert_eq!(outcome.revisions.len(), 1);
    assert!(outcome.revisions[0].diff.is_none());
    assert!(outcome.errors.is_empty());
    assert!(errors.is_empty());
    assert!(events.last().unwrap().completed);
}

#[tokio::test]
async fn local_history_pairs_each_revision_with_its_predecessor() {
    let source = FakeSource::new(SourceMode::Local, 4);
    let (outcome, _, _) = run(&source, options()).await;

    let ids: Vec<&str> = outcome.revisions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["c4", "c3", "c2", "c1"]);
    assert_eq!(outcome.diff_count(), 3);
    assert!(outcome.revisions[3].diff.is_none());
    assert_eq!(diff_pair(&outcome, 0), Some(("v3".into(), "v4".into())));
    assert_eq!(diff_pair(&outcome, 2), Some(("v1".into(), "v2".into())));
    assert_eq!(
        outcome.revisions[0].previous_content.as_deref(),
        Some(b"v3".as_slice())
    );
    // local sources are read strictly oldest to newest
    assert_eq!(*source.fetched.lock().unwrap(), vec!["c1", "c2", "c3", "c4"]);
}

#[tokio::test]
async fn remote_history_matches_local_results() {
    let source = FakeSource::new(SourceMode::Remote, 5);
    let (outcome, events, errors) = run(&source, options()).await;
    assert!(errors.is_empty());
    assert_eq!(outcome.revisions.len(), 5);
    assert_eq!(outcome.diff_count(), 4);
    assert_eq!(diff_pair(&outcome, 0), Some(("v4".into(), "v5".into())));

    // fetch progress is reported in history order despite concurrent completion
    let fetched: Vec<&str> = events
        .iter()
        .filter(|e| e.job == "fetch")
        .map(|e| e.message.split_whitespace().nth(1).unwrap_or(""))
        .collect();
    assert_eq!(fetched, vec!["c1", "c2", "c3", "c4", "c5"]);

    // every fetch event precedes every diff event
    let last_fetch = events.iter().rposition(|e| e.job == "fetch").unwrap();
    let first_diff = events.iter().position(|e| e.job == "diff").unwrap();
    assert!(last_fetch < first_diff);
    assert!(events.last().unwrap().completed);
}

#[tokio::test]
async fn remote_fetch_failure_aborts_the_batch() {
    let source = FakeSource::new(SourceMode::Remote, 5).failing_on("c3");
    let (outcome, events, errors) = run(&source, options()).await;

    assert!(outcome.revisions.is_empty());
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].fatal);
    assert!(outcome.fatal().unwrap().message.contains("c3"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].fatal);
    assert!(events.iter().all(|e| e.job != "diff"));
    assert!(events.iter().all(|e| !e.completed));
}

#[tokio::test]
async fn local_fetch_failure_is_fatal() {
    let source = FakeSource::new(SourceMode::Local, 3).failing_on("c2");
    let (outcome, _, errors) = run(&source, options()).await;
    assert!(outcome.revisions.is_empty());
    assert!(outcome.fatal().is_some());
    assert_eq!(errors.len(), 1);
    // nothing after the failing revision was read
    assert_eq!(*source.fetched.lock().unwrap(), vec!["c1", "c2"]);
}

#[tokio::test]
async fn local_failure_on_the_newest_revision_discards_earlier_diffs() {
    let source = FakeSource::new(SourceMode::Local, 4).failing_on("c4");
    let (outcome, events, errors) = run(&source, options()).await;

    assert!(outcome.revisions.is_empty());
    assert!(outcome.fatal().unwrap().message.contains("c4"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].fatal);
    // older pairs were already diffed before the failing read
    assert!(events.iter().any(|e| e.job == "diff"));
    assert!(events.iter().all(|e| !e.completed));
    assert_eq!(*source.fetched.lock().unwrap(), vec!["c1", "c2", "c3", "c4"]);
}

#[tokio::test]
async fn progress_counts_match_tree_statistics() {
    let source = FakeSource::new(SourceMode::Local, 2);
    let (outcome, events, _) = run_with(&source, FutureEngine, options()).await;

    let diff = outcome.revisions[0].diff.as_ref().unwrap();
    let statistics = changelens_tree::normalize(diff).statistics;
    assert_eq!(statistics.total, 1);
    assert_eq!(diff.total_changes(), statistics.total);
    assert!(events
        .iter()
        .any(|e| e.job == "diff" && e.message == "c2: 1 changes"));
}

#[tokio::test]
async fn diff_failure_is_recorded_and_processing_continues() {
    let source = FakeSource::new(SourceMode::Local, 4).set_content("c3", b"bad");
    let (outcome, _, errors) = run(&source, options()).await;

    assert_eq!(outcome.revisions.len(), 4);
    assert!(outcome.fatal().is_none());
    assert_eq!(outcome.errors.len(), 1);
    assert!(!outcome.errors[0].fatal);
    assert_eq!(errors.len(), 1);
    // c3 failed, c4 was still diffed (against c3's content)
    assert!(outcome.revisions[1].diff.is_none());
    assert_eq!(diff_pair(&outcome, 0), Some(("bad".into(), "v4".into())));
    assert_eq!(outcome.diff_count(), 2);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("c3"));
}

#[tokio::test]
async fn base_revision_makes_diffs_cumulative() {
    let source = FakeSource::new(SourceMode::Remote, 4);
    let options = PipelineOptions {
        base: Some("c1".into()),
        ..options()
    };
    let (outcome, _, _) = run(&source, options).await;
    assert_eq!(outcome.diff_count(), 3);
    assert_eq!(diff_pair(&outcome, 0), Some(("v1".into(), "v4".into())));
    assert_eq!(diff_pair(&outcome, 1), Some(("v1".into(), "v3".into())));
    assert!(outcome.revisions[3].diff.is_none());
}

#[tokio::test]
async fn base_outside_the_selection_is_fetched() {
    let source = FakeSource::new(SourceMode::Local, 5);
    let options = PipelineOptions {
        base: Some("c1".into()),
        limit: Some(2),
        ..options()
    };
    let (outcome, _, _) = run(&source, options).await;
    assert_eq!(outcome.revisions.len(), 2);
    assert_eq!(outcome.diff_count(), 2);
    assert_eq!(diff_pair(&outcome, 1), Some(("v1".into(), "v4".into())));
}

#[tokio::test]
async fn limit_bounds_work_before_fetching() {
    let source = FakeSource::new(SourceMode::Remote, 5);
    let options = PipelineOptions {
        limit: Some(3),
        ..options()
    };
    let (outcome, _, _) = run(&source, options).await;
    let ids: Vec<&str> = outcome.revisions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["c5", "c4", "c3"]);
    assert_eq!(outcome.diff_count(), 2);
    assert_eq!(source.fetched.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn content_budget_drops_oldest_remote_revisions() {
    let big = vec![b'x'; 4 * 1024];
    let source = FakeSource::new(SourceMode::Remote, 4)
        .set_content("c1", &big)
        .set_content("c2", &big)
        .set_content("c3", &big)
        .set_content("c4", &big);
    let options = PipelineOptions {
        max_content_kb: Some(9),
        ..options()
    };
    let (outcome, events, _) = run(&source, options).await;
    let ids: Vec<&str> = outcome.revisions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["c4", "c3"]);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("2 oldest"));
    assert!(events.iter().any(|e| e.warning && e.job == "budget"));
}

#[tokio::test]
async fn listing_failure_is_fatal() {
    let mut source = FakeSource::new(SourceMode::Remote, 2);
    source.fail_list = true;
    let (outcome, _, errors) = run(&source, options()).await;
    assert!(outcome.revisions.is_empty());
    assert!(outcome.fatal().is_some());
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn empty_history_is_not_an_error() {
    let source = FakeSource::new(SourceMode::Local, 0);
    let (outcome, events, errors) = run(&source, options()).await;
    assert!(outcome.revisions.is_empty());
    assert!(outcome.errors.is_empty());
    assert!(errors.is_empty());
    assert!(events.last().unwrap().completed);
}
