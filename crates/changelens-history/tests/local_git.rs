//! Integration test: local git history through the pipeline and the
//! structural engine, on a scratch repository.

use std::path::Path;

use changelens_core::ProgressReporter;
use changelens_history::local::LocalGitSource;
use changelens_history::pipeline::{HistoryPipeline, PipelineOptions};
use changelens_history::source::{RevisionSource, SourceMode};
use changelens_history::structural::StructuralEngine;
use git2::{Repository, Signature, Time};

fn commit_file(repo: &Repository, path: &str, content: &str, message: &str, when: i64) {
    let workdir = repo.workdir().unwrap();
    let full = workdir.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(&full, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::new("Dana", "dana@example.com", &Time::new(when, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

fn scratch_repo() -> (tempfile::TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let base = 1_700_000_000;
    commit_file(
        &repo,
        "api/openapi.json",
        r#"{"openapi": "3.1.0", "paths": {"/pets": {"get": {}}}}"#,
        "initial spec",
        base,
    );
    commit_file(&repo, "README.md", "docs", "unrelated change", base + 60);
    commit_file(
        &repo,
        "api/openapi.json",
        r#"{"openapi": "3.1.0", "paths": {"/pets": {"get": {}, "post": {}}}}"#,
        "add create pet\n\nbody",
        base + 120,
    );
    (dir, repo)
}

#[tokio::test]
async fn lists_only_commits_touching_the_file() {
    let (dir, _repo) = scratch_repo();
    let source = LocalGitSource::discover(&dir.path().join("api/openapi.json")).unwrap();
    assert_eq!(source.file_path(), "api/openapi.json");
    assert_eq!(source.mode(), SourceMode::Local);

    let listed = source.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].message, "add create pet");
    assert_eq!(listed[1].message, "initial spec");
    assert_eq!(listed[0].author, "Dana");
    assert_eq!(listed[0].timestamp.timestamp(), 1_700_000_120);

    let old = source.fetch(&listed[1].id).await.unwrap();
    assert!(String::from_utf8(old).unwrap().contains("\"get\""));
}

#[tokio::test]
async fn pipeline_diffs_local_history() {
    let (dir, _repo) = scratch_repo();
    let source = LocalGitSource::discover(&dir.path().join("api/openapi.json")).unwrap();
    let pipeline = HistoryPipeline::new(StructuralEngine::new(), PipelineOptions::default());
    let outcome = pipeline.run(&source, ProgressReporter::silent()).await;

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.revisions.len(), 2);
    let diff = outcome.revisions[0].diff.as_ref().unwrap();
    assert_eq!(diff.total_changes(), 1);
    assert_eq!(diff.breaking_changes(), 0);
    assert!(outcome.revisions[1].diff.is_none());
}

#[test]
fn discover_rejects_untracked_files() {
    let (dir, _repo) = scratch_repo();
    std::fs::write(dir.path().join("new.json"), "{}").unwrap();
    assert!(LocalGitSource::discover(&dir.path().join("new.json")).is_err());
    assert!(LocalGitSource::discover(&dir.path().join("missing.json")).is_err());
}

#[tokio::test]
async fn fetch_accepts_revision_expressions() {
    let (dir, _repo) = scratch_repo();
    let source = LocalGitSource::new(dir.path(), "api/openapi.json");
    let head = source.fetch("HEAD").await.unwrap();
    assert!(String::from_utf8(head).unwrap().contains("post"));
    assert!(source.fetch("not-a-ref").await.is_err());
}
