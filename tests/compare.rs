//! Runs the binary on two files compared directly, without git.

use std::path::Path;
use std::process::{Command, Output};

const OLD: &str = r#"{
  "openapi": "3.1.0",
  "info": {"title": "Pets", "version": "1.0.0"},
  "paths": {"/pets": {"get": {"summary": "List pets", "operationId": "listPets"}}}
}
"#;

const ADDITIVE: &str = r#"{
  "openapi": "3.1.0",
  "info": {"title": "Pets", "version": "1.0.0"},
  "paths": {"/pets": {"get": {"summary": "List pets", "operationId": "listPets"}, "post": {"summary": "Create"}}}
}
"#;

const BREAKING: &str = r#"{
  "openapi": "3.1.0",
  "info": {"title": "Pets", "version": "2.0.0"},
  "paths": {}
}
"#;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_changelens"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn fixture(newer: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("old.json"), OLD).unwrap();
    std::fs::write(dir.path().join("new.json"), newer).unwrap();
    dir
}

#[test]
fn summary_of_additive_change_succeeds() {
    let dir = fixture(ADDITIVE);
    let output = run(dir.path(), &["summary", "old.json", "new.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Post Added"));
    assert!(stdout.contains("Total Changes: 1"));
}

#[test]
fn summary_fails_on_breaking_changes() {
    let dir = fixture(BREAKING);
    let output = run(dir.path(), &["summary", "old.json", "new.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("breaking changes discovered"));

    let allowed = run(dir.path(), &["summary", "old.json", "new.json", "--allow-breaking"]);
    assert!(allowed.status.success());
}

#[test]
fn flat_report_lists_hashed_changes() {
    let dir = fixture(ADDITIVE);
    let output = run(dir.path(), &["report", "old.json", "new.json", "--flat"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let changes = report["reports"][0]["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["property"], "post");
    assert_eq!(changes[0]["hash"].as_str().unwrap().len(), 64);
}

#[test]
fn markdown_and_html_reports_are_written() {
    let dir = fixture(BREAKING);
    let md = run(dir.path(), &["markdown-report", "old.json", "new.json"]);
    assert!(md.status.success(), "{}", String::from_utf8_lossy(&md.stderr));
    let text = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(text.contains("## General Summary"));
    assert!(text.contains("#### Object Removed"));

    let html = run(dir.path(), &["html-report", "old.json", "new.json", "-o", "out.html"]);
    assert!(html.status.success(), "{}", String::from_utf8_lossy(&html.stderr));
    let page = std::fs::read_to_string(dir.path().join("out.html")).unwrap();
    assert!(page.contains("changelens-data"));
}

#[test]
fn missing_file_is_reported() {
    let dir = fixture(ADDITIVE);
    let output = run(dir.path(), &["summary", "old.json", "absent.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.json"));
}
