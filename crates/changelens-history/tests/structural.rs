//! Breaking-change rules of the built-in comparator on whole documents.

use changelens_core::{Change, ChangeKind, DiffResult};
use changelens_history::engine::DiffEngine;
use changelens_history::structural::StructuralEngine;

fn compare(old: &str, new: &str) -> DiffResult {
    StructuralEngine::new()
        .compare(old.as_bytes(), new.as_bytes())
        .unwrap()
}

fn removed<'a>(diff: &'a DiffResult, key: &str) -> &'a Change {
    diff.all_changes()
        .find(|c| {
            c.kind == ChangeKind::ObjectRemoved
                && c.property != "required"
                && c.original.as_deref() == Some(key)
        })
        .unwrap_or_else(|| panic!("no removal of {key}"))
}

const OWNER_V1: &str = r#"{
    "openapi": "3.1.0",
    "components": {"schemas": {"Owner": {
        "type": "object",
        "required": ["id", "description", "title", "tags"],
        "properties": {
            "id": {"type": "integer"},
            "description": {"type": "string"},
            "title": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    }}}
}"#;

const OWNER_V2: &str = r#"{
    "openapi": "3.1.0",
    "components": {"schemas": {"Owner": {
        "type": "object",
        "required": ["id"],
        "properties": {
            "id": {"type": "integer"}
        }
    }}}
}"#;

#[test]
fn removed_properties_named_like_keywords_are_breaking() {
    let diff = compare(OWNER_V1, OWNER_V2);
    for name in ["description", "title", "tags"] {
        let change = removed(&diff, name);
        assert!(change.breaking, "{name} removal should be breaking");
    }
}

#[test]
fn removed_path_and_response_code_are_breaking() {
    let old = r#"{"paths": {
        "/pets": {"get": {"responses": {"200": {"description": "ok"}, "404": {"description": "no"}}}},
        "/summary": {"get": {"responses": {"200": {"description": "ok"}}}}
    }}"#;
    let new = r#"{"paths": {
        "/pets": {"get": {"responses": {"200": {"description": "ok"}}}}
    }}"#;
    let diff = compare(old, new);
    assert!(removed(&diff, "/summary").breaking);
    let code = removed(&diff, "404");
    assert_eq!(code.property, "codes");
    assert!(code.breaking);
}

#[test]
fn keyword_fields_keep_their_rules() {
    let old = r#"{"info": {"title": "Pets", "description": "All pets"}}"#;
    let new = r#"{"info": {"title": "Pets"}}"#;
    let diff = compare(old, new);
    let change = diff.all_changes().next().unwrap();
    assert_eq!(change.property, "description");
    assert_eq!(change.kind, ChangeKind::PropertyRemoved);
    assert!(!change.breaking);
}
