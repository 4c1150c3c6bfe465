use std::fmt::Write;

use changelens_core::ChangelensError;

use crate::normalize::{Normalized, TreeNode};

/// Render a change tree as indented text with box-drawing characters.
///
/// Containers show their change counts; leaves show their title only.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind, ObjectChanges, ObjectKind};
/// use changelens_tree::{normalize, render_tree};
///
/// let diff = ObjectChanges::new(ObjectKind::Document)
///     .with_properties("changes", vec![Change::new("openapi", ChangeKind::Modified)]);
/// let text = render_tree(&normalize(&diff).tree);
/// assert_eq!(text, "Document (1 change)\n\u{2514}\u{2500}\u{2500} Openapi Modified\n");
/// ```
pub fn render_tree(root: &TreeNode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading(root));
    render_children(&mut out, &root.children, "");
    out
}

fn render_children(out: &mut String, children: &[TreeNode], prefix: &str) {
    let count = children.len();
    for (idx, child) in children.iter().enumerate() {
        let is_last = idx == count - 1;
        let branch = if is_last {
            "\u{2514}\u{2500}\u{2500} "
        } else {
            "\u{251c}\u{2500}\u{2500} "
        };
        let _ = writeln!(out, "{prefix}{branch}{}", heading(child));

        let child_prefix = if is_last { "    " } else { "\u{2502}   " };
        render_children(out, &child.children, &format!("{prefix}{child_prefix}"));
    }
}

fn heading(node: &TreeNode) -> String {
    if node.is_leaf {
        return node.title.clone();
    }
    let noun = if node.total_changes == 1 { "change" } else { "changes" };
    if node.breaking_changes > 0 {
        format!(
            "{} ({} {noun}, {} breaking)",
            node.title, node.total_changes, node.breaking_changes
        )
    } else {
        format!("{} ({} {noun})", node.title, node.total_changes)
    }
}

/// Serialize a normalized diff as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ChangelensError::Serialization`] if encoding fails.
pub fn format_json(normalized: &Normalized) -> Result<String, ChangelensError> {
    serde_json::to_string_pretty(normalized).map_err(ChangelensError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use changelens_core::{Change, ChangeKind, ObjectChanges, ObjectKind};
    use std::collections::BTreeMap;

    #[test]
    fn nested_branches_are_indented() {
        let get = ObjectChanges::new(ObjectKind::Operation).with_properties(
            "changes",
            vec![
                Change::new("summary", ChangeKind::Modified),
                Change::new("operationId", ChangeKind::PropertyRemoved).breaking(),
            ],
        );
        let item = ObjectChanges::new(ObjectKind::PathItem).with_object("get", get);
        let paths = ObjectChanges::new(ObjectKind::Paths)
            .with_keyed("pathItems", BTreeMap::from([("/pets".to_string(), item)]));
        let diff = ObjectChanges::new(ObjectKind::Document)
            .with_properties("changes", vec![Change::new("openapi", ChangeKind::Modified)])
            .with_object("paths", paths);

        let text = render_tree(&normalize(&diff).tree);
        let expected = "\
Document (3 changes, 1 breaking)
\u{251c}\u{2500}\u{2500} Openapi Modified
\u{2514}\u{2500}\u{2500} Paths (2 changes, 1 breaking)
    \u{2514}\u{2500}\u{2500} /pets (2 changes, 1 breaking)
        \u{2514}\u{2500}\u{2500} GET (2 changes, 1 breaking)
            \u{251c}\u{2500}\u{2500} Summary Modified
            \u{2514}\u{2500}\u{2500} OperationId Removed [breaking]
";
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_tree_renders_root_only() {
        let text = render_tree(&normalize(&ObjectChanges::new(ObjectKind::Document)).tree);
        assert_eq!(text, "Document (0 changes)\n");
    }

    #[test]
    fn json_uses_camel_case() {
        let diff = ObjectChanges::new(ObjectKind::Document)
            .with_properties("changes", vec![Change::new("openapi", ChangeKind::Modified)]);
        let json = format_json(&normalize(&diff)).unwrap();
        assert!(json.contains("\"totalChanges\": 1"));
        assert!(json.contains("\"isLeaf\": true"));
        assert!(json.contains("\"edges\""));
    }
}
