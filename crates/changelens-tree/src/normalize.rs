//! The change-tree normalizer.
//!
//! One recursive pass over a [`DiffResult`] produces both the hierarchical
//! tree and the node/edge graph, so the two always have the same shape.
//! Containers that end up with no leaf changes are dropped from both.

use changelens_core::{Change, DiffResult, ObjectChanges, ObjectKind, SlotValue};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::labels::{container_label, leaf_subject, leaf_title};
use crate::stats::ChangeStatistics;

/// Key and id of the root node.
pub const ROOT_KEY: &str = "root";
/// Title of the root node.
pub const ROOT_TITLE: &str = "Document";

const DEFAULT_HEIGHT: u32 = 25;
const LEAF_HEIGHT: u32 = 45;
const DEFAULT_WIDTH: u32 = 150;
const MAX_WIDTH: u32 = 250;
const TEXT_LIMIT: usize = 20;
const TEXT_SIZE_BUMP: u32 = 5;
const TEXT_WIDTH_BUMP: u32 = 10;

/// A node of the normalized change tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub title: String,
    /// Unique within one traversal; equal to the matching graph node id.
    pub key: String,
    pub is_leaf: bool,
    pub selectable: bool,
    /// Leaf changes in this subtree (1 for a leaf).
    pub total_changes: usize,
    pub breaking_changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Change>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    /// Iterate over the leaves of this subtree, left to right.
    pub fn leaves(&self) -> Vec<&TreeNode> {
        if self.is_leaf {
            return vec![self];
        }
        self.children.iter().flat_map(TreeNode::leaves).collect()
    }

    /// Find a node by key.
    pub fn find(&self, key: &str) -> Option<&TreeNode> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(key))
    }
}

/// A node of the change graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Change>,
}

/// A parent to child edge of the change graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// The change graph: a tree expressed as nodes and edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ChangeGraph {
    /// Build a `petgraph` view: node weights are graph node ids, edge
    /// weights are edge ids.
    pub fn to_digraph(&self) -> DiGraph<String, String> {
        let mut graph = DiGraph::new();
        let mut index = std::collections::HashMap::<&str, NodeIndex>::new();
        for node in &self.nodes {
            let idx = graph.add_node(node.id.clone());
            index.insert(node.id.as_str(), idx);
        }
        for edge in &self.edges {
            if let (Some(&from), Some(&to)) =
                (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            {
                graph.add_edge(from, to, edge.id.clone());
            }
        }
        graph
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalized {
    pub tree: TreeNode,
    pub graph: ChangeGraph,
    pub statistics: ChangeStatistics,
}

/// Reduce a diff to a tree, a graph and statistics in a single pass.
///
/// Keyed collections are visited in key order and ordered collections in
/// source order, so the output is deterministic. Objects of unknown kind
/// and slots of unsupported shape are skipped.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind, ObjectChanges, ObjectKind};
/// use changelens_tree::normalize;
///
/// let info = ObjectChanges::new(ObjectKind::Info)
///     .with_properties("changes", vec![Change::new("version", ChangeKind::Modified)]);
/// let diff = ObjectChanges::new(ObjectKind::Document).with_object("info", info);
///
/// let normalized = normalize(&diff);
/// assert_eq!(normalized.tree.title, "Document");
/// assert_eq!(normalized.tree.children[0].title, "Info");
/// assert_eq!(normalized.tree.total_changes, 1);
/// assert_eq!(normalized.graph.nodes.len(), 3);
/// ```
pub fn normalize(diff: &DiffResult) -> Normalized {
    let mut builder = Builder::default();
    let children = builder.children(diff);
    let fragment = builder.assemble(
        ROOT_KEY.to_string(),
        ROOT_TITLE.to_string(),
        children,
    );
    Normalized {
        tree: fragment.node,
        graph: ChangeGraph {
            nodes: fragment.nodes,
            edges: fragment.edges,
        },
        statistics: builder.statistics,
    }
}

/// A finished subtree together with its graph nodes and edges.
struct Fragment {
    node: TreeNode,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

#[derive(Default)]
struct Builder {
    next_id: usize,
    statistics: ChangeStatistics,
}

impl Builder {
    fn next_key(&mut self, label: &str) -> String {
        self.next_id += 1;
        let slug: String = label
            .chars()
            .take(24)
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        format!("{}-{}", slug.trim_matches('-'), self.next_id)
    }

    /// Fragments for every present slot of `object`, in slot order.
    fn children(&mut self, object: &ObjectChanges) -> Vec<Fragment> {
        let mut children = Vec::new();
        for slot in &object.slots {
            match &slot.value {
                SlotValue::Properties(changes) => {
                    for change in changes {
                        children.push(self.leaf(change));
                    }
                }
                SlotValue::Object(Some(sub)) => {
                    let label = container_label(&slot.name, sub.kind, false);
                    children.extend(self.container(sub, label));
                }
                SlotValue::Keyed(Some(entries)) => {
                    for (key, sub) in entries {
                        children.extend(self.container(sub, key.clone()));
                    }
                }
                SlotValue::Ordered(Some(items)) => {
                    for item in items {
                        let label = container_label(&slot.name, item.kind, true);
                        children.extend(self.container(item, label));
                    }
                }
                SlotValue::Object(None)
                | SlotValue::Keyed(None)
                | SlotValue::Ordered(None)
                | SlotValue::Unsupported => {}
            }
        }
        children
    }

    fn container(&mut self, object: &ObjectChanges, label: String) -> Option<Fragment> {
        if object.kind == ObjectKind::Unknown {
            return None;
        }
        let key = self.next_key(&label);
        let children = self.children(object);
        if children.is_empty() {
            return None;
        }
        Some(self.assemble(key, label, children))
    }

    fn assemble(&mut self, key: String, title: String, children: Vec<Fragment>) -> Fragment {
        let mut nodes = vec![GraphNode {
            id: key.clone(),
            width: DEFAULT_WIDTH + text_bump(&title),
            height: DEFAULT_HEIGHT,
            label: title.clone(),
            data: None,
        }];
        let mut edges = Vec::new();
        let mut tree_children = Vec::with_capacity(children.len());
        let mut total = 0;
        let mut breaking = 0;

        for child in children {
            edges.push(edge(&key, &child.node.key));
            total += child.node.total_changes;
            breaking += child.node.breaking_changes;
            nodes.extend(child.nodes);
            edges.extend(child.edges);
            tree_children.push(child.node);
        }

        Fragment {
            node: TreeNode {
                title,
                key,
                is_leaf: false,
                selectable: false,
                total_changes: total,
                breaking_changes: breaking,
                change: None,
                children: tree_children,
            },
            nodes,
            edges,
        }
    }

    fn leaf(&mut self, change: &Change) -> Fragment {
        self.statistics.record(change);
        let subject = leaf_subject(change);
        let key = self.next_key(&subject);
        Fragment {
            nodes: vec![GraphNode {
                id: key.clone(),
                width: leaf_width(change, &subject),
                height: leaf_height(change),
                label: subject,
                data: Some(change.clone()),
            }],
            edges: Vec::new(),
            node: TreeNode {
                title: leaf_title(change),
                key,
                is_leaf: true,
                selectable: true,
                total_changes: 1,
                breaking_changes: usize::from(change.breaking),
                change: Some(change.clone()),
                children: Vec::new(),
            },
        }
    }
}

fn edge(from: &str, to: &str) -> GraphEdge {
    GraphEdge {
        id: format!("{from}-to-{to}"),
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Extra width for node text longer than the text limit.
fn text_bump(text: &str) -> u32 {
    let extra = text.chars().count().saturating_sub(TEXT_LIMIT);
    TEXT_SIZE_BUMP * u32::try_from(extra).unwrap_or(u32::MAX / TEXT_SIZE_BUMP)
}

/// Width needed to show a value inside a node.
fn value_width(value: Option<&str>) -> u32 {
    let len = value.map(|v| v.chars().count()).unwrap_or(0);
    if len <= TEXT_LIMIT {
        return DEFAULT_WIDTH;
    }
    let extra = u32::try_from(len - (TEXT_LIMIT - 1)).unwrap_or(u32::MAX / TEXT_WIDTH_BUMP);
    DEFAULT_WIDTH.saturating_add(TEXT_WIDTH_BUMP.saturating_mul(extra))
}

fn leaf_width(change: &Change, label: &str) -> u32 {
    let widest = value_width(change.original.as_deref())
        .max(value_width(change.new.as_deref()))
        .min(MAX_WIDTH);
    widest.saturating_add(text_bump(label))
}

fn leaf_height(change: &Change) -> u32 {
    let empty = |v: &Option<String>| v.as_deref().map_or(true, str::is_empty);
    if empty(&change.original) && empty(&change.new) {
        // no values to show
        DEFAULT_HEIGHT + 2
    } else {
        LEAF_HEIGHT
    }
}
