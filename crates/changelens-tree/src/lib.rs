//! Normalization of diff results into a change tree and change graph,
//! plus per-revision change statistics.

pub mod labels;
pub mod normalize;
pub mod render;
pub mod stats;

pub use normalize::{
    normalize, ChangeGraph, GraphEdge, GraphNode, Normalized, TreeNode, ROOT_KEY, ROOT_TITLE,
};
pub use render::{format_json, render_tree};
pub use stats::{aggregate, ChangeStatistics, CommitStatistics};
