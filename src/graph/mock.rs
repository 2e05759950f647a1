//! Helpers for building small split graphs in unit tests.

use crate::graph::builder::SplitGraphBuilder;
use crate::graph::sequence::SPLIT_NODE_SIZE;
use crate::graph::split::SplitGraph;

/// Builds a forward-strand graph from `(id, sequence)` nodes and
/// `(from, to)` edges targeting offset 0, finalized with component ordering.
pub(crate) fn build_graph(nodes: &[(i64, &str)], edges: &[(i64, i64)]) -> SplitGraph {
    let mut builder = SplitGraphBuilder::new();
    for &(id, sequence) in nodes {
        builder
            .add_node(id, sequence, &format!("node{id}"), false, &[0, sequence.len()])
            .unwrap();
    }
    for &(from, to) in edges {
        builder.add_edge(from, to, 0).unwrap();
    }
    builder.finalize(SPLIT_NODE_SIZE, true)
}

/// Two parallel paths between a source and a sink.
pub(crate) fn diamond_graph() -> SplitGraph {
    build_graph(
        &[(0, "ACGTACGT"), (2, "TT"), (4, "GGGG"), (6, "CATCAT")],
        &[(0, 2), (0, 4), (2, 6), (4, 6)],
    )
}
