//! Graph-anchored alignment values.
//!
//! The aligner reports its result as a list of matrix positions; the types
//! here carry the reconstructed form: a path of [`Mapping`]s, each anchored
//! at an original node position and holding the edits that consume graph
//! and query bases.

pub mod trace;

use serde::{Deserialize, Serialize};

/// Alignment score as reported to the outside.
pub type Score = i32;

/// Coordinate of one dynamic-programming cell: split vertex, base offset
/// within the split, and base position in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixPosition {
    pub node: usize,
    pub node_offset: usize,
    pub seq_pos: usize,
}

impl MatrixPosition {
    pub fn new(node: usize, node_offset: usize, seq_pos: usize) -> Self {
        MatrixPosition { node, node_offset, seq_pos }
    }
}

/// An anchored position on an original node of the input graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub node_id: i64,
    pub offset: usize,
    pub is_reverse: bool,
}

/// One piece of an alignment: `from_length` graph bases against `to_length`
/// query bases, with the query bases spelled out whenever any were consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub from_length: usize,
    pub to_length: usize,
    pub sequence: String,
}

/// A maximal run of edits anchored at a single original node and strand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub position: Position,
    pub rank: i64,
    pub edits: Vec<Edit>,
}

/// A reconstructed sequence-to-graph alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    pub name: String,
    pub sequence: String,
    pub score: Score,
    pub path: Vec<Mapping>,
}

/// An alignment plus the bookkeeping the driver aggregates per read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentItem {
    pub alignment: Alignment,
    pub cells_processed: usize,
    pub elapsed_ms: u64,
    pub alignment_start: usize,
    pub alignment_end: usize,
}

impl AlignmentItem {
    /// The failure sentinel carries the maximum representable score.
    #[inline]
    pub fn alignment_failed(&self) -> bool {
        self.alignment.score == Score::MAX
    }
}
