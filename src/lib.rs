//! granola — an indexed split-node sequence graph for sequence-to-graph
//! alignment.
//!
//! An input bidirected sequence graph is rebuilt as a *split-node* graph:
//! every original node is cut at its breakpoints and then into strides of at
//! most one machine word of bases, so that a column-wise dynamic program can
//! treat each vertex as a single bit-packed word. The finalized graph also
//! carries the per-vertex analyses the aligner consumes (ambiguity
//! partition, linearizable flags, component ordering).
//!
//! The aligner itself lives outside this crate; it reads the finalized
//! [`graph::split::SplitGraph`] and hands its traces back to
//! [`alignment::trace::trace_to_alignment`] to obtain graph-anchored
//! alignments.

pub mod alignment;
pub mod errors;
pub mod graph;
