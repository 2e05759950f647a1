//! The finalized, immutable split-node graph.

use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;

use crate::graph::builder::NeighborList;
use crate::graph::sequence::{AmbiguousChunks, NodeChunks};

/// Index tables of the split-node graph, produced once by
/// [`SplitGraphBuilder::finalize`](crate::graph::builder::SplitGraphBuilder::finalize)
/// and shared read-only across aligner threads.
///
/// Split vertices are dense indices `0..node_count()`. Vertices below
/// [`first_ambiguous`](Self::first_ambiguous) store their bases two bits
/// each in [`NodeChunks`]; the rest store four admission masks in
/// [`AmbiguousChunks`]. Both adjacency directions are kept: the aligner
/// walks out-edges forward while the linearizable analysis walks in-edges
/// backward, and neither wants a per-query reversal.
#[derive(Debug, Clone)]
pub struct SplitGraph {
    pub(crate) node_length: Vec<usize>,
    pub(crate) node_lookup: FxHashMap<i64, Vec<usize>>,
    pub(crate) node_ids: Vec<i64>,
    pub(crate) node_offset: Vec<usize>,
    pub(crate) reverse: FixedBitSet,
    pub(crate) in_neighbors: Vec<NeighborList>,
    pub(crate) out_neighbors: Vec<NeighborList>,
    pub(crate) node_sequences: Vec<NodeChunks>,
    pub(crate) ambiguous_sequences: Vec<AmbiguousChunks>,
    pub(crate) first_ambiguous: usize,
    pub(crate) linearizable: FixedBitSet,
    pub(crate) component_number: Vec<usize>,
    pub(crate) original_node_size: FxHashMap<i64, usize>,
    pub(crate) original_node_name: FxHashMap<i64, String>,
}

impl SplitGraph {
    /// Number of split vertices.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_length.len()
    }

    /// Number of original input nodes with at least one split.
    #[inline]
    pub fn original_node_count(&self) -> usize {
        self.node_lookup.len()
    }

    #[inline]
    pub fn node_length(&self, split: usize) -> usize {
        self.node_length[split]
    }

    /// Id of the original node this split was cut from.
    #[inline]
    pub fn original_id(&self, split: usize) -> i64 {
        self.node_ids[split]
    }

    /// Byte offset of this split inside its original node's forward sequence.
    #[inline]
    pub fn node_offset(&self, split: usize) -> usize {
        self.node_offset[split]
    }

    /// Strand of the split within the bidirected input model.
    #[inline]
    pub fn is_reverse(&self, split: usize) -> bool {
        self.reverse.contains(split)
    }

    /// Partition boundary: splits below it are definite, the rest ambiguous.
    #[inline]
    pub fn first_ambiguous(&self) -> usize {
        self.first_ambiguous
    }

    #[inline]
    pub fn is_ambiguous(&self, split: usize) -> bool {
        split >= self.first_ambiguous
    }

    /// Whether the split sits on a unique-in-degree tail that flows into a
    /// branching vertex; the aligner takes a faster code path on such tails.
    #[inline]
    pub fn linearizable(&self, split: usize) -> bool {
        self.linearizable.contains(split)
    }

    #[inline]
    pub fn has_component_order(&self) -> bool {
        !self.component_number.is_empty()
    }

    /// Component number of the split; along every edge the number never
    /// decreases. Only available when the graph was finalized with
    /// component ordering.
    #[inline]
    pub fn component(&self, split: usize) -> usize {
        self.component_number[split]
    }

    #[inline]
    pub fn in_neighbors(&self, split: usize) -> &[usize] {
        &self.in_neighbors[split]
    }

    #[inline]
    pub fn out_neighbors(&self, split: usize) -> &[usize] {
        &self.out_neighbors[split]
    }

    /// The base at `pos` of a split: one of `ACGT` for definite splits, the
    /// stored IUPAC code for ambiguous ones.
    pub fn base_at(&self, split: usize, pos: usize) -> u8 {
        assert!(pos < self.node_length[split]);
        if split < self.first_ambiguous {
            self.node_sequences[split].base_at(pos)
        } else {
            self.ambiguous_sequences[split - self.first_ambiguous].base_at(pos)
        }
    }

    /// Packed chunks of a definite split, for word-parallel consumption.
    #[inline]
    pub fn chunks(&self, split: usize) -> NodeChunks {
        debug_assert!(split < self.first_ambiguous);
        self.node_sequences[split]
    }

    /// Admission masks of an ambiguous split.
    #[inline]
    pub fn ambiguous_chunks(&self, split: usize) -> AmbiguousChunks {
        debug_assert!(split >= self.first_ambiguous);
        self.ambiguous_sequences[split - self.first_ambiguous]
    }

    /// Splits covering original node `id`, in ascending offset order.
    #[inline]
    pub fn splits_of(&self, id: i64) -> &[usize] {
        &self.node_lookup[&id]
    }

    #[inline]
    pub fn original_node_size(&self, id: i64) -> usize {
        self.original_node_size[&id]
    }

    /// Name recorded for original node `id`, or empty if unknown.
    pub fn original_node_name(&self, id: i64) -> &str {
        self.original_node_name.get(&id).map(String::as_str).unwrap_or("")
    }

    /// The split of original node `id` covering `offset`. Starts from a
    /// proportional estimate and scans at most a few entries in either
    /// direction, amortized constant on uniformly cut nodes.
    pub fn unitig_node(&self, id: i64, offset: usize) -> usize {
        let splits = &self.node_lookup[&id];
        debug_assert!(!splits.is_empty());
        let mut index = splits.len() * offset / self.original_node_size[&id];
        if index >= splits.len() {
            index = splits.len() - 1;
        }
        while index < splits.len() - 1
            && self.node_offset[splits[index]] + self.node_length[splits[index]] <= offset
        {
            index += 1;
        }
        while index > 0 && self.node_offset[splits[index]] > offset {
            index -= 1;
        }
        let result = splits[index];
        debug_assert!(self.node_offset[result] <= offset);
        debug_assert!(offset < self.node_offset[result] + self.node_length[result]);
        result
    }

    /// Maps a position on original node `id` to the same physical position
    /// on its reverse complement. Ids pair even/odd: the mate of `id` is
    /// `id ^ 1`.
    pub fn reverse_position(&self, id: i64, offset: usize) -> (i64, usize) {
        debug_assert!(self.node_lookup.contains_key(&id));
        let original_size = self.original_node_size[&id];
        assert!(offset < original_size);
        (id ^ 1, original_size - offset - 1)
    }

    /// Full cross-check of the index tables, run behind a debug assertion
    /// at finalize time.
    pub(crate) fn check_consistency(&self) -> bool {
        for (split, neighbors) in self.in_neighbors.iter().enumerate() {
            for &neighbor in neighbors.iter() {
                if !self.out_neighbors[neighbor].contains(&split) {
                    return false;
                }
            }
        }
        for (split, neighbors) in self.out_neighbors.iter().enumerate() {
            for &neighbor in neighbors.iter() {
                if !self.in_neighbors[neighbor].contains(&split) {
                    return false;
                }
            }
        }
        for (&id, splits) in &self.node_lookup {
            let mut covered = 0;
            let mut last_offset = None;
            for &split in splits {
                if self.node_ids[split] != id {
                    return false;
                }
                if last_offset.is_some_and(|prev| self.node_offset[split] <= prev) {
                    return false;
                }
                last_offset = Some(self.node_offset[split]);
                covered += self.node_length[split];
            }
            if covered != self.original_node_size[&id] {
                return false;
            }
        }
        true
    }
}
