//! Construction of the split-node graph.
//!
//! The builder accumulates nodes and edges of the input bidirected graph,
//! cutting every node at its breakpoints and then into word-sized splits.
//! [`SplitGraphBuilder::finalize`] consumes the builder, renumbers ambiguous
//! splits to the end of the index space, runs the per-vertex analyses and
//! returns the immutable [`SplitGraph`]; after that point no mutation is
//! possible by construction.

use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::errors::GranolaError;
use crate::graph::analysis;
use crate::graph::sequence::{self, AmbiguousChunks, NodeChunks, SplitSequence, SPLIT_NODE_SIZE};
use crate::graph::split::SplitGraph;

/// Adjacency row of one split vertex. Sequence graphs branch rarely, so two
/// neighbors live inline.
pub(crate) type NeighborList = SmallVec<[usize; 2]>;

/// Mutable accumulator for the split-node graph.
///
/// Original node ids follow the bidirected even/odd convention: the reverse
/// complement of node `id` is node `id ^ 1`. [`SplitGraph::reverse_position`]
/// relies on this pairing, so callers must assign ids accordingly.
#[derive(Debug, Default)]
pub struct SplitGraphBuilder {
    node_length: Vec<usize>,
    node_lookup: FxHashMap<i64, Vec<usize>>,
    node_ids: Vec<i64>,
    node_offset: Vec<usize>,
    reverse: Vec<bool>,
    in_neighbors: Vec<NeighborList>,
    out_neighbors: Vec<NeighborList>,
    node_sequences: Vec<NodeChunks>,
    ambiguous_sequences: Vec<AmbiguousChunks>,
    ambiguous: Vec<bool>,
    original_node_size: FxHashMap<i64, usize>,
    original_node_name: FxHashMap<i64, String>,
}

impl SplitGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity hint; safe to omit.
    pub fn reserve(&mut self, num_originals: usize, num_splits: usize) {
        self.node_length.reserve(num_splits);
        self.node_lookup.reserve(num_originals);
        self.node_ids.reserve(num_splits);
        self.node_offset.reserve(num_splits);
        self.reverse.reserve(num_splits);
        self.in_neighbors.reserve(num_splits);
        self.out_neighbors.reserve(num_splits);
        self.node_sequences.reserve(num_splits);
        self.ambiguous_sequences.reserve(num_splits);
        self.ambiguous.reserve(num_splits);
    }

    /// Adds one original node, splitting its sequence at `breakpoints` and
    /// then into strides of at most [`SPLIT_NODE_SIZE`] bases. Consecutive
    /// splits of the node are linked by an implicit edge.
    ///
    /// Re-adding an already present `id` is a no-op: subgraph extraction may
    /// legally produce overlapping subgraphs with shared nodes.
    ///
    /// `breakpoints` must start at 0, end at the sequence length and never
    /// decrease; equal consecutive breakpoints delimit an empty span, which
    /// is skipped.
    pub fn add_node(
        &mut self,
        id: i64,
        sequence: &str,
        name: &str,
        reverse: bool,
        breakpoints: &[usize],
    ) -> Result<(), GranolaError> {
        if self.node_lookup.contains_key(&id) {
            return Ok(());
        }
        let seq = sequence.as_bytes();
        let well_formed = breakpoints.len() >= 2
            && breakpoints[0] == 0
            && *breakpoints.last().unwrap() == seq.len()
            && breakpoints.windows(2).all(|span| span[0] <= span[1]);
        if !well_formed {
            return Err(GranolaError::MalformedBreakpoints { node: id });
        }
        self.original_node_size.insert(id, seq.len());
        self.original_node_name.insert(id, name.to_owned());
        for span in breakpoints.windows(2) {
            if span[0] == span[1] {
                continue;
            }
            for offset in (span[0]..span[1]).step_by(SPLIT_NODE_SIZE) {
                let size = SPLIT_NODE_SIZE.min(span[1] - offset);
                self.add_split(id, offset, &seq[offset..offset + size], reverse)?;
                if offset > 0 {
                    // consecutive splits of one original stay implicitly linked
                    let last = self.node_length.len() - 1;
                    debug_assert_eq!(self.node_ids[last - 1], self.node_ids[last]);
                    debug_assert_eq!(
                        self.node_offset[last - 1] + self.node_length[last - 1],
                        self.node_offset[last]
                    );
                    self.out_neighbors[last - 1].push(last);
                    self.in_neighbors[last].push(last - 1);
                }
            }
        }
        Ok(())
    }

    fn add_split(
        &mut self,
        id: i64,
        offset: usize,
        sequence: &[u8],
        reverse: bool,
    ) -> Result<(), GranolaError> {
        debug_assert!(!sequence.is_empty());
        debug_assert!(sequence.len() <= SPLIT_NODE_SIZE);
        let encoded = sequence::encode(sequence)?;
        let index = self.node_length.len();
        self.node_lookup.entry(id).or_default().push(index);
        self.node_length.push(sequence.len());
        self.node_ids.push(id);
        self.node_offset.push(offset);
        self.reverse.push(reverse);
        self.in_neighbors.push(NeighborList::new());
        self.out_neighbors.push(NeighborList::new());
        match encoded {
            SplitSequence::Definite(chunks) => {
                self.ambiguous.push(false);
                self.node_sequences.push(chunks);
            }
            SplitSequence::Ambiguous(masks) => {
                self.ambiguous.push(true);
                self.ambiguous_sequences.push(masks);
            }
        }
        debug_assert_eq!(self.node_ids.len(), self.node_length.len());
        debug_assert_eq!(self.in_neighbors.len(), self.out_neighbors.len());
        Ok(())
    }

    /// Adds the edge from the trailing split of `from_id` to the split of
    /// `to_id` starting at `to_start_offset`. Both endpoints must already
    /// have been added; a repeated edge is dropped.
    pub fn add_edge(
        &mut self,
        from_id: i64,
        to_id: i64,
        to_start_offset: usize,
    ) -> Result<(), GranolaError> {
        let from = self
            .node_lookup
            .get(&from_id)
            .and_then(|splits| splits.last().copied())
            .ok_or(GranolaError::UnknownNode(from_id))?;
        debug_assert_eq!(
            self.node_offset[from] + self.node_length[from],
            self.original_node_size[&from_id]
        );
        let to = self
            .node_lookup
            .get(&to_id)
            .ok_or(GranolaError::UnknownNode(to_id))?
            .iter()
            .copied()
            .find(|&split| self.node_offset[split] == to_start_offset)
            .ok_or(GranolaError::NoSplitAtOffset { node: to_id, offset: to_start_offset })?;
        if !self.in_neighbors[to].contains(&from) {
            self.in_neighbors[to].push(from);
        }
        if !self.out_neighbors[from].contains(&to) {
            self.out_neighbors[from].push(to);
        }
        Ok(())
    }

    /// Freezes the graph. `word_size` is the aligner's word width and must
    /// not exceed [`SPLIT_NODE_SIZE`]; `do_component_order` gates the
    /// strongly-connected-component numbering pass.
    pub fn finalize(mut self, word_size: usize, do_component_order: bool) -> SplitGraph {
        assert!(word_size <= SPLIT_NODE_SIZE);
        debug_assert_eq!(
            self.node_sequences.len() + self.ambiguous_sequences.len(),
            self.node_length.len()
        );
        debug_assert_eq!(self.in_neighbors.len(), self.node_length.len());
        debug_assert_eq!(self.out_neighbors.len(), self.node_length.len());
        debug_assert_eq!(self.reverse.len(), self.node_length.len());
        debug_assert_eq!(self.node_ids.len(), self.node_length.len());

        let first_ambiguous = self.renumber_ambiguous_to_end();
        self.ambiguous = Vec::new();

        let linearizable = analysis::find_linearizable(&self.in_neighbors);

        let mut edges = 0;
        let mut branching = 0;
        for neighbors in &mut self.in_neighbors {
            neighbors.shrink_to_fit();
            edges += neighbors.len();
            if neighbors.len() >= 2 {
                branching += 1;
            }
        }
        for neighbors in &mut self.out_neighbors {
            neighbors.shrink_to_fit();
        }
        debug!("{} original nodes", self.node_lookup.len());
        debug!("{} split nodes", self.node_length.len());
        debug!("{} ambiguous split nodes", self.ambiguous_sequences.len());
        debug!("{} edges", edges);
        debug!("{} nodes with in-degree >= 2", branching);

        self.node_length.shrink_to_fit();
        self.node_ids.shrink_to_fit();
        self.node_offset.shrink_to_fit();
        self.in_neighbors.shrink_to_fit();
        self.out_neighbors.shrink_to_fit();
        self.node_sequences.shrink_to_fit();
        self.ambiguous_sequences.shrink_to_fit();

        let component_number = if do_component_order {
            debug!("use component ordering");
            analysis::component_order(&self.out_neighbors)
        } else {
            Vec::new()
        };

        let mut strand = FixedBitSet::with_capacity(self.reverse.len());
        for (split, &reverse) in self.reverse.iter().enumerate() {
            if reverse {
                strand.insert(split);
            }
        }

        let graph = SplitGraph {
            node_length: self.node_length,
            node_lookup: self.node_lookup,
            node_ids: self.node_ids,
            node_offset: self.node_offset,
            reverse: strand,
            in_neighbors: self.in_neighbors,
            out_neighbors: self.out_neighbors,
            node_sequences: self.node_sequences,
            ambiguous_sequences: self.ambiguous_sequences,
            first_ambiguous,
            linearizable,
            component_number,
            original_node_size: self.original_node_size,
            original_node_name: self.original_node_name,
        };
        debug_assert!(graph.check_consistency());
        graph
    }

    /// Permutes the vertex index space so definite splits form the prefix
    /// and ambiguous splits the suffix. Definite splits keep their relative
    /// order; the ambiguous group maps construction index `k` to
    /// `total - 1 - k`, and the ambiguous sequence pool is reversed to
    /// match. Returns the partition boundary.
    fn renumber_ambiguous_to_end(&mut self) -> usize {
        debug_assert_eq!(self.ambiguous.len(), self.node_length.len());
        let total = self.ambiguous.len();
        let mut renumbering = Vec::with_capacity(total);
        let mut definite_count = 0;
        let mut ambiguous_count = 0;
        for &ambiguous in &self.ambiguous {
            if ambiguous {
                debug_assert!(total - 1 - ambiguous_count >= definite_count);
                renumbering.push(total - 1 - ambiguous_count);
                ambiguous_count += 1;
            } else {
                renumbering.push(definite_count);
                definite_count += 1;
            }
        }
        debug_assert_eq!(definite_count, self.node_sequences.len());
        debug_assert_eq!(ambiguous_count, self.ambiguous_sequences.len());
        let first_ambiguous = definite_count;

        if ambiguous_count == 0 {
            return first_ambiguous;
        }

        // the new numbering addresses the ambiguous pool back to front
        self.ambiguous_sequences.reverse();

        self.node_length = reorder(std::mem::take(&mut self.node_length), &renumbering);
        self.node_offset = reorder(std::mem::take(&mut self.node_offset), &renumbering);
        self.node_ids = reorder(std::mem::take(&mut self.node_ids), &renumbering);
        self.reverse = reorder(std::mem::take(&mut self.reverse), &renumbering);
        self.in_neighbors = reorder(std::mem::take(&mut self.in_neighbors), &renumbering);
        self.out_neighbors = reorder(std::mem::take(&mut self.out_neighbors), &renumbering);
        for splits in self.node_lookup.values_mut() {
            for split in splits.iter_mut() {
                *split = renumbering[*split];
            }
        }
        for neighbors in self.in_neighbors.iter_mut().chain(self.out_neighbors.iter_mut()) {
            for neighbor in neighbors.iter_mut() {
                *neighbor = renumbering[*neighbor];
            }
        }

        first_ambiguous
    }
}

fn reorder<T: Clone + Default>(values: Vec<T>, renumbering: &[usize]) -> Vec<T> {
    debug_assert_eq!(values.len(), renumbering.len());
    let mut result = vec![T::default(); values.len()];
    for (old, value) in values.into_iter().enumerate() {
        result[renumbering[old]] = value;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::mock;

    #[test]
    fn breakpoints_split_a_node() {
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(2, "ACGTACGT", "chain", false, &[0, 4, 8]).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, false);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node_length(0), 4);
        assert_eq!(graph.node_length(1), 4);
        assert_eq!(graph.node_offset(0), 0);
        assert_eq!(graph.node_offset(1), 4);
        assert_eq!(graph.first_ambiguous(), 2);
        assert_eq!(graph.out_neighbors(0), &[1]);
        assert_eq!(graph.in_neighbors(1), &[0]);
        assert_eq!(graph.base_at(0, 0), b'A');
        assert_eq!(graph.base_at(1, 3), b'T');
        assert_eq!(graph.splits_of(2), &[0, 1]);
        assert_eq!(graph.original_node_size(2), 8);
        assert_eq!(graph.original_node_name(2), "chain");
    }

    #[test]
    fn long_nodes_split_at_word_width() {
        let sequence: String = "ACGT".repeat(32).chars().chain("GG".chars()).collect();
        assert_eq!(sequence.len(), 130);
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(0, &sequence, "", false, &[0, 130]).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, false);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(
            (0..graph.node_count()).map(|v| graph.node_length(v)).collect::<Vec<_>>(),
            vec![64, 64, 2]
        );
        assert_eq!(
            (0..graph.node_count()).map(|v| graph.node_offset(v)).collect::<Vec<_>>(),
            vec![0, 64, 128]
        );
        assert_eq!(graph.out_neighbors(0), &[1]);
        assert_eq!(graph.out_neighbors(1), &[2]);
        for (pos, symbol) in sequence.bytes().enumerate() {
            let split = graph.unitig_node(0, pos);
            assert_eq!(graph.base_at(split, pos - graph.node_offset(split)), symbol);
        }
    }

    #[test]
    fn empty_spans_are_skipped() {
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(0, "ACGTA", "", false, &[0, 0, 5, 5]).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, false);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node_length(0), 5);
    }

    #[test]
    fn re_adding_a_node_is_a_no_op() {
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(0, "ACGT", "first", false, &[0, 4]).unwrap();
        builder.add_node(0, "TTTTTTTT", "second", false, &[0, 8]).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, false);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.original_node_size(0), 4);
        assert_eq!(graph.original_node_name(0), "first");
    }

    #[test]
    fn repeated_edges_are_deduplicated() {
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(0, "ACGT", "", false, &[0, 4]).unwrap();
        builder.add_node(2, "GGCC", "", false, &[0, 4]).unwrap();
        builder.add_edge(0, 2, 0).unwrap();
        builder.add_edge(0, 2, 0).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, false);
        assert_eq!(graph.out_neighbors(0), &[1]);
        assert_eq!(graph.in_neighbors(1), &[0]);
    }

    #[test]
    fn malformed_breakpoints_are_rejected() {
        let mut builder = SplitGraphBuilder::new();
        assert_eq!(
            builder.add_node(0, "ACGT", "", false, &[0, 3]),
            Err(GranolaError::MalformedBreakpoints { node: 0 })
        );
        assert_eq!(
            builder.add_node(0, "ACGT", "", false, &[1, 4]),
            Err(GranolaError::MalformedBreakpoints { node: 0 })
        );
        assert_eq!(
            builder.add_node(0, "ACGT", "", false, &[0, 3, 2, 4]),
            Err(GranolaError::MalformedBreakpoints { node: 0 })
        );
    }

    #[test]
    fn edges_need_both_endpoints() {
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(0, "ACGT", "", false, &[0, 4]).unwrap();
        assert_eq!(builder.add_edge(0, 2, 0), Err(GranolaError::UnknownNode(2)));
        assert_eq!(builder.add_edge(2, 0, 0), Err(GranolaError::UnknownNode(2)));
        builder.add_node(2, "GGCC", "", false, &[0, 4]).unwrap();
        assert_eq!(
            builder.add_edge(0, 2, 3),
            Err(GranolaError::NoSplitAtOffset { node: 2, offset: 3 })
        );
    }

    #[test]
    fn ambiguous_nodes_move_to_the_suffix() {
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(0, "AAAA", "", false, &[0, 4]).unwrap();
        builder.add_node(4, "ACNGT", "", false, &[0, 5]).unwrap();
        builder.add_edge(0, 4, 0).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, false);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.first_ambiguous(), 1);
        assert_eq!(graph.original_id(0), 0);
        assert_eq!(graph.original_id(1), 4);
        assert!(graph.is_ambiguous(1));
        assert_eq!(graph.base_at(1, 2), b'N');
        assert_eq!(graph.splits_of(4), &[1]);
        assert_eq!(graph.out_neighbors(0), &[1]);
        assert_eq!(graph.in_neighbors(1), &[0]);
    }

    #[test]
    fn renumbering_remaps_every_index_space() {
        let mut builder = SplitGraphBuilder::new();
        builder.add_node(0, "NN", "", false, &[0, 2]).unwrap();
        builder.add_node(2, "AA", "", false, &[0, 2]).unwrap();
        builder.add_node(4, "RR", "", false, &[0, 2]).unwrap();
        builder.add_node(6, "CC", "", false, &[0, 2]).unwrap();
        builder.add_edge(0, 2, 0).unwrap();
        builder.add_edge(2, 4, 0).unwrap();
        builder.add_edge(4, 6, 0).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, false);

        assert_eq!(graph.first_ambiguous(), 2);
        // definite splits keep their relative order, ambiguous splits are
        // numbered back to front
        assert_eq!(
            (0..4).map(|v| graph.original_id(v)).collect::<Vec<_>>(),
            vec![2, 6, 4, 0]
        );
        assert_eq!(graph.base_at(2, 0), b'R');
        assert_eq!(graph.base_at(3, 0), b'N');
        assert_eq!(graph.out_neighbors(3), &[0]);
        assert_eq!(graph.out_neighbors(0), &[2]);
        assert_eq!(graph.out_neighbors(2), &[1]);
        assert_eq!(graph.in_neighbors(1), &[2]);
        assert!(graph.check_consistency());
    }

    #[test]
    fn full_pipeline_on_a_cyclic_mixed_graph() {
        let long_arm: String = "TGCA".repeat(20);
        let mut builder = SplitGraphBuilder::new();
        builder.reserve(4, 6);
        builder.add_node(0, "ACGTACGT", "", false, &[0, 8]).unwrap();
        builder.add_node(2, &long_arm, "", false, &[0, 80]).unwrap();
        builder.add_node(4, "ACNGT", "", false, &[0, 5]).unwrap();
        builder.add_node(6, "GATTACA", "", false, &[0, 7]).unwrap();
        builder.add_edge(0, 2, 0).unwrap();
        builder.add_edge(2, 4, 0).unwrap();
        builder.add_edge(4, 0, 0).unwrap();
        builder.add_edge(4, 6, 0).unwrap();
        let graph = builder.finalize(SPLIT_NODE_SIZE, true);

        // 1 + 2 + 1 + 1 splits, the ambiguous one renumbered last
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.first_ambiguous(), 4);
        assert_eq!(graph.original_id(4), 4);
        assert!(graph.check_consistency());
        for split in 0..graph.node_count() {
            for &neighbor in graph.out_neighbors(split) {
                assert!(graph.component(split) <= graph.component(neighbor));
            }
        }
        // the 0 -> 2 -> 4 -> 0 cycle condenses into one component
        let cycle_component = graph.component(graph.splits_of(0)[0]);
        for &split in graph.splits_of(2).iter().chain(graph.splits_of(4)) {
            assert_eq!(graph.component(split), cycle_component);
        }
        assert!(cycle_component <= graph.component(graph.splits_of(6)[0]));
        // node 6 hangs off the cycle; its split is the only linearizable one
        assert!(graph.linearizable(graph.splits_of(6)[0]));
        for &split in graph.splits_of(0).iter().chain(graph.splits_of(2)).chain(graph.splits_of(4)) {
            assert!(!graph.linearizable(split));
        }
    }

    #[test]
    fn finalized_tables_stay_consistent() {
        let graph = mock::diamond_graph();
        assert!(graph.check_consistency());
        for split in 0..graph.node_count() {
            assert!(graph.node_length(split) >= 1);
            assert!(graph.node_length(split) <= SPLIT_NODE_SIZE);
            for &neighbor in graph.out_neighbors(split) {
                assert!(neighbor < graph.node_count());
            }
        }
    }
}
