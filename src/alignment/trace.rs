//! Reconstruction of graph-anchored alignments from aligner traces, and
//! stitching of the two half-alignments flanking a seed.

use crate::alignment::{Alignment, AlignmentItem, Edit, Mapping, MatrixPosition, Position, Score};
use crate::graph::sequence::SPLIT_NODE_SIZE;
use crate::graph::split::SplitGraph;

/// Turns a trace of matrix positions, ordered from alignment start to end in
/// query order, into a path of mappings. Consecutive trace positions in the
/// same split extend the current mapping's edit; a new mapping opens
/// whenever the trace moves to a different original node, switches strand,
/// or jumps to a split that is not the contiguous continuation of the
/// previous one, so mappings follow original node boundaries rather than
/// split boundaries.
///
/// An empty trace yields the failure sentinel of [`empty_alignment`].
/// `elapsed_ms` is left at zero for the driver to fill in.
pub fn trace_to_alignment(
    graph: &SplitGraph,
    seq_id: &str,
    sequence: &str,
    score: Score,
    trace: &[MatrixPosition],
    cells_processed: usize,
    reverse: bool,
) -> AlignmentItem {
    if trace.is_empty() {
        return empty_alignment(0, cells_processed);
    }

    let mut current_node = trace[0].node;
    let mut current_node_id = graph.original_id(current_node);
    let mut rank = 0;
    let mut path = vec![Mapping {
        position: Position {
            node_id: current_node_id,
            offset: trace[0].node_offset,
            is_reverse: graph.is_reverse(current_node) != reverse,
        },
        rank,
        edits: vec![Edit::default()],
    }];
    let mut bt_node_start = trace[0];
    let mut bt_node_end = trace[0];
    let mut bt_before_node = trace[0];

    for &pos in trace {
        if pos.node == current_node {
            bt_node_end = pos;
            continue;
        }
        debug_assert!(pos.seq_pos >= bt_node_end.seq_pos);
        extend_edit(last_edit(&mut path), sequence, bt_before_node, bt_node_start, bt_node_end, reverse);
        bt_before_node = bt_node_end;
        bt_node_start = pos;
        bt_node_end = pos;
        let previous_node = current_node;
        current_node = pos.node;

        let contiguous = graph.original_id(current_node) == current_node_id
            && graph.is_reverse(current_node) == graph.is_reverse(previous_node)
            && graph.node_offset(current_node) + if reverse { SPLIT_NODE_SIZE } else { 0 }
                == graph.node_offset(previous_node) + if reverse { 0 } else { SPLIT_NODE_SIZE };
        if !contiguous {
            rank += 1;
            current_node_id = graph.original_id(current_node);
            path.push(Mapping {
                position: Position {
                    node_id: current_node_id,
                    offset: graph.node_offset(current_node),
                    is_reverse: graph.is_reverse(current_node) != reverse,
                },
                rank,
                edits: vec![Edit::default()],
            });
        }
    }
    extend_edit(last_edit(&mut path), sequence, bt_before_node, bt_node_start, bt_node_end, reverse);

    AlignmentItem {
        alignment: Alignment {
            name: seq_id.to_owned(),
            sequence: sequence.to_owned(),
            score,
            path,
        },
        cells_processed,
        elapsed_ms: 0,
        alignment_start: trace[0].seq_pos,
        alignment_end: trace[trace.len() - 1].seq_pos,
    }
}

fn last_edit(path: &mut [Mapping]) -> &mut Edit {
    path.last_mut().unwrap().edits.last_mut().unwrap()
}

/// Folds the finished run `[start, end]` into `edit`. Query bases consumed
/// since the previous run's end are appended as literal sequence; graph
/// bases are counted from the run's offsets, which move backward within a
/// split when the alignment is a reverse pass.
fn extend_edit(
    edit: &mut Edit,
    sequence: &str,
    before: MatrixPosition,
    start: MatrixPosition,
    end: MatrixPosition,
    reverse: bool,
) {
    debug_assert_eq!(start.node, end.node);
    debug_assert!(end.seq_pos >= before.seq_pos);
    edit.to_length += end.seq_pos - before.seq_pos;
    if end.seq_pos > before.seq_pos {
        debug_assert!(before.seq_pos < sequence.len() - 1);
        edit.sequence.push_str(&sequence[before.seq_pos + 1..end.seq_pos + 1]);
    }
    if reverse {
        debug_assert!(start.node_offset + 1 >= end.node_offset);
        edit.from_length += start.node_offset - end.node_offset + 1;
    } else {
        debug_assert!(end.node_offset + 1 >= start.node_offset);
        edit.from_length += end.node_offset - start.node_offset + 1;
    }
}

/// Stitches the alignments produced left and right of a seed. A failed or
/// empty side yields the other side unchanged. When `second` starts at the
/// exact position where `first` ends (same original node and strand) its
/// first mapping is dropped; otherwise every mapping is kept, even when the
/// two ends are joined by an edge. Scores, cell counts and elapsed times
/// are summed.
pub fn merge_alignments(
    graph: &SplitGraph,
    first: AlignmentItem,
    second: AlignmentItem,
) -> AlignmentItem {
    debug_assert!(!first.alignment_failed() || !second.alignment_failed());
    if first.alignment_failed() {
        return second;
    }
    if second.alignment_failed() {
        return first;
    }
    if first.alignment.path.is_empty() {
        return second;
    }
    if second.alignment.path.is_empty() {
        return first;
    }

    let mut merged = first;
    merged.cells_processed += second.cells_processed;
    merged.elapsed_ms += second.elapsed_ms;
    merged.alignment.score += second.alignment.score;

    let first_end = merged.alignment.path.last().unwrap().position;
    let second_start = second.alignment.path[0].position;
    let first_end_split = *graph.splits_of(first_end.node_id).last().unwrap();
    let second_start_split = graph.splits_of(second_start.node_id)[0];
    let skip = if pos_equal(first_end, second_start) {
        1
    } else if graph.out_neighbors(first_end_split).contains(&second_start_split) {
        // the trailing split feeds straight into the leading split; nothing
        // is shared, keep every mapping
        0
    } else {
        0
    };
    merged.alignment.path.extend(second.alignment.path.into_iter().skip(skip));
    merged
}

/// The failure sentinel: an empty path scored at the maximum representable
/// value.
pub fn empty_alignment(elapsed_ms: u64, cells_processed: usize) -> AlignmentItem {
    AlignmentItem {
        alignment: Alignment {
            name: String::new(),
            sequence: String::new(),
            score: Score::MAX,
            path: Vec::new(),
        },
        cells_processed,
        elapsed_ms,
        alignment_start: 0,
        alignment_end: 0,
    }
}

fn pos_equal(a: Position, b: Position) -> bool {
    a.node_id == b.node_id && a.is_reverse == b.is_reverse
}
