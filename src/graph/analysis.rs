//! Per-vertex analyses over the finalized adjacency tables.
//!
//! Both passes run on real pangenome graphs with millions of vertices, so
//! neither may recurse; the component pass keeps an explicit call stack.

use fixedbitset::FixedBitSet;

use crate::graph::builder::NeighborList;

/// Flags every vertex lying on a unique-in-degree tail that drains into a
/// branching vertex.
///
/// Each unchecked vertex with in-degree one starts a backward walk along its
/// unique in-edges. The walk ends when it reaches a vertex with in-degree
/// other than one or a vertex resolved by an earlier walk (everything walked
/// so far is a tail, the terminator is not), when it returns to its own
/// start (the walk is a cycle, nothing qualifies), or when it re-enters
/// itself at an interior vertex (the part before the re-entry point hangs
/// off a cycle and qualifies, the rest is the cycle).
pub(crate) fn find_linearizable(in_neighbors: &[NeighborList]) -> FixedBitSet {
    let total = in_neighbors.len();
    let mut linearizable = FixedBitSet::with_capacity(total);
    let mut checked = FixedBitSet::with_capacity(total);
    let mut on_stack = FixedBitSet::with_capacity(total);
    let mut stack: Vec<usize> = Vec::new();

    for start in 0..total {
        if checked.contains(start) {
            continue;
        }
        if in_neighbors[start].len() != 1 {
            checked.insert(start);
            continue;
        }
        debug_assert!(stack.is_empty());
        stack.push(start);
        on_stack.insert(start);
        loop {
            debug_assert!(stack.len() <= total);
            let back = *stack.last().unwrap();
            if in_neighbors[back].len() != 1 || (back != start && checked.contains(back)) {
                // the tail ends here; the terminator itself does not qualify
                for &vertex in &stack[..stack.len() - 1] {
                    debug_assert_eq!(in_neighbors[vertex].len(), 1);
                    checked.insert(vertex);
                    linearizable.insert(vertex);
                    on_stack.set(vertex, false);
                }
                checked.insert(back);
                linearizable.set(back, false);
                on_stack.set(back, false);
                stack.clear();
                break;
            }
            let neighbor = in_neighbors[back][0];
            if neighbor == start {
                // the walk closed a cycle through its own start
                for &vertex in &stack {
                    checked.insert(vertex);
                    linearizable.set(vertex, false);
                    on_stack.set(vertex, false);
                }
                stack.clear();
                break;
            }
            if on_stack.contains(neighbor) {
                debug_assert_ne!(neighbor, start);
                let reentry = stack.iter().position(|&vertex| vertex == neighbor).unwrap();
                for &vertex in &stack[reentry..] {
                    checked.insert(vertex);
                    linearizable.set(vertex, false);
                    on_stack.set(vertex, false);
                }
                for &vertex in &stack[..reentry] {
                    checked.insert(vertex);
                    linearizable.insert(vertex);
                    on_stack.set(vertex, false);
                }
                stack.clear();
                break;
            }
            stack.push(neighbor);
            on_stack.insert(neighbor);
        }
    }
    linearizable
}

/// One suspended Tarjan visit.
#[derive(Debug, Clone, Copy)]
enum Phase {
    /// First entry of the vertex.
    Enter,
    /// A child finished; fold its lowlink in and resume the neighbor scan.
    AfterChild,
    /// All neighbors done; pop the vertex's component if it is a root.
    Exit,
}

/// Numbers the strongly connected components so that along every edge the
/// component number never decreases.
///
/// Tarjan's algorithm with the recursion unrolled onto an explicit stack of
/// `(vertex, phase, neighbor cursor)` frames. Tarjan emits components in
/// reverse topological order of the condensation, so the numbers are flipped
/// before returning.
pub(crate) fn component_order(out_neighbors: &[NeighborList]) -> Vec<usize> {
    const UNVISITED: usize = usize::MAX;

    let total = out_neighbors.len();
    let mut index = vec![UNVISITED; total];
    let mut lowlink = vec![UNVISITED; total];
    let mut component_number = vec![UNVISITED; total];
    let mut on_stack = FixedBitSet::with_capacity(total);
    let mut pending: Vec<usize> = Vec::new();
    let mut call_stack: Vec<(usize, Phase, usize)> = Vec::new();
    let mut next_index = 0;
    let mut next_component = 0;

    for root in 0..total {
        if index[root] != UNVISITED {
            continue;
        }
        call_stack.push((root, Phase::Enter, 0));
        while let Some((vertex, phase, mut cursor)) = call_stack.pop() {
            match phase {
                Phase::Enter => {
                    debug_assert_eq!(index[vertex], UNVISITED);
                    debug_assert!(!on_stack.contains(vertex));
                    index[vertex] = next_index;
                    lowlink[vertex] = next_index;
                    next_index += 1;
                    pending.push(vertex);
                    on_stack.insert(vertex);
                }
                Phase::AfterChild => {
                    let child = out_neighbors[vertex][cursor];
                    debug_assert_ne!(lowlink[child], UNVISITED);
                    lowlink[vertex] = lowlink[vertex].min(lowlink[child]);
                    cursor += 1;
                }
                Phase::Exit => {
                    if lowlink[vertex] == index[vertex] {
                        loop {
                            let member = pending.pop().unwrap();
                            on_stack.set(member, false);
                            component_number[member] = next_component;
                            if member == vertex {
                                break;
                            }
                        }
                        next_component += 1;
                    }
                    continue;
                }
            }
            let mut descended = false;
            while cursor < out_neighbors[vertex].len() {
                let child = out_neighbors[vertex][cursor];
                if index[child] == UNVISITED {
                    call_stack.push((vertex, Phase::AfterChild, cursor));
                    call_stack.push((child, Phase::Enter, 0));
                    descended = true;
                    break;
                }
                if on_stack.contains(child) {
                    lowlink[vertex] = lowlink[vertex].min(index[child]);
                }
                cursor += 1;
            }
            if !descended {
                call_stack.push((vertex, Phase::Exit, cursor));
            }
        }
    }
    debug_assert!(pending.is_empty());

    for component in component_number.iter_mut() {
        debug_assert_ne!(*component, UNVISITED);
        *component = next_component - 1 - *component;
    }
    if cfg!(debug_assertions) {
        for (vertex, neighbors) in out_neighbors.iter().enumerate() {
            for &neighbor in neighbors.iter() {
                debug_assert!(component_number[neighbor] >= component_number[vertex]);
            }
        }
    }
    component_number
}
