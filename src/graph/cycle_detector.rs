//! Three-color depth-first cycle detection.
//!
//! Runs once per dependency-based execution, before any worker starts:
//! circular strict dependencies would deadlock the dependency orchestrator,
//! since neither step could ever reach a terminal state to unblock the
//! other.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    NotVisited,
    Visiting,
    Visited,
}

/// Find all cycles reachable from `nodes`, following `edges`.
///
/// Every node is used as a traversal root so disconnected subgraphs are
/// covered. A neighbor found in `Visiting` state constitutes a cycle,
/// reported as the ordered node list from the point of first re-entry back
/// to itself (not the whole traversal stack): `A -> B -> C -> A` yields
/// `[A, B, C]`. An acyclic graph yields an empty result.
pub fn find_cycles<N, I, F>(nodes: I, mut edges: F) -> Vec<Vec<N>>
where
    N: Eq + Hash + Clone,
    I: IntoIterator<Item = N>,
    F: FnMut(&N) -> Vec<N>,
{
    let mut states: HashMap<N, VisitState> = HashMap::new();
    let mut path: Vec<N> = Vec::new();
    let mut cycles: Vec<Vec<N>> = Vec::new();

    for node in nodes {
        if state_of(&states, &node) == VisitState::NotVisited {
            visit(&node, &mut edges, &mut states, &mut path, &mut cycles);
        }
    }

    cycles
}

fn state_of<N: Eq + Hash>(states: &HashMap<N, VisitState>, node: &N) -> VisitState {
    states.get(node).copied().unwrap_or(VisitState::NotVisited)
}

fn visit<N, F>(
    node: &N,
    edges: &mut F,
    states: &mut HashMap<N, VisitState>,
    path: &mut Vec<N>,
    cycles: &mut Vec<Vec<N>>,
) where
    N: Eq + Hash + Clone,
    F: FnMut(&N) -> Vec<N>,
{
    states.insert(node.clone(), VisitState::Visiting);
    path.push(node.clone());

    for neighbor in edges(node) {
        match state_of(states, &neighbor) {
            VisitState::NotVisited => visit(&neighbor, edges, states, path, cycles),
            VisitState::Visiting => {
                // Trim the traversal stack to start at the re-entered node.
                let start = path
                    .iter()
                    .position(|n| n == &neighbor)
                    .expect("visiting node must be on the current path");
                cycles.push(path[start..].to_vec());
            }
            VisitState::Visited => {}
        }
    }

    path.pop();
    states.insert(node.clone(), VisitState::Visited);
}
