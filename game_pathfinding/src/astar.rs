use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// A graph that can be searched by [`AStar`].
///
/// Nodes must be totally ordered so that ties in the open set are broken the
/// same way on every run.
pub trait Graph {
    type Node: Copy + Eq + Ord + Hash;

    /// Push the traversable neighbors of `node` into `out`.
    fn neighbors(&self, node: Self::Node, out: &mut Vec<Self::Node>);

    /// Cost of the edge `from -> to`.
    fn cost(&self, from: Self::Node, to: Self::Node) -> u32;

    /// Admissible estimate of the remaining cost from `from` to `goal`.
    fn heuristic(&self, from: Self::Node, goal: Self::Node) -> u32;
}

/// A found route, start and goal included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<N> {
    pub nodes: Vec<N>,
    pub cost: u32,
}

/// Best-first search with a hard cap on expanded nodes.
///
/// Running out of budget is reported the same way as an unreachable goal:
/// callers treat both as "no route this tick".
#[derive(Debug, Clone, Copy)]
pub struct AStar {
    max_expansions: usize,
}

impl Default for AStar {
    fn default() -> Self {
        Self {
            max_expansions: 100_000,
        }
    }
}

impl AStar {
    pub fn new(max_expansions: usize) -> Self {
        Self { max_expansions }
    }

    pub fn find_path<G: Graph>(&self, graph: &G, start: G::Node, goal: G::Node) -> Option<Path<G::Node>> {
        let mut open = BinaryHeap::new();
        let mut parent: HashMap<G::Node, G::Node> = HashMap::new();
        let mut best: HashMap<G::Node, u32> = HashMap::new();
        let mut scratch = Vec::with_capacity(8);
        let mut expanded = 0usize;

        best.insert(start, 0);
        open.push(Frontier {
            node: start,
            cost: 0,
            estimate: graph.heuristic(start, goal),
        });

        while let Some(Frontier { node, cost, .. }) = open.pop() {
            // Stale heap entry: a cheaper route to `node` was queued later.
            if best.get(&node).is_some_and(|&known| cost > known) {
                continue;
            }
            if node == goal {
                return Some(Path {
                    nodes: unwind(&parent, start, goal),
                    cost,
                });
            }

            expanded += 1;
            if expanded > self.max_expansions {
                return None;
            }

            scratch.clear();
            graph.neighbors(node, &mut scratch);
            for &next in &scratch {
                let through = cost.saturating_add(graph.cost(node, next));
                if through < best.get(&next).copied().unwrap_or(u32::MAX) {
                    best.insert(next, through);
                    parent.insert(next, node);
                    open.push(Frontier {
                        node: next,
                        cost: through,
                        estimate: through.saturating_add(graph.heuristic(next, goal)),
                    });
                }
            }
        }

        None
    }
}

fn unwind<N: Copy + Eq + Hash>(parent: &HashMap<N, N>, start: N, goal: N) -> Vec<N> {
    let mut nodes = vec![goal];
    let mut cursor = goal;
    while cursor != start {
        match parent.get(&cursor) {
            Some(&prev) => {
                nodes.push(prev);
                cursor = prev;
            }
            None => break,
        }
    }
    nodes.reverse();
    nodes
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct Frontier<N> {
    node: N,
    cost: u32,
    estimate: u32,
}

// Min-heap on estimate, then prefer deeper nodes, then the smaller node id.
impl<N: Ord> Ord for Frontier<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| self.cost.cmp(&other.cost))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl<N: Ord> PartialOrd for Frontier<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
