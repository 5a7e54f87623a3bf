//! Function subregions.
//!
//! A [`SubGraph`] is a lightweight handle identified by its tail (`End`)
//! node; the nodes of the function are whatever is reachable from the tail
//! through input edges. Iteration is lazy: nothing is collected up front.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::edge::Use;
use crate::graph::Graph;
use crate::id::NodeId;

/// Handle on one function's reachable set. Equality and hash are on the
/// tail node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubGraph {
    tail: NodeId,
}

impl SubGraph {
    pub fn new(tail: NodeId) -> Self {
        SubGraph { tail }
    }

    pub fn tail(&self) -> NodeId {
        self.tail
    }

    /// BFS over input edges starting at the tail; yields each reachable
    /// node exactly once, tail first.
    pub fn nodes<'g>(&self, graph: &'g Graph) -> SubGraphNodes<'g> {
        let mut visited = IndexSet::new();
        visited.insert(self.tail);
        let mut queue = VecDeque::new();
        queue.push_back(self.tail);
        SubGraphNodes {
            graph,
            queue,
            visited,
        }
    }

    pub fn node_count(&self, graph: &Graph) -> usize {
        self.nodes(graph).count()
    }

    /// Yields each `(source, dest, kind)` edge of the reachable set, in
    /// node-BFS order, with the graph's edge patcher applied.
    pub fn edges<'g>(&self, graph: &'g Graph) -> SubGraphEdges<'g> {
        SubGraphEdges {
            graph,
            nodes: self.nodes(graph),
            current: None,
            next_input: 0,
        }
    }

    pub fn edge_count(&self, graph: &Graph) -> usize {
        self.edges(graph).count()
    }
}

/// Lazy BFS node iterator: each step pops the front, enqueues every unseen
/// input, and yields the popped node.
pub struct SubGraphNodes<'g> {
    graph: &'g Graph,
    queue: VecDeque<NodeId>,
    visited: IndexSet<NodeId>,
}

impl Iterator for SubGraphNodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let front = self.queue.pop_front()?;
        for &input in self.graph.node(front).inputs() {
            if self.visited.insert(input) {
                self.queue.push_back(input);
            }
        }
        Some(front)
    }
}

/// Lazy edge iterator over a subregion: exhausts one node's inputs, then
/// advances to the next reachable node.
pub struct SubGraphEdges<'g> {
    graph: &'g Graph,
    nodes: SubGraphNodes<'g>,
    current: Option<NodeId>,
    next_input: usize,
}

impl Iterator for SubGraphEdges<'_> {
    type Item = Use;

    fn next(&mut self) -> Option<Use> {
        loop {
            let source = match self.current {
                Some(id) => id,
                None => {
                    let id = self.nodes.next()?;
                    self.current = Some(id);
                    self.next_input = 0;
                    id
                }
            };
            let node = self.graph.node(source);
            if self.next_input >= node.inputs().len() {
                self.current = None;
                continue;
            }
            let raw = self.next_input;
            self.next_input += 1;
            let dest = node.inputs()[raw];
            let kind = node.input_kind(raw).expect("input within partitions");
            return Some(self.graph.patch(Use::new(source, dest, kind)));
        }
    }
}
