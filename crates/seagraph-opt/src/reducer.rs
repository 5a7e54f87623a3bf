//! The fixed-point reduction engine.
//!
//! For each function subregion the engine seeds a reduction stack with a
//! post-order DFS from the tail (inputs before users where the graph
//! allows it), then alternates between draining that stack and a revisit
//! stack until both are empty. A reducer reports per node either
//! "unchanged", "changed in place" (same node returned), or a replacement
//! node; the engine owns splicing, killing, and the revisit bookkeeping.
//!
//! Termination is the reducer's contract: every non-idempotent reduction
//! must either shrink the reachable set or advance a node's state. The
//! engine places no iteration cap.

use std::collections::VecDeque;

use indexmap::IndexSet;

use seagraph_ir::builders::DeadBuilder;
use seagraph_ir::{Graph, MarkerState, NodeId, NodeMarker, Opcode, SubGraph};

/// Outcome of one `reduce` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    replacement: Option<NodeId>,
}

impl Reduction {
    pub fn unchanged() -> Self {
        Reduction { replacement: None }
    }

    /// The node should be replaced by `node`; returning the reduced node
    /// itself means "changed in place, retry once my inputs settle".
    pub fn replace(node: NodeId) -> Self {
        Reduction {
            replacement: Some(node),
        }
    }

    pub fn changed(&self) -> bool {
        self.replacement.is_some()
    }

    pub fn replacement(&self) -> Option<NodeId> {
        self.replacement
    }
}

/// Engine surface offered to reducers that act on the engine itself.
pub trait Editor {
    fn graph(&mut self) -> &mut Graph;
    fn graph_ref(&self) -> &Graph;
    /// Queues an already-visited node for another reduction round.
    fn revisit(&mut self, node: NodeId);
    /// Splices `replacement` into every use of `node` and kills `node`.
    fn replace(&mut self, node: NodeId, replacement: NodeId);
    fn dead_node(&self) -> NodeId;
}

/// A graph rewriter pluggable into [`GraphReducer`].
pub trait Reducer {
    fn name(&self) -> &'static str;
    fn reduce(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction;
}

/// Per-node engine state, kept in a private arity-4 marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReductionState {
    Unvisited,
    Revisit,
    OnStack,
    Visited,
}

impl MarkerState for ReductionState {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ReductionState::Unvisited,
            1 => ReductionState::Revisit,
            2 => ReductionState::OnStack,
            _ => ReductionState::Visited,
        }
    }

    fn into_raw(self) -> u32 {
        match self {
            ReductionState::Unvisited => 0,
            ReductionState::Revisit => 1,
            ReductionState::OnStack => 2,
            ReductionState::Visited => 3,
        }
    }
}

/// Post-order DFS over input edges from `tail`; cycles are broken by the
/// visited set, so every reachable node appears exactly once, deepest
/// inputs first.
fn dfs_post_order(graph: &Graph, tail: NodeId) -> Vec<NodeId> {
    let mut post = Vec::new();
    let mut visited: IndexSet<NodeId> = IndexSet::new();
    let mut stack: Vec<(NodeId, usize)> = Vec::new();
    visited.insert(tail);
    stack.push((tail, 0));
    while let Some(&(n, i)) = stack.last() {
        let inputs = graph.node(n).inputs();
        if i < inputs.len() {
            stack.last_mut().unwrap().1 += 1;
            let input = inputs[i];
            if visited.insert(input) {
                stack.push((input, 0));
            }
        } else {
            stack.pop();
            post.push(n);
        }
    }
    post
}

/// Fixed-point driver over all subregions of a graph.
pub struct GraphReducer<'g> {
    graph: &'g mut Graph,
    dead: NodeId,
    state: NodeMarker<ReductionState>,
    reduction_stack: VecDeque<NodeId>,
    revisit_stack: VecDeque<NodeId>,
    trim: bool,
}

impl<'g> GraphReducer<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self::with_trim(graph, true)
    }

    pub fn with_trim(graph: &'g mut Graph, trim: bool) -> Self {
        let dead = DeadBuilder::new(graph).build();
        let state = NodeMarker::new(graph, 4);
        GraphReducer {
            graph,
            dead,
            state,
            reduction_stack: VecDeque::new(),
            revisit_stack: VecDeque::new(),
            trim,
        }
    }

    /// Runs `reducer` to a fixed point over every subregion, trimming
    /// unreachable nodes afterwards.
    pub fn run(graph: &mut Graph, reducer: &mut dyn Reducer) {
        GraphReducer::new(graph).run_reducer(reducer);
    }

    /// Like [`GraphReducer::run`] but leaves dead nodes in the arena.
    pub fn run_without_trim(graph: &mut Graph, reducer: &mut dyn Reducer) {
        GraphReducer::with_trim(graph, false).run_reducer(reducer);
    }

    pub fn run_reducer(mut self, reducer: &mut dyn Reducer) {
        tracing::debug!(
            reducer = reducer.name(),
            sub_regions = self.graph.sub_regions().len(),
            "running graph reducer"
        );
        let regions: Vec<SubGraph> = self.graph.sub_regions().to_vec();
        for region in regions {
            self.run_on_sub_graph(region, reducer);
        }
        if self.trim {
            self.trim_graph();
        }
    }

    fn run_on_sub_graph(&mut self, region: SubGraph, reducer: &mut dyn Reducer) {
        for n in dfs_post_order(self.graph, region.tail()) {
            self.state.set(self.graph, n, ReductionState::OnStack);
            self.reduction_stack.push_back(n);
        }

        while !self.reduction_stack.is_empty() || !self.revisit_stack.is_empty() {
            while let Some(&node) = self.reduction_stack.front() {
                if self.graph.node(node).op() == Opcode::Dead {
                    self.pop();
                    continue;
                }

                let reduction = reducer.reduce(self, node);

                let Some(replacement) = reduction.replacement() else {
                    self.pop();
                    continue;
                };

                if replacement == node {
                    // Changed in place: settle any inputs that are not yet
                    // visited before retrying this node.
                    let inputs = self.graph.node(node).inputs().to_vec();
                    let mut recursed = false;
                    for input in inputs {
                        if input != node {
                            recursed |= self.recurse(input);
                        }
                    }
                    if recursed {
                        continue;
                    }
                }

                self.pop();

                if replacement != node {
                    self.replace_node(node, replacement);
                } else {
                    // In-place change settled: users may have new
                    // opportunities now.
                    for user in self.graph.node(node).users().to_vec() {
                        if user != node {
                            self.revisit_node(user);
                        }
                    }
                }
            }

            while let Some(node) = self.revisit_stack.pop_front() {
                if self.state.get(self.graph, node) == ReductionState::Revisit {
                    self.push(node);
                }
            }
        }
    }

    fn push(&mut self, node: NodeId) {
        self.state.set(self.graph, node, ReductionState::OnStack);
        self.reduction_stack.push_front(node);
    }

    fn pop(&mut self) {
        if let Some(node) = self.reduction_stack.pop_front() {
            self.state.set(self.graph, node, ReductionState::Visited);
        }
    }

    fn recurse(&mut self, node: NodeId) -> bool {
        if self.state.get(self.graph, node) > ReductionState::Revisit {
            return false;
        }
        self.push(node);
        true
    }

    fn revisit_node(&mut self, node: NodeId) {
        if self.state.get(self.graph, node) == ReductionState::Visited {
            self.state.set(self.graph, node, ReductionState::Revisit);
            self.revisit_stack.push_front(node);
        }
    }

    fn replace_node(&mut self, node: NodeId, replacement: NodeId) {
        for user in self.graph.node(node).users().to_vec() {
            self.revisit_node(user);
        }
        self.graph.replace_all_uses(node, replacement, None);
        self.graph.kill_node(node, self.dead);
        self.recurse(replacement);
    }

    /// Removes every node unreachable from any subregion tail, except
    /// global values and declared global variables, then strips all
    /// remaining edges to the dead sentinel.
    fn trim_graph(&mut self) {
        let marker: NodeMarker<ReductionState> = NodeMarker::new(self.graph, 4);
        let regions: Vec<SubGraph> = self.graph.sub_regions().to_vec();
        for region in regions {
            for n in dfs_post_order(self.graph, region.tail()) {
                marker.set(self.graph, n, ReductionState::OnStack);
            }
        }

        let ids: Vec<NodeId> = self.graph.nodes().map(|(id, _)| id).collect();
        let mut removed = 0usize;
        for id in ids {
            let keep = marker.get(self.graph, id) != ReductionState::Unvisited
                || self.graph.node(id).op().is_global_value()
                || self.graph.is_global_var(id);
            if !keep {
                self.graph.remove_node(id);
                removed += 1;
            }
        }
        tracing::debug!(removed, "trimmed unreachable nodes");

        let dead = self.dead;
        for user in self.graph.value_users(dead) {
            self.graph.remove_value_input_all(user, dead);
        }
        for user in self.graph.effect_users(dead) {
            self.graph.remove_effect_input_all(user, dead);
        }
        for user in self.graph.control_users(dead) {
            self.graph.remove_control_input_all(user, dead);
        }
    }
}

impl Editor for GraphReducer<'_> {
    fn graph(&mut self) -> &mut Graph {
        &mut *self.graph
    }

    fn graph_ref(&self) -> &Graph {
        &*self.graph
    }

    fn revisit(&mut self, node: NodeId) {
        self.revisit_node(node);
    }

    fn replace(&mut self, node: NodeId, replacement: NodeId) {
        self.replace_node(node, replacement);
    }

    fn dead_node(&self) -> NodeId {
        self.dead
    }
}
