//! The graph: single owner of every node.
//!
//! Nodes live in a dense arena indexed by [`NodeId`]; removal tombstones
//! the slot and ids are never reused, so cycles (loop backedges, phis
//! feeding themselves) are plain integer references with no ownership
//! knots. Alongside the arena the graph owns the deduplicating constant
//! and function-stub pools, the subregion list the reducer iterates, the
//! global-variable set, the per-node attribute table, and the monotone
//! ceiling that [`NodeMarker`](crate::NodeMarker) ranges are carved from.
//!
//! All mutation goes through `Graph` methods so the user-list invariant
//! can be maintained on both endpoints of every edge.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use crate::attribute::Attr;
use crate::edge::{EdgePatcher, Use};
use crate::id::NodeId;
use crate::marker::NodeMarker;
use crate::node::Node;
use crate::opcode::Opcode;
use crate::subgraph::SubGraph;

/// Bidirectional map between nodes and a pooled payload.
///
/// Both directions are updated together; an entry is never observable in
/// only one of the two maps.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeBiMap<T> {
    node_to_value: HashMap<NodeId, T>,
    value_to_node: HashMap<T, NodeId>,
}

impl<T: Eq + Hash + Clone> NodeBiMap<T> {
    pub(crate) fn new() -> Self {
        NodeBiMap {
            node_to_value: HashMap::new(),
            value_to_node: HashMap::new(),
        }
    }

    pub(crate) fn find_value(&self, node: NodeId) -> Option<&T> {
        self.node_to_value.get(&node)
    }

    pub(crate) fn find_node(&self, value: &T) -> Option<NodeId> {
        self.value_to_node.get(value).copied()
    }

    /// Inserts the pair unless either side is already present.
    pub(crate) fn insert(&mut self, node: NodeId, value: T) -> bool {
        if self.node_to_value.contains_key(&node) || self.value_to_node.contains_key(&value) {
            return false;
        }
        self.node_to_value.insert(node, value.clone());
        self.value_to_node.insert(value, node);
        true
    }

    pub(crate) fn erase(&mut self, node: NodeId) {
        if let Some(value) = self.node_to_value.remove(&node) {
            self.value_to_node.remove(&value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.value_to_node.len()
    }
}

/// Owner of all nodes, pools, subregions, and pass bookkeeping.
pub struct Graph {
    pub(crate) nodes: Vec<Option<Node>>,
    live_nodes: usize,
    pub(crate) dead_node: Option<NodeId>,
    pub(crate) const_int_pool: NodeBiMap<i32>,
    pub(crate) const_str_pool: NodeBiMap<String>,
    pub(crate) func_stub_pool: NodeBiMap<SubGraph>,
    sub_regions: Vec<SubGraph>,
    global_variables: IndexSet<NodeId>,
    attributes: IndexMap<NodeId, Vec<Attr>>,
    pub(crate) marker_ceiling: u32,
    edge_patcher: Option<EdgePatcher>,
    node_idx_marker: Option<NodeMarker<u16>>,
    node_idx_counter: u16,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            live_nodes: 0,
            dead_node: None,
            const_int_pool: NodeBiMap::new(),
            const_str_pool: NodeBiMap::new(),
            func_stub_pool: NodeBiMap::new(),
            sub_regions: Vec::new(),
            global_variables: IndexSet::new(),
            attributes: IndexMap::new(),
            marker_ceiling: 0,
            edge_patcher: None,
            node_idx_marker: None,
            node_idx_counter: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Arena access
    // -----------------------------------------------------------------------

    /// Looks up a live node. Panics if the node has been removed; removal
    /// only happens through [`Graph::remove_node`], so a panic here is a
    /// use-after-remove programming error.
    pub fn node(&self, id: NodeId) -> &Node {
        self.get_node(id)
            .unwrap_or_else(|| panic!("node {id} has been removed from the graph"))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("node {id} has been removed from the graph"))
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    /// Iterates live nodes in arena (creation) order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|n| (NodeId(idx as u32), n)))
    }

    /// Allocates a node with the given input partitions, registering it as
    /// a user of every input it references.
    pub(crate) fn new_node(
        &mut self,
        op: Opcode,
        values: &[NodeId],
        controls: &[NodeId],
        effects: &[NodeId],
    ) -> NodeId {
        for &input in values.iter().chain(controls).chain(effects) {
            assert!(
                !self.node(input).is_killed(),
                "cannot use killed node {input} as an input"
            );
        }
        let id = self.insert_node(Node::with_inputs(op, values, controls, effects));
        let inputs: Vec<NodeId> = self.node(id).inputs().to_vec();
        for input in inputs {
            self.node_mut(input).users.push(id);
        }
        id
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        self.live_nodes += 1;
        if let Some(marker) = self.node_idx_marker {
            let seq = self.node_idx_counter;
            self.node_idx_counter += 1;
            marker.set(self, id, seq);
        }
        id
    }

    /// Physically reclaims a node: kills it against the dead sentinel if it
    /// is still live, severs the links the kill itself left to the
    /// sentinel, and drops ownership of the slot.
    pub fn remove_node(&mut self, id: NodeId) {
        if !self.node(id).is_killed() {
            let dead = self.ensure_dead_node();
            self.kill_node(id, dead);
        }
        if let Some(dead) = self.dead_node {
            if id != dead {
                self.remove_value_input_all(id, dead);
                self.remove_effect_input_all(id, dead);
                self.remove_control_input_all(id, dead);
            }
        }
        self.const_int_pool.erase(id);
        self.const_str_pool.erase(id);
        self.func_stub_pool.erase(id);
        self.global_variables.shift_remove(&id);
        self.attributes.shift_remove(&id);
        self.nodes[id.index()] = None;
        self.live_nodes -= 1;
    }

    /// Returns the unique dead sentinel, creating it on first use.
    pub(crate) fn ensure_dead_node(&mut self) -> NodeId {
        match self.dead_node {
            Some(dead) => dead,
            None => {
                let dead = self.insert_node(Node::new(Opcode::Dead));
                self.dead_node = Some(dead);
                dead
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pools (read-only from outside; insertion goes through the builders)
    // -----------------------------------------------------------------------

    pub fn num_const_ints(&self) -> usize {
        self.const_int_pool.len()
    }

    pub fn num_const_strs(&self) -> usize {
        self.const_str_pool.len()
    }

    pub fn num_func_stubs(&self) -> usize {
        self.func_stub_pool.len()
    }

    /// Pooled payload of a `ConstantInt` node.
    pub fn const_int_value(&self, id: NodeId) -> Option<i32> {
        self.const_int_pool.find_value(id).copied()
    }

    /// Pooled node of an integer constant, if one was built.
    pub fn const_int_node(&self, value: i32) -> Option<NodeId> {
        self.const_int_pool.find_node(&value)
    }

    /// Pooled payload of a `ConstantStr` node.
    pub fn const_str_value(&self, id: NodeId) -> Option<&str> {
        self.const_str_pool.find_value(id).map(String::as_str)
    }

    pub fn const_str_node(&self, value: &str) -> Option<NodeId> {
        self.const_str_pool.find_node(&value.to_string())
    }

    /// The function subregion a `FunctionStub` stands for.
    pub fn func_stub_sub_graph(&self, id: NodeId) -> Option<SubGraph> {
        self.func_stub_pool.find_value(id).copied()
    }

    pub fn func_stub_node(&self, sub_graph: SubGraph) -> Option<NodeId> {
        self.func_stub_pool.find_node(&sub_graph)
    }

    // -----------------------------------------------------------------------
    // Subregions
    // -----------------------------------------------------------------------

    /// Appends a function subregion. Duplicates (same tail node) are
    /// ignored so the reducer visits each function once.
    pub fn add_sub_region(&mut self, sub_graph: SubGraph) {
        if !self.sub_regions.contains(&sub_graph) {
            self.sub_regions.push(sub_graph);
        }
    }

    pub fn sub_regions(&self) -> &[SubGraph] {
        &self.sub_regions
    }

    // -----------------------------------------------------------------------
    // Global variables
    // -----------------------------------------------------------------------

    /// Declares a node as a global variable. Only declarations and stack
    /// slots can be globals.
    pub fn mark_global_var(&mut self, id: NodeId) {
        let op = self.node(id).op();
        assert!(
            matches!(op, Opcode::SrcVarDecl | Opcode::SrcArrayDecl | Opcode::Alloca),
            "node {id} ({op}) cannot be marked as a global variable"
        );
        self.global_variables.insert(id);
    }

    pub fn is_global_var(&self, id: NodeId) -> bool {
        self.global_variables.contains(&id)
    }

    /// Transfers global membership from `old` to `new` (no-op when `old`
    /// is not a global).
    pub fn replace_global_var(&mut self, old: NodeId, new: NodeId) {
        if self.global_variables.shift_remove(&old) {
            self.mark_global_var(new);
        }
    }

    pub fn global_vars(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.global_variables.iter().copied()
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    pub(crate) fn attach_attributes(&mut self, id: NodeId, attrs: Vec<Attr>) {
        self.attributes.entry(id).or_default().extend(attrs);
    }

    pub fn attributes(&self, id: NodeId) -> &[Attr] {
        self.attributes.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_attribute(&self, id: NodeId, attr: Attr) -> bool {
        self.attributes(id).contains(&attr)
    }

    // -----------------------------------------------------------------------
    // Marker bookkeeping
    // -----------------------------------------------------------------------

    /// Carves a fresh `[lo, hi)` marker range off the monotone ceiling.
    pub(crate) fn reserve_marker_range(&mut self, num_states: u32) -> (u32, u32) {
        assert!(num_states != 0, "marker must declare at least one state");
        let lo = self.marker_ceiling;
        let hi = lo
            .checked_add(num_states)
            .expect("marker range wraparound");
        self.marker_ceiling = hi;
        (lo, hi)
    }

    /// Registers a marker that [`Graph::insert_node`] stamps with a running
    /// sequence number; used by schedulers that need dense node indices.
    pub fn set_node_idx_marker(&mut self, marker: NodeMarker<u16>) {
        self.node_idx_marker = Some(marker);
        self.node_idx_counter = 0;
    }

    pub fn clear_node_idx_marker(&mut self) {
        self.node_idx_marker = None;
    }

    // -----------------------------------------------------------------------
    // Edge iteration
    // -----------------------------------------------------------------------

    /// Installs a hook applied to every edge materialized by iteration.
    pub fn set_edge_patcher(&mut self, patcher: impl Fn(Use) -> Use + 'static) {
        self.edge_patcher = Some(Box::new(patcher));
    }

    pub fn clear_edge_patcher(&mut self) {
        self.edge_patcher = None;
    }

    pub(crate) fn patch(&self, edge: Use) -> Use {
        match &self.edge_patcher {
            Some(patcher) => patcher(edge),
            None => edge,
        }
    }

    /// Iterates every edge of every live node, patcher applied.
    pub fn edges(&self) -> impl Iterator<Item = Use> + '_ {
        self.nodes().flat_map(move |(id, node)| {
            node.inputs().iter().enumerate().map(move |(raw, &dest)| {
                let kind = node.input_kind(raw).expect("input within partitions");
                self.patch(Use::new(id, dest, kind))
            })
        })
    }

    pub fn edge_count(&self) -> usize {
        self.nodes().map(|(_, n)| n.inputs().len()).sum()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

impl std::ops::Index<NodeId> for Graph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.node(id)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("sub_regions", &self.sub_regions.len())
            .field("const_ints", &self.num_const_ints())
            .field("const_strs", &self.num_const_strs())
            .field("func_stubs", &self.num_func_stubs())
            .finish()
    }
}
