//! Nodes and the input-edit operations over them.
//!
//! A node stores its inputs in one ordered sequence with the fixed layout
//! `[value | control | effect]` plus the three partition counts; the kind
//! of a raw index is derived arithmetically. The user list is the reverse
//! multiset: a node appears in `users` once per incoming edge.
//!
//! Every edit touches two nodes (an input slot here, a user entry there),
//! so all mutation is hosted on [`Graph`]; the accessors that only read a
//! single node live on [`Node`] itself.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::edge::DepKind;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::opcode::Opcode;

pub(crate) type NodeList = SmallVec<[NodeId; 4]>;

/// A vertex of the sea-of-nodes graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub(crate) op: Opcode,
    pub(crate) marker: u32,
    pub(crate) num_value_inputs: u32,
    pub(crate) num_control_inputs: u32,
    pub(crate) num_effect_inputs: u32,
    pub(crate) inputs: NodeList,
    pub(crate) users: NodeList,
    pub(crate) killed: bool,
}

impl Node {
    pub(crate) fn new(op: Opcode) -> Self {
        Node {
            op,
            marker: 0,
            num_value_inputs: 0,
            num_control_inputs: 0,
            num_effect_inputs: 0,
            inputs: NodeList::new(),
            users: NodeList::new(),
            killed: false,
        }
    }

    pub(crate) fn with_inputs(
        op: Opcode,
        values: &[NodeId],
        controls: &[NodeId],
        effects: &[NodeId],
    ) -> Self {
        let mut inputs = NodeList::with_capacity(values.len() + controls.len() + effects.len());
        inputs.extend_from_slice(values);
        inputs.extend_from_slice(controls);
        inputs.extend_from_slice(effects);
        Node {
            op,
            marker: 0,
            num_value_inputs: values.len() as u32,
            num_control_inputs: controls.len() as u32,
            num_effect_inputs: effects.len() as u32,
            inputs,
            users: NodeList::new(),
            killed: false,
        }
    }

    pub fn op(&self) -> Opcode {
        self.op
    }

    /// Set once by [`Graph::kill_node`]; a killed node keeps its storage
    /// until trimming but no longer participates semantically.
    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn num_value_inputs(&self) -> usize {
        self.num_value_inputs as usize
    }

    pub fn num_control_inputs(&self) -> usize {
        self.num_control_inputs as usize
    }

    pub fn num_effect_inputs(&self) -> usize {
        self.num_effect_inputs as usize
    }

    pub fn value_input(&self, idx: usize) -> NodeId {
        assert!(idx < self.num_value_inputs(), "value input {idx} out of range");
        self.inputs[idx]
    }

    pub fn control_input(&self, idx: usize) -> NodeId {
        assert!(
            idx < self.num_control_inputs(),
            "control input {idx} out of range"
        );
        self.inputs[self.num_value_inputs() + idx]
    }

    pub fn effect_input(&self, idx: usize) -> NodeId {
        assert!(
            idx < self.num_effect_inputs(),
            "effect input {idx} out of range"
        );
        self.inputs[self.num_value_inputs() + self.num_control_inputs() + idx]
    }

    /// All inputs in raw `[value | control | effect]` order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn value_inputs(&self) -> &[NodeId] {
        &self.inputs[..self.num_value_inputs()]
    }

    pub fn control_inputs(&self) -> &[NodeId] {
        let lo = self.num_value_inputs();
        &self.inputs[lo..lo + self.num_control_inputs()]
    }

    pub fn effect_inputs(&self) -> &[NodeId] {
        let lo = self.num_value_inputs() + self.num_control_inputs();
        &self.inputs[lo..lo + self.num_effect_inputs()]
    }

    /// Dependency kind of a raw input index, derived from the partition
    /// counts. `None` if the index is out of range.
    pub fn input_kind(&self, raw_idx: usize) -> Option<DepKind> {
        if raw_idx < self.num_value_inputs() {
            Some(DepKind::Value)
        } else if raw_idx < self.num_value_inputs() + self.num_control_inputs() {
            Some(DepKind::Control)
        } else if raw_idx
            < self.num_value_inputs() + self.num_control_inputs() + self.num_effect_inputs()
        {
            Some(DepKind::Effect)
        } else {
            None
        }
    }

    /// The reverse multiset: every node referencing this one as an input,
    /// once per incoming edge.
    pub fn users(&self) -> &[NodeId] {
        &self.users
    }

    fn kind_slice(&self, kind: DepKind) -> &[NodeId] {
        match kind {
            DepKind::Value => self.value_inputs(),
            DepKind::Control => self.control_inputs(),
            DepKind::Effect => self.effect_inputs(),
        }
    }

    pub(crate) fn uses_as(&self, src: NodeId, kind: DepKind) -> bool {
        self.kind_slice(kind).contains(&src)
    }
}

// ---------------------------------------------------------------------------
// Input editing (hosted on Graph: each edit updates both endpoints)
// ---------------------------------------------------------------------------

impl Graph {
    fn kind_offset(&self, n: NodeId, kind: DepKind) -> usize {
        let node = self.node(n);
        match kind {
            DepKind::Value => 0,
            DepKind::Control => node.num_value_inputs(),
            DepKind::Effect => node.num_value_inputs() + node.num_control_inputs(),
        }
    }

    fn kind_len(&self, n: NodeId, kind: DepKind) -> usize {
        let node = self.node(n);
        match kind {
            DepKind::Value => node.num_value_inputs(),
            DepKind::Control => node.num_control_inputs(),
            DepKind::Effect => node.num_effect_inputs(),
        }
    }

    /// Removes exactly one occurrence of `user` from `of`'s user list.
    fn unregister_user(&mut self, of: NodeId, user: NodeId) {
        let users = &mut self.node_mut(of).users;
        let pos = users
            .iter()
            .position(|&u| u == user)
            .expect("user-list invariant violated: missing reverse entry");
        users.remove(pos);
    }

    fn set_input(&mut self, n: NodeId, kind: DepKind, idx: usize, new_input: NodeId) {
        assert!(
            !self.node(new_input).is_killed(),
            "cannot set killed node {new_input} as an input"
        );
        assert!(
            idx < self.kind_len(n, kind),
            "{kind:?} input {idx} out of range on node {n}"
        );
        let raw = self.kind_offset(n, kind) + idx;
        let old = self.node(n).inputs[raw];
        self.unregister_user(old, n);
        self.node_mut(n).inputs[raw] = new_input;
        self.node_mut(new_input).users.push(n);
    }

    fn append_input(&mut self, n: NodeId, kind: DepKind, new_input: NodeId) {
        assert!(
            !self.node(new_input).is_killed(),
            "cannot append killed node {new_input} as an input"
        );
        let at = self.kind_offset(n, kind) + self.kind_len(n, kind);
        let node = self.node_mut(n);
        node.inputs.insert(at, new_input);
        match kind {
            DepKind::Value => node.num_value_inputs += 1,
            DepKind::Control => node.num_control_inputs += 1,
            DepKind::Effect => node.num_effect_inputs += 1,
        }
        self.node_mut(new_input).users.push(n);
    }

    fn remove_input(&mut self, n: NodeId, kind: DepKind, idx: usize) {
        assert!(
            idx < self.kind_len(n, kind),
            "{kind:?} input {idx} out of range on node {n}"
        );
        let raw = self.kind_offset(n, kind) + idx;
        let old = self.node(n).inputs[raw];
        self.unregister_user(old, n);
        let node = self.node_mut(n);
        node.inputs.remove(raw);
        match kind {
            DepKind::Value => node.num_value_inputs -= 1,
            DepKind::Control => node.num_control_inputs -= 1,
            DepKind::Effect => node.num_effect_inputs -= 1,
        }
    }

    fn remove_input_all(&mut self, n: NodeId, kind: DepKind, target: NodeId) {
        while let Some(idx) = self
            .node(n)
            .kind_slice(kind)
            .iter()
            .position(|&m| m == target)
        {
            self.remove_input(n, kind, idx);
        }
    }

    pub fn set_value_input(&mut self, n: NodeId, idx: usize, new_input: NodeId) {
        self.set_input(n, DepKind::Value, idx, new_input);
    }

    pub fn append_value_input(&mut self, n: NodeId, new_input: NodeId) {
        self.append_input(n, DepKind::Value, new_input);
    }

    pub fn remove_value_input(&mut self, n: NodeId, idx: usize) {
        self.remove_input(n, DepKind::Value, idx);
    }

    pub fn remove_value_input_all(&mut self, n: NodeId, target: NodeId) {
        self.remove_input_all(n, DepKind::Value, target);
    }

    pub fn set_control_input(&mut self, n: NodeId, idx: usize, new_input: NodeId) {
        self.set_input(n, DepKind::Control, idx, new_input);
    }

    pub fn append_control_input(&mut self, n: NodeId, new_input: NodeId) {
        self.append_input(n, DepKind::Control, new_input);
    }

    pub fn remove_control_input(&mut self, n: NodeId, idx: usize) {
        self.remove_input(n, DepKind::Control, idx);
    }

    pub fn remove_control_input_all(&mut self, n: NodeId, target: NodeId) {
        self.remove_input_all(n, DepKind::Control, target);
    }

    pub fn set_effect_input(&mut self, n: NodeId, idx: usize, new_input: NodeId) {
        self.set_input(n, DepKind::Effect, idx, new_input);
    }

    pub fn append_effect_input(&mut self, n: NodeId, new_input: NodeId) {
        self.append_input(n, DepKind::Effect, new_input);
    }

    pub fn remove_effect_input(&mut self, n: NodeId, idx: usize) {
        self.remove_input(n, DepKind::Effect, idx);
    }

    pub fn remove_effect_input_all(&mut self, n: NodeId, target: NodeId) {
        self.remove_input_all(n, DepKind::Effect, target);
    }

    /// Rewrites the first occurrence of `from` in `n`'s inputs of the given
    /// kind to `to`. Returns whether a replacement happened; callers that
    /// want every occurrence iterate until `false`.
    pub fn replace_use_of_with(
        &mut self,
        n: NodeId,
        from: NodeId,
        to: NodeId,
        kind: DepKind,
    ) -> bool {
        let Some(idx) = self
            .node(n)
            .kind_slice(kind)
            .iter()
            .position(|&m| m == from)
        else {
            return false;
        };
        self.set_input(n, kind, idx, to);
        true
    }

    /// Splices `replacement` into every use site of `n` of the given kind
    /// (all kinds when `None`). Operates on a snapshot of the user list:
    /// users added while splicing are already wired to the replacement and
    /// are not observed.
    pub fn replace_all_uses(&mut self, n: NodeId, replacement: NodeId, kind: Option<DepKind>) {
        match kind {
            None => {
                self.replace_all_uses(n, replacement, Some(DepKind::Value));
                self.replace_all_uses(n, replacement, Some(DepKind::Control));
                self.replace_all_uses(n, replacement, Some(DepKind::Effect));
            }
            Some(kind) => {
                let users = self.users_of_kind(n, kind);
                for user in users {
                    while self.replace_use_of_with(user, n, replacement, kind) {}
                }
            }
        }
    }

    fn users_of_kind(&self, n: NodeId, kind: DepKind) -> Vec<NodeId> {
        let mut seen = Vec::new();
        for &user in self.node(n).users() {
            if !seen.contains(&user) && self.node(user).uses_as(n, kind) {
                seen.push(user);
            }
        }
        seen
    }

    /// Deduplicated snapshot of the users holding `n` as a value input.
    pub fn value_users(&self, n: NodeId) -> Vec<NodeId> {
        self.users_of_kind(n, DepKind::Value)
    }

    /// Deduplicated snapshot of the users holding `n` as a control input.
    pub fn control_users(&self, n: NodeId) -> Vec<NodeId> {
        self.users_of_kind(n, DepKind::Control)
    }

    /// Deduplicated snapshot of the users holding `n` as an effect input.
    pub fn effect_users(&self, n: NodeId) -> Vec<NodeId> {
        self.users_of_kind(n, DepKind::Effect)
    }

    /// Detaches `n` from the graph: rewrites all of its inputs to the dead
    /// sentinel, splices the sentinel into every remaining use of `n`, and
    /// sets the killed flag. Idempotent after the first call.
    pub fn kill_node(&mut self, n: NodeId, dead: NodeId) {
        if self.node(n).is_killed() {
            return;
        }
        for i in 0..self.node(n).num_value_inputs() {
            self.set_value_input(n, i, dead);
        }
        for i in 0..self.node(n).num_control_inputs() {
            self.set_control_input(n, i, dead);
        }
        for i in 0..self.node(n).num_effect_inputs() {
            self.set_effect_input(n, i, dead);
        }
        self.replace_all_uses(n, dead, None);
        self.node_mut(n).killed = true;
    }
}
