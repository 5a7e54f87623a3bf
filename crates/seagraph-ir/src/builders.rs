//! Per-opcode node builders.
//!
//! Each builder accumulates typed inputs through fluent setters, optionally
//! validates, and allocates a node with the right `(value, control, effect)`
//! partition layout, registering it as a user of every input. Builders for
//! pooled opcodes (`Dead`, `ConstantInt`, `ConstantStr`, `FunctionStub`)
//! return the existing pool entry on hit, so equal payloads always share one
//! node.

use crate::error::BuildError;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::Node;
use crate::opcode::Opcode;
use crate::subgraph::SubGraph;

/// Returns the graph's unique dead sentinel, creating it lazily.
pub struct DeadBuilder<'g> {
    graph: &'g mut Graph,
}

impl<'g> DeadBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        DeadBuilder { graph }
    }

    pub fn build(self) -> NodeId {
        self.graph.ensure_dead_node()
    }
}

/// Pooled integer constant.
pub struct ConstantIntBuilder<'g> {
    graph: &'g mut Graph,
    value: i32,
}

impl<'g> ConstantIntBuilder<'g> {
    pub fn new(graph: &'g mut Graph, value: i32) -> Self {
        ConstantIntBuilder { graph, value }
    }

    pub fn build(self) -> NodeId {
        if let Some(existing) = self.graph.const_int_pool.find_node(&self.value) {
            return existing;
        }
        let node = self.graph.insert_node(Node::new(Opcode::ConstantInt));
        self.graph.const_int_pool.insert(node, self.value);
        node
    }
}

/// Pooled string constant.
pub struct ConstantStrBuilder<'g> {
    graph: &'g mut Graph,
    value: String,
}

impl<'g> ConstantStrBuilder<'g> {
    pub fn new(graph: &'g mut Graph, value: impl Into<String>) -> Self {
        ConstantStrBuilder {
            graph,
            value: value.into(),
        }
    }

    pub fn build(self) -> NodeId {
        if let Some(existing) = self.graph.const_str_pool.find_node(&self.value) {
            return existing;
        }
        let node = self.graph.insert_node(Node::new(Opcode::ConstantStr));
        self.graph.const_str_pool.insert(node, self.value);
        node
    }
}

/// Pooled function stub. Two subgraphs sharing a tail get the same stub.
pub struct FunctionStubBuilder<'g> {
    graph: &'g mut Graph,
    sub_graph: SubGraph,
}

impl<'g> FunctionStubBuilder<'g> {
    pub fn new(graph: &'g mut Graph, sub_graph: SubGraph) -> Self {
        FunctionStubBuilder { graph, sub_graph }
    }

    pub fn build(self) -> NodeId {
        if let Some(existing) = self.graph.func_stub_pool.find_node(&self.sub_graph) {
            return existing;
        }
        let node = self.graph.insert_node(Node::new(Opcode::FunctionStub));
        self.graph.func_stub_pool.insert(node, self.sub_graph);
        node
    }
}

/// Call: value input 0 is the callee stub, the rest are parameters.
pub struct CallBuilder<'g> {
    graph: &'g mut Graph,
    func_stub: NodeId,
    params: Vec<NodeId>,
}

impl<'g> CallBuilder<'g> {
    pub fn new(graph: &'g mut Graph, func_stub: NodeId) -> Self {
        CallBuilder {
            graph,
            func_stub,
            params: Vec::new(),
        }
    }

    pub fn add_param(mut self, param: NodeId) -> Self {
        self.params.push(param);
        self
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn build(self) -> NodeId {
        let mut values = Vec::with_capacity(self.params.len() + 1);
        values.push(self.func_stub);
        values.extend(self.params);
        self.graph.new_node(Opcode::Call, &values, &[], &[])
    }
}

/// Variable declaration: value input 0 is the pooled symbol name.
pub struct SrcVarDeclBuilder<'g> {
    graph: &'g mut Graph,
    symbol_name: String,
}

impl<'g> SrcVarDeclBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        SrcVarDeclBuilder {
            graph,
            symbol_name: String::new(),
        }
    }

    pub fn symbol_name(mut self, name: impl Into<String>) -> Self {
        self.symbol_name = name.into();
        self
    }

    pub fn build(self) -> NodeId {
        let name = ConstantStrBuilder::new(self.graph, self.symbol_name).build();
        self.graph.new_node(Opcode::SrcVarDecl, &[name], &[], &[])
    }
}

/// Array declaration: value input 0 is the symbol name, 1..N the dimension
/// expressions.
pub struct SrcArrayDeclBuilder<'g> {
    graph: &'g mut Graph,
    symbol_name: String,
    dims: Vec<NodeId>,
}

impl<'g> SrcArrayDeclBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        SrcArrayDeclBuilder {
            graph,
            symbol_name: String::new(),
            dims: Vec::new(),
        }
    }

    pub fn symbol_name(mut self, name: impl Into<String>) -> Self {
        self.symbol_name = name.into();
        self
    }

    pub fn add_dim(mut self, dim: NodeId) -> Self {
        self.dims.push(dim);
        self
    }

    pub fn add_const_dim(mut self, dim: u32) -> Self {
        assert!(dim > 0, "array dimension must be positive");
        let node = ConstantIntBuilder::new(self.graph, dim as i32).build();
        self.dims.push(node);
        self
    }

    pub fn reset_dims(mut self) -> Self {
        self.dims.clear();
        self
    }

    pub fn build(self) -> NodeId {
        let name = ConstantStrBuilder::new(self.graph, self.symbol_name).build();
        let mut values = Vec::with_capacity(self.dims.len() + 1);
        values.push(name);
        values.extend(self.dims);
        self.graph.new_node(Opcode::SrcArrayDecl, &values, &[], &[])
    }
}

/// Marks an array declaration as having an initializer.
pub struct SrcInitialArrayBuilder<'g> {
    graph: &'g mut Graph,
    array_decl: NodeId,
}

impl<'g> SrcInitialArrayBuilder<'g> {
    pub fn new(graph: &'g mut Graph, array_decl: NodeId) -> Self {
        SrcInitialArrayBuilder { graph, array_decl }
    }

    pub fn build(self) -> NodeId {
        self.graph
            .new_node(Opcode::SrcInitialArray, &[self.array_decl], &[], &[])
    }
}

/// Any of the ten trivial binary operations.
pub struct BinOpBuilder<'g> {
    graph: &'g mut Graph,
    op: Opcode,
    lhs: Option<NodeId>,
    rhs: Option<NodeId>,
}

impl<'g> BinOpBuilder<'g> {
    pub fn new(graph: &'g mut Graph, op: Opcode) -> Self {
        assert!(op.is_bin_op(), "{op} is not a binary operation");
        BinOpBuilder {
            graph,
            op,
            lhs: None,
            rhs: None,
        }
    }

    pub fn lhs(mut self, node: NodeId) -> Self {
        self.lhs = Some(node);
        self
    }

    pub fn rhs(mut self, node: NodeId) -> Self {
        self.rhs = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let lhs = self.lhs.expect("binary op requires a left operand");
        let rhs = self.rhs.expect("binary op requires a right operand");
        self.graph.new_node(self.op, &[lhs, rhs], &[], &[])
    }
}

/// Variable read: value input 0 is the declaration, the optional effect
/// input is the last modification of that variable.
pub struct SrcVarAccessBuilder<'g> {
    graph: &'g mut Graph,
    decl: Option<NodeId>,
    effect: Option<NodeId>,
}

impl<'g> SrcVarAccessBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        SrcVarAccessBuilder {
            graph,
            decl: None,
            effect: None,
        }
    }

    pub fn decl(mut self, node: NodeId) -> Self {
        self.decl = Some(node);
        self
    }

    pub fn effect(mut self, node: NodeId) -> Self {
        self.effect = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let decl = self.decl.expect("variable access requires a declaration");
        let op = self.graph.node(decl).op();
        assert!(
            matches!(op, Opcode::SrcVarDecl | Opcode::Argument),
            "variable access declaration must be SrcVarDecl or Argument, got {op}"
        );
        self.finish(decl)
    }

    /// Builds without checking the declaration opcode.
    pub fn build_unchecked(self) -> NodeId {
        let decl = self.decl.expect("variable access requires a declaration");
        self.finish(decl)
    }

    fn finish(self, decl: NodeId) -> NodeId {
        let effects: Vec<NodeId> = self.effect.into_iter().collect();
        self.graph
            .new_node(Opcode::SrcVarAccess, &[decl], &[], &effects)
    }
}

/// Array read: value input 0 is the declaration, 1..N the index
/// expressions (one per declared dimension).
pub struct SrcArrayAccessBuilder<'g> {
    graph: &'g mut Graph,
    decl: Option<NodeId>,
    effect: Option<NodeId>,
    dims: Vec<NodeId>,
}

impl<'g> SrcArrayAccessBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        SrcArrayAccessBuilder {
            graph,
            decl: None,
            effect: None,
            dims: Vec::new(),
        }
    }

    pub fn decl(mut self, node: NodeId) -> Self {
        self.decl = Some(node);
        self
    }

    pub fn effect(mut self, node: NodeId) -> Self {
        self.effect = Some(node);
        self
    }

    pub fn add_access_dim(mut self, dim: NodeId) -> Self {
        self.dims.push(dim);
        self
    }

    pub fn reset_dims(mut self) -> Self {
        self.dims.clear();
        self
    }

    pub fn build(self) -> NodeId {
        let decl = self.decl.expect("array access requires a declaration");
        let decl_node = self.graph.node(decl);
        assert_eq!(
            decl_node.op(),
            Opcode::SrcArrayDecl,
            "array access declaration must be SrcArrayDecl"
        );
        let declared_dims = decl_node.num_value_inputs() - 1;
        assert_eq!(
            declared_dims,
            self.dims.len(),
            "array access has {} index expressions but the declaration has {} dimensions",
            self.dims.len(),
            declared_dims
        );
        self.finish(decl)
    }

    /// Builds without checking the declaration shape.
    pub fn build_unchecked(self) -> NodeId {
        let decl = self.decl.expect("array access requires a declaration");
        self.finish(decl)
    }

    fn finish(self, decl: NodeId) -> NodeId {
        let mut values = Vec::with_capacity(self.dims.len() + 1);
        values.push(decl);
        values.extend(self.dims);
        let effects: Vec<NodeId> = self.effect.into_iter().collect();
        self.graph
            .new_node(Opcode::SrcArrayAccess, &values, &[], &effects)
    }
}

/// Assignment: value input 0 is the destination designator, 1 the source.
pub struct SrcAssignStmtBuilder<'g> {
    graph: &'g mut Graph,
    dest: Option<NodeId>,
    source: Option<NodeId>,
    effect: Option<NodeId>,
}

impl<'g> SrcAssignStmtBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        SrcAssignStmtBuilder {
            graph,
            dest: None,
            source: None,
            effect: None,
        }
    }

    pub fn dest(mut self, node: NodeId) -> Self {
        self.dest = Some(node);
        self
    }

    pub fn source(mut self, node: NodeId) -> Self {
        self.source = Some(node);
        self
    }

    /// Previous modification of the same variable, threading the
    /// per-variable effect chain through this assignment.
    pub fn effect(mut self, node: NodeId) -> Self {
        self.effect = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let dest = self.dest.expect("assignment requires a destination");
        let source = self.source.expect("assignment requires a source");
        let effects: Vec<NodeId> = self.effect.into_iter().collect();
        self.graph
            .new_node(Opcode::SrcAssignStmt, &[dest, source], &[], &effects)
    }
}

/// Two-way branch on a condition value.
pub struct IfBuilder<'g> {
    graph: &'g mut Graph,
    condition: Option<NodeId>,
}

impl<'g> IfBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        IfBuilder {
            graph,
            condition: None,
        }
    }

    pub fn condition(mut self, node: NodeId) -> Self {
        self.condition = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let condition = self.condition.expect("If requires a condition");
        self.graph.new_node(Opcode::If, &[condition], &[], &[])
    }
}

/// Branch projection (`IfTrue` or `IfFalse`) of an `If` node.
pub struct IfBranchBuilder<'g> {
    graph: &'g mut Graph,
    is_true_branch: bool,
    if_node: Option<NodeId>,
}

impl<'g> IfBranchBuilder<'g> {
    pub fn new(graph: &'g mut Graph, is_true_branch: bool) -> Self {
        IfBranchBuilder {
            graph,
            is_true_branch,
            if_node: None,
        }
    }

    pub fn if_stmt(mut self, node: NodeId) -> Self {
        self.if_node = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let if_node = self.if_node.expect("branch projection requires an If node");
        let op = if self.is_true_branch {
            Opcode::IfTrue
        } else {
            Opcode::IfFalse
        };
        self.graph.new_node(op, &[], &[if_node], &[])
    }
}

/// Control merge point.
pub struct MergeBuilder<'g> {
    graph: &'g mut Graph,
    ctrls: Vec<NodeId>,
}

impl<'g> MergeBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        MergeBuilder {
            graph,
            ctrls: Vec::new(),
        }
    }

    pub fn add_ctrl_input(mut self, node: NodeId) -> Self {
        self.ctrls.push(node);
        self
    }

    pub fn build(self) -> NodeId {
        self.graph.new_node(Opcode::Merge, &[], &self.ctrls, &[])
    }
}

/// Effect merge point.
pub struct EffectMergeBuilder<'g> {
    graph: &'g mut Graph,
    effects: Vec<NodeId>,
}

impl<'g> EffectMergeBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        EffectMergeBuilder {
            graph,
            effects: Vec::new(),
        }
    }

    pub fn add_effect_input(mut self, node: NodeId) -> Self {
        self.effects.push(node);
        self
    }

    pub fn build(self) -> NodeId {
        self.graph
            .new_node(Opcode::EffectMerge, &[], &[], &self.effects)
    }
}

/// SSA merge node. The i-th value/effect input corresponds to the control
/// pivot's i-th control input.
pub struct PhiBuilder<'g> {
    graph: &'g mut Graph,
    values: Vec<NodeId>,
    effects: Vec<NodeId>,
    ctrl_merge: Option<NodeId>,
}

impl<'g> PhiBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        PhiBuilder {
            graph,
            values: Vec::new(),
            effects: Vec::new(),
            ctrl_merge: None,
        }
    }

    pub fn add_value_input(mut self, node: NodeId) -> Self {
        self.values.push(node);
        self
    }

    pub fn add_effect_input(mut self, node: NodeId) -> Self {
        self.effects.push(node);
        self
    }

    pub fn ctrl_merge(mut self, node: NodeId) -> Self {
        self.ctrl_merge = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let merge = self.ctrl_merge.expect("Phi requires a control merge point");
        self.graph
            .new_node(Opcode::Phi, &self.values, &[merge], &self.effects)
    }
}

/// Formal parameter: value input 0 is the pooled parameter name.
pub struct ArgumentBuilder<'g> {
    graph: &'g mut Graph,
    name: String,
}

impl<'g> ArgumentBuilder<'g> {
    pub fn new(graph: &'g mut Graph, name: impl Into<String>) -> Self {
        ArgumentBuilder {
            graph,
            name: name.into(),
        }
    }

    pub fn build(self) -> NodeId {
        let name = ConstantStrBuilder::new(self.graph, self.name).build();
        self.graph.new_node(Opcode::Argument, &[name], &[], &[])
    }
}

/// Function prototype, producing the `Start` node: the name is its value
/// input, the parameters hang off it as effect inputs.
pub struct FuncPrototypeBuilder<'g> {
    graph: &'g mut Graph,
    name: Option<NodeId>,
    parameters: Vec<NodeId>,
}

impl<'g> FuncPrototypeBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        FuncPrototypeBuilder {
            graph,
            name: None,
            parameters: Vec::new(),
        }
    }

    pub fn func_name(mut self, name: impl Into<String>) -> Self {
        let node = ConstantStrBuilder::new(self.graph, name).build();
        self.name = Some(node);
        self
    }

    pub fn add_parameter(mut self, node: NodeId) -> Self {
        self.parameters.push(node);
        self
    }

    pub fn build(self) -> Result<NodeId, BuildError> {
        let name = self.name.ok_or(BuildError::MissingFunctionName)?;
        for &param in &self.parameters {
            let op = self.graph.node(param).op();
            if op != Opcode::Argument {
                return Err(BuildError::NonArgumentParameter { node: param, op });
            }
        }
        Ok(self
            .graph
            .new_node(Opcode::Start, &[name], &[], &self.parameters))
    }
}

/// Region tail: control-dependent on the function's terminators (or the
/// start node alone when there are none).
pub struct EndBuilder<'g> {
    graph: &'g mut Graph,
    start: NodeId,
    terminators: Vec<NodeId>,
    effects: Vec<NodeId>,
}

impl<'g> EndBuilder<'g> {
    pub fn new(graph: &'g mut Graph, start: NodeId) -> Self {
        EndBuilder {
            graph,
            start,
            terminators: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn add_terminator(mut self, node: NodeId) -> Self {
        self.terminators.push(node);
        self
    }

    pub fn add_effect_dep(mut self, node: NodeId) -> Self {
        self.effects.push(node);
        self
    }

    pub fn build(self) -> NodeId {
        let mut ctrls = Vec::with_capacity(self.terminators.len() + 1);
        ctrls.push(self.start);
        ctrls.extend(self.terminators);
        self.graph.new_node(Opcode::End, &[], &ctrls, &self.effects)
    }
}

/// Function return, with an optional return value.
pub struct ReturnBuilder<'g> {
    graph: &'g mut Graph,
    value: Option<NodeId>,
}

impl<'g> ReturnBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        ReturnBuilder { graph, value: None }
    }

    pub fn value(mut self, node: NodeId) -> Self {
        self.value = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let values: Vec<NodeId> = self.value.into_iter().collect();
        self.graph.new_node(Opcode::Return, &values, &[], &[])
    }
}

/// Loop header. Synthesizes the guarding `If` with both branch
/// projections; the header is control-dependent on the preceding control
/// point and on the true branch (the backedge, always control input 1).
pub struct LoopBuilder<'g> {
    graph: &'g mut Graph,
    last_ctrl_point: NodeId,
    condition: Option<NodeId>,
}

impl<'g> LoopBuilder<'g> {
    pub fn new(graph: &'g mut Graph, last_ctrl_point: NodeId) -> Self {
        LoopBuilder {
            graph,
            last_ctrl_point,
            condition: None,
        }
    }

    pub fn condition(mut self, node: NodeId) -> Self {
        self.condition = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let condition = self.condition.expect("Loop requires a condition");
        let if_node = IfBuilder::new(self.graph).condition(condition).build();
        let if_true = IfBranchBuilder::new(self.graph, true)
            .if_stmt(if_node)
            .build();
        // The false projection is the loop exit; it is picked up later by
        // whatever control follows the loop.
        let _if_false = IfBranchBuilder::new(self.graph, false)
            .if_stmt(if_node)
            .build();
        let loop_node = self.graph.new_node(
            Opcode::Loop,
            &[],
            &[self.last_ctrl_point, if_true],
            &[],
        );
        self.graph.append_control_input(if_node, loop_node);
        loop_node
    }
}

/// Stack allocation, one word by default.
pub struct AllocaBuilder<'g> {
    graph: &'g mut Graph,
    size: Option<NodeId>,
}

impl<'g> AllocaBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        AllocaBuilder { graph, size: None }
    }

    pub fn size(mut self, node: NodeId) -> Self {
        self.size = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let size = match self.size {
            Some(size) => size,
            None => ConstantIntBuilder::new(self.graph, 1).build(),
        };
        self.graph.new_node(Opcode::Alloca, &[size], &[], &[])
    }
}

/// Memory read from `base + offset`.
pub struct MemLoadBuilder<'g> {
    graph: &'g mut Graph,
    base_addr: Option<NodeId>,
    offset: Option<NodeId>,
}

impl<'g> MemLoadBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        MemLoadBuilder {
            graph,
            base_addr: None,
            offset: None,
        }
    }

    pub fn base_addr(mut self, node: NodeId) -> Self {
        self.base_addr = Some(node);
        self
    }

    pub fn offset(mut self, node: NodeId) -> Self {
        self.offset = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let base = self.base_addr.expect("memory load requires a base address");
        let offset = self.offset.expect("memory load requires an offset");
        self.graph
            .new_node(Opcode::MemLoad, &[base, offset], &[], &[])
    }
}

/// Memory write of `source` to `base + offset`.
pub struct MemStoreBuilder<'g> {
    graph: &'g mut Graph,
    base_addr: Option<NodeId>,
    offset: Option<NodeId>,
    source: Option<NodeId>,
}

impl<'g> MemStoreBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        MemStoreBuilder {
            graph,
            base_addr: None,
            offset: None,
            source: None,
        }
    }

    pub fn base_addr(mut self, node: NodeId) -> Self {
        self.base_addr = Some(node);
        self
    }

    pub fn offset(mut self, node: NodeId) -> Self {
        self.offset = Some(node);
        self
    }

    pub fn source(mut self, node: NodeId) -> Self {
        self.source = Some(node);
        self
    }

    pub fn build(self) -> NodeId {
        let base = self.base_addr.expect("memory store requires a base address");
        let offset = self.offset.expect("memory store requires an offset");
        let source = self.source.expect("memory store requires a source value");
        self.graph
            .new_node(Opcode::MemStore, &[base, offset, source], &[], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_int_pool_is_idempotent() {
        let mut g = Graph::new();
        let a = ConstantIntBuilder::new(&mut g, 42).build();
        let b = ConstantIntBuilder::new(&mut g, 42).build();
        let c = ConstantIntBuilder::new(&mut g, 43).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(g.num_const_ints(), 2);
        assert_eq!(g.const_int_value(a), Some(42));
        assert_eq!(g.const_int_node(42), Some(a));
    }

    #[test]
    fn constant_str_pool_is_idempotent() {
        let mut g = Graph::new();
        let a = ConstantStrBuilder::new(&mut g, "x").build();
        let b = ConstantStrBuilder::new(&mut g, "x").build();
        assert_eq!(a, b);
        assert_eq!(g.num_const_strs(), 1);
        assert_eq!(g.const_str_value(a), Some("x"));
    }

    #[test]
    fn function_stub_pool_keys_on_the_tail() {
        let mut g = Graph::new();
        let end = g.new_node(Opcode::End, &[], &[], &[]);
        let s1 = FunctionStubBuilder::new(&mut g, SubGraph::new(end)).build();
        let s2 = FunctionStubBuilder::new(&mut g, SubGraph::new(end)).build();
        assert_eq!(s1, s2);
        assert_eq!(g.num_func_stubs(), 1);
        assert_eq!(g.func_stub_sub_graph(s1), Some(SubGraph::new(end)));
    }

    #[test]
    fn call_layout_is_stub_then_params() {
        let mut g = Graph::new();
        let end = g.new_node(Opcode::End, &[], &[], &[]);
        let stub = FunctionStubBuilder::new(&mut g, SubGraph::new(end)).build();
        let p0 = ConstantIntBuilder::new(&mut g, 1).build();
        let p1 = ConstantIntBuilder::new(&mut g, 2).build();
        let call = CallBuilder::new(&mut g, stub)
            .add_param(p0)
            .add_param(p1)
            .build();
        assert_eq!(g.node(call).value_inputs(), &[stub, p0, p1]);
    }

    #[test]
    fn prototype_builds_start_with_name_and_parameter_effects() {
        let mut g = Graph::new();
        let arg = ArgumentBuilder::new(&mut g, "n").build();
        let start = FuncPrototypeBuilder::new(&mut g)
            .func_name("fib")
            .add_parameter(arg)
            .build()
            .unwrap();
        let node = g.node(start);
        assert_eq!(node.op(), Opcode::Start);
        assert_eq!(node.num_value_inputs(), 1);
        assert_eq!(node.effect_inputs(), &[arg]);
        assert_eq!(g.const_str_value(node.value_input(0)), Some("fib"));
    }

    #[test]
    fn prototype_without_name_is_a_diagnostic() {
        let mut g = Graph::new();
        let err = FuncPrototypeBuilder::new(&mut g).build().unwrap_err();
        assert!(matches!(err, BuildError::MissingFunctionName));
    }

    #[test]
    fn prototype_rejects_non_argument_parameters() {
        let mut g = Graph::new();
        let not_arg = ConstantIntBuilder::new(&mut g, 5).build();
        let err = FuncPrototypeBuilder::new(&mut g)
            .func_name("f")
            .add_parameter(not_arg)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::NonArgumentParameter { node, op: Opcode::ConstantInt } if node == not_arg
        ));
    }

    #[test]
    fn end_is_control_dependent_on_start_then_terminators() {
        let mut g = Graph::new();
        let start = FuncPrototypeBuilder::new(&mut g)
            .func_name("f")
            .build()
            .unwrap();
        let ret = ReturnBuilder::new(&mut g).build();
        let end = EndBuilder::new(&mut g, start).add_terminator(ret).build();
        assert_eq!(g.node(end).control_inputs(), &[start, ret]);
    }

    #[test]
    fn loop_builder_synthesizes_guard_and_backedge() {
        let mut g = Graph::new();
        let start = FuncPrototypeBuilder::new(&mut g)
            .func_name("f")
            .build()
            .unwrap();
        let cond = ConstantIntBuilder::new(&mut g, 1).build();
        let loop_node = LoopBuilder::new(&mut g, start).condition(cond).build();

        let node = g.node(loop_node);
        assert_eq!(node.op(), Opcode::Loop);
        assert_eq!(node.num_control_inputs(), 2);
        assert_eq!(node.control_input(0), start);
        let backedge = node.control_input(1);
        assert_eq!(g.node(backedge).op(), Opcode::IfTrue);

        // The guarding If sits inside the loop: its control input is the
        // header, its condition the given predicate.
        let if_node = g.node(backedge).control_input(0);
        assert_eq!(g.node(if_node).op(), Opcode::If);
        assert_eq!(g.node(if_node).value_input(0), cond);
        assert_eq!(g.node(if_node).control_inputs(), &[loop_node]);

        // Both projections exist.
        let projections: Vec<Opcode> = g
            .control_users(if_node)
            .iter()
            .map(|&u| g.node(u).op())
            .filter(|op| op.is_if_branch())
            .collect();
        assert_eq!(projections.len(), 2);
    }

    #[test]
    fn array_access_validates_dimension_count() {
        let mut g = Graph::new();
        let decl = SrcArrayDeclBuilder::new(&mut g)
            .symbol_name("a")
            .add_const_dim(4)
            .add_const_dim(5)
            .build();
        let i = ConstantIntBuilder::new(&mut g, 0).build();
        let j = ConstantIntBuilder::new(&mut g, 1).build();
        let access = SrcArrayAccessBuilder::new(&mut g)
            .decl(decl)
            .add_access_dim(i)
            .add_access_dim(j)
            .build();
        assert_eq!(g.node(access).value_inputs(), &[decl, i, j]);
    }

    #[test]
    #[should_panic(expected = "index expressions")]
    fn array_access_with_wrong_dim_count_panics() {
        let mut g = Graph::new();
        let decl = SrcArrayDeclBuilder::new(&mut g)
            .symbol_name("a")
            .add_const_dim(4)
            .add_const_dim(5)
            .build();
        let i = ConstantIntBuilder::new(&mut g, 0).build();
        let _ = SrcArrayAccessBuilder::new(&mut g)
            .decl(decl)
            .add_access_dim(i)
            .build();
    }

    #[test]
    fn var_access_threads_the_effect_chain() {
        let mut g = Graph::new();
        let decl = SrcVarDeclBuilder::new(&mut g).symbol_name("x").build();
        let five = ConstantIntBuilder::new(&mut g, 5).build();
        let assign = SrcAssignStmtBuilder::new(&mut g)
            .dest(decl)
            .source(five)
            .build();
        let access = SrcVarAccessBuilder::new(&mut g)
            .decl(decl)
            .effect(assign)
            .build();

        let node = g.node(access);
        assert_eq!(node.value_inputs(), &[decl]);
        assert_eq!(node.effect_inputs(), &[assign]);
    }

    #[test]
    fn alloca_defaults_to_one_word() {
        let mut g = Graph::new();
        let alloca = AllocaBuilder::new(&mut g).build();
        let size = g.node(alloca).value_input(0);
        assert_eq!(g.const_int_value(size), Some(1));
    }

    #[test]
    fn mem_store_layout() {
        let mut g = Graph::new();
        let base = AllocaBuilder::new(&mut g).build();
        let off = ConstantIntBuilder::new(&mut g, 0).build();
        let val = ConstantIntBuilder::new(&mut g, 9).build();
        let store = MemStoreBuilder::new(&mut g)
            .base_addr(base)
            .offset(off)
            .source(val)
            .build();
        assert_eq!(g.node(store).value_inputs(), &[base, off, val]);
    }
}
