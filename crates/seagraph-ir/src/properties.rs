//! Read-only, opcode-tagged views over nodes.
//!
//! Each view is a transparent `(graph, node)` wrapper whose constructor
//! `of` returns `None` unless the node carries the expected opcode (or
//! belongs to the expected opcode family). Views expose the semantic
//! accessors of their opcode -- input roles, projections, pooled payloads
//! -- and never mutate the graph.

use crate::attribute::Attr;
use crate::edge::DepKind;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::opcode::Opcode;
use crate::subgraph::SubGraph;

macro_rules! view_ctor {
    ($name:ident, $pred:expr) => {
        impl<'g> $name<'g> {
            pub fn of(graph: &'g Graph, node: NodeId) -> Option<Self> {
                let op = graph.get_node(node)?.op();
                let matches: fn(Opcode) -> bool = $pred;
                if matches(op) {
                    Some(Self { graph, node })
                } else {
                    None
                }
            }

            pub fn node(&self) -> NodeId {
                self.node
            }
        }
    };
}

/// Pooled integer constant.
pub struct ConstantIntView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(ConstantIntView, |op| op == Opcode::ConstantInt);

impl ConstantIntView<'_> {
    /// Pool lookup; zero when the node is not pooled.
    pub fn value(&self) -> i32 {
        self.graph.const_int_value(self.node).unwrap_or_default()
    }
}

/// Pooled string constant.
pub struct ConstantStrView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(ConstantStrView, |op| op == Opcode::ConstantStr);

impl<'g> ConstantStrView<'g> {
    pub fn value(&self) -> &'g str {
        self.graph
            .const_str_value(self.node)
            .expect("ConstantStr node missing from the string pool")
    }

    pub fn value_or_default(&self) -> &'g str {
        self.graph.const_str_value(self.node).unwrap_or("")
    }
}

/// Function stub standing in for a callee subregion.
pub struct FunctionStubView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(FunctionStubView, |op| op == Opcode::FunctionStub);

impl FunctionStubView<'_> {
    /// The `Start` node of the stubbed function, reached through the pool
    /// and the tail's inputs.
    pub fn function_start(&self) -> Option<NodeId> {
        let sub_graph = self.graph.func_stub_sub_graph(self.node)?;
        self.graph
            .node(sub_graph.tail())
            .inputs()
            .iter()
            .copied()
            .find(|&n| self.graph.node(n).op() == Opcode::Start)
    }

    /// Whether the stubbed function carries `attr`. Pass `func` to skip
    /// the pool walk when the `Start` node is already at hand.
    pub fn has_attribute(&self, attr: Attr, func: Option<NodeId>) -> bool {
        let start = match func {
            Some(start) => Some(start),
            None => self.function_start(),
        };
        match start {
            Some(start) => self.graph.has_attribute(start, attr),
            None => false,
        }
    }
}

/// Function call.
pub struct CallView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(CallView, |op| op == Opcode::Call);

impl<'g> CallView<'g> {
    pub fn func_stub(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }

    pub fn num_parameters(&self) -> usize {
        let count = self.graph.node(self.node).num_value_inputs();
        assert!(count > 0, "Call node without a callee");
        count - 1
    }

    pub fn params(&self) -> &'g [NodeId] {
        &self.graph.node(self.node).value_inputs()[1..]
    }
}

/// Variable or array declaration.
pub struct SrcDeclView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(SrcDeclView, Opcode::is_src_decl);

impl<'g> SrcDeclView<'g> {
    pub fn symbol_name(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }

    pub fn ident_name(&self) -> &'g str {
        ConstantStrView::of(self.graph, self.symbol_name())
            .expect("declaration name must be a ConstantStr")
            .value()
    }
}

/// Array declaration: dimensions start at value input 1.
pub struct SrcArrayDeclView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(SrcArrayDeclView, |op| op == Opcode::SrcArrayDecl);

impl<'g> SrcArrayDeclView<'g> {
    pub fn symbol_name(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }

    pub fn dim_count(&self) -> usize {
        let count = self.graph.node(self.node).num_value_inputs();
        assert!(count > 0, "array declaration without a symbol name");
        count - 1
    }

    pub fn dim(&self, idx: usize) -> NodeId {
        assert!(idx < self.dim_count(), "dim index out of bounds");
        self.graph.node(self.node).value_input(idx + 1)
    }

    pub fn dims(&self) -> &'g [NodeId] {
        &self.graph.node(self.node).value_inputs()[1..]
    }
}

/// Designator access (variable or array read).
pub struct DesigAccessView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(DesigAccessView, Opcode::is_desig_access);

impl DesigAccessView<'_> {
    pub fn decl(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }

    pub fn effect_dependency(&self) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        if node.num_effect_inputs() > 0 {
            Some(node.effect_input(0))
        } else {
            None
        }
    }
}

/// Array read: index expressions start at value input 1.
pub struct SrcArrayAccessView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(SrcArrayAccessView, |op| op == Opcode::SrcArrayAccess);

impl<'g> SrcArrayAccessView<'g> {
    pub fn decl(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }

    pub fn effect_dependency(&self) -> Option<NodeId> {
        DesigAccessView::of(self.graph, self.node)
            .and_then(|view| view.effect_dependency())
    }

    pub fn dim_count(&self) -> usize {
        self.graph.node(self.node).num_value_inputs() - 1
    }

    pub fn dims(&self) -> &'g [NodeId] {
        &self.graph.node(self.node).value_inputs()[1..]
    }
}

/// Assignment statement.
pub struct SrcAssignStmtView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(SrcAssignStmtView, |op| op == Opcode::SrcAssignStmt);

impl SrcAssignStmtView<'_> {
    pub fn dest(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }

    pub fn source(&self) -> NodeId {
        self.graph.node(self.node).value_input(1)
    }
}

/// Function entry.
pub struct StartView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(StartView, |op| op == Opcode::Start);

impl<'g> StartView<'g> {
    pub fn name(&self) -> &'g str {
        ConstantStrView::of(self.graph, self.graph.node(self.node).value_input(0))
            .expect("Start name must be a ConstantStr")
            .value()
    }

    /// The matching region tail, found among this node's users.
    pub fn end_node(&self) -> Option<NodeId> {
        self.graph
            .node(self.node)
            .users()
            .iter()
            .copied()
            .find(|&u| self.graph.node(u).op() == Opcode::End)
    }

    /// The pooled stub for this function, if one was built.
    pub fn func_stub(&self) -> Option<NodeId> {
        let end = self.end_node()?;
        self.graph.func_stub_node(SubGraph::new(end))
    }
}

/// Formal parameter.
pub struct ArgumentView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(ArgumentView, |op| op == Opcode::Argument);

impl ArgumentView<'_> {
    /// The `Start` node this parameter belongs to (arguments hang off
    /// their function entry as effect inputs).
    pub fn func_start(&self) -> Option<NodeId> {
        self.graph
            .effect_users(self.node)
            .into_iter()
            .find(|&u| self.graph.node(u).op() == Opcode::Start)
    }
}

/// Two-way branch.
pub struct IfView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(IfView, |op| op == Opcode::If);

impl IfView<'_> {
    pub fn condition(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }

    pub fn true_branch(&self) -> Option<NodeId> {
        self.graph
            .control_users(self.node)
            .into_iter()
            .find(|&u| self.graph.node(u).op() == Opcode::IfTrue)
    }

    /// The `IfFalse` projection, or any non-true control user when the
    /// false side falls through without an explicit projection.
    pub fn false_branch(&self) -> Option<NodeId> {
        let users = self.graph.control_users(self.node);
        users
            .iter()
            .copied()
            .find(|&u| self.graph.node(u).op() == Opcode::IfFalse)
            .or_else(|| {
                users
                    .into_iter()
                    .find(|&u| self.graph.node(u).op() != Opcode::IfTrue)
            })
    }
}

/// Control merge.
pub struct MergeView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(MergeView, |op| op == Opcode::Merge);

impl MergeView<'_> {
    pub fn true_branch(&self) -> Option<NodeId> {
        self.graph
            .node(self.node)
            .control_inputs()
            .iter()
            .copied()
            .find(|&n| self.graph.node(n).op() == Opcode::IfTrue)
    }

    /// The merged false side; with `fallthrough`, the branch point itself
    /// counts when no `IfFalse` projection was merged.
    pub fn false_branch(&self, fallthrough: bool) -> Option<NodeId> {
        let ctrls = self.graph.node(self.node).control_inputs();
        ctrls
            .iter()
            .copied()
            .find(|&n| self.graph.node(n).op() == Opcode::IfFalse)
            .or_else(|| {
                if fallthrough {
                    ctrls
                        .iter()
                        .copied()
                        .find(|&n| self.graph.node(n).op() == Opcode::If)
                } else {
                    None
                }
            })
    }
}

/// `IfTrue`/`IfFalse` projection.
pub struct IfBranchView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(IfBranchView, Opcode::is_if_branch);

impl IfBranchView<'_> {
    pub fn branch_point(&self) -> Option<NodeId> {
        self.graph
            .node(self.node)
            .control_inputs()
            .iter()
            .copied()
            .find(|&n| self.graph.node(n).op() == Opcode::If)
    }
}

/// Loop header.
pub struct LoopView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(LoopView, |op| op == Opcode::Loop);

impl LoopView<'_> {
    /// The guarding `If` inside the loop.
    pub fn branch(&self) -> Option<NodeId> {
        self.graph
            .control_users(self.node)
            .into_iter()
            .find(|&u| self.graph.node(u).op() == Opcode::If)
    }

    /// The backedge always sits behind the entry control point.
    pub fn backedge(&self) -> NodeId {
        let node = self.graph.node(self.node);
        assert_eq!(
            node.num_control_inputs(),
            2,
            "loop header must have entry and backedge control inputs"
        );
        node.control_input(1)
    }
}

/// SSA merge node.
pub struct PhiView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(PhiView, |op| op == Opcode::Phi);

impl PhiView<'_> {
    pub fn ctrl_pivot(&self) -> NodeId {
        self.graph.node(self.node).control_input(0)
    }

    /// Maps a value or effect input of this phi to the corresponding
    /// control input of the pivot (same position).
    pub fn map_ctrl_node(&self, input: NodeId, kind: DepKind) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        let idx = match kind {
            DepKind::Value => node.value_inputs().iter().position(|&n| n == input)?,
            DepKind::Effect => node.effect_inputs().iter().position(|&n| n == input)?,
            DepKind::Control => panic!("phi inputs are mapped by value or effect kind"),
        };
        let pivot = self.graph.node(self.ctrl_pivot());
        assert!(
            idx < pivot.num_control_inputs(),
            "phi input count exceeds pivot control inputs"
        );
        Some(pivot.control_input(idx))
    }
}

/// Stack allocation.
pub struct AllocaView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(AllocaView, |op| op == Opcode::Alloca);

impl AllocaView<'_> {
    pub fn size(&self) -> NodeId {
        self.graph.node(self.node).value_input(0)
    }
}

/// Memory access (load or store).
pub struct MemOpView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(MemOpView, Opcode::is_mem_op);

impl MemOpView<'_> {
    pub fn base_addr(&self) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        (node.num_value_inputs() > 0).then(|| node.value_input(0))
    }

    pub fn offset(&self) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        (node.num_value_inputs() > 1).then(|| node.value_input(1))
    }
}

/// Memory write.
pub struct MemStoreView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(MemStoreView, |op| op == Opcode::MemStore);

impl MemStoreView<'_> {
    pub fn base_addr(&self) -> Option<NodeId> {
        MemOpView::of(self.graph, self.node).and_then(|v| v.base_addr())
    }

    pub fn offset(&self) -> Option<NodeId> {
        MemOpView::of(self.graph, self.node).and_then(|v| v.offset())
    }

    pub fn src_val(&self) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        (node.num_value_inputs() > 2).then(|| node.value_input(2))
    }
}

/// Any of the ten trivial binary operations.
pub struct BinOpView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(BinOpView, Opcode::is_bin_op);

impl BinOpView<'_> {
    pub fn lhs(&self) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        (node.num_value_inputs() > 0).then(|| node.value_input(0))
    }

    pub fn rhs(&self) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        (node.num_value_inputs() > 1).then(|| node.value_input(1))
    }

    pub fn is_commutative(&self) -> bool {
        self.graph.node(self.node).op().is_commutative_bin_op()
    }
}

/// Function return.
pub struct ReturnView<'g> {
    graph: &'g Graph,
    node: NodeId,
}
view_ctor!(ReturnView, |op| op == Opcode::Return);

impl ReturnView<'_> {
    pub fn return_value(&self) -> Option<NodeId> {
        let node = self.graph.node(self.node);
        (node.num_value_inputs() > 0).then(|| node.value_input(0))
    }
}

/// BFS over input edges from `node` to the first control-point node.
pub fn find_nearest_ctrl_point(graph: &Graph, node: NodeId) -> Option<NodeId> {
    let mut queue = vec![node];
    let mut visited = vec![node];
    let mut at = 0;
    while at < queue.len() {
        let current = queue[at];
        at += 1;
        for &input in graph.node(current).inputs() {
            if graph.node(input).op().is_ctrl_point() {
                return Some(input);
            }
            if !visited.contains(&input) {
                visited.push(input);
                queue.push(input);
            }
        }
    }
    None
}
