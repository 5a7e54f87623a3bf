//! Scalar value promotion and array lowering.
//!
//! Source programs reach the graph with memory-shaped accesses: every
//! variable read (`SrcVarAccess`) carries an effect edge to the last
//! modification of that variable, every write is an `SrcAssignStmt`, and
//! control merges join the per-variable chains with effect phis. This
//! reducer threads values through those chains directly:
//!
//! - an assignment to a scalar becomes its source value, so readers
//!   downstream of it pick the value straight off their effect edge;
//! - a scalar read resolves through its effect edge (assignment source,
//!   promoted value, or the argument/zero default when the chain is
//!   empty);
//! - an effect phi whose inputs have all become values is rebuilt as a
//!   value phi on the same control pivot;
//! - array declarations lower to `Alloca` of `#elements * 4` bytes
//!   (global membership transfers to the allocation), array reads to
//!   `MemLoad` with a row-major byte offset, and assignments through
//!   array designators to `MemStore`;
//! - a load whose effect edge is a store to the same base and offset
//!   forwards the stored value.
//!
//! Offset expressions are constant-folded when every index and dimension
//! is a pooled constant, and memoized per `(base, indices)` otherwise so
//! repeated accesses to one element share the address computation.

use std::collections::HashMap;

use seagraph_ir::builders::{
    AllocaBuilder, BinOpBuilder, ConstantIntBuilder, MemLoadBuilder, MemStoreBuilder, PhiBuilder,
};
use seagraph_ir::properties::{
    DesigAccessView, MemStoreView, SrcArrayAccessView, SrcArrayDeclView, SrcAssignStmtView,
};
use seagraph_ir::{Graph, NodeId, Opcode};

use crate::reducer::{Editor, Reducer, Reduction};

const WORD_BYTES: i32 = 4;

#[derive(Debug, Default)]
pub struct ValuePromotion {
    /// Allocation -> the declared dimension nodes it was lowered from.
    array_dims: HashMap<NodeId, Vec<NodeId>>,
    /// `(base, indices)` -> shared offset expression.
    offset_memo: HashMap<(NodeId, Vec<NodeId>), NodeId>,
}

impl ValuePromotion {
    pub fn new() -> Self {
        ValuePromotion::default()
    }

    /// Effect-chain carriers: nodes that stand for a memory state rather
    /// than a promoted value.
    fn is_effect_carrier(graph: &Graph, id: NodeId) -> bool {
        let node = graph.node(id);
        match node.op() {
            Opcode::SrcAssignStmt
            | Opcode::EffectMerge
            | Opcode::MemStore
            | Opcode::SrcInitialArray
            | Opcode::Start
            | Opcode::Dead => true,
            Opcode::Phi => node.num_value_inputs() == 0,
            _ => false,
        }
    }

    fn reduce_assignment(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let (dest, source) = {
            let graph = editor.graph_ref();
            let Some(view) = SrcAssignStmtView::of(graph, node) else {
                return Reduction::unchanged();
            };
            (view.dest(), view.source())
        };
        let dest_op = editor.graph_ref().node(dest).op();
        match dest_op {
            Opcode::MemLoad | Opcode::SrcArrayAccess => {
                self.reduce_mem_assignment(editor, node, dest, source)
            }
            Opcode::SrcVarDecl if editor.graph_ref().is_global_var(dest) => Reduction::unchanged(),
            Opcode::SrcVarAccess => {
                let decl = DesigAccessView::of(editor.graph_ref(), dest)
                    .expect("checked opcode")
                    .decl();
                if editor.graph_ref().is_global_var(decl) {
                    Reduction::unchanged()
                } else {
                    Reduction::replace(source)
                }
            }
            _ => Reduction::replace(source),
        }
    }

    /// Assignment through an array designator becomes a store.
    fn reduce_mem_assignment(
        &mut self,
        editor: &mut dyn Editor,
        node: NodeId,
        dest: NodeId,
        source: NodeId,
    ) -> Reduction {
        let assign_chain = editor
            .graph_ref()
            .node(node)
            .effect_inputs()
            .first()
            .copied();
        let (base, offset, chain) = match editor.graph_ref().node(dest).op() {
            Opcode::MemLoad => {
                let dest_node = editor.graph_ref().node(dest);
                if dest_node.num_value_inputs() < 2 {
                    return Reduction::unchanged();
                }
                let base = dest_node.value_input(0);
                let offset = dest_node.value_input(1);
                let chain = dest_node.effect_inputs().first().copied().or(assign_chain);
                (base, offset, chain)
            }
            Opcode::SrcArrayAccess => {
                let (decl, indices, access_chain) = {
                    let graph = editor.graph_ref();
                    let view = SrcArrayAccessView::of(graph, dest).expect("checked opcode");
                    (view.decl(), view.dims().to_vec(), view.effect_dependency())
                };
                let Some(dims) = self.array_dims.get(&decl).cloned() else {
                    return Reduction::unchanged();
                };
                let Some(offset) = self.offset_expr(editor, decl, &dims, &indices) else {
                    return Reduction::unchanged();
                };
                (decl, offset, access_chain.or(assign_chain))
            }
            _ => return Reduction::unchanged(),
        };

        let graph = editor.graph();
        let store = MemStoreBuilder::new(graph)
            .base_addr(base)
            .offset(offset)
            .source(source)
            .build();
        if let Some(chain) = chain {
            graph.append_effect_input(store, chain);
        }
        Reduction::replace(store)
    }

    fn reduce_var_access(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let (decl, effect_dep) = {
            let graph = editor.graph_ref();
            let Some(view) = DesigAccessView::of(graph, node) else {
                return Reduction::unchanged();
            };
            (view.decl(), view.effect_dependency())
        };
        let graph = editor.graph_ref();
        let decl_op = graph.node(decl).op();
        if decl_op == Opcode::SrcVarDecl && graph.is_global_var(decl) {
            return Reduction::unchanged();
        }
        match effect_dep {
            None => match decl_op {
                // Reading a parameter is the parameter value itself.
                Opcode::Argument => Reduction::replace(decl),
                // A never-assigned local reads as zero.
                Opcode::SrcVarDecl => {
                    let zero = ConstantIntBuilder::new(editor.graph(), 0).build();
                    Reduction::replace(zero)
                }
                _ => Reduction::unchanged(),
            },
            Some(effect) => {
                if graph.node(effect).op() == Opcode::SrcAssignStmt {
                    let source = SrcAssignStmtView::of(graph, effect)
                        .expect("checked opcode")
                        .source();
                    return Reduction::replace(source);
                }
                if Self::is_effect_carrier(graph, effect) {
                    // The chain has not been promoted (yet); the engine
                    // revisits this access when it is.
                    return Reduction::unchanged();
                }
                Reduction::replace(effect)
            }
        }
    }

    /// Array declarations lower to a stack allocation of the array's byte
    /// size; global membership follows the allocation.
    fn reduce_array_decl(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let dims = {
            let graph = editor.graph_ref();
            let Some(view) = SrcArrayDeclView::of(graph, node) else {
                return Reduction::unchanged();
            };
            view.dims().to_vec()
        };
        if dims.is_empty() {
            return Reduction::unchanged();
        }

        let graph = editor.graph();
        let const_dims: Option<Vec<i64>> = dims
            .iter()
            .map(|&d| graph.const_int_value(d).map(i64::from))
            .collect();
        let size = match const_dims {
            Some(values) => {
                let total: i64 = values.iter().product::<i64>() * i64::from(WORD_BYTES);
                match i32::try_from(total) {
                    Ok(total) => ConstantIntBuilder::new(graph, total).build(),
                    Err(_) => Self::size_expr(graph, &dims),
                }
            }
            None => Self::size_expr(graph, &dims),
        };
        let alloca = AllocaBuilder::new(graph).size(size).build();
        self.array_dims.insert(alloca, dims);
        editor.graph().replace_global_var(node, alloca);
        Reduction::replace(alloca)
    }

    fn size_expr(graph: &mut Graph, dims: &[NodeId]) -> NodeId {
        let mut total = dims[0];
        for &dim in &dims[1..] {
            total = BinOpBuilder::new(graph, Opcode::BinMul)
                .lhs(total)
                .rhs(dim)
                .build();
        }
        let word = ConstantIntBuilder::new(graph, WORD_BYTES).build();
        BinOpBuilder::new(graph, Opcode::BinMul)
            .lhs(total)
            .rhs(word)
            .build()
    }

    /// Array reads lower to a load at the element's byte offset.
    fn reduce_array_access(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let (decl, indices, effect_dep) = {
            let graph = editor.graph_ref();
            let Some(view) = SrcArrayAccessView::of(graph, node) else {
                return Reduction::unchanged();
            };
            (view.decl(), view.dims().to_vec(), view.effect_dependency())
        };
        if indices.is_empty() || editor.graph_ref().node(decl).op() != Opcode::Alloca {
            return Reduction::unchanged();
        }
        let Some(dims) = self.array_dims.get(&decl).cloned() else {
            return Reduction::unchanged();
        };
        let Some(offset) = self.offset_expr(editor, decl, &dims, &indices) else {
            return Reduction::unchanged();
        };

        let graph = editor.graph();
        let load = MemLoadBuilder::new(graph)
            .base_addr(decl)
            .offset(offset)
            .build();
        if let Some(effect) = effect_dep {
            graph.append_effect_input(load, effect);
        }
        Reduction::replace(load)
    }

    /// Store-to-load forwarding: a load whose memory state is a store to
    /// the same base and offset is the stored value.
    fn reduce_mem_load(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let graph = editor.graph_ref();
        let load = graph.node(node);
        if load.num_value_inputs() < 2 || load.num_effect_inputs() == 0 {
            return Reduction::unchanged();
        }
        let Some(store) = MemStoreView::of(graph, load.effect_input(0)) else {
            return Reduction::unchanged();
        };
        if store.base_addr() == Some(load.value_input(0))
            && store.offset() == Some(load.value_input(1))
        {
            if let Some(value) = store.src_val() {
                return Reduction::replace(value);
            }
        }
        Reduction::unchanged()
    }

    /// An effect phi whose inputs have all been promoted to values is
    /// rebuilt as a value phi on the same pivot.
    fn reduce_phi_node(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let effects = {
            let graph = editor.graph_ref();
            let phi = graph.node(node);
            if phi.num_value_inputs() != 0
                || phi.num_effect_inputs() == 0
                || phi.num_control_inputs() == 0
            {
                return Reduction::unchanged();
            }
            let effects = phi.effect_inputs().to_vec();
            if effects
                .iter()
                .any(|&e| e == node || Self::is_effect_carrier(graph, e))
            {
                return Reduction::unchanged();
            }
            effects
        };
        let pivot = editor.graph_ref().node(node).control_input(0);
        let graph = editor.graph();
        let mut builder = PhiBuilder::new(graph).ctrl_merge(pivot);
        for effect in effects {
            builder = builder.add_value_input(effect);
        }
        Reduction::replace(builder.build())
    }

    /// Byte offset of an element: row-major linearization of the indices
    /// against the declared dimensions, scaled by the word size. Constant
    /// shapes fold to a pooled constant; otherwise the expression is
    /// memoized per `(base, indices)`.
    fn offset_expr(
        &mut self,
        editor: &mut dyn Editor,
        base: NodeId,
        decl_dims: &[NodeId],
        indices: &[NodeId],
    ) -> Option<NodeId> {
        if indices.is_empty() || indices.len() != decl_dims.len() {
            return None;
        }
        let graph = editor.graph();

        let const_dims: Option<Vec<i64>> = decl_dims
            .iter()
            .map(|&d| graph.const_int_value(d).map(i64::from))
            .collect();
        let const_indices: Option<Vec<i64>> = indices
            .iter()
            .map(|&i| graph.const_int_value(i).map(i64::from))
            .collect();
        if let (Some(dims), Some(idx)) = (const_dims, const_indices) {
            let mut linear = idx[0];
            for j in 1..idx.len() {
                linear = linear * dims[j] + idx[j];
            }
            if let Ok(byte) = i32::try_from(linear * i64::from(WORD_BYTES)) {
                return Some(ConstantIntBuilder::new(graph, byte).build());
            }
        }

        let key = (base, indices.to_vec());
        if let Some(&existing) = self.offset_memo.get(&key) {
            return Some(existing);
        }
        let mut linear = indices[0];
        for j in 1..indices.len() {
            let scaled = BinOpBuilder::new(graph, Opcode::BinMul)
                .lhs(linear)
                .rhs(decl_dims[j])
                .build();
            linear = BinOpBuilder::new(graph, Opcode::BinAdd)
                .lhs(scaled)
                .rhs(indices[j])
                .build();
        }
        let word = ConstantIntBuilder::new(graph, WORD_BYTES).build();
        let byte = BinOpBuilder::new(graph, Opcode::BinMul)
            .lhs(linear)
            .rhs(word)
            .build();
        self.offset_memo.insert(key, byte);
        Some(byte)
    }
}

impl Reducer for ValuePromotion {
    fn name(&self) -> &'static str {
        "value-promotion"
    }

    fn reduce(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        match editor.graph_ref().node(node).op() {
            Opcode::SrcAssignStmt => self.reduce_assignment(editor, node),
            Opcode::SrcVarAccess => self.reduce_var_access(editor, node),
            Opcode::SrcArrayDecl => self.reduce_array_decl(editor, node),
            Opcode::SrcArrayAccess => self.reduce_array_access(editor, node),
            Opcode::MemLoad => self.reduce_mem_load(editor, node),
            Opcode::Phi => self.reduce_phi_node(editor, node),
            _ => Reduction::unchanged(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::GraphReducer;
    use seagraph_ir::builders::{
        ArgumentBuilder, BinOpBuilder, ConstantIntBuilder, EndBuilder, FuncPrototypeBuilder,
        IfBranchBuilder, IfBuilder, MergeBuilder, ReturnBuilder, SrcArrayAccessBuilder,
        SrcArrayDeclBuilder, SrcAssignStmtBuilder, SrcVarAccessBuilder, SrcVarDeclBuilder,
    };
    use seagraph_ir::properties::PhiView;
    use seagraph_ir::{DepKind, SubGraph};

    fn run_promotion(g: &mut Graph) {
        let mut reducer = ValuePromotion::new();
        GraphReducer::run(g, &mut reducer);
    }

    fn finish_function(g: &mut Graph, root: NodeId, args: &[NodeId]) -> NodeId {
        let mut proto = FuncPrototypeBuilder::new(g).func_name("f");
        for &arg in args {
            proto = proto.add_parameter(arg);
        }
        let start = proto.build().unwrap();
        let ret = ReturnBuilder::new(g).value(root).build();
        let end = EndBuilder::new(g, start).add_terminator(ret).build();
        g.add_sub_region(SubGraph::new(end));
        ret
    }

    #[test]
    fn straight_line_reads_thread_assigned_values() {
        let mut g = Graph::new();
        let x = SrcVarDeclBuilder::new(&mut g).symbol_name("x").build();
        let five = ConstantIntBuilder::new(&mut g, 5).build();
        let assign1 = SrcAssignStmtBuilder::new(&mut g).dest(x).source(five).build();
        let read1 = SrcVarAccessBuilder::new(&mut g).decl(x).effect(assign1).build();
        let one = ConstantIntBuilder::new(&mut g, 1).build();
        let add = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(read1).rhs(one).build();
        let assign2 = SrcAssignStmtBuilder::new(&mut g)
            .dest(x)
            .source(add)
            .effect(assign1)
            .build();
        let read2 = SrcVarAccessBuilder::new(&mut g).decl(x).effect(assign2).build();
        let ret = finish_function(&mut g, read2, &[]);

        run_promotion(&mut g);

        // read2 -> x+1 with the read of x already resolved to 5.
        let result = g.node(ret).value_input(0);
        assert_eq!(result, add);
        assert_eq!(g.node(add).value_inputs(), &[five, one]);
        assert!(g.get_node(x).is_none(), "promoted declaration is trimmed");
    }

    #[test]
    fn unassigned_local_reads_as_zero() {
        let mut g = Graph::new();
        let x = SrcVarDeclBuilder::new(&mut g).symbol_name("x").build();
        let read = SrcVarAccessBuilder::new(&mut g).decl(x).build();
        let ret = finish_function(&mut g, read, &[]);

        run_promotion(&mut g);
        assert_eq!(g.const_int_value(g.node(ret).value_input(0)), Some(0));
    }

    #[test]
    fn parameter_reads_become_the_argument() {
        let mut g = Graph::new();
        let arg = ArgumentBuilder::new(&mut g, "n").build();
        let read = SrcVarAccessBuilder::new(&mut g).decl(arg).build();
        let ret = finish_function(&mut g, read, &[arg]);

        run_promotion(&mut g);
        assert_eq!(g.node(ret).value_input(0), arg);
    }

    #[test]
    fn global_scalars_keep_their_memory_form() {
        let mut g = Graph::new();
        let x = SrcVarDeclBuilder::new(&mut g).symbol_name("g").build();
        g.mark_global_var(x);
        let five = ConstantIntBuilder::new(&mut g, 5).build();
        let assign = SrcAssignStmtBuilder::new(&mut g).dest(x).source(five).build();
        let read = SrcVarAccessBuilder::new(&mut g).decl(x).effect(assign).build();
        let ret = finish_function(&mut g, read, &[]);

        run_promotion(&mut g);
        assert_eq!(g.node(ret).value_input(0), read, "global read stays");
        assert_eq!(g.node(read).effect_input(0), assign, "global chain stays");
    }

    #[test]
    fn merged_assignments_promote_to_a_value_phi() {
        let mut g = Graph::new();
        let x = SrcVarDeclBuilder::new(&mut g).symbol_name("x").build();
        let cond = ArgumentBuilder::new(&mut g, "c").build();
        let if_node = IfBuilder::new(&mut g).condition(cond).build();
        let t = IfBranchBuilder::new(&mut g, true).if_stmt(if_node).build();
        let f = IfBranchBuilder::new(&mut g, false).if_stmt(if_node).build();
        let merge = MergeBuilder::new(&mut g)
            .add_ctrl_input(t)
            .add_ctrl_input(f)
            .build();

        let ten = ConstantIntBuilder::new(&mut g, 10).build();
        let twenty = ConstantIntBuilder::new(&mut g, 20).build();
        let assign_t = SrcAssignStmtBuilder::new(&mut g).dest(x).source(ten).build();
        let assign_f = SrcAssignStmtBuilder::new(&mut g).dest(x).source(twenty).build();
        let effect_phi = PhiBuilder::new(&mut g)
            .add_effect_input(assign_t)
            .add_effect_input(assign_f)
            .ctrl_merge(merge)
            .build();
        let read = SrcVarAccessBuilder::new(&mut g).decl(x).effect(effect_phi).build();
        let ret = finish_function(&mut g, read, &[cond]);

        run_promotion(&mut g);

        let result = g.node(ret).value_input(0);
        let phi = PhiView::of(&g, result).expect("merged read should be a phi");
        assert_eq!(phi.ctrl_pivot(), merge);
        assert_eq!(g.node(result).value_inputs(), &[ten, twenty]);
        assert_eq!(phi.map_ctrl_node(ten, DepKind::Value), Some(t));
        assert_eq!(phi.map_ctrl_node(twenty, DepKind::Value), Some(f));
        assert!(g.get_node(effect_phi).is_none(), "effect phi is trimmed");
    }

    #[test]
    fn array_round_trip_forwards_the_stored_value() {
        let mut g = Graph::new();
        let arr = SrcArrayDeclBuilder::new(&mut g)
            .symbol_name("a")
            .add_const_dim(2)
            .build();
        let zero = ConstantIntBuilder::new(&mut g, 0).build();
        let five = ConstantIntBuilder::new(&mut g, 5).build();
        let dest = SrcArrayAccessBuilder::new(&mut g)
            .decl(arr)
            .add_access_dim(zero)
            .build();
        let assign = SrcAssignStmtBuilder::new(&mut g).dest(dest).source(five).build();
        let read = SrcArrayAccessBuilder::new(&mut g)
            .decl(arr)
            .add_access_dim(zero)
            .effect(assign)
            .build();
        let ret = finish_function(&mut g, read, &[]);

        run_promotion(&mut g);
        assert_eq!(g.const_int_value(g.node(ret).value_input(0)), Some(5));
    }

    #[test]
    fn array_decl_lowers_to_sized_alloca_and_keeps_global_membership() {
        let mut g = Graph::new();
        let arr = SrcArrayDeclBuilder::new(&mut g)
            .symbol_name("grid")
            .add_const_dim(3)
            .add_const_dim(4)
            .build();
        g.mark_global_var(arr);
        let i = ConstantIntBuilder::new(&mut g, 2).build();
        let j = ConstantIntBuilder::new(&mut g, 1).build();
        let read = SrcArrayAccessBuilder::new(&mut g)
            .decl(arr)
            .add_access_dim(i)
            .add_access_dim(j)
            .build();
        let ret = finish_function(&mut g, read, &[]);

        run_promotion(&mut g);

        let load = g.node(ret).value_input(0);
        assert_eq!(g.node(load).op(), Opcode::MemLoad);
        let base = g.node(load).value_input(0);
        assert_eq!(g.node(base).op(), Opcode::Alloca);
        assert!(g.is_global_var(base), "global membership moved to alloca");
        assert!(!g.get_node(arr).is_some_and(|n| !n.is_killed()));

        // 3x4 words = 48 bytes; element (2,1) sits at (2*4+1)*4 = 36.
        let size = g.node(base).value_input(0);
        assert_eq!(g.const_int_value(size), Some(48));
        let offset = g.node(load).value_input(1);
        assert_eq!(g.const_int_value(offset), Some(36));
    }

    #[test]
    fn loads_with_unknown_state_stay_loads() {
        let mut g = Graph::new();
        let arr = SrcArrayDeclBuilder::new(&mut g)
            .symbol_name("a")
            .add_const_dim(8)
            .build();
        let idx = ArgumentBuilder::new(&mut g, "i").build();
        let read = SrcArrayAccessBuilder::new(&mut g)
            .decl(arr)
            .add_access_dim(idx)
            .build();
        let ret = finish_function(&mut g, read, &[idx]);

        run_promotion(&mut g);
        let load = g.node(ret).value_input(0);
        assert_eq!(g.node(load).op(), Opcode::MemLoad);
        // Offset is idx * 4, built once.
        let offset = g.node(load).value_input(1);
        assert_eq!(g.node(offset).op(), Opcode::BinMul);
        assert_eq!(g.node(offset).value_input(0), idx);
    }
}
