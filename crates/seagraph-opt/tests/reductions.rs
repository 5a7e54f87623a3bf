//! End-to-end reduction scenarios: build a function graph through the
//! builder surface, run a reducer to its fixed point, and check the
//! surviving shape.

use seagraph_opt::{CSEReducer, GraphReducer, PeepholeReducer, ValuePromotion};

use seagraph_ir::builders::{
    ArgumentBuilder, BinOpBuilder, ConstantIntBuilder, ConstantStrBuilder, EndBuilder,
    FuncPrototypeBuilder, IfBranchBuilder, IfBuilder, MergeBuilder, PhiBuilder, ReturnBuilder,
    SrcAssignStmtBuilder, SrcVarAccessBuilder, SrcVarDeclBuilder,
};
use seagraph_ir::properties::{IfView, LoopView};
use seagraph_ir::{Graph, NodeId, Opcode, SubGraph};

/// Wraps `root` as `fn <name>(args...) { return root; }`, registers the
/// subregion, and returns `(ret, end)`.
fn make_function(g: &mut Graph, name: &str, root: NodeId, args: &[NodeId]) -> (NodeId, NodeId) {
    let mut proto = FuncPrototypeBuilder::new(g).func_name(name);
    for &arg in args {
        proto = proto.add_parameter(arg);
    }
    let start = proto.build().unwrap();
    let ret = ReturnBuilder::new(g).value(root).build();
    let end = EndBuilder::new(g, start).add_terminator(ret).build();
    g.add_sub_region(SubGraph::new(end));
    (ret, end)
}

#[test]
fn constant_fold_leaves_only_the_folded_constant_reachable() {
    let mut g = Graph::new();
    let two = ConstantIntBuilder::new(&mut g, 2).build();
    let three = ConstantIntBuilder::new(&mut g, 3).build();
    let add = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(two).rhs(three).build();
    let (ret, end) = make_function(&mut g, "f", add, &[]);

    let mut peephole = PeepholeReducer::new();
    GraphReducer::run(&mut g, &mut peephole);

    let five = g.const_int_node(5).expect("folded constant is pooled");
    assert_eq!(g.node(ret).value_input(0), five);
    assert!(g.get_node(add).is_none(), "the BinAdd is dead and trimmed");

    // Reachable set: End, Return, Start, the folded constant, the
    // function-name string.
    let reachable: Vec<NodeId> = SubGraph::new(end).nodes(&g).collect();
    assert_eq!(reachable.len(), 5);
    assert!(reachable.contains(&five));
    let name = g.const_str_node("f").unwrap();
    assert!(reachable.contains(&name));
    // The original operands survive in the pool but are no longer
    // reachable from the function.
    assert!(!reachable.contains(&two));
    assert!(!reachable.contains(&three));
}

#[test]
fn cse_merges_commutative_duplicates_and_trim_removes_the_loser() {
    let mut g = Graph::new();
    let a = ArgumentBuilder::new(&mut g, "a").build();
    let b = ArgumentBuilder::new(&mut g, "b").build();
    let ab = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(a).rhs(b).build();
    let ba = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(b).rhs(a).build();
    let joined = BinOpBuilder::new(&mut g, Opcode::BinMul).lhs(ab).rhs(ba).build();
    let _ = make_function(&mut g, "f", joined, &[a, b]);

    let mut cse = CSEReducer::new();
    GraphReducer::run(&mut g, &mut cse);

    let lhs = g.node(joined).value_input(0);
    let rhs = g.node(joined).value_input(1);
    assert_eq!(lhs, rhs, "a+b and b+a share a single node");
    let survivors = [ab, ba]
        .iter()
        .filter(|&&n| g.get_node(n).is_some())
        .count();
    assert_eq!(survivors, 1, "the duplicate is dead and removed by trim");
}

#[test]
fn phi_with_identical_inputs_collapses_to_the_common_value() {
    let mut g = Graph::new();
    let cond = ArgumentBuilder::new(&mut g, "c").build();
    let if_node = IfBuilder::new(&mut g).condition(cond).build();
    let t = IfBranchBuilder::new(&mut g, true).if_stmt(if_node).build();
    let f = IfBranchBuilder::new(&mut g, false).if_stmt(if_node).build();
    let merge = MergeBuilder::new(&mut g)
        .add_ctrl_input(t)
        .add_ctrl_input(f)
        .build();
    let v = ConstantIntBuilder::new(&mut g, 7).build();
    let phi = PhiBuilder::new(&mut g)
        .add_value_input(v)
        .add_value_input(v)
        .ctrl_merge(merge)
        .build();
    let (ret, _end) = make_function(&mut g, "f", phi, &[cond]);

    let mut peephole = PeepholeReducer::new();
    GraphReducer::run(&mut g, &mut peephole);

    assert_eq!(g.node(ret).value_input(0), v);
    assert!(g.get_node(phi).is_none(), "the phi is dead and trimmed");
}

#[test]
fn loop_sub_graph_contains_header_branches_and_backedge_once() {
    let mut g = Graph::new();
    let start = FuncPrototypeBuilder::new(&mut g)
        .func_name("spin")
        .build()
        .unwrap();
    let cond = ConstantIntBuilder::new(&mut g, 1).build();
    let loop_hdr = seagraph_ir::builders::LoopBuilder::new(&mut g, start)
        .condition(cond)
        .build();
    let branch = LoopView::of(&g, loop_hdr).unwrap().branch().unwrap();
    let exit = IfView::of(&g, branch).unwrap().false_branch().unwrap();
    let backedge = LoopView::of(&g, loop_hdr).unwrap().backedge();
    let end = EndBuilder::new(&mut g, start).add_terminator(exit).build();
    g.add_sub_region(SubGraph::new(end));

    let reachable: Vec<NodeId> = SubGraph::new(end).nodes(&g).collect();
    for expected in [loop_hdr, branch, exit, backedge] {
        assert_eq!(
            reachable.iter().filter(|&&n| n == expected).count(),
            1,
            "node {expected} must appear exactly once in the BFS"
        );
    }
    // Header, If, both projections, Start, End, the condition constant,
    // and the function name.
    assert_eq!(reachable.len(), 8);
}

#[test]
fn string_pool_deduplicates_across_builders() {
    let mut g = Graph::new();
    let first = ConstantStrBuilder::new(&mut g, "x").build();
    let second = ConstantStrBuilder::new(&mut g, "x").build();
    assert_eq!(first, second);
    assert_eq!(g.num_const_strs(), 1);
}

#[test]
fn peephole_reaches_a_fixed_point() {
    let mut g = Graph::new();
    let two = ConstantIntBuilder::new(&mut g, 2).build();
    let three = ConstantIntBuilder::new(&mut g, 3).build();
    let add = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(two).rhs(three).build();
    let four = ConstantIntBuilder::new(&mut g, 4).build();
    let mul = BinOpBuilder::new(&mut g, Opcode::BinMul).lhs(add).rhs(four).build();
    let (_ret, end) = make_function(&mut g, "f", mul, &[]);

    let mut peephole = PeepholeReducer::new();
    GraphReducer::run(&mut g, &mut peephole);

    let shape_after_first: Vec<NodeId> = SubGraph::new(end).nodes(&g).collect();
    let edges_after_first = g.edge_count();

    let mut peephole = PeepholeReducer::new();
    GraphReducer::run(&mut g, &mut peephole);

    let shape_after_second: Vec<NodeId> = SubGraph::new(end).nodes(&g).collect();
    assert_eq!(shape_after_first, shape_after_second);
    assert_eq!(edges_after_first, g.edge_count());
}

#[test]
fn promotion_then_peephole_folds_a_variable_chain() {
    let mut g = Graph::new();
    let x = SrcVarDeclBuilder::new(&mut g).symbol_name("x").build();
    let five = ConstantIntBuilder::new(&mut g, 5).build();
    let assign = SrcAssignStmtBuilder::new(&mut g).dest(x).source(five).build();
    let read = SrcVarAccessBuilder::new(&mut g).decl(x).effect(assign).build();
    let one = ConstantIntBuilder::new(&mut g, 1).build();
    let add = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(read).rhs(one).build();
    let (ret, _end) = make_function(&mut g, "f", add, &[]);

    let mut promotion = ValuePromotion::new();
    GraphReducer::run(&mut g, &mut promotion);
    let mut peephole = PeepholeReducer::new();
    GraphReducer::run(&mut g, &mut peephole);

    assert_eq!(g.const_int_value(g.node(ret).value_input(0)), Some(6));
}
