//! Common-subexpression elimination.
//!
//! Binary operations hash as `(opcode, lhs, rhs)` with commutative
//! operands canonicalized by node id; memory loads additionally key on
//! their effect input so loads from different memory states never merge.
//! Candidates live in per-opcode buckets; a hash hit is verified
//! structurally before the duplicate is replaced by the surviving node.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;

use seagraph_ir::{Graph, NodeId, Opcode};

use crate::reducer::{Editor, Reducer, Reduction};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CseKey {
    Bin {
        op: Opcode,
        lhs: NodeId,
        rhs: NodeId,
    },
    Load {
        base: NodeId,
        offset: NodeId,
        effect: Option<NodeId>,
    },
}

#[derive(Debug, Default)]
pub struct CSEReducer {
    /// Opcode -> candidate nodes with that opcode.
    node_op_map: HashMap<Opcode, IndexSet<NodeId>>,
    /// Last computed hash per candidate.
    node_hash_map: HashMap<NodeId, u64>,
}

impl CSEReducer {
    pub fn new() -> Self {
        CSEReducer::default()
    }

    fn key_of(graph: &Graph, node: NodeId) -> Option<CseKey> {
        let n = graph.node(node);
        let op = n.op();
        if op.is_bin_op() {
            if n.num_value_inputs() < 2 {
                return None;
            }
            let mut lhs = n.value_input(0);
            let mut rhs = n.value_input(1);
            if op.is_commutative_bin_op() && rhs < lhs {
                std::mem::swap(&mut lhs, &mut rhs);
            }
            return Some(CseKey::Bin { op, lhs, rhs });
        }
        if op == Opcode::MemLoad {
            if n.num_value_inputs() < 2 {
                return None;
            }
            let effect = (n.num_effect_inputs() > 0).then(|| n.effect_input(0));
            return Some(CseKey::Load {
                base: n.value_input(0),
                offset: n.value_input(1),
                effect,
            });
        }
        None
    }

    fn hash_of(key: &CseKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn bucket_others(&self, op: Opcode, except: &[NodeId]) -> Vec<NodeId> {
        self.node_op_map
            .get(&op)
            .map(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .filter(|n| !except.contains(n))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Reducer for CSEReducer {
    fn name(&self) -> &'static str {
        "cse"
    }

    fn reduce(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let (op, key) = {
            let graph = editor.graph_ref();
            let op = graph.node(node).op();
            match Self::key_of(graph, node) {
                Some(key) => (op, key),
                None => return Reduction::unchanged(),
            }
        };
        let hash = Self::hash_of(&key);

        let hit = {
            let graph = editor.graph_ref();
            self.node_op_map.get(&op).and_then(|bucket| {
                bucket.iter().copied().find(|&candidate| {
                    candidate != node
                        && graph
                            .get_node(candidate)
                            .is_some_and(|n| !n.is_killed())
                        && self.node_hash_map.get(&candidate) == Some(&hash)
                        && Self::key_of(graph, candidate).as_ref() == Some(&key)
                })
            })
        };

        if let Some(existing) = hit {
            self.node_hash_map.remove(&node);
            if let Some(bucket) = self.node_op_map.get_mut(&op) {
                bucket.shift_remove(&node);
            }
            // Other nodes of this opcode may hash differently once the
            // duplicate is spliced out.
            for other in self.bucket_others(op, &[node, existing]) {
                editor.revisit(other);
            }
            return Reduction::replace(existing);
        }

        let previous = self.node_hash_map.insert(node, hash);
        self.node_op_map.entry(op).or_default().insert(node);
        if previous.is_some() && previous != Some(hash) {
            // The node's operands changed since registration; peers may
            // now be able to merge with it.
            for other in self.bucket_others(op, &[node]) {
                editor.revisit(other);
            }
        }
        Reduction::unchanged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::GraphReducer;
    use seagraph_ir::builders::{
        AllocaBuilder, ArgumentBuilder, BinOpBuilder, ConstantIntBuilder, EndBuilder,
        FuncPrototypeBuilder, MemLoadBuilder, MemStoreBuilder, ReturnBuilder,
    };
    use seagraph_ir::SubGraph;

    fn run_cse(g: &mut Graph) {
        let mut reducer = CSEReducer::new();
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
    fn commutative_duplicates_share_one_node() {
        let mut g = Graph::new();
        let a = ArgumentBuilder::new(&mut g, "a").build();
        let b = ArgumentBuilder::new(&mut g, "b").build();
        let ab = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(a).rhs(b).build();
        let ba = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(b).rhs(a).build();
        let joined = BinOpBuilder::new(&mut g, Opcode::BinMul).lhs(ab).rhs(ba).build();
        let _ret = finish_function(&mut g, joined, &[a, b]);

        run_cse(&mut g);

        let lhs = g.node(joined).value_input(0);
        let rhs = g.node(joined).value_input(1);
        assert_eq!(lhs, rhs, "a+b and b+a should merge");
        // Exactly one of the two adds survived.
        assert_eq!(
            usize::from(g.get_node(ab).is_some()) + usize::from(g.get_node(ba).is_some()),
            1
        );
    }

    #[test]
    fn non_commutative_order_is_respected() {
        let mut g = Graph::new();
        let a = ArgumentBuilder::new(&mut g, "a").build();
        let b = ArgumentBuilder::new(&mut g, "b").build();
        let ab = BinOpBuilder::new(&mut g, Opcode::BinSub).lhs(a).rhs(b).build();
        let ba = BinOpBuilder::new(&mut g, Opcode::BinSub).lhs(b).rhs(a).build();
        let joined = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(ab).rhs(ba).build();
        let _ret = finish_function(&mut g, joined, &[a, b]);

        run_cse(&mut g);

        let lhs = g.node(joined).value_input(0);
        let rhs = g.node(joined).value_input(1);
        assert_ne!(lhs, rhs, "a-b and b-a must not merge");
    }

    #[test]
    fn identical_subtractions_do_merge() {
        let mut g = Graph::new();
        let a = ArgumentBuilder::new(&mut g, "a").build();
        let b = ArgumentBuilder::new(&mut g, "b").build();
        let s1 = BinOpBuilder::new(&mut g, Opcode::BinSub).lhs(a).rhs(b).build();
        let s2 = BinOpBuilder::new(&mut g, Opcode::BinSub).lhs(a).rhs(b).build();
        let joined = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(s1).rhs(s2).build();
        let _ret = finish_function(&mut g, joined, &[a, b]);

        run_cse(&mut g);
        assert_eq!(g.node(joined).value_input(0), g.node(joined).value_input(1));
    }

    #[test]
    fn loads_merge_only_with_matching_memory_state() {
        let mut g = Graph::new();
        let base = AllocaBuilder::new(&mut g).build();
        let off = ConstantIntBuilder::new(&mut g, 0).build();
        let val = ConstantIntBuilder::new(&mut g, 1).build();
        let store = MemStoreBuilder::new(&mut g)
            .base_addr(base)
            .offset(off)
            .source(val)
            .build();

        let l1 = MemLoadBuilder::new(&mut g).base_addr(base).offset(off).build();
        g.append_effect_input(l1, store);
        let l2 = MemLoadBuilder::new(&mut g).base_addr(base).offset(off).build();
        g.append_effect_input(l2, store);
        // Same location, but before the store.
        let l3 = MemLoadBuilder::new(&mut g).base_addr(base).offset(off).build();

        let sum = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(l1).rhs(l2).build();
        let total = BinOpBuilder::new(&mut g, Opcode::BinAdd).lhs(sum).rhs(l3).build();
        let _ret = finish_function(&mut g, total, &[]);

        run_cse(&mut g);

        let merged_lhs = g.node(sum).value_input(0);
        let merged_rhs = g.node(sum).value_input(1);
        assert_eq!(merged_lhs, merged_rhs, "same-state loads should merge");
        let before_store = g.node(total).value_input(1);
        assert_ne!(
            merged_lhs, before_store,
            "loads across different memory states must not merge"
        );
    }

    #[test]
    fn key_canonicalization_orders_commutative_operands() {
        let mut g = Graph::new();
        let a = ArgumentBuilder::new(&mut g, "a").build();
        let b = ArgumentBuilder::new(&mut g, "b").build();
        let ab = BinOpBuilder::new(&mut g, Opcode::BinMul).lhs(a).rhs(b).build();
        let ba = BinOpBuilder::new(&mut g, Opcode::BinMul).lhs(b).rhs(a).build();
        assert_eq!(
            CSEReducer::key_of(&g, ab),
            CSEReducer::key_of(&g, ba),
            "commutative keys must canonicalize"
        );

        let sub_ab = BinOpBuilder::new(&mut g, Opcode::BinSub).lhs(a).rhs(b).build();
        let sub_ba = BinOpBuilder::new(&mut g, Opcode::BinSub).lhs(b).rhs(a).build();
        assert_ne!(CSEReducer::key_of(&g, sub_ab), CSEReducer::key_of(&g, sub_ba));
    }
}
