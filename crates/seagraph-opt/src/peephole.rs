//! Peephole simplification.
//!
//! Folds arithmetic and relations whose operands are pooled integer
//! constants, rewrites the usual algebraic identities, and collapses phi
//! nodes whose value inputs all agree. Integer arithmetic wraps; division
//! by a constant zero is never folded.

use seagraph_ir::builders::ConstantIntBuilder;
use seagraph_ir::properties::BinOpView;
use seagraph_ir::{NodeId, Opcode};

use crate::reducer::{Editor, Reducer, Reduction};

#[derive(Debug, Default)]
pub struct PeepholeReducer;

impl PeepholeReducer {
    pub fn new() -> Self {
        PeepholeReducer
    }

    fn operands(editor: &dyn Editor, node: NodeId) -> Option<(NodeId, NodeId)> {
        let view = BinOpView::of(editor.graph_ref(), node)?;
        Some((view.lhs()?, view.rhs()?))
    }

    fn reduce_arithmetic(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let Some((lhs, rhs)) = Self::operands(editor, node) else {
            return Reduction::unchanged();
        };
        let graph = editor.graph();
        let op = graph.node(node).op();
        let lhs_val = graph.const_int_value(lhs);
        let rhs_val = graph.const_int_value(rhs);

        if let (Some(a), Some(b)) = (lhs_val, rhs_val) {
            let folded = match op {
                Opcode::BinAdd => Some(a.wrapping_add(b)),
                Opcode::BinSub => Some(a.wrapping_sub(b)),
                Opcode::BinMul => Some(a.wrapping_mul(b)),
                Opcode::BinDiv if b != 0 => Some(a.wrapping_div(b)),
                _ => None,
            };
            if let Some(value) = folded {
                let constant = ConstantIntBuilder::new(graph, value).build();
                return Reduction::replace(constant);
            }
        }

        match op {
            Opcode::BinAdd => {
                if lhs_val == Some(0) {
                    return Reduction::replace(rhs);
                }
                if rhs_val == Some(0) {
                    return Reduction::replace(lhs);
                }
            }
            Opcode::BinSub => {
                if lhs == rhs {
                    let zero = ConstantIntBuilder::new(graph, 0).build();
                    return Reduction::replace(zero);
                }
                if rhs_val == Some(0) {
                    return Reduction::replace(lhs);
                }
            }
            Opcode::BinMul => {
                if lhs_val == Some(0) || rhs_val == Some(0) {
                    let zero = ConstantIntBuilder::new(graph, 0).build();
                    return Reduction::replace(zero);
                }
                if lhs_val == Some(1) {
                    return Reduction::replace(rhs);
                }
                if rhs_val == Some(1) {
                    return Reduction::replace(lhs);
                }
            }
            Opcode::BinDiv => {
                if rhs_val == Some(1) {
                    return Reduction::replace(lhs);
                }
            }
            _ => {}
        }
        Reduction::unchanged()
    }

    fn reduce_relation(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let Some((lhs, rhs)) = Self::operands(editor, node) else {
            return Reduction::unchanged();
        };
        let graph = editor.graph();
        let op = graph.node(node).op();

        let outcome = match (graph.const_int_value(lhs), graph.const_int_value(rhs)) {
            (Some(a), Some(b)) => Some(match op {
                Opcode::BinLe => a <= b,
                Opcode::BinLt => a < b,
                Opcode::BinGe => a >= b,
                Opcode::BinGt => a > b,
                Opcode::BinEq => a == b,
                Opcode::BinNe => a != b,
                _ => unreachable!("relation dispatch"),
            }),
            // Identical operands decide reflexive relations without
            // knowing the value.
            _ if lhs == rhs => match op {
                Opcode::BinLe | Opcode::BinGe | Opcode::BinEq => Some(true),
                Opcode::BinLt | Opcode::BinGt | Opcode::BinNe => Some(false),
                _ => None,
            },
            _ => None,
        };

        match outcome {
            Some(truth) => {
                let constant = ConstantIntBuilder::new(graph, i32::from(truth)).build();
                Reduction::replace(constant)
            }
            None => Reduction::unchanged(),
        }
    }

    /// A phi whose value inputs all name one node (itself excluded, so
    /// self-referential loop phis collapse too) is that node.
    fn reduce_phi(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        let graph = editor.graph_ref();
        let values = graph.node(node).value_inputs();
        if values.is_empty() {
            return Reduction::unchanged();
        }
        let mut common = None;
        for &value in values {
            if value == node {
                continue;
            }
            match common {
                None => common = Some(value),
                Some(existing) if existing == value => {}
                Some(_) => return Reduction::unchanged(),
            }
        }
        match common {
            Some(value) => Reduction::replace(value),
            None => Reduction::unchanged(),
        }
    }
}

impl Reducer for PeepholeReducer {
    fn name(&self) -> &'static str {
        "peephole"
    }

    fn reduce(&mut self, editor: &mut dyn Editor, node: NodeId) -> Reduction {
        match editor.graph_ref().node(node).op() {
            Opcode::BinAdd | Opcode::BinSub | Opcode::BinMul | Opcode::BinDiv => {
                self.reduce_arithmetic(editor, node)
            }
            Opcode::BinLe
            | Opcode::BinLt
            | Opcode::BinGe
            | Opcode::BinGt
            | Opcode::BinEq
            | Opcode::BinNe => self.reduce_relation(editor, node),
            Opcode::Phi => self.reduce_phi(editor, node),
            _ => Reduction::unchanged(),
        }
    }
}
