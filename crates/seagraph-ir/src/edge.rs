//! Edge kinds and the on-demand edge descriptor.
//!
//! Edges are not stored as their own entities: a node's input array is the
//! single source of truth, and [`Use`] triples are materialized by the edge
//! iterators on [`Graph`](crate::Graph) and [`SubGraph`](crate::SubGraph).

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// The three independent dependency kinds of the graph.
///
/// A node's inputs are stored partitioned `[value | control | effect]`;
/// the kind of a raw input index is derived from the partition counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepKind {
    Value,
    Control,
    Effect,
}

/// An edge observed during iteration: `source` depends on `dest`.
///
/// Parallel edges of the same or different kinds between the same endpoints
/// are allowed; each input occurrence yields its own `Use`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Use {
    pub source: NodeId,
    pub dest: NodeId,
    pub kind: DepKind,
}

impl Use {
    pub fn new(source: NodeId, dest: NodeId, kind: DepKind) -> Self {
        Use { source, dest, kind }
    }
}

/// Hook rewriting freshly observed edges during traversal.
///
/// A scheduler installs one to redirect edges on the fly (for example,
/// around fixed nodes it has already placed); the reducer engine leaves it
/// unset.
pub type EdgePatcher = Box<dyn Fn(Use) -> Use>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_equality_is_structural() {
        let a = Use::new(NodeId(0), NodeId(1), DepKind::Value);
        let b = Use::new(NodeId(0), NodeId(1), DepKind::Value);
        let c = Use::new(NodeId(0), NodeId(1), DepKind::Effect);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn serde_roundtrip() {
        let u = Use::new(NodeId(3), NodeId(7), DepKind::Control);
        let json = serde_json::to_string(&u).unwrap();
        let back: Use = serde_json::from_str(&json).unwrap();
        assert_eq!(u, back);
    }

    #[test]
    fn use_serializes_with_stable_field_names() {
        let u = Use::new(NodeId(3), NodeId(7), DepKind::Control);
        insta::assert_json_snapshot!(u, @r#"
        {
          "source": 3,
          "dest": 7,
          "kind": "Control"
        }
        "#);
    }
}
