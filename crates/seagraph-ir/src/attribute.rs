//! Node attributes.
//!
//! A closed set of facts about functions and builtins, stored in the
//! graph's side table. The builder buffers attributes so a front-end can
//! accumulate them while parsing and attach the batch once the target node
//! exists.

use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::id::NodeId;

/// The closed attribute set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attr {
    NoMem,
    ReadMem,
    WriteMem,
    /// Environment side effects (I/O and the like).
    HasSideEffect,
    IsBuiltin,
}

/// Buffers attributes, then attaches them to a node's side-table entry.
pub struct AttributeBuilder<'g> {
    graph: &'g mut Graph,
    attrs: Vec<Attr>,
}

impl<'g> AttributeBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        AttributeBuilder {
            graph,
            attrs: Vec::new(),
        }
    }

    pub fn add(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn has_attr(&self, attr: Attr) -> bool {
        self.attrs.contains(&attr)
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Moves the buffered attributes onto `node`, consuming the builder.
    pub fn attach(self, node: NodeId) {
        self.graph.attach_attributes(node, self.attrs);
    }
}
