//! Stable node identifier.
//!
//! [`NodeId`] is a newtype over `u32` indexing the graph's node arena.
//! Slots are never reused, so an id stays valid for the lifetime of the
//! graph even after the node it names has been removed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense index of a node in its owning [`Graph`](crate::Graph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the arena slot this id names.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
