//! Sea-of-nodes intermediate representation.
//!
//! A program is a single directed multigraph: nodes are computations,
//! control points, and memory effects; edges come in three independent
//! kinds (value, control, effect). There is no explicit control-flow
//! graph -- a later scheduling step linearizes nodes into basic blocks.
//!
//! The [`Graph`] owns every node in a dense arena. Each function is a
//! [`SubGraph`], a lightweight handle on its `End` node. Construction
//! goes through the per-opcode builders in [`builders`]; read-only,
//! opcode-tagged access goes through the views in [`properties`]; passes
//! attach per-node scratch state with [`NodeMarker`].

pub mod attribute;
pub mod builders;
pub mod diag;
pub mod dot;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod marker;
pub mod node;
pub mod opcode;
pub mod properties;
pub mod subgraph;

// Re-export commonly used types
pub use attribute::{Attr, AttributeBuilder};
pub use diag::{DiagnosticSink, Severity};
pub use edge::{DepKind, Use};
pub use error::BuildError;
pub use graph::Graph;
pub use id::NodeId;
pub use marker::{MarkerState, NodeMarker};
pub use node::Node;
pub use opcode::Opcode;
pub use properties::find_nearest_ctrl_point;
pub use subgraph::SubGraph;
