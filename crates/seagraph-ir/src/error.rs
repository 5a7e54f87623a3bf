//! Recoverable construction errors.
//!
//! Malformed graph *mutations* are programming errors and abort; the
//! errors here are the diagnostic-path failures a front-end reports to the
//! user instead of building a node.

use thiserror::Error;

use crate::id::NodeId;
use crate::opcode::Opcode;

/// Errors from validating builders.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A function prototype was built without a name.
    #[error("function prototype requires a name")]
    MissingFunctionName,

    /// A function prototype parameter was not an `Argument` node.
    #[error("function parameter must be an Argument node, got {op} (node {node})")]
    NonArgumentParameter { node: NodeId, op: Opcode },
}
