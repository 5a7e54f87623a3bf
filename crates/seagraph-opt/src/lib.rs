//! Graph reductions over the sea-of-nodes IR.
//!
//! The [`GraphReducer`] engine drives a pluggable [`Reducer`] over every
//! function subregion of a graph to a fixed point, then optionally trims
//! nodes unreachable from any subregion tail. The concrete reducers --
//! [`PeepholeReducer`], [`CSEReducer`], and [`ValuePromotion`] -- are
//! built on the same engine.

pub mod cse;
pub mod peephole;
pub mod promote;
pub mod reducer;

pub use cse::CSEReducer;
pub use peephole::PeepholeReducer;
pub use promote::ValuePromotion;
pub use reducer::{Editor, GraphReducer, Reducer, Reduction, ReductionState};
