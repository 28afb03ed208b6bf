//! Control-flow graph, dominator, and natural-loop analyses.

pub mod cfg;
pub mod dominators;
pub mod loops;

pub use dominators::Dominators;
pub use loops::{LoopForest, NaturalLoop};
