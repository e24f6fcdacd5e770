//! Decision tree storage for the fitted ensemble.

pub mod node;
pub mod soa;

pub use node::SplitCondition;
pub use soa::{SoATreeStorage, TreeBuilder};
