//! Tree ensembles.

mod soa;

pub use soa::SoAForest;
