//! Model artifact bundles and the store that serves them.
//!
//! A bundle is a directory holding `model.json` (XGBoost JSON) and
//! `metadata.json` (encoding metadata). [`ArtifactStore`] loads it once and
//! shares the verified [`ModelArtifactBundle`] read-only.

mod bundle;
mod source;
mod store;

pub use bundle::{check_compatible, model_digest, BundleError, ModelArtifactBundle};
pub use source::{
    BundleLocator, BundleReader, FsBundleReader, RawBundle, SourceError, METADATA_FILE,
    MODEL_FILE,
};
pub use store::{ArtifactStore, LoadError, Readiness, StoreError};
