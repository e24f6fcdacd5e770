//! Offline producer of serving bundles.
//!
//! The model itself is fitted externally on the design matrix written here.
//! This module owns the other half of the contract: fitting the encoding
//! metadata, holding out a stratified test split, encoding the training rows
//! with the serving validator and encoder, writing the verified bundle the
//! server loads, and scoring that bundle on held-out rows.

mod bundle;
mod dataset;
mod evaluate;
mod fit;
mod split;

pub use bundle::{write_bundle, WriteBundleError};
pub use dataset::{Dataset, DatasetError, DatasetRow, TARGET_COLUMN};
pub use evaluate::{evaluate, ClassMetrics, ClassificationReport, EvaluateError};
pub use fit::{encode_dataset, fit_encoding, DesignMatrix, FitError};
pub use split::{stratified_split, InvalidTestFraction, DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION};
