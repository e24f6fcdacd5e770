//! penguins: penguin species classification with training/serving encoding parity.
//!
//! A prediction request flows through four stages, all driven by one
//! [`artifact::ModelArtifactBundle`]:
//!
//! 1. [`schema`] validates the raw JSON payload into a [`features::FeatureRecord`],
//!    using categorical domains derived from the bundle's encoding metadata.
//! 2. [`encoding`] turns the record into a [`encoding::FeatureVector`] whose
//!    column order comes verbatim from that metadata.
//! 3. [`predictor`] runs the tree ensemble and maps the class index to a label.
//! 4. [`service`] ties the stages to an [`artifact::ArtifactStore`] and maps
//!    outcomes to responses.
//!
//! [`training`] produces bundles: it fits the metadata on a CSV dataset,
//! encodes the training rows through the same validator and encoder, and
//! writes the verified model + metadata pair.

pub mod artifact;
pub mod compat;
pub mod config;
pub mod encoding;
pub mod features;
pub mod forest;
pub mod logging;
pub mod model;
pub mod objective;
pub mod predictor;
pub mod schema;
pub mod service;
pub mod testing;
pub mod training;
pub mod trees;
