//! Training/serving feature encoding.
//!
//! [`EncodingMetadata`] is the single source of truth for the column layout,
//! the categorical vocabulary, and the class labels. Both the training
//! pipeline and the prediction path encode through [`encode`], so a vector
//! built at serving time has the same columns, in the same order, as the
//! vectors the model was fitted on.

mod encoder;
mod metadata;

pub use encoder::{encode, EncodingError, FeatureVector};
pub use metadata::{
    ColumnSource, EncodingMetadata, MetadataDocument, MetadataError, METADATA_FORMAT_VERSION,
};
