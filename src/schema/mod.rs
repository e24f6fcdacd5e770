//! Request schema validation.
//!
//! Raw JSON payloads are parsed into [`FeatureRecord`](crate::features::FeatureRecord)s
//! against a [`RequestSchema`] derived from the bundle's encoding metadata.

mod error;
mod validator;

pub use error::{FieldProblem, ProblemKind, ValidationError};
pub use validator::{validate, RequestSchema};
