//! External model format compatibility.
//!
//! Models are fitted outside this crate; this module turns their persisted
//! representation into the native [`Model`](crate::model::Model).

pub mod xgboost;

pub use xgboost::{ConversionError, XgbModel};
