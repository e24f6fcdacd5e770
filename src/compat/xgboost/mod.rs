//! XGBoost JSON model support.

mod convert;
pub mod format;

pub use convert::ConversionError;
pub use format::XgbModel;
