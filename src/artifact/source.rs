//! Where bundles come from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the serialized model inside a bundle directory.
pub const MODEL_FILE: &str = "model.json";
/// File name of the encoding metadata inside a bundle directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Parsed bundle source locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleLocator {
    /// A directory on the local filesystem.
    Local(PathBuf),
}

impl BundleLocator {
    /// Parse `file://<dir>` or a plain directory path.
    ///
    /// Remote object stores are handled outside this crate, so any other
    /// scheme is rejected.
    pub fn parse(locator: &str) -> Result<Self, SourceError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(SourceError::EmptyLocator);
        }
        if let Some(path) = locator.strip_prefix("file://") {
            if path.is_empty() {
                return Err(SourceError::EmptyLocator);
            }
            return Ok(BundleLocator::Local(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = locator.split_once("://") {
            return Err(SourceError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(BundleLocator::Local(PathBuf::from(locator)))
    }
}

impl fmt::Display for BundleLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleLocator::Local(path) => write!(f, "file://{}", path.display()),
        }
    }
}

impl From<PathBuf> for BundleLocator {
    fn from(path: PathBuf) -> Self {
        BundleLocator::Local(path)
    }
}

impl From<&Path> for BundleLocator {
    fn from(path: &Path) -> Self {
        BundleLocator::Local(path.to_path_buf())
    }
}

/// Unparsed bundle contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBundle {
    pub model: Vec<u8>,
    pub metadata: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("empty bundle locator")]
    EmptyLocator,

    #[error("unsupported bundle scheme `{0}://`")]
    UnsupportedScheme(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fetches the raw bytes of a bundle.
pub trait BundleReader: Send + Sync {
    fn read(&self, locator: &BundleLocator) -> Result<RawBundle, SourceError>;
}

/// Reads bundles from local directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBundleReader;

impl BundleReader for FsBundleReader {
    fn read(&self, locator: &BundleLocator) -> Result<RawBundle, SourceError> {
        let BundleLocator::Local(dir) = locator;
        Ok(RawBundle {
            model: read_file(&dir.join(MODEL_FILE))?,
            metadata: read_file(&dir.join(METADATA_FILE))?,
        })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, SourceError> {
    fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })
}
