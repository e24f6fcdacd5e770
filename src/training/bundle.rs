//! Writing a verified bundle directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::{check_compatible, model_digest, BundleError, METADATA_FILE, MODEL_FILE};
use crate::encoding::EncodingMetadata;
use crate::model::Model;

#[derive(Debug, thiserror::Error)]
pub enum WriteBundleError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Check `model_bytes` against `metadata`, stamp the model digest, and write
/// both files into `dir` (created if needed).
///
/// Returns the stamped metadata.
pub fn write_bundle(
    dir: &Path,
    model_bytes: &[u8],
    metadata: EncodingMetadata,
) -> Result<EncodingMetadata, WriteBundleError> {
    let model = Model::from_xgboost_json(model_bytes).map_err(BundleError::from)?;
    check_compatible(&model, &metadata)?;

    let digest = model_digest(model_bytes);
    let metadata = metadata.with_model_digest(digest.clone());
    let metadata_json = metadata.to_json_pretty()?;

    fs::create_dir_all(dir).map_err(|source| WriteBundleError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    write_file(&dir.join(MODEL_FILE), model_bytes)?;
    write_file(&dir.join(METADATA_FILE), metadata_json.as_bytes())?;

    info!(dir = %dir.display(), digest = %digest, "bundle written");
    Ok(metadata)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), WriteBundleError> {
    fs::write(path, bytes).map_err(|source| WriteBundleError::Io {
        path: path.to_path_buf(),
        source,
    })
}
