//! Fixtures and assertion helpers shared by unit and integration tests.
//!
//! The fixture bundle is a small three-class `multi:softprob` ensemble over the
//! canonical ten penguin columns, stored under `tests/test-cases/penguins/`.
//!
//! ```ignore
//! use penguins::testing::{ready_store, valid_payload};
//!
//! let store = ready_store();
//! let record = store.get()?.schema().validate(&valid_payload())?;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use crate::artifact::{
    ArtifactStore, BundleLocator, BundleReader, ModelArtifactBundle, RawBundle, SourceError,
};
use crate::encoding::EncodingMetadata;
use crate::model::Model;

/// Fixture model in XGBoost JSON format.
pub const FIXTURE_MODEL_JSON: &str = include_str!("../tests/test-cases/penguins/model.json");

/// Encoding metadata matching [`FIXTURE_MODEL_JSON`].
pub const FIXTURE_METADATA_JSON: &str =
    include_str!("../tests/test-cases/penguins/metadata.json");

/// Default tolerance for margin and probability comparisons.
pub const DEFAULT_TOLERANCE: f32 = 1e-5;

// =============================================================================
// Fixtures
// =============================================================================

pub fn fixture_metadata() -> EncodingMetadata {
    EncodingMetadata::from_json(FIXTURE_METADATA_JSON.as_bytes())
        .expect("fixture metadata should compile")
}

pub fn fixture_model() -> Model {
    Model::from_xgboost_json(FIXTURE_MODEL_JSON.as_bytes()).expect("fixture model should convert")
}

pub fn fixture_raw_bundle() -> RawBundle {
    RawBundle {
        model: FIXTURE_MODEL_JSON.as_bytes().to_vec(),
        metadata: FIXTURE_METADATA_JSON.as_bytes().to_vec(),
    }
}

pub fn fixture_bundle() -> ModelArtifactBundle {
    ModelArtifactBundle::from_raw(&fixture_raw_bundle(), BundleLocator::Local("fixture".into()))
        .expect("fixture bundle should verify")
}

/// A store that has already loaded the fixture bundle.
pub fn ready_store() -> Arc<ArtifactStore> {
    let store = ArtifactStore::new(
        Arc::new(MemoryBundleReader::new(fixture_raw_bundle())),
        Duration::from_secs(5),
    );
    store.load("fixture").expect("fixture bundle should load");
    Arc::new(store)
}

/// A well-formed request (an Adelie from Torgersen).
pub fn valid_payload() -> Value {
    json!({
        "bill_length_mm": 39.1,
        "bill_depth_mm": 18.7,
        "flipper_length_mm": 181,
        "body_mass_g": 3750,
        "year": 2007,
        "sex": "male",
        "island": "Torgersen"
    })
}

// =============================================================================
// In-memory Bundle Reader
// =============================================================================

/// Serves a fixed [`RawBundle`] regardless of locator.
///
/// Clones share the read counter, so a test can keep one handle and give
/// another to the store.
#[derive(Debug, Clone)]
pub struct MemoryBundleReader {
    raw: RawBundle,
    delay: Option<Duration>,
    panics: bool,
    reads: Arc<AtomicUsize>,
}

impl MemoryBundleReader {
    pub fn new(raw: RawBundle) -> Self {
        Self {
            raw,
            delay: None,
            panics: false,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic instead of answering.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl BundleReader for MemoryBundleReader {
    fn read(&self, _locator: &BundleLocator) -> Result<RawBundle, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.panics {
            panic!("memory bundle reader asked to panic");
        }
        Ok(self.raw.clone())
    }
}

// =============================================================================
// Assertions
// =============================================================================

/// Assert that two slices are approximately equal.
///
/// # Panics
///
/// Panics if lengths differ or any element differs by more than tolerance.
pub fn assert_slice_approx_eq(actual: &[f32], expected: &[f32], tolerance: f32, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (a - e).abs();
        assert!(
            diff <= tolerance,
            "{context}[{i}]: {a} != {e} (diff={diff}, tolerance={tolerance})"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_agree() {
        let bundle = fixture_bundle();
        assert_eq!(bundle.model().num_features(), bundle.metadata().num_columns());
        assert_eq!(bundle.metadata().labels(), ["Adelie", "Chinstrap", "Gentoo"]);
    }

    #[test]
    fn memory_reader_counts_reads() {
        let reader = MemoryBundleReader::new(fixture_raw_bundle());
        let handle = reader.clone();
        reader.read(&BundleLocator::Local("x".into())).unwrap();
        assert_eq!(handle.reads(), 1);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn slice_assert_checks_length() {
        assert_slice_approx_eq(&[1.0], &[1.0, 2.0], DEFAULT_TOLERANCE, "margins");
    }
}
