//! Test case loading utilities for integration tests.
//!
//! Fixtures live under `tests/test-cases/penguins/`. For bundle fixtures and
//! assertion helpers, use `penguins::testing`.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[allow(unused_imports)]
pub use penguins::testing::{
    assert_slice_approx_eq, fixture_bundle, fixture_metadata, fixture_raw_bundle, ready_store,
    valid_payload, MemoryBundleReader, DEFAULT_TOLERANCE, FIXTURE_MODEL_JSON,
};

// =============================================================================
// Test Case Loading
// =============================================================================

/// Base directory for test cases.
pub fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

/// Directory holding the penguin fixtures.
pub fn penguin_cases_dir() -> PathBuf {
    test_cases_dir().join("penguins")
}

/// Load a JSON file and deserialize it.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> T {
    let file =
        File::open(path).unwrap_or_else(|e| panic!("Failed to open {}: {e}", path.display()));
    serde_json::from_reader(file)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()))
}

// =============================================================================
// Request Cases
// =============================================================================

/// One recorded request and the outcome it must produce.
#[derive(Debug, Deserialize)]
pub struct RequestCase {
    pub name: String,
    pub payload: Value,
    pub status: u16,
    /// Expected label for successful requests.
    #[serde(default)]
    pub species: Option<String>,
    /// Fields the validator must name, for rejected requests.
    #[serde(default)]
    pub invalid_fields: Vec<String>,
}

pub fn request_cases() -> Vec<RequestCase> {
    load_json(&penguin_cases_dir().join("requests.json"))
}

/// Path of the sample training dataset.
pub fn sample_dataset_path() -> PathBuf {
    penguin_cases_dir().join("penguins_sample.csv")
}
