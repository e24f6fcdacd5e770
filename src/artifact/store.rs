//! Load-once holder of the serving bundle.
//!
//! The store moves through `uninitialized -> loading -> ready | failed`.
//! A failed load is terminal: later `load` calls report the recorded
//! failure instead of retrying.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info};

use super::bundle::{BundleError, ModelArtifactBundle};
use super::source::{BundleLocator, BundleReader, FsBundleReader, SourceError};

/// Externally visible store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl Readiness {
    pub fn as_str(self) -> &'static str {
        match self {
            Readiness::Uninitialized => "uninitialized",
            Readiness::Loading => "loading",
            Readiness::Ready => "ready",
            Readiness::Failed => "failed",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a load attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("bundle load did not finish within {0:?}")]
    Timeout(Duration),

    #[error("bundle loader panicked")]
    LoaderPanicked,

    #[error("failed to spawn bundle loader: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("model artifact unavailable (store is {state})")]
    ArtifactUnavailable { state: Readiness },

    #[error("model artifact failed to load: {0}")]
    LoadFailed(#[source] Arc<LoadError>),
}

enum StoreState {
    Uninitialized,
    Loading,
    Ready(Arc<ModelArtifactBundle>),
    Failed(Arc<LoadError>),
}

impl StoreState {
    fn readiness(&self) -> Readiness {
        match self {
            StoreState::Uninitialized => Readiness::Uninitialized,
            StoreState::Loading => Readiness::Loading,
            StoreState::Ready(_) => Readiness::Ready,
            StoreState::Failed(_) => Readiness::Failed,
        }
    }
}

/// Owner of the process-wide [`ModelArtifactBundle`].
///
/// Share it by `Arc`; once ready, [`get`](Self::get) hands out the bundle
/// without taking any lock beyond a brief state check.
pub struct ArtifactStore {
    state: Mutex<StoreState>,
    settled: Condvar,
    reader: Arc<dyn BundleReader>,
    load_timeout: Duration,
}

impl ArtifactStore {
    pub fn new(reader: Arc<dyn BundleReader>, load_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(StoreState::Uninitialized),
            settled: Condvar::new(),
            reader,
            load_timeout,
        }
    }

    /// Store reading bundles from local directories.
    pub fn with_fs(load_timeout: Duration) -> Self {
        Self::new(Arc::new(FsBundleReader), load_timeout)
    }

    /// Load the bundle named by `source` (`file://<dir>` or a directory path).
    ///
    /// Only the first call loads. Callers arriving while a load is in flight
    /// wait for it and see the same outcome.
    pub fn load(&self, source: &str) -> Result<Arc<ModelArtifactBundle>, StoreError> {
        self.settle(|| {
            let locator = BundleLocator::parse(source)?;
            self.load_bundle(locator)
        })
    }

    /// Like [`load`](Self::load) with an already parsed locator.
    pub fn load_locator(
        &self,
        locator: &BundleLocator,
    ) -> Result<Arc<ModelArtifactBundle>, StoreError> {
        self.settle(|| self.load_bundle(locator.clone()))
    }

    /// The loaded bundle, or `ArtifactUnavailable` if the store is not ready.
    pub fn get(&self) -> Result<Arc<ModelArtifactBundle>, StoreError> {
        match &*self.lock() {
            StoreState::Ready(bundle) => Ok(Arc::clone(bundle)),
            other => Err(StoreError::ArtifactUnavailable {
                state: other.readiness(),
            }),
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.lock().readiness()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(
        &self,
        attempt: impl FnOnce() -> Result<ModelArtifactBundle, LoadError>,
    ) -> Result<Arc<ModelArtifactBundle>, StoreError> {
        let mut state = self
            .settled
            .wait_while(self.lock(), |s| matches!(s, StoreState::Loading))
            .unwrap_or_else(PoisonError::into_inner);
        match &*state {
            StoreState::Ready(bundle) => return Ok(Arc::clone(bundle)),
            StoreState::Failed(err) => return Err(StoreError::LoadFailed(Arc::clone(err))),
            StoreState::Loading | StoreState::Uninitialized => {}
        }
        *state = StoreState::Loading;
        drop(state);

        // A panic here must still settle the state, or waiters block forever.
        let outcome = panic::catch_unwind(AssertUnwindSafe(attempt))
            .unwrap_or(Err(LoadError::LoaderPanicked));

        let mut state = self.lock();
        let result = match outcome {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                *state = StoreState::Ready(Arc::clone(&bundle));
                Ok(bundle)
            }
            Err(err) => {
                error!(error = %err, "model artifact load failed");
                let err = Arc::new(err);
                *state = StoreState::Failed(Arc::clone(&err));
                Err(StoreError::LoadFailed(err))
            }
        };
        self.settled.notify_all();
        result
    }

    /// Read and verify the bundle on a worker thread, bounded by the load timeout.
    fn load_bundle(&self, locator: BundleLocator) -> Result<ModelArtifactBundle, LoadError> {
        info!(source = %locator, timeout = ?self.load_timeout, "loading model artifact");
        let started = Instant::now();

        let (tx, rx) = mpsc::sync_channel(1);
        let reader = Arc::clone(&self.reader);
        thread::Builder::new()
            .name("bundle-loader".into())
            .spawn(move || {
                let outcome = reader
                    .read(&locator)
                    .map_err(LoadError::from)
                    .and_then(|raw| Ok(ModelArtifactBundle::from_raw(&raw, locator)?));
                // The receiver is gone if the load already timed out.
                let _ = tx.send(outcome);
            })
            .map_err(LoadError::Spawn)?;

        let bundle = match rx.recv_timeout(self.load_timeout) {
            Ok(outcome) => outcome?,
            Err(RecvTimeoutError::Timeout) => return Err(LoadError::Timeout(self.load_timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err(LoadError::LoaderPanicked),
        };

        info!(
            source = %bundle.source(),
            digest = bundle.digest().unwrap_or("-"),
            columns = bundle.metadata().num_columns(),
            classes = bundle.metadata().labels().len(),
            trees = bundle.model().forest().num_trees(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model artifact ready"
        );
        Ok(bundle)
    }
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("readiness", &self.readiness())
            .field("load_timeout", &self.load_timeout)
            .finish_non_exhaustive()
    }
}
