//! Request handling over a shared [`ArtifactStore`].
//!
//! Each request is an independent validate -> encode -> predict transaction
//! against the bundle the store currently holds. [`PredictionService::handle`]
//! maps the outcome to a status code and JSON body; transports only need to
//! copy those onto the wire.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactStore, Readiness, StoreError};
use crate::encoding::{encode, EncodingError};
use crate::predictor::{predict, PredictError, Prediction};
use crate::schema::ValidationError;

/// Everything that can go wrong while serving one request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Unavailable(#[from] StoreError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Predict(#[from] PredictError),
}

impl ServiceError {
    /// HTTP-style status code for this failure.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Encoding(_) | ServiceError::Predict(_) => 500,
        }
    }

    /// Response body. Internal failures stay opaque to the caller.
    pub fn body(&self) -> Value {
        match self {
            ServiceError::Validation(err) => json!({ "detail": err }),
            ServiceError::Unavailable(_) => json!({ "detail": "Model not ready" }),
            ServiceError::Encoding(_) | ServiceError::Predict(_) => {
                json!({ "detail": "Internal prediction error" })
            }
        }
    }
}

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

#[derive(Debug, Clone)]
pub struct PredictionService {
    store: Arc<ArtifactStore>,
}

impl PredictionService {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Validate, encode and classify one raw payload.
    pub fn predict(&self, payload: &Value) -> Result<Prediction, ServiceError> {
        let bundle = self.store.get()?;
        let record = bundle.schema().validate(payload)?;
        let features = encode(&record, bundle.metadata())?;
        Ok(predict(&features, &bundle)?)
    }

    /// Serve one request: `{"species": ...}` on success, an error body otherwise.
    pub fn handle(&self, payload: &Value) -> Response {
        match self.predict(payload) {
            Ok(prediction) => {
                info!(
                    species = %prediction.species,
                    class_index = prediction.class_index,
                    "prediction served"
                );
                Response::ok(json!({ "species": prediction.species }))
            }
            Err(err) => {
                match &err {
                    ServiceError::Validation(v) => {
                        debug!(problems = v.problems().len(), error = %v, "request rejected");
                    }
                    ServiceError::Unavailable(e) => {
                        warn!(error = %e, "prediction requested before model is ready");
                    }
                    ServiceError::Encoding(e) => {
                        error!(error = %e, payload = %payload, "encoding failed after validation");
                    }
                    ServiceError::Predict(e) => {
                        error!(error = %e, payload = %payload, "prediction failed");
                    }
                }
                Response {
                    status: err.status(),
                    body: err.body(),
                }
            }
        }
    }

    /// Serve one raw request body. Bodies that are not JSON get a 400 with a
    /// single `json_invalid` problem, shaped like every other validation error.
    pub fn handle_json(&self, body: &str) -> Response {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) => self.handle(&payload),
            Err(e) => {
                debug!(error = %e, "request body is not valid JSON");
                let err = ServiceError::Validation(ValidationError::invalid_json(&e, body));
                Response {
                    status: err.status(),
                    body: err.body(),
                }
            }
        }
    }

    /// Readiness check: 200 `{"status": "ok"}` once the bundle is loaded.
    pub fn health(&self) -> Response {
        match self.store.readiness() {
            Readiness::Ready => Response::ok(json!({ "status": "ok" })),
            state => Response {
                status: 503,
                body: json!({ "status": state }),
            },
        }
    }
}
