//! HTTP inference service for a pre-trained battery capacity regressor.
//!
//! The model is loaded once at startup and shared read-only by every request.
//! Each `POST /predict` body is mapped to the feature row
//! `[id_cycle, Temperature_measured]`, run through the model and answered with
//! either `{"predicted_capacity": ...}` or `{"error": ...}`.

pub mod artifact;
pub mod config;
pub mod handler;
pub mod model;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

pub use artifact::{ArtifactError, ModelArtifact, PredictionError};
pub use config::{ErrorStatusPolicy, ServerArgs};
pub use handler::{ErrorResponse, PredictError, PredictionResponse, ROOT_MESSAGE};
pub use model::{CapacityModel, FEATURE_NAMES, FeatureMatrix, FeatureVector, N_FEATURES};

/// Shared state handed to every request handler.
pub struct AppState<M> {
    /// The loaded model, immutable for the lifetime of the process.
    pub model: Arc<M>,
    /// Status code policy for failed predictions.
    pub error_status: ErrorStatusPolicy,
}

impl<M> AppState<M> {
    pub fn new(model: Arc<M>, error_status: ErrorStatusPolicy) -> Self {
        Self {
            model,
            error_status,
        }
    }
}

// manual impl: cloning the state must not require `M: Clone`
impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            error_status: self.error_status,
        }
    }
}

/// Builds the service router around a loaded model.
///
/// # Routes
/// * `GET /` - liveness text
/// * `POST /predict` - capacity prediction
pub fn build_app<M>(state: AppState<M>) -> Router
where
    M: CapacityModel + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(handler::home))
        .route("/predict", post(handler::predict::<M>))
        .fallback(handler::not_found)
        .with_state(state)
}
