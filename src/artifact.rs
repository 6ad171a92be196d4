//! ONNX model artifacts.
//!
//! The trained regressor is exported to ONNX and executed with tract. The
//! input is pinned to a `[1, 2]` float tensor at load time, so an artifact
//! trained on a different number of columns is rejected before the server
//! starts.

use std::path::{Path, PathBuf};

use tract_onnx::prelude::*;

use crate::model::{CapacityModel, FeatureMatrix, N_FEATURES};

type CapacityPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Error raised while loading a model artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model artifact: {0}")]
    Model(#[from] TractError),
}

/// Error raised by a loaded model while predicting.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("model inference failed: {0}")]
    Runtime(#[from] TractError),
    #[error("model produced no output")]
    NoOutput,
    #[error("model produced a non-finite prediction for row {row}")]
    NonFinite { row: usize },
}

/// An optimized, immutable ONNX regression model.
pub struct ModelArtifact {
    plan: CapacityPlan,
}

impl std::fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("nodes", &self.plan.model().nodes().len())
            .finish()
    }
}

impl ModelArtifact {
    /// Decodes and optimizes a model from its serialized ONNX bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let plan = tract_onnx::onnx()
            .model_for_read(&mut &bytes[..])?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, N_FEATURES)),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { plan })
    }

    /// Reads and optimizes the ONNX model stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }

    /// Short human readable description, used in startup logs.
    pub fn describe(&self) -> String {
        format!("ONNX model ({} nodes)", self.plan.model().nodes().len())
    }
}

impl CapacityModel for ModelArtifact {
    type Error = PredictionError;

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, Self::Error> {
        let input: Tensor = features.clone().into();
        let outputs = self.plan.run(tvec!(input.into()))?;
        let output = outputs.first().ok_or(PredictionError::NoOutput)?;

        output
            .to_array_view::<f32>()?
            .iter()
            .enumerate()
            .map(|(row, value)| {
                if value.is_finite() {
                    Ok(*value as f64)
                } else {
                    Err(PredictionError::NonFinite { row })
                }
            })
            .collect()
    }
}
