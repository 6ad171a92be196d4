use tract_onnx::prelude::tract_ndarray::{Array2, arr2};

/// Number of input columns the capacity model was trained on.
pub const N_FEATURES: usize = 2;

/// Column names in the exact order the model expects them.
pub const FEATURE_NAMES: [&str; N_FEATURES] = ["id_cycle", "Temperature_measured"];

/// Numeric input matrix handed to a [`CapacityModel`], one row per prediction.
pub type FeatureMatrix = Array2<f32>;

/// The inputs of a single prediction, already coerced to numbers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureVector {
    /// Cycle index of the battery.
    pub id_cycle: f64,
    /// Measured temperature during the cycle.
    pub temperature_measured: f64,
}

impl FeatureVector {
    /// Returns the row in training column order: `[id_cycle, Temperature_measured]`.
    pub fn row(&self) -> [f64; N_FEATURES] {
        [self.id_cycle, self.temperature_measured]
    }

    /// Builds the single-row `[1, N_FEATURES]` matrix for this vector.
    pub fn to_matrix(&self) -> FeatureMatrix {
        let [id_cycle, temperature_measured] = self.row();
        arr2(&[[id_cycle as f32, temperature_measured as f32]])
    }
}

/// Trait for regression models that predict battery capacity.
///
/// A model is loaded once at startup and never mutated afterwards, so
/// prediction only needs a shared reference and the same instance can serve
/// every request concurrently.
pub trait CapacityModel {
    /// The error type that can be returned during prediction.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Predicts one value per row of `features`.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, Self::Error>;
}
