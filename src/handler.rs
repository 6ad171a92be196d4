use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    AppState,
    model::{CapacityModel, FEATURE_NAMES, FeatureVector},
};

/// Text served on the root route.
pub const ROOT_MESSAGE: &str = "ML Model API is running!";

/// A decoded request body. Unknown keys are kept but never read.
pub type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictionResponse {
    pub predicted_capacity: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Everything that can go wrong while turning a request body into a prediction.
///
/// The display text is what ends up in the `error` field of the response.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// A required key is absent from the body.
    #[error("'{0}'")]
    MissingField(&'static str),
    /// A string value that does not parse as a number.
    #[error("could not convert string to float: '{value}'")]
    NotNumeric { field: &'static str, value: String },
    /// A value of a JSON type that can not become a matrix cell.
    #[error("field '{field}' must be a number, got {kind}")]
    InvalidType {
        field: &'static str,
        kind: &'static str,
    },
    #[error("field '{field}' must be a finite number")]
    NonFinite { field: &'static str },
    #[error("model returned no predictions")]
    EmptyPrediction,
    /// Failure inside the model itself.
    #[error("{0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PredictError {
    /// True when the request itself is at fault rather than the model.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, PredictError::EmptyPrediction | PredictError::Model(_))
    }
}

/// Decodes a request body regardless of its declared content type.
///
/// Bodies that are not valid JSON, or valid JSON that is not an object,
/// decode to an empty object so the failure surfaces as a missing field.
pub fn parse_body(body: &[u8]) -> JsonObject {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            log::debug!("Request body is not a JSON object: {other}");
            JsonObject::new()
        }
        Err(e) => {
            log::debug!("Request body is not valid JSON: {e}");
            JsonObject::new()
        }
    }
}

fn coerce(field: &'static str, value: &Value) -> Result<f64, PredictError> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or(PredictError::InvalidType {
            field,
            kind: "number out of range",
        })?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| PredictError::NotNumeric {
            field,
            value: s.clone(),
        })?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null => return Err(PredictError::InvalidType { field, kind: "null" }),
        Value::Array(_) => return Err(PredictError::InvalidType { field, kind: "array" }),
        Value::Object(_) => return Err(PredictError::InvalidType { field, kind: "object" }),
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(PredictError::NonFinite { field })
    }
}

fn lookup(body: &JsonObject, field: &'static str) -> Result<f64, PredictError> {
    let value = body.get(field).ok_or(PredictError::MissingField(field))?;
    coerce(field, value)
}

/// Reads the model inputs out of a decoded body.
pub fn extract_features(body: &JsonObject) -> Result<FeatureVector, PredictError> {
    let [id_cycle_key, temperature_key] = FEATURE_NAMES;
    Ok(FeatureVector {
        id_cycle: lookup(body, id_cycle_key)?,
        temperature_measured: lookup(body, temperature_key)?,
    })
}

/// Runs one prediction for a decoded request body.
pub fn predict_capacity<M: CapacityModel>(
    model: &M,
    body: &JsonObject,
) -> Result<f64, PredictError> {
    let matrix = extract_features(body)?.to_matrix();

    let predictions = model
        .predict(&matrix)
        .map_err(|e| PredictError::Model(Box::new(e)))?;

    predictions
        .first()
        .copied()
        .ok_or(PredictError::EmptyPrediction)
}

pub async fn home() -> &'static str {
    ROOT_MESSAGE
}

pub async fn predict<M>(State(state): State<AppState<M>>, body: Bytes) -> Response
where
    M: CapacityModel + Send + Sync + 'static,
{
    let payload = parse_body(&body);

    match predict_capacity(state.model.as_ref(), &payload) {
        Ok(predicted_capacity) => {
            log::debug!("Predicted capacity {predicted_capacity}");
            (StatusCode::OK, Json(PredictionResponse { predicted_capacity })).into_response()
        }
        Err(error) => {
            log::warn!("Prediction failed: {error}");
            (
                state.error_status.status_for(&error),
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureMatrix;
    use std::sync::Mutex;
    use tract_onnx::prelude::tract_ndarray::arr2;

    #[derive(Debug, thiserror::Error)]
    #[error("model exploded")]
    struct Boom;

    /// Records every matrix it sees and answers with `intercept + 2*x0 + x1`.
    #[derive(Default)]
    struct RecordingModel {
        seen: Mutex<Vec<FeatureMatrix>>,
    }

    impl CapacityModel for RecordingModel {
        type Error = Boom;

        fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, Self::Error> {
            self.seen.lock().unwrap().push(features.clone());
            Ok(features
                .outer_iter()
                .map(|row| 1.0 + 2.0 * row[0] as f64 + row[1] as f64)
                .collect())
        }
    }

    struct FailingModel;

    impl CapacityModel for FailingModel {
        type Error = Boom;

        fn predict(&self, _features: &FeatureMatrix) -> Result<Vec<f64>, Self::Error> {
            Err(Boom)
        }
    }

    struct SilentModel;

    impl CapacityModel for SilentModel {
        type Error = Boom;

        fn predict(&self, _features: &FeatureMatrix) -> Result<Vec<f64>, Self::Error> {
            Ok(Vec::new())
        }
    }

    fn body(json: &str) -> JsonObject {
        parse_body(json.as_bytes())
    }

    #[test]
    fn builds_row_in_training_order() {
        let model = RecordingModel::default();
        predict_capacity(&model, &body(r#"{"Temperature_measured": 30.2, "id_cycle": 5}"#))
            .unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], arr2(&[[5.0_f32, 30.2_f64 as f32]]));
    }

    #[test]
    fn returns_first_prediction() {
        let model = RecordingModel::default();
        let value =
            predict_capacity(&model, &body(r#"{"id_cycle": 10, "Temperature_measured": 25.5}"#))
                .unwrap();
        assert_eq!(value, 46.5);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let features = extract_features(&body(
            r#"{"id_cycle": 1, "Temperature_measured": 2, "ambient": "hot"}"#,
        ))
        .unwrap();
        assert_eq!(features.row(), [1.0, 2.0]);
    }

    #[test]
    fn missing_field_message_names_the_key() {
        let err = extract_features(&body(r#"{"Temperature_measured": 25.5}"#)).unwrap_err();
        assert!(matches!(err, PredictError::MissingField("id_cycle")));
        assert_eq!(err.to_string(), "'id_cycle'");

        let err = extract_features(&body(r#"{"id_cycle": 3}"#)).unwrap_err();
        assert_eq!(err.to_string(), "'Temperature_measured'");
    }

    #[test]
    fn non_json_body_becomes_empty_object() {
        assert!(parse_body(b"id_cycle=10").is_empty());
        assert!(parse_body(b"[10, 25.5]").is_empty());
        assert!(parse_body(b"").is_empty());

        let err = extract_features(&parse_body(b"not json")).unwrap_err();
        assert_eq!(err.to_string(), "'id_cycle'");
    }

    #[test]
    fn numeric_strings_and_booleans_are_coerced() {
        let features = extract_features(&body(
            r#"{"id_cycle": " 12 ", "Temperature_measured": true}"#,
        ))
        .unwrap();
        assert_eq!(features.row(), [12.0, 1.0]);
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let err = extract_features(&body(r#"{"id_cycle": "ten", "Temperature_measured": 1}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "could not convert string to float: 'ten'");

        let err = extract_features(&body(r#"{"id_cycle": 1, "Temperature_measured": null}"#))
            .unwrap_err();
        assert!(matches!(
            err,
            PredictError::InvalidType {
                field: "Temperature_measured",
                kind: "null"
            }
        ));

        let err = extract_features(&body(r#"{"id_cycle": [1], "Temperature_measured": 1}"#))
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn nan_strings_are_rejected() {
        let err = extract_features(&body(r#"{"id_cycle": "nan", "Temperature_measured": 1}"#))
            .unwrap_err();
        assert!(matches!(err, PredictError::NonFinite { field: "id_cycle" }));
    }

    #[test]
    fn model_failures_are_wrapped() {
        let payload = body(r#"{"id_cycle": 1, "Temperature_measured": 1}"#);

        let err = predict_capacity(&FailingModel, &payload).unwrap_err();
        assert_eq!(err.to_string(), "model exploded");
        assert!(!err.is_input_error());

        let err = predict_capacity(&SilentModel, &payload).unwrap_err();
        assert!(matches!(err, PredictError::EmptyPrediction));
    }
}
