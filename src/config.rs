use std::path::PathBuf;

use argh::FromArgs;
use axum::http::StatusCode;

use crate::handler::PredictError;

// defaults for the server
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL_PATH: &str = "model/model.onnx";

#[derive(FromArgs, Debug)]
/// Serves battery capacity predictions over HTTP.
pub struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    pub host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    pub port: u16,

    /// path to the ONNX model artifact
    #[argh(option, short = 'm', default = "PathBuf::from(DEFAULT_MODEL_PATH)")]
    pub model: PathBuf,

    /// answer failed predictions with 422/500 instead of 200
    #[argh(switch)]
    pub strict_status: bool,
}

impl ServerArgs {
    /// The `host:port` address to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn error_status(&self) -> ErrorStatusPolicy {
        if self.strict_status {
            ErrorStatusPolicy::Strict
        } else {
            ErrorStatusPolicy::Compatible
        }
    }
}

/// How failed predictions map onto HTTP status codes.
///
/// Clients of the original service detect failures by looking for an `error`
/// key, never by status, so `Compatible` stays the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorStatusPolicy {
    /// Every response is `200 OK`.
    #[default]
    Compatible,
    /// Bad input is `422`, model failures are `500`.
    Strict,
}

impl ErrorStatusPolicy {
    pub fn status_for(&self, error: &PredictError) -> StatusCode {
        match self {
            ErrorStatusPolicy::Compatible => StatusCode::OK,
            ErrorStatusPolicy::Strict if error.is_input_error() => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorStatusPolicy::Strict => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_local_debug_server() {
        let args = ServerArgs::from_args(&["capacity-api"], &[]).unwrap();
        assert_eq!(args.addr(), "127.0.0.1:5000");
        assert_eq!(args.model, PathBuf::from("model/model.onnx"));
        assert_eq!(args.error_status(), ErrorStatusPolicy::Compatible);
    }

    #[test]
    fn parses_overrides() {
        let args = ServerArgs::from_args(
            &["capacity-api"],
            &["--port", "8080", "--model", "/srv/model.onnx", "--strict-status"],
        )
        .unwrap();
        assert_eq!(args.addr(), "127.0.0.1:8080");
        assert_eq!(args.model, PathBuf::from("/srv/model.onnx"));
        assert_eq!(args.error_status(), ErrorStatusPolicy::Strict);
    }

    #[test]
    fn strict_policy_separates_input_and_model_errors() {
        let strict = ErrorStatusPolicy::Strict;
        assert_eq!(
            strict.status_for(&PredictError::MissingField("id_cycle")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            strict.status_for(&PredictError::EmptyPrediction),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorStatusPolicy::Compatible.status_for(&PredictError::EmptyPrediction),
            StatusCode::OK
        );
    }
}
