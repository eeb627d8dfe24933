//! JSON error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use steel_defect::DefectError;
use tracing::{error, warn};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// A failed request: status code plus a message for the caller
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<DefectError> for ApiError {
    fn from(err: DefectError) -> Self {
        let status = match &err {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            DefectError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("prediction failed: {}", err);
        } else {
            warn!("rejected request: {}", err);
        }

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_error_kind() {
        let full = ApiError::from(DefectError::Unavailable("inference queue is full".into()));
        assert_eq!(full.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(full.message, "Inference unavailable: inference queue is full");

        let decode = ApiError::from(DefectError::Decode("not a PNG".into()));
        assert_eq!(decode.status, StatusCode::BAD_REQUEST);

        let inference = ApiError::from(DefectError::Inference("NaN logit".into()));
        assert_eq!(inference.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
