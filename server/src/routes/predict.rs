//! Prediction and label endpoints

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::QueryRejection,
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use steel_defect::ResultSet;
use tracing::debug;

use crate::error::ApiError;
use crate::state::SharedState;

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    /// Overrides the configured K for this request
    pub top_k: Option<usize>,
}

/// POST /predict - Rank the defect classes for an uploaded image
pub async fn predict(
    State(state): State<SharedState>,
    params: Result<Query<PredictParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ResultSet>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let bytes = read_file_field(&mut multipart).await?;
    debug!(size = bytes.len(), top_k = ?params.top_k, "predict request");

    let results = match params.top_k {
        Some(k) => state.pool.predict_with_k(bytes, k).await?,
        None => state.pool.predict(bytes).await?,
    };

    Ok(Json(results))
}

/// Bytes of the first `file` field; other fields are ignored
async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    loop {
        let field = multipart.next_field().await.map_err(|e| ApiError {
            status: e.status(),
            message: e.body_text(),
        })?;

        let Some(field) = field else {
            return Err(ApiError::bad_request(format!(
                "missing multipart field '{}'",
                FILE_FIELD
            )));
        };

        if field.name() == Some(FILE_FIELD) {
            let bytes = field.bytes().await.map_err(|e| ApiError {
                status: e.status(),
                message: e.body_text(),
            })?;
            return Ok(bytes.to_vec());
        }
    }
}

#[derive(Serialize)]
pub struct LabelsResponse {
    pub labels: Vec<String>,
    pub top_k: usize,
    pub image_size: u32,
}

/// GET /labels - Class names in output order and the serving defaults
pub async fn labels(State(state): State<SharedState>) -> Json<LabelsResponse> {
    Json(LabelsResponse {
        labels: state.labels.to_vec(),
        top_k: state.pool.top_k(),
        image_size: state.image_size,
    })
}
