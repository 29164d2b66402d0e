use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No file part in the request")]
    MissingPayload,

    #[error("No file selected")]
    MissingFilename,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Document converter is not available: {0}")]
    ConversionUnavailable(String),

    #[error("Error processing file: {0}")]
    ConversionFailed(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

/// Body of every error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingPayload | AppError::MissingFilename | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ConversionUnavailable(_)
            | AppError::ConversionFailed(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::MissingPayload | AppError::MissingFilename => self.to_string(),
            AppError::BadRequest(msg) | AppError::PayloadTooLarge(msg) => {
                tracing::warn!("Rejected request: {}", msg);
                msg.clone()
            }
            AppError::ConversionUnavailable(_) | AppError::ConversionFailed(_) => {
                tracing::error!("{}", self);
                self.to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
