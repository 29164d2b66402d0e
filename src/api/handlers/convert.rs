use crate::AppState;
use crate::api::error::AppError;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;
use utoipa::ToSchema;

/// Multipart field that carries the document
pub const FILE_FIELD: &str = "file";

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MarkdownResponse {
    pub markdown: String,
}

/// Request body schema for the OpenAPI document
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// The caller's file as received
#[derive(Debug)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Bytes,
}

#[utoipa::path(
    post,
    path = "/extract-markdown",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Document to convert"),
    responses(
        (status = 200, description = "Document converted", body = MarkdownResponse),
        (status = 400, description = "No file part or no file selected", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorResponse),
        (status = 500, description = "Converter unavailable or conversion failed", body = ErrorResponse)
    ),
    tag = "convert"
)]
pub async fn extract_markdown(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MarkdownResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Request is not a multipart upload: {}", e);
        AppError::MissingPayload
    })?;

    let upload = match read_upload(&mut multipart, state.config.max_file_size).await {
        Ok(upload) => upload,
        Err(e) => {
            // Consume the rest of the body so the client sees our response, not a reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            return Err(e);
        }
    };

    let (filename, bytes) = validate(upload)?;
    let engine = state.conversion.engine().await?;

    let started = Instant::now();
    let staged = state.stager.stage(&filename, &bytes).await?;
    drop(bytes);

    let result = state.conversion.convert(engine, &staged).await;
    staged.cleanup();
    let markdown = result?;

    info!(
        "📄 Converted {} ({} chars of markdown) in {:?}",
        filename,
        markdown.len(),
        started.elapsed()
    );
    Ok(Json(MarkdownResponse { markdown }))
}

/// Find the `file` field and read it fully. Other fields are skipped.
pub async fn read_upload(
    multipart: &mut Multipart,
    max_file_size: usize,
) -> Result<Option<Upload>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the maximum allowed size of {} bytes",
                max_file_size
            )));
        }
        return Ok(Some(Upload { filename, bytes }));
    }
    Ok(None)
}

/// An upload must be present and carry a non-blank filename
pub fn validate(upload: Option<Upload>) -> Result<(String, Bytes), AppError> {
    let upload = upload.ok_or(AppError::MissingPayload)?;
    let filename = upload
        .filename
        .filter(|name| !name.trim().is_empty())
        .ok_or(AppError::MissingFilename)?;
    Ok((filename, upload.bytes))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: Option<&str>) -> Option<Upload> {
        Some(Upload {
            filename: filename.map(str::to_string),
            bytes: Bytes::from_static(b"content"),
        })
    }

    #[test]
    fn test_validate_missing_payload() {
        assert!(matches!(validate(None), Err(AppError::MissingPayload)));
    }

    #[test]
    fn test_validate_missing_filename() {
        assert!(matches!(
            validate(upload(None)),
            Err(AppError::MissingFilename)
        ));
        assert!(matches!(
            validate(upload(Some("  "))),
            Err(AppError::MissingFilename)
        ));
    }

    #[test]
    fn test_validate_accepts_named_upload() {
        let (filename, bytes) = validate(upload(Some("report.pdf"))).unwrap();
        assert_eq!(filename, "report.pdf");
        assert_eq!(&bytes[..], b"content");
    }
}
