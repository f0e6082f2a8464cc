use crate::export::ExportError;
use crate::ingest::IngestError;
use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::schema::SchemaError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the `/api/products` handlers.
///
/// Each variant maps to one status code; the body is always
/// `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("invalid columns: {0}")]
    Schema(#[from] SchemaError),
    #[error("no file was uploaded")]
    MissingFile,
    #[error("dynamic mode requires a `columns` field")]
    MissingColumns,
    #[error("malformed multipart request: {0}")]
    Multipart(String),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("upload exceeds the limit of {limit} bytes")]
    UploadTooLarge { limit: usize },
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("run '{0}' not found")]
    RunNotFound(String),
}

impl From<actix_multipart::MultipartError> for ServiceError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        ServiceError::Multipart(e.to_string())
    }
}

impl From<JsonPayloadError> for ServiceError {
    fn from(e: JsonPayloadError) -> Self {
        match e {
            JsonPayloadError::Overflow { limit } | JsonPayloadError::OverflowKnownLength { limit, .. } => {
                ServiceError::UploadTooLarge { limit }
            }
            other => ServiceError::InvalidBody(other.to_string()),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Ingest(_)
            | ServiceError::Schema(_)
            | ServiceError::MissingFile
            | ServiceError::MissingColumns
            | ServiceError::Multipart(_)
            | ServiceError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ServiceError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::RunNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn statuses_follow_the_failure_kind() {
        let unsupported = ServiceError::from(IngestError::UnsupportedFormat {
            filename: "notes.txt".to_string(),
        });
        assert_eq!(unsupported.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::UploadTooLarge { limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ServiceError::RunNotFound("x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Export(ExportError::Flush("closed".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn json_extractor_failures_map_to_client_errors() {
        let overflow = ServiceError::from(JsonPayloadError::Overflow { limit: 8 });
        assert_eq!(overflow.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        let wrong_type = ServiceError::from(JsonPayloadError::ContentType);
        assert_eq!(wrong_type.status_code(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn body_is_a_json_error_object() {
        let response = ServiceError::MissingFile.error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "no file was uploaded" }));
    }
}
