use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to load model from {path}: {attempts}")]
    Load { path: PathBuf, attempts: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected model output: {0}")]
    Output(String),
}

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("failed to read labels file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed labels file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced at the HTTP boundary. Each variant renders as
/// `{"error": ..., "details": ...}` with its own status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no file provided")]
    MissingFile,

    #[error("malformed upload")]
    Multipart(String),

    #[error("invalid image")]
    InvalidImage(String),

    #[error("upload too large")]
    PayloadTooLarge { limit: usize },

    #[error("model load failed")]
    ModelUnavailable(String),

    #[error("inference failed")]
    Inference(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

impl ApiError {
    pub fn details(&self) -> String {
        match self {
            ApiError::MissingFile => "multipart field 'file' is required".to_string(),
            ApiError::Multipart(msg)
            | ApiError::InvalidImage(msg)
            | ApiError::ModelUnavailable(msg)
            | ApiError::Inference(msg) => msg.clone(),
            ApiError::PayloadTooLarge { limit } => {
                format!("request body exceeds the limit of {} bytes", limit)
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::Multipart(_) | ApiError::InvalidImage(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelUnavailable(_) | ApiError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            details: self.details(),
        })
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound(_) | ModelError::Load { .. } => {
                ApiError::ModelUnavailable(err.to_string())
            }
            ModelError::Inference(_) | ModelError::Output(_) => ApiError::Inference(err.to_string()),
        }
    }
}
