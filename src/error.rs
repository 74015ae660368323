//! Error taxonomy and the uniform error envelope returned by every handler

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Malformed request body: {detail}")]
    MalformedBody { detail: String, body: String },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Image size({image_width}x{image_height}) and mask size({mask_width}x{mask_height}) not match.")]
    SizeMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("Malformed image url: {0}")]
    MalformedUrl(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Plugin {plugin} does not support {capability}")]
    CapabilityUnsupported {
        plugin: String,
        capability: &'static str,
    },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Image {0} not found in cache")]
    NotFound(String),

    #[error("Failed to download image from {url}: upstream returned {status}")]
    FetchFailed { url: String, status: u16 },

    #[error("No Unity image reference found")]
    NoPendingCorrelation,

    #[error("{0} not configured or doesn't exist")]
    Unconfigured(String),

    #[error("No input image configured")]
    InputImageUnconfigured,

    #[error("Input image not found")]
    InputImageMissing,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Image encoding error: {0}")]
    Encode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<image::ImageError> for AppError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Encoding(_) | image::ImageError::Limits(_) => {
                AppError::Encode(e.to_string())
            }
            image::ImageError::IoError(io) => AppError::Io(io),
            other => AppError::InvalidImage(other.to_string()),
        }
    }
}

/// Wire-level error envelope
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub detail: String,
    pub body: String,
    pub status_code: u16,
}

impl AppError {
    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "ConfigError",
            AppError::Io(_) => "IoError",
            AppError::Json(_) => "JsonError",
            AppError::HttpClient(_) => "HttpClientError",
            AppError::InvalidRequest(_) => "ValidationError",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::MalformedBody { .. } => "MalformedBody",
            AppError::InvalidImage(_) => "InvalidImage",
            AppError::SizeMismatch { .. } => "SizeMismatch",
            AppError::MalformedUrl(_) => "MalformedUrl",
            AppError::PluginNotFound(_) => "PluginNotFound",
            AppError::CapabilityUnsupported { .. } => "CapabilityUnsupported",
            AppError::ModelNotFound(_) => "ModelNotFound",
            AppError::NotFound(_) => "NotFound",
            AppError::FetchFailed { .. } => "FetchFailed",
            AppError::NoPendingCorrelation => "NoPendingCorrelation",
            AppError::Unconfigured(_) => "Unconfigured",
            AppError::InputImageUnconfigured => "InputImageUnconfigured",
            AppError::InputImageMissing => "InputImageMissing",
            AppError::RateLimitExceeded => "RateLimitExceeded",
            AppError::BackendError(_) => "BackendError",
            AppError::Encode(_) => "EncodeError",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// HTTP status code the error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::InvalidImage(_)
            | AppError::SizeMismatch { .. }
            | AppError::MalformedUrl(_)
            | AppError::NoPendingCorrelation
            | AppError::Unconfigured(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::ModelNotFound(_) | AppError::InputImageMissing => {
                StatusCode::NOT_FOUND
            }
            AppError::MalformedBody { .. }
            | AppError::PluginNotFound(_)
            | AppError::CapabilityUnsupported { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::FetchFailed { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            // The frontend treats this as "nothing to preload", not a failure
            AppError::InputImageUnconfigured => StatusCode::OK,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::BackendError(_)
            | AppError::Encode(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the envelope for this error
    pub fn envelope(&self) -> ErrorEnvelope {
        let body = match self {
            AppError::MalformedBody { body, .. } => body.clone(),
            _ => String::new(),
        };

        ErrorEnvelope {
            error: self.kind().to_string(),
            detail: self.to_string(),
            body,
            status_code: self.status_code().as_u16(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = self.envelope();

        if status.is_server_error() {
            error!(kind = %envelope.error, status = status.as_u16(), error = %envelope.detail, "API error");
        } else if status.is_client_error() {
            warn!(kind = %envelope.error, status = status.as_u16(), error = %envelope.detail, "Request rejected");
        }

        (status, Json(envelope)).into_response()
    }
}

/// Panic handler for `CatchPanicLayer`, rendering panics as a 500 envelope
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    AppError::Internal(message).into_response()
}

/// Map a body-reading rejection, keeping length-limit failures apart
pub fn body_rejection(status: StatusCode, detail: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(detail)
    } else {
        AppError::InvalidRequest(detail)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
