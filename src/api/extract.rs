//! JSON extractor that reports malformed bodies through the error envelope

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::{body_rejection, AppError};

/// Longest body prefix echoed back in a malformed-body error
const MAX_ECHO_BYTES: usize = 1024;

/// Like `axum::Json`, but parse failures become [`AppError::MalformedBody`]
/// carrying the raw body
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| body_rejection(e.status(), e.body_text()))?;

        serde_json::from_slice(&bytes)
            .map(ApiJson)
            .map_err(|e| AppError::MalformedBody {
                detail: e.to_string(),
                body: echo(&bytes),
            })
    }
}

fn echo(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_ECHO_BYTES);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
