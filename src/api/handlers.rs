//! Request handlers

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use image::ImageFormat;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::extract::ApiJson;
use crate::api::types::*;
use crate::backend::ModelInfo;
use crate::codec::EncodedImage;
use crate::control::{self, ServerConfigResponse};
use crate::correlation::Ingested;
use crate::error::{body_rejection, AppError, Result};
use crate::pipeline::{self, GenInfo, SAMPLERS};
use crate::storage::OutputStore;
use crate::AppState;

pub const X_SEED: HeaderName = HeaderName::from_static("x-seed");

impl IntoResponse for EncodedImage {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, self.content_type())], self.bytes).into_response()
    }
}

/// Bytes of the multipart field named `file`, with its client filename
async fn read_file_field(mut multipart: Multipart) -> Result<(Option<String>, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| body_rejection(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(String::from);
        let data = field
            .bytes()
            .await
            .map_err(|e| body_rejection(e.status(), e.body_text()))?;
        return Ok((filename, data));
    }

    Err(AppError::InvalidRequest("Missing multipart field 'file'".to_string()))
}

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn gen_info(multipart: Multipart) -> Result<Json<GenInfo>> {
    let (_, data) = read_file_field(multipart).await?;
    Ok(Json(pipeline::gen_info(&data)?))
}

pub async fn server_config(State(state): State<Arc<AppState>>) -> Result<Json<ServerConfigResponse>> {
    Ok(Json(control::describe_server_config(&state).await?))
}

pub async fn current_model(State(state): State<Arc<AppState>>) -> Json<ModelInfo> {
    Json(state.backends.current_model())
}

pub async fn switch_model(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SwitchModelRequest>,
) -> Result<Json<ModelInfo>> {
    Ok(Json(state.backends.switch(&req.name).await?))
}

/// Serve the configured input image
pub async fn input_image(State(state): State<Arc<AppState>>) -> Result<Response> {
    let path = state
        .settings
        .read()
        .await
        .storage
        .input_path()
        .ok_or(AppError::InputImageUnconfigured)?;

    if !path.is_file() {
        return Err(AppError::InputImageMissing);
    }

    let data = tokio::fs::read(&path).await?;
    let content_type = ImageFormat::from_path(&path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

pub async fn inpaint(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<InpaintRequest>,
) -> Result<Response> {
    let output = state
        .pipeline()
        .await
        .inpaint(&req.image, &req.mask, req.params)
        .await?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(output.image.content_type())),
        (X_SEED, HeaderValue::from(output.seed)),
    ];
    Ok((headers, output.image.bytes).into_response())
}

pub async fn switch_plugin_model(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SwitchPluginModelRequest>,
) -> Result<StatusCode> {
    control::switch_plugin_model(&state, &req.plugin_name, &req.model_name).await?;
    Ok(StatusCode::OK)
}

pub async fn run_plugin_gen_mask(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RunPluginRequest>,
) -> Result<EncodedImage> {
    state
        .pipeline()
        .await
        .run_plugin_gen_mask(&req.name, &req.image, &req.params)
        .await
}

pub async fn run_plugin_gen_image(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RunPluginRequest>,
) -> Result<EncodedImage> {
    state
        .pipeline()
        .await
        .run_plugin_gen_image(&req.name, &req.image, &req.params)
        .await
}

pub async fn samplers() -> Json<&'static [&'static str]> {
    Json(SAMPLERS)
}

pub async fn adjust_mask(ApiJson(req): ApiJson<AdjustMaskRequest>) -> Result<EncodedImage> {
    pipeline::adjust_mask(&req.mask, req.kernel_size, req.operate)
}

/// Save an uploaded file into the output directory under its basename
pub async fn save_image(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<StatusCode> {
    let store = OutputStore::existing(state.settings.read().await.storage.output_path())?;

    let (filename, data) = read_file_field(multipart).await?;
    let filename = filename.ok_or_else(|| AppError::InvalidRequest("Missing filename".to_string()))?;
    let path = store.write(&filename, &data).await?;

    info!(path = ?path, "Image saved");
    Ok(StatusCode::OK)
}

pub async fn unity_image(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UnityImageRequest>,
) -> Result<Json<UnityImageResponse>> {
    let output_dir = state.settings.read().await.storage.output_path();
    let ingested = state.unity.ingest_upload(&req.image, output_dir).await?;

    Ok(Json(UnityImageResponse {
        success: true,
        message: "Image received and event emitted".to_string(),
        image_id: ingested.image_id,
    }))
}

pub async fn unity_image_url(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UnityImageUrlRequest>,
) -> Result<Json<Ingested>> {
    Ok(Json(state.unity.ingest_url(&req.image_url).await?))
}

pub async fn send_to_unity(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UnityImageRequest>,
) -> Result<StatusCode> {
    let output_dir = state.settings.read().await.storage.output_path();
    state
        .unity
        .complete(&req.image, req.image_id.as_deref(), output_dir)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn cached_image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Result<Response> {
    let bytes = state.unity.lookup(&image_id)?;
    let content_type = image::guess_format(&bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/png");

    debug!(image_id = %image_id, size = bytes.len(), "Serving cached image");
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
