//! HTTP client for remote inference workers

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, RgbImage};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::{BackendProvider, InpaintBackend, InpaintParams, ModelInfo};
use crate::codec::{base64, raster, ImageMetadata};
use crate::config::WorkerConfig;
use crate::error::{AppError, Result};

/// Thin JSON/bytes client over one worker endpoint
#[derive(Clone)]
pub struct WorkerClient {
    client: Client,
    endpoint: String,
}

impl WorkerClient {
    /// Create a new worker client from configuration
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, &config.endpoint))
    }

    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = check_status(path, response).await?;
        Ok(response.json::<T>().await?)
    }

    /// POST a JSON body and return the raw response bytes
    pub async fn post_for_bytes<B>(&self, path: &str, body: &B) -> Result<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = check_status(path, response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// POST a JSON body, ignoring the response body
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        check_status(path, response).await?;
        Ok(())
    }

    /// GET and decode a JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = check_status(path, response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Ask the worker to release memory; failures are only logged
    pub async fn reclaim(&self) {
        match self.client.post(self.url("/v1/reclaim")).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(endpoint = %self.endpoint, "Memory reclamation requested");
            }
            Ok(response) => {
                debug!(endpoint = %self.endpoint, status = %response.status(), "Memory reclamation ignored");
            }
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "Memory reclamation request failed");
            }
        }
    }
}

async fn check_status(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(path = %path, status = %status, "Worker returned an error");

    if status == StatusCode::NOT_FOUND && path == "/v1/model" {
        return Err(AppError::ModelNotFound(body));
    }

    Err(AppError::BackendError(format!(
        "Worker returned {} for {}: {}",
        status, path, body
    )))
}

/// Encode an image as base64 PNG for the worker wire format
pub fn image_to_base64(image: DynamicImage) -> Result<String> {
    let encoded = raster::encode_png(&image, &ImageMetadata::new())?;
    Ok(base64::encode(&encoded.bytes))
}

/// Decode worker image bytes
pub fn image_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| AppError::BackendError(format!("Worker returned an undecodable image: {}", e)))
}

#[derive(Serialize)]
struct LoadModelRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct ApiInpaintRequest<'a> {
    model: &'a str,
    image: String,
    mask: String,
    params: &'a InpaintParams,
}

/// Loads inpainting backends hosted on a worker
pub struct HttpBackendProvider {
    worker: WorkerClient,
}

impl HttpBackendProvider {
    pub fn new(worker: WorkerClient) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl BackendProvider for HttpBackendProvider {
    async fn load(&self, name: &str) -> Result<Arc<dyn InpaintBackend>> {
        debug!(endpoint = %self.worker.endpoint(), model = %name, "Loading model on worker");

        let info: ModelInfo = self
            .worker
            .post_json("/v1/model", &LoadModelRequest { name })
            .await
            .map_err(|e| match e {
                AppError::ModelNotFound(_) => AppError::ModelNotFound(name.to_string()),
                other => other,
            })?;

        Ok(Arc::new(HttpBackend {
            info,
            worker: self.worker.clone(),
        }))
    }

    async fn scan_models(&self) -> Result<Vec<ModelInfo>> {
        self.worker.get_json("/v1/models").await
    }
}

/// Inpainting backend whose inference runs on a remote worker
pub struct HttpBackend {
    info: ModelInfo,
    worker: WorkerClient,
}

#[async_trait]
impl InpaintBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn info(&self) -> ModelInfo {
        self.info.clone()
    }

    async fn inpaint(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
        params: &InpaintParams,
    ) -> Result<RgbImage> {
        let request = ApiInpaintRequest {
            model: &self.info.name,
            image: image_to_base64(DynamicImage::ImageRgb8(image.clone()))?,
            mask: image_to_base64(DynamicImage::ImageLuma8(mask.clone()))?,
            params,
        };

        debug!(backend = %self.info.name, "Sending inpaint request");
        let bytes = self.worker.post_for_bytes("/v1/inpaint", &request).await?;
        Ok(image_from_bytes(&bytes)?.to_rgb8())
    }

    async fn reclaim_memory(&self) {
        self.worker.reclaim().await;
    }
}
