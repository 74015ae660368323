//! Ingestion and completion of externally tracked images

use axum::body::Bytes;
use chrono::Local;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::codec::base64;
use crate::config::{CacheConfig, FetchConfig};
use crate::correlation::cache::CorrelationCache;
use crate::correlation::metadata::{image_id_at, timestamp_of, CorrelationMetadata};
use crate::error::{AppError, Result};
use crate::storage::OutputStore;

/// Result of an ingestion
#[derive(Debug, Clone, Serialize)]
pub struct Ingested {
    pub image_id: String,
    pub redirect_url: String,
}

impl Ingested {
    fn new(image_id: String) -> Self {
        let redirect_url = format!("/?image={}", image_id);
        Self {
            image_id,
            redirect_url,
        }
    }
}

/// Record written next to a completed image so the external client can pick it up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub status: &'static str,
    #[serde(rename = "pano_id")]
    pub correlation_key: String,
    #[serde(rename = "face_letter")]
    pub face_discriminator: String,
    pub original_filename: String,
    pub modified_filename: String,
    pub modified_path: String,
    pub timestamp: String,
}

/// Both halves of the round trip: ingest a source image, later persist the
/// processed version under the filename its source implies
pub struct UnityWorkflow {
    cache: Arc<CorrelationCache>,
    client: Client,
}

impl UnityWorkflow {
    pub fn new(cache: Arc<CorrelationCache>, client: Client) -> Self {
        Self { cache, client }
    }

    pub fn from_config(cache: &CacheConfig, fetch: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(fetch.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::new(Arc::new(CorrelationCache::from_config(cache)), client))
    }

    pub fn cache(&self) -> &CorrelationCache {
        &self.cache
    }

    /// Fetch `source_url` and cache it with the metadata its path encodes
    pub async fn ingest_url(&self, source_url: &str) -> Result<Ingested> {
        // A URL we cannot correlate later is rejected before any network I/O
        let metadata = CorrelationMetadata::from_url(source_url)?;

        let response = self.client.get(source_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %source_url, status = %status, "Image download failed");
            return Err(AppError::FetchFailed {
                url: source_url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        info!(url = %source_url, size = bytes.len(), "Downloaded image");

        Ok(self.ingest_fetched(metadata, bytes))
    }

    /// Cache already fetched bytes under a freshly minted id
    pub fn ingest_fetched(&self, metadata: CorrelationMetadata, bytes: Bytes) -> Ingested {
        let image_id = image_id_at(&Local::now());

        info!(
            image_id = %image_id,
            pano_id = %metadata.correlation_key,
            face = %metadata.face_discriminator,
            result = %metadata.expected_result_filename,
            "Image ingested"
        );
        self.cache.insert(&image_id, bytes, metadata);

        Ingested::new(image_id)
    }

    /// Persist a directly uploaded image and track it like a fetched one
    pub async fn ingest_upload(&self, image: &str, output_dir: Option<PathBuf>) -> Result<Ingested> {
        let data = base64::decode(image)?;
        let store = OutputStore::create(output_dir).await?;

        let image_id = image_id_at(&Local::now());
        let path = store.write(&format!("{}.png", image_id), &data).await?;
        info!(image_id = %image_id, path = ?path, size = data.len(), "Uploaded image saved");

        self.cache
            .insert(&image_id, Bytes::from(data), CorrelationMetadata::for_upload(&image_id));

        Ok(Ingested::new(image_id))
    }

    /// Cached bytes for `image_id`; lookups never remove the entry
    pub fn lookup(&self, image_id: &str) -> Result<Bytes> {
        self.cache
            .get(image_id)
            .ok_or_else(|| AppError::NotFound(image_id.to_string()))
    }

    /// Write a processed image under the filename its source implies, plus a
    /// notification record
    pub async fn complete(
        &self,
        image: &str,
        image_id: Option<&str>,
        output_dir: Option<PathBuf>,
    ) -> Result<Notification> {
        let data = base64::decode(image)?;
        let store = OutputStore::existing(output_dir)?;

        let (chosen, metadata) = self
            .cache
            .select_pending(image_id)
            .ok_or(AppError::NoPendingCorrelation)?;
        let timestamp = timestamp_of(&chosen).unwrap_or(chosen.as_str()).to_string();

        let path = store.write(&metadata.expected_result_filename, &data).await?;
        info!(
            image_id = %chosen,
            path = ?path,
            original = %metadata.original_filename,
            "Processed image saved"
        );

        let notification = Notification {
            status: "ready",
            correlation_key: metadata.correlation_key,
            face_discriminator: metadata.face_discriminator,
            original_filename: metadata.original_filename,
            modified_filename: metadata.expected_result_filename,
            modified_path: path.display().to_string(),
            timestamp,
        };

        let record = store
            .write_json(&format!("unity_notification_{}.json", notification.timestamp), &notification)
            .await?;
        info!(path = ?record, "Notification file created");

        Ok(notification)
    }
}
