//! Inpaint Serving Gateway
//!
//! Request orchestration for an image-inpainting service: a decode/dispatch/
//! encode pipeline in front of a swappable inpainting backend, a fixed set of
//! auxiliary image plugins, and a correlation cache that pairs images pushed
//! by an external 3D client with the processed results sent back to it.

pub mod api;
pub mod backend;
pub mod codec;
pub mod config;
pub mod control;
pub mod correlation;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod plugin;
pub mod storage;

pub use error::{AppError, Result};

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use backend::http_backend::{HttpBackendProvider, WorkerClient};
use backend::BackendRegistry;
use correlation::UnityWorkflow;
use pipeline::Pipeline;
use plugin::PluginRegistry;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<RwLock<config::Settings>>,
    pub backends: Arc<BackendRegistry>,
    pub plugins: Arc<PluginRegistry>,
    pub unity: Arc<UnityWorkflow>,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        backends: Arc<BackendRegistry>,
        plugins: Arc<PluginRegistry>,
        unity: Arc<UnityWorkflow>,
    ) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            backends,
            plugins,
            unity,
        }
    }

    /// Wire worker-backed registries from configuration, loading the
    /// configured inpainting model
    pub async fn from_settings(settings: config::Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.worker.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let worker = WorkerClient::with_client(client.clone(), &settings.worker.endpoint);
        let provider = Arc::new(HttpBackendProvider::new(worker));
        let backends = Arc::new(BackendRegistry::initialize(provider, &settings.model.name).await?);
        let plugins = Arc::new(PluginRegistry::from_settings(&settings, client));
        let unity = Arc::new(UnityWorkflow::from_config(&settings.cache, &settings.fetch)?);

        Ok(Self::new(settings, backends, plugins, unity))
    }

    /// Pipeline over the current registries
    pub async fn pipeline(&self) -> Pipeline<'_> {
        let quality = self.settings.read().await.storage.quality;
        Pipeline::new(&self.backends, &self.plugins, quality)
    }
}
