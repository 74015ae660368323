//! Holder of the single active inpainting backend

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::backend::traits::{BackendProvider, InpaintBackend, ModelInfo};
use crate::error::Result;

/// The active backend slot plus the provider used to replace it.
///
/// Readers clone the `Arc` out of the slot, so a request that started before
/// a switch finishes on the backend it started with. Switches are serialized
/// among themselves but never wait for in-flight requests.
pub struct BackendRegistry {
    active: RwLock<Arc<dyn InpaintBackend>>,
    provider: Arc<dyn BackendProvider>,
    switch_lock: Mutex<()>,
}

impl BackendRegistry {
    /// Load `name` through the provider and make it active
    pub async fn initialize(provider: Arc<dyn BackendProvider>, name: &str) -> Result<Self> {
        let backend = provider.load(name).await?;
        info!(backend = %backend.name(), "Initialized inpainting backend");
        Ok(Self::with_backend(provider, backend))
    }

    /// Build a registry around an already loaded backend
    pub fn with_backend(provider: Arc<dyn BackendProvider>, backend: Arc<dyn InpaintBackend>) -> Self {
        Self {
            active: RwLock::new(backend),
            provider,
            switch_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the active backend
    pub fn current(&self) -> Arc<dyn InpaintBackend> {
        self.active.read().clone()
    }

    /// Descriptor of the active backend
    pub fn current_model(&self) -> ModelInfo {
        self.current().info()
    }

    /// Make `name` the active backend; a no-op when it already is
    pub async fn switch(&self, name: &str) -> Result<ModelInfo> {
        let current = self.current();
        if current.name() == name {
            return Ok(current.info());
        }

        let _guard = self.switch_lock.lock().await;

        // Another switch may have landed while we waited
        let current = self.current();
        if current.name() == name {
            return Ok(current.info());
        }

        let backend = self.provider.load(name).await?;
        let model = backend.info();
        *self.active.write() = backend;

        info!(from = %current.name(), to = %name, "Switched inpainting backend");
        Ok(model)
    }

    /// Catalog of backends the provider can load
    pub async fn scan_models(&self) -> Result<Vec<ModelInfo>> {
        self.provider.scan_models().await
    }
}
