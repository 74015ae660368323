//! Plugins hosted on a remote inference worker

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::backend::http_backend::{image_from_bytes, image_to_base64, WorkerClient};
use crate::error::Result;
use crate::plugin::{unsupported, Capability, Plugin, PluginKind, PluginParams};

#[derive(Serialize)]
struct ApiPluginRequest<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    params: &'a PluginParams,
}

#[derive(Serialize)]
struct ApiSwitchModelRequest<'a> {
    model_name: &'a str,
}

/// A plugin whose algorithm runs on a worker
pub struct HttpPlugin {
    kind: PluginKind,
    worker: WorkerClient,
    model: RwLock<Option<String>>,
}

impl HttpPlugin {
    /// `model` falls back to the kind's default sub-model
    pub fn new(kind: PluginKind, worker: WorkerClient, model: Option<String>) -> Self {
        let model = model.or_else(|| kind.default_model().map(String::from));
        Self {
            kind,
            worker,
            model: RwLock::new(model),
        }
    }

    async fn run(&self, capability: Capability, image: &RgbImage, params: &PluginParams) -> Result<DynamicImage> {
        if !self.capabilities().supports(capability) {
            return Err(unsupported(self.name(), capability));
        }

        let action = match capability {
            Capability::GenImage => "gen_image",
            Capability::GenMask => "gen_mask",
        };
        let path = format!("/v1/plugins/{}/{}", self.kind.as_str(), action);
        let request = ApiPluginRequest {
            image: image_to_base64(DynamicImage::ImageRgb8(image.clone()))?,
            model: self.current_model(),
            params,
        };

        debug!(plugin = %self.kind.as_str(), action = %action, "Dispatching to worker");
        let bytes = self.worker.post_for_bytes(&path, &request).await?;
        image_from_bytes(&bytes)
    }
}

#[async_trait]
impl Plugin for HttpPlugin {
    fn kind(&self) -> PluginKind {
        self.kind
    }

    fn current_model(&self) -> Option<String> {
        self.model.read().clone()
    }

    async fn gen_image(&self, image: &RgbImage, params: &PluginParams) -> Result<DynamicImage> {
        self.run(Capability::GenImage, image, params).await
    }

    async fn gen_mask(&self, image: &RgbImage, params: &PluginParams) -> Result<DynamicImage> {
        self.run(Capability::GenMask, image, params).await
    }

    async fn switch_model(&self, model: &str) -> Result<()> {
        if self.current_model().as_deref() == Some(model) {
            return Ok(());
        }

        let path = format!("/v1/plugins/{}/model", self.kind.as_str());
        self.worker
            .post(&path, &ApiSwitchModelRequest { model_name: model })
            .await?;
        *self.model.write() = Some(model.to_string());
        Ok(())
    }

    async fn reclaim_memory(&self) {
        self.worker.reclaim().await;
    }
}
