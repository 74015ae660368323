//! Common traits and types for inpainting backends

use async_trait::async_trait;
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Family of an inpainting model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    #[default]
    Inpaint,
    DiffusersSd,
    DiffusersSdxl,
    DiffusersSdInpaint,
    DiffusersSdxlInpaint,
    DiffusersOther,
}

/// Descriptor of an inpainting backend as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub model_type: ModelType,
    #[serde(default)]
    pub support_strength: bool,
    #[serde(default)]
    pub support_outpainting: bool,
    #[serde(default)]
    pub support_controlnet: bool,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            model_type: ModelType::default(),
            support_strength: false,
            support_outpainting: false,
            support_controlnet: false,
        }
    }
}

/// Per-request inpainting parameters, forwarded to the backend untouched
/// apart from seed resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InpaintParams {
    /// `-1` asks for a random seed
    #[serde(default = "default_seed")]
    pub sd_seed: i64,

    #[serde(default)]
    pub prompt: String,

    #[serde(default)]
    pub negative_prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd_steps: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd_sampler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd_strength: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd_guidance_scale: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldm_steps: Option<u32>,

    /// Model-specific options the gateway does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_seed() -> i64 {
    42
}

impl Default for InpaintParams {
    fn default() -> Self {
        Self {
            sd_seed: default_seed(),
            prompt: String::new(),
            negative_prompt: String::new(),
            sd_steps: None,
            sd_sampler: None,
            sd_strength: None,
            sd_guidance_scale: None,
            hd_strategy: None,
            ldm_steps: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// An inpainting engine able to fill the masked region of an image
#[async_trait]
pub trait InpaintBackend: Send + Sync {
    /// Backend (model) name, unique within the catalog
    fn name(&self) -> &str;

    /// Descriptor reported to clients
    fn info(&self) -> ModelInfo;

    /// Inpaint `image` where `mask` is 255, returning an RGB image of the same size
    async fn inpaint(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
        params: &InpaintParams,
    ) -> Result<RgbImage>;

    /// Advisory hint that accelerator memory may be released
    async fn reclaim_memory(&self) {}
}

/// Loads backends by name and enumerates the catalog
#[async_trait]
pub trait BackendProvider: Send + Sync {
    async fn load(&self, name: &str) -> Result<Arc<dyn InpaintBackend>>;

    async fn scan_models(&self) -> Result<Vec<ModelInfo>>;
}
