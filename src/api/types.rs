//! Request and response bodies of the HTTP surface

use serde::{Deserialize, Serialize};

use crate::backend::InpaintParams;
use crate::codec::mask::MaskOperation;
use crate::plugin::PluginParams;

#[derive(Debug, Deserialize)]
pub struct InpaintRequest {
    pub image: String,
    pub mask: String,
    #[serde(flatten)]
    pub params: InpaintParams,
}

#[derive(Debug, Deserialize)]
pub struct RunPluginRequest {
    pub name: String,
    pub image: String,
    #[serde(flatten)]
    pub params: PluginParams,
}

#[derive(Debug, Deserialize)]
pub struct SwitchModelRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchPluginModelRequest {
    pub plugin_name: String,
    pub model_name: String,
}

fn default_kernel_size() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct AdjustMaskRequest {
    pub mask: String,
    #[serde(default = "default_kernel_size")]
    pub kernel_size: u32,
    pub operate: MaskOperation,
}

/// Used both for direct uploads and for returning processed images
#[derive(Debug, Deserialize)]
pub struct UnityImageRequest {
    pub image: String,
    /// Id of the cached image this result answers, when the client knows it
    #[serde(default)]
    pub image_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnityImageUrlRequest {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct UnityImageResponse {
    pub success: bool,
    pub message: String,
    pub image_id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
