//! Auxiliary image plugins - kinds, capabilities and the dispatch trait

pub mod http_plugin;
pub mod registry;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub use http_plugin::HttpPlugin;
pub use registry::PluginRegistry;

/// The closed set of plugins the gateway knows how to dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    #[serde(rename = "RemoveBG")]
    RemoveBg,
    #[serde(rename = "AnimeSeg")]
    AnimeSeg,
    #[serde(rename = "RealESRGAN")]
    RealEsrgan,
    #[serde(rename = "GFPGAN")]
    Gfpgan,
    #[serde(rename = "RestoreFormer")]
    RestoreFormer,
    #[serde(rename = "InteractiveSeg")]
    InteractiveSeg,
}

const REMOVE_BG_MODELS: &[&str] = &[
    "briaai/RMBG-1.4",
    "briaai/RMBG-2.0",
    "u2net",
    "u2netp",
    "u2net_human_seg",
    "u2net_cloth_seg",
    "silueta",
    "isnet-general-use",
    "birefnet-general",
    "birefnet-general-lite",
    "birefnet-portrait",
    "birefnet-dis",
    "birefnet-hrsod",
    "birefnet-cod",
    "birefnet-massive",
];

const REALESRGAN_MODELS: &[&str] = &[
    "realesr-general-x4v3",
    "RealESRGAN_x4plus",
    "RealESRGAN_x4plus_anime_6B",
];

const INTERACTIVE_SEG_MODELS: &[&str] = &[
    "vit_b",
    "vit_l",
    "vit_h",
    "sam_hq_vit_b",
    "sam_hq_vit_l",
    "sam_hq_vit_h",
    "mobile_sam",
    "sam2_tiny",
    "sam2_small",
    "sam2_base",
    "sam2_large",
    "sam2_1_tiny",
    "sam2_1_small",
    "sam2_1_base",
    "sam2_1_large",
];

impl PluginKind {
    pub const ALL: [PluginKind; 6] = [
        PluginKind::RemoveBg,
        PluginKind::AnimeSeg,
        PluginKind::RealEsrgan,
        PluginKind::Gfpgan,
        PluginKind::RestoreFormer,
        PluginKind::InteractiveSeg,
    ];

    /// Registry key and wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::RemoveBg => "RemoveBG",
            PluginKind::AnimeSeg => "AnimeSeg",
            PluginKind::RealEsrgan => "RealESRGAN",
            PluginKind::Gfpgan => "GFPGAN",
            PluginKind::RestoreFormer => "RestoreFormer",
            PluginKind::InteractiveSeg => "InteractiveSeg",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn capabilities(&self) -> PluginCapabilities {
        match self {
            PluginKind::RemoveBg | PluginKind::AnimeSeg => PluginCapabilities {
                gen_image: true,
                gen_mask: true,
            },
            PluginKind::RealEsrgan | PluginKind::Gfpgan | PluginKind::RestoreFormer => {
                PluginCapabilities {
                    gen_image: true,
                    gen_mask: false,
                }
            }
            PluginKind::InteractiveSeg => PluginCapabilities {
                gen_image: false,
                gen_mask: true,
            },
        }
    }

    /// Sub-models this plugin can switch between; empty when it has a single model
    pub fn model_catalog(&self) -> &'static [&'static str] {
        match self {
            PluginKind::RemoveBg => REMOVE_BG_MODELS,
            PluginKind::RealEsrgan => REALESRGAN_MODELS,
            PluginKind::InteractiveSeg => INTERACTIVE_SEG_MODELS,
            _ => &[],
        }
    }

    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            PluginKind::RemoveBg => Some("briaai/RMBG-1.4"),
            PluginKind::RealEsrgan => Some("realesr-general-x4v3"),
            PluginKind::InteractiveSeg => Some("sam2_1_tiny"),
            _ => None,
        }
    }
}

/// What a plugin can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginCapabilities {
    pub gen_image: bool,
    pub gen_mask: bool,
}

/// A single capability a dispatch requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    GenImage,
    GenMask,
}

impl Capability {
    pub fn label(&self) -> &'static str {
        match self {
            Capability::GenImage => "image output",
            Capability::GenMask => "mask output",
        }
    }
}

impl PluginCapabilities {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::GenImage => self.gen_image,
            Capability::GenMask => self.gen_mask,
        }
    }
}

/// Plugin descriptor as listed in the server config
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub support_gen_image: bool,
    pub support_gen_mask: bool,
}

/// Plugin-specific request parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginParams {
    /// Interactive segmentation clicks as `[x, y, positive]`
    #[serde(default)]
    pub clicks: Vec<Vec<f64>>,

    /// Upscale factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An auxiliary image-processing capability
#[async_trait]
pub trait Plugin: Send + Sync {
    fn kind(&self) -> PluginKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn capabilities(&self) -> PluginCapabilities {
        self.kind().capabilities()
    }

    /// Currently selected sub-model, if the plugin has any
    fn current_model(&self) -> Option<String>;

    /// Produce an RGB or RGBA image from `image`
    async fn gen_image(&self, _image: &RgbImage, _params: &PluginParams) -> Result<DynamicImage> {
        Err(unsupported(self.name(), Capability::GenImage))
    }

    /// Produce a gray or colored mask from `image`
    async fn gen_mask(&self, _image: &RgbImage, _params: &PluginParams) -> Result<DynamicImage> {
        Err(unsupported(self.name(), Capability::GenMask))
    }

    async fn switch_model(&self, model: &str) -> Result<()>;

    /// Advisory hint that accelerator memory may be released
    async fn reclaim_memory(&self) {}
}

pub(crate) fn unsupported(plugin: &str, capability: Capability) -> AppError {
    AppError::CapabilityUnsupported {
        plugin: plugin.to_string(),
        capability: capability.label(),
    }
}
