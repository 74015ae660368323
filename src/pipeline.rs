//! Decode, validate, dispatch, normalize and encode

use image::{DynamicImage, ImageFormat};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::backend::{BackendRegistry, InpaintParams};
use crate::codec::mask::{self, MaskOperation};
use crate::codec::raster::{self, EncodedImage, ImageMetadata};
use crate::error::{AppError, Result};
use crate::plugin::{Capability, Plugin, PluginParams, PluginRegistry};

/// Sampler names accepted by diffusion backends
pub const SAMPLERS: &[&str] = &[
    "dpm++ 2m",
    "dpm++ 2m karras",
    "dpm++ 2m sde",
    "dpm++ 2m sde karras",
    "dpm++ sde",
    "dpm++ sde karras",
    "dpm2",
    "dpm2 karras",
    "dpm2 a",
    "dpm2 a karras",
    "euler",
    "euler a",
    "heun",
    "lms",
    "lms karras",
    "ddim",
    "pndm",
    "uni_pc",
    "lcm",
];

const NEGATIVE_PROMPT_MARKER: &str = "Negative prompt: ";

/// Inpainted image plus the seed it was generated with
#[derive(Debug, Clone)]
pub struct InpaintOutput {
    pub image: EncodedImage,
    pub seed: i64,
}

/// Generation parameters recovered from an image's embedded text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenInfo {
    pub prompt: String,
    pub negative_prompt: String,
}

/// Per-request view over the registries
pub struct Pipeline<'a> {
    backends: &'a BackendRegistry,
    plugins: &'a PluginRegistry,
    quality: u8,
}

impl<'a> Pipeline<'a> {
    pub fn new(backends: &'a BackendRegistry, plugins: &'a PluginRegistry, quality: u8) -> Self {
        Self {
            backends,
            plugins,
            quality,
        }
    }

    /// Fill the masked region of `image` with the active backend
    pub async fn inpaint(
        &self,
        image: &str,
        mask: &str,
        mut params: InpaintParams,
    ) -> Result<InpaintOutput> {
        let source = raster::decode_base64_image(image)?;
        let mask = mask::threshold(&raster::decode_base64_mask(mask)?);

        let (image_width, image_height) = source.dimensions();
        let (mask_width, mask_height) = mask.dimensions();
        if (image_width, image_height) != (mask_width, mask_height) {
            return Err(AppError::SizeMismatch {
                image_width,
                image_height,
                mask_width,
                mask_height,
            });
        }

        if params.sd_seed == -1 {
            params.sd_seed = rand::thread_rng().gen_range(0..i64::from(i32::MAX));
            debug!(seed = params.sd_seed, "Drew random seed");
        }

        // Snapshot; a concurrent switch does not affect this request
        let backend = self.backends.current();
        let start = Instant::now();
        let result = backend.inpaint(&source.pixels, &mask, &params).await?;
        info!(
            backend = %backend.name(),
            format = ?source.format,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Inpaint finished"
        );

        let output = raster::concat_alpha(result, source.alpha.as_ref());
        let image = raster::encode_image(&output, source.format, self.quality, &source.metadata)?;

        tokio::spawn(async move { backend.reclaim_memory().await });

        Ok(InpaintOutput {
            image,
            seed: params.sd_seed,
        })
    }

    /// Run a plugin that produces an image; the result is always PNG
    pub async fn run_plugin_gen_image(
        &self,
        name: &str,
        image: &str,
        params: &PluginParams,
    ) -> Result<EncodedImage> {
        let plugin = self.plugins.resolve(name, Capability::GenImage)?;
        let source = raster::decode_base64_image(image)?;

        let start = Instant::now();
        let generated = plugin.gen_image(&source.pixels, params).await?;
        debug!(plugin = %name, elapsed_ms = start.elapsed().as_millis() as u64, "Plugin image generated");

        let output = if generated.color().has_alpha() {
            generated
        } else {
            raster::concat_alpha(generated.to_rgb8(), source.alpha.as_ref())
        };
        let encoded = raster::encode_image(&output, ImageFormat::Png, self.quality, &source.metadata)?;

        spawn_reclaim(plugin);
        Ok(encoded)
    }

    /// Run a plugin that produces a mask, rendered as the frontend overlay
    pub async fn run_plugin_gen_mask(
        &self,
        name: &str,
        image: &str,
        params: &PluginParams,
    ) -> Result<EncodedImage> {
        let plugin = self.plugins.resolve(name, Capability::GenMask)?;
        let source = raster::decode_base64_image(image)?;

        let start = Instant::now();
        let generated = plugin.gen_mask(&source.pixels, params).await?;
        debug!(plugin = %name, elapsed_ms = start.elapsed().as_millis() as u64, "Plugin mask generated");

        let overlay = DynamicImage::ImageRgba8(mask::frontend_mask(&generated));
        let encoded = raster::encode_png(&overlay, &ImageMetadata::new())?;

        spawn_reclaim(plugin);
        Ok(encoded)
    }
}

/// Fire the memory-reclamation hint without waiting for it
pub(crate) fn spawn_reclaim(plugin: Arc<dyn Plugin>) {
    tokio::spawn(async move { plugin.reclaim_memory().await });
}

/// Binarize, grow, shrink or invert a mask and render it as an overlay
pub fn adjust_mask(mask: &str, kernel_size: u32, operate: MaskOperation) -> Result<EncodedImage> {
    let gray = raster::decode_base64_mask(mask)?;
    let adjusted = mask::adjust_mask(&gray, kernel_size, operate);
    raster::encode_png(&DynamicImage::ImageRgba8(adjusted), &ImageMetadata::new())
}

/// Recover prompt and negative prompt from the `parameters` text chunk
pub fn gen_info(bytes: &[u8]) -> Result<GenInfo> {
    let metadata = raster::read_metadata(bytes)?;
    Ok(parse_parameters(metadata.get("parameters").unwrap_or_default()))
}

fn parse_parameters(parameters: &str) -> GenInfo {
    let mut parts = parameters.splitn(2, NEGATIVE_PROMPT_MARKER);
    let prompt = parts.next().unwrap_or_default().trim().to_string();
    let negative_prompt = parts
        .next()
        .and_then(|rest| rest.lines().next())
        .unwrap_or_default()
        .trim()
        .to_string();

    GenInfo {
        prompt,
        negative_prompt,
    }
}
