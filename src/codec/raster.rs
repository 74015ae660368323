//! Raster decoding and format-preserving encoding
//!
//! Decoding captures everything the encode step needs to reproduce the input
//! faithfully: the pixel buffer, the alpha channel split off into its own
//! plane, the container format and any PNG text chunks (generation
//! parameters written by diffusion front-ends live there).

use std::io::Cursor;

use image::{
    codecs::{jpeg::JpegEncoder, webp::WebPEncoder},
    imageops::{self, FilterType},
    metadata::Orientation,
    DynamicImage, GrayImage, ImageDecoder, ImageFormat, ImageReader, Luma, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use tracing::debug;

use crate::codec::base64;
use crate::error::{AppError, Result};

/// Text metadata embedded in an image container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    text: Vec<(String, String)>,
}

impl ImageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.text.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.text.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.text.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A decoded image together with its provenance
#[derive(Debug, Clone)]
pub struct ImageEnvelope {
    pub pixels: RgbImage,
    pub alpha: Option<GrayImage>,
    pub format: ImageFormat,
    pub metadata: ImageMetadata,
}

impl ImageEnvelope {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }
}

/// Encoded image bytes and the container they are in
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl EncodedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Decode raw image bytes into an envelope
pub fn decode_image(bytes: &[u8]) -> Result<ImageEnvelope> {
    let format = image::guess_format(bytes)?;
    let metadata = read_text_chunks(bytes, format);
    let (pixels, alpha) = split_alpha(load_oriented(bytes, format)?);

    debug!(
        format = ?format,
        width = pixels.width(),
        height = pixels.height(),
        alpha = alpha.is_some(),
        "Decoded image"
    );

    Ok(ImageEnvelope {
        pixels,
        alpha,
        format,
        metadata,
    })
}

/// Decode a base64 (or data URL) image into an envelope
pub fn decode_base64_image(encoded: &str) -> Result<ImageEnvelope> {
    decode_image(&base64::decode(encoded)?)
}

/// Decode raw bytes as a single-channel mask
pub fn decode_mask(bytes: &[u8]) -> Result<GrayImage> {
    let format = image::guess_format(bytes)?;
    Ok(load_oriented(bytes, format)?.to_luma8())
}

/// Decode a base64 (or data URL) payload as a single-channel mask
pub fn decode_base64_mask(encoded: &str) -> Result<GrayImage> {
    decode_mask(&base64::decode(encoded)?)
}

/// Read only the embedded text metadata of an image
pub fn read_metadata(bytes: &[u8]) -> Result<ImageMetadata> {
    let format = image::guess_format(bytes)?;
    Ok(read_text_chunks(bytes, format))
}

fn load_oriented(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage> {
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format).into_decoder()?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

fn read_text_chunks(bytes: &[u8], format: ImageFormat) -> ImageMetadata {
    let mut metadata = ImageMetadata::new();
    if format != ImageFormat::Png {
        return metadata;
    }

    let reader = match png::Decoder::new(Cursor::new(bytes)).read_info() {
        Ok(reader) => reader,
        Err(e) => {
            debug!(error = %e, "Could not read PNG text chunks");
            return metadata;
        }
    };

    let info = reader.info();
    for chunk in &info.uncompressed_latin1_text {
        metadata.insert(chunk.keyword.clone(), chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        if let Ok(text) = chunk.get_text() {
            metadata.insert(chunk.keyword.clone(), text);
        }
    }
    for chunk in &info.utf8_text {
        if let Ok(text) = chunk.get_text() {
            metadata.insert(chunk.keyword.clone(), text);
        }
    }

    metadata
}

/// Split an image into its RGB plane and, if present, its alpha plane
pub fn split_alpha(image: DynamicImage) -> (RgbImage, Option<GrayImage>) {
    if !image.color().has_alpha() {
        return (image.to_rgb8(), None);
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    let mut alpha = GrayImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        rgb.put_pixel(x, y, Rgb([pixel[0], pixel[1], pixel[2]]));
        alpha.put_pixel(x, y, Luma([pixel[3]]));
    }

    (rgb, Some(alpha))
}

/// Re-attach an alpha plane to an RGB image
///
/// The alpha plane is resized to the image when the two disagree, which
/// happens whenever the producer changed the resolution (upscalers).
pub fn concat_alpha(rgb: RgbImage, alpha: Option<&GrayImage>) -> DynamicImage {
    let Some(alpha) = alpha else {
        return DynamicImage::ImageRgb8(rgb);
    };

    let (width, height) = rgb.dimensions();
    let resized;
    let alpha = if alpha.dimensions() != (width, height) {
        resized = imageops::resize(alpha, width, height, FilterType::Triangle);
        &resized
    } else {
        alpha
    };

    let mut rgba = RgbaImage::new(width, height);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        rgba.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha.get_pixel(x, y)[0]]));
    }

    DynamicImage::ImageRgba8(rgba)
}

/// Container actually used when asked to encode `format`
pub fn output_format(format: ImageFormat) -> ImageFormat {
    match format {
        ImageFormat::Png
        | ImageFormat::Jpeg
        | ImageFormat::WebP
        | ImageFormat::Bmp
        | ImageFormat::Tiff => format,
        _ => ImageFormat::Png,
    }
}

/// Encode an image, preserving the requested container where possible
///
/// `quality` applies to JPEG only. Metadata is embedded for PNG output.
pub fn encode_image(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
    metadata: &ImageMetadata,
) -> Result<EncodedImage> {
    let format = output_format(format);
    let mut bytes = Vec::new();

    match format {
        ImageFormat::Png => return encode_png(image, metadata),
        ImageFormat::Jpeg => {
            // JPEG has no alpha
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))?;
        }
        ImageFormat::WebP => {
            let image = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            image.write_with_encoder(WebPEncoder::new_lossless(&mut bytes))?;
        }
        other => {
            image.write_to(&mut Cursor::new(&mut bytes), other)?;
        }
    }

    Ok(EncodedImage { bytes, format })
}

/// Encode as PNG with text chunks
pub fn encode_png(image: &DynamicImage, metadata: &ImageMetadata) -> Result<EncodedImage> {
    let (color, raw) = match image {
        DynamicImage::ImageLuma8(gray) => (png::ColorType::Grayscale, gray.as_raw().clone()),
        other if other.color().has_alpha() => (png::ColorType::Rgba, other.to_rgba8().into_raw()),
        other => (png::ColorType::Rgb, other.to_rgb8().into_raw()),
    };

    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, image.width(), image.height());
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);

        for (key, value) in metadata.entries() {
            let added = if value.is_ascii() {
                encoder.add_text_chunk(key.to_string(), value.to_string())
            } else {
                encoder.add_itxt_chunk(key.to_string(), value.to_string())
            };
            added.map_err(png_error)?;
        }

        let mut writer = encoder.write_header().map_err(png_error)?;
        writer.write_image_data(&raw).map_err(png_error)?;
        writer.finish().map_err(png_error)?;
    }

    Ok(EncodedImage {
        bytes,
        format: ImageFormat::Png,
    })
}

fn png_error(e: png::EncodingError) -> AppError {
    AppError::Encode(format!("PNG encoding failed: {}", e))
}
