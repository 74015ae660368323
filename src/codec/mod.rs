//! Codec boundary - base64 payloads, raster images and masks

pub mod base64;
pub mod mask;
pub mod raster;

pub use raster::{EncodedImage, ImageEnvelope, ImageMetadata};
