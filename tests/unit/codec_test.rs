//! Unit tests for the image codec boundary

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use inpaint_gateway::codec::{base64, raster, ImageMetadata};
use inpaint_gateway::AppError;

fn rgba_png(metadata: &ImageMetadata) -> Vec<u8> {
    let image = RgbaImage::from_pixel(6, 4, Rgba([40, 80, 120, 90]));
    raster::encode_png(&DynamicImage::ImageRgba8(image), metadata)
        .unwrap()
        .bytes
}

#[test]
fn test_decode_splits_alpha_and_keeps_format() {
    let envelope = raster::decode_image(&rgba_png(&ImageMetadata::new())).unwrap();

    assert_eq!(envelope.format, ImageFormat::Png);
    assert_eq!(envelope.dimensions(), (6, 4));
    assert!(envelope.has_alpha());
    assert_eq!(envelope.pixels.get_pixel(0, 0), &Rgb([40, 80, 120]));
    assert_eq!(envelope.alpha.as_ref().unwrap().get_pixel(5, 3)[0], 90);
}

#[test]
fn test_png_text_chunks_survive() {
    let mut metadata = ImageMetadata::new();
    metadata.insert("parameters", "a lighthouse\nNegative prompt: fog");
    metadata.insert("comment", "caf\u{e9}");

    let bytes = rgba_png(&metadata);
    let read = raster::read_metadata(&bytes).unwrap();

    assert_eq!(read.get("parameters"), Some("a lighthouse\nNegative prompt: fog"));
    assert_eq!(read.get("comment"), Some("caf\u{e9}"));
}

#[test]
fn test_jpeg_stays_jpeg() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 10, 10])));
    let encoded = raster::encode_image(&image, ImageFormat::Jpeg, 90, &ImageMetadata::new()).unwrap();

    assert_eq!(encoded.format, ImageFormat::Jpeg);
    assert_eq!(encoded.content_type(), "image/jpeg");
    assert_eq!(image::guess_format(&encoded.bytes).unwrap(), ImageFormat::Jpeg);

    let decoded = raster::decode_image(&encoded.bytes).unwrap();
    assert!(!decoded.has_alpha());
    assert_eq!(decoded.dimensions(), (8, 8));
}

#[test]
fn test_decode_base64_data_url() {
    let bytes = rgba_png(&ImageMetadata::new());
    let data_url = format!("data:image/png;base64,{}", base64::encode(&bytes));

    let envelope = raster::decode_base64_image(&data_url).unwrap();
    assert_eq!(envelope.dimensions(), (6, 4));
}

#[test]
fn test_mask_decodes_to_gray() {
    let bytes = rgba_png(&ImageMetadata::new());
    let mask = raster::decode_base64_mask(&base64::encode(&bytes)).unwrap();
    assert_eq!(mask.dimensions(), (6, 4));
}

#[test]
fn test_garbage_is_invalid_image() {
    let result = raster::decode_image(b"definitely not an image");
    assert!(matches!(result, Err(AppError::InvalidImage(_))));
}
