//! Mask binarization, morphology and frontend colorization

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Brush color the web editor paints masks with (`#ffcc00`, alpha 0.73)
pub const BRUSH_COLOR: Rgba<u8> = Rgba([255, 203, 0, 186]);

/// Kernel used to grow plugin-generated masks before display
const FRONTEND_DILATE_SIZE: i32 = 9;

/// Mask adjustment requested by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskOperation {
    Expand,
    Shrink,
    Reverse,
}

/// Binarize a client-drawn mask, dropping anti-aliased edges
///
/// Pixels strictly above the midpoint become foreground.
pub fn threshold(mask: &GrayImage) -> GrayImage {
    map_pixels(mask, |v| if v > 127 { 255 } else { 0 })
}

/// Adjust a mask and render it in the frontend brush color
pub fn adjust_mask(mask: &GrayImage, kernel_size: u32, operate: MaskOperation) -> RgbaImage {
    let binary = map_pixels(mask, |v| if v >= 127 { 255 } else { 0 });
    let (width, height) = mask.dimensions();

    let adjusted = match operate {
        MaskOperation::Reverse => map_pixels(&binary, |v| 255 - v),
        MaskOperation::Expand => dilate(&binary, &ellipse_kernel(kernel_size, width, height)),
        MaskOperation::Shrink => erode(&binary, &ellipse_kernel(kernel_size, width, height)),
    };

    colorize(&adjusted)
}

/// Turn a plugin-generated mask (gray or color) into the frontend overlay
pub fn frontend_mask(mask: &DynamicImage) -> RgbaImage {
    let gray = mask.to_luma8();
    let half = FRONTEND_DILATE_SIZE / 2;
    let square: Vec<(i32, i32)> = (-half..=half)
        .flat_map(|dy| (-half..=half).map(move |dx| (dx, dy)))
        .collect();

    colorize(&dilate(&gray, &square))
}

/// Paint foreground pixels (`> 128`) with the brush color, the rest transparent
pub fn colorize(mask: &GrayImage) -> RgbaImage {
    let (width, height) = mask.dimensions();
    let mut out = RgbaImage::new(width, height);
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] > 128 {
            out.put_pixel(x, y, BRUSH_COLOR);
        }
    }
    out
}

/// Offsets of an elliptical structuring element of size `2k+1`
///
/// Only offsets that can reach another pixel of a `width`x`height` mask are
/// kept, so an oversized `kernel_size` behaves like one spanning the mask.
pub fn ellipse_kernel(kernel_size: u32, width: u32, height: u32) -> Vec<(i32, i32)> {
    let r = f64::from(kernel_size);
    let reach_x = i64::from(width.saturating_sub(1)).min(i64::from(kernel_size));
    let reach_y = i64::from(height.saturating_sub(1)).min(i64::from(kernel_size));

    let mut offsets = Vec::new();
    for dy in -reach_y..=reach_y {
        let dyf = dy as f64;
        let dx = ((r * r - dyf * dyf).sqrt().round() as i64).min(reach_x);
        for x in -dx..=dx {
            offsets.push((x as i32, dy as i32));
        }
    }
    offsets
}

/// Grayscale dilation; out-of-bounds neighbours are ignored
pub fn dilate(mask: &GrayImage, kernel: &[(i32, i32)]) -> GrayImage {
    morph(mask, kernel, 0, u8::max)
}

/// Grayscale erosion; out-of-bounds neighbours are ignored
pub fn erode(mask: &GrayImage, kernel: &[(i32, i32)]) -> GrayImage {
    morph(mask, kernel, 255, u8::min)
}

fn morph(mask: &GrayImage, kernel: &[(i32, i32)], init: u8, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as i32, height as i32);
    let mut out = GrayImage::new(width, height);

    for y in 0..h {
        for x in 0..w {
            let mut acc = init;
            for &(dx, dy) in kernel {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && ny >= 0 && nx < w && ny < h {
                    acc = pick(acc, mask.get_pixel(nx as u32, ny as u32)[0]);
                }
            }
            out.put_pixel(x as u32, y as u32, Luma([acc]));
        }
    }

    out
}

fn map_pixels(mask: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let mut out = mask.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = f(pixel[0]);
    }
    out
}
