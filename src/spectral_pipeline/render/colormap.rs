//! Jet palette
//!
//! Dark blue through cyan, yellow and red, as 256 entries indexed by an
//! 8-bit normalized value.

use image::{GrayImage, Rgb, RgbImage};

fn channel(t: f64, center: f64) -> u8 {
    let v = (1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0);
    (v * 255.0).round() as u8
}

/// Palette colour for an 8-bit level.
pub fn jet(level: u8) -> Rgb<u8> {
    let t = level as f64 / 255.0;
    Rgb([channel(t, 3.0), channel(t, 2.0), channel(t, 1.0)])
}

/// Applies the palette to every pixel of a normalized image.
pub fn apply_jet(levels: &GrayImage) -> RgbImage {
    let lut: Vec<Rgb<u8>> = (0..=255u8).map(jet).collect();
    RgbImage::from_fn(levels.width(), levels.height(), |x, y| {
        lut[levels.get_pixel(x, y)[0] as usize]
    })
}
