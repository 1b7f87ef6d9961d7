use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::spectral_pipeline::cube::{Raster, Region};

const SELECTION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OUTLINE_WIDTH: u32 = 2;

/// Converts intensity samples to an 8-bit image, saturating outside 0..=255.
pub fn raster_to_gray(raster: &Raster) -> GrayImage {
    let pixels = raster
        .data
        .iter()
        .map(|&v| if v.is_finite() { v.round().clamp(0.0, 255.0) as u8 } else { 0 })
        .collect();
    GrayImage::from_raw(raster.width as u32, raster.height as u32, pixels)
        .unwrap_or_else(|| GrayImage::new(raster.width as u32, raster.height as u32))
}

/// Display image of `band` scaled by `scale`, with the display-space
/// `selection` outlined.
pub fn render_preview(band: &Raster, scale: f64, selection: Option<Region>) -> RgbImage {
    let gray = raster_to_gray(band);
    let gray = if scale < 1.0 {
        let width = ((band.width as f64 * scale) as u32).max(1);
        let height = ((band.height as f64 * scale) as u32).max(1);
        imageops::resize(&gray, width, height, FilterType::Triangle)
    } else {
        gray
    };

    let mut preview = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let Luma([v]) = *gray.get_pixel(x, y);
        Rgb([v, v, v])
    });

    if let Some(region) = selection {
        draw_outline(&mut preview, region);
    }
    preview
}

fn draw_outline(image: &mut RgbImage, region: Region) {
    let width = region.width() as u32;
    let height = region.height() as u32;
    for inset in 0..OUTLINE_WIDTH {
        if width <= 2 * inset || height <= 2 * inset {
            break;
        }
        let rect = Rect::at((region.x0 as u32 + inset) as i32, (region.y0 as u32 + inset) as i32)
            .of_size(width - 2 * inset, height - 2 * inset);
        draw_hollow_rect_mut(image, rect, SELECTION_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_is_scaled_and_outlined() {
        let band = Raster::filled(40, 20, 100.0);
        let preview = render_preview(&band, 0.5, Some(Region::new(2, 2, 10, 8)));

        assert_eq!(preview.dimensions(), (20, 10));
        assert_eq!(*preview.get_pixel(2, 2), SELECTION_COLOR);
        assert_eq!(*preview.get_pixel(3, 3), SELECTION_COLOR);
        assert_eq!(*preview.get_pixel(9, 7), SELECTION_COLOR);
        assert_eq!(*preview.get_pixel(8, 6), SELECTION_COLOR);
        assert_eq!(*preview.get_pixel(6, 5), Rgb([100, 100, 100]));
    }

    #[test]
    fn test_outline_past_the_edge_is_clipped() {
        let band = Raster::filled(10, 10, 0.0);
        let preview = render_preview(&band, 1.0, Some(Region::new(6, 6, 14, 14)));

        assert_eq!(preview.dimensions(), (10, 10));
        assert_eq!(*preview.get_pixel(9, 6), SELECTION_COLOR);
        assert_eq!(*preview.get_pixel(6, 9), SELECTION_COLOR);
        assert_eq!(*preview.get_pixel(9, 9), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_raster_to_gray_saturates() {
        let band = Raster::from_vec(3, 1, vec![-5.0, 300.0, f32::NAN]).unwrap();
        let gray = raster_to_gray(&band);
        assert_eq!(gray.as_raw(), &vec![0, 255, 0]);
    }
}
