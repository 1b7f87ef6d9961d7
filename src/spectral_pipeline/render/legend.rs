//! Vertical colour legend with tick labels.
//!
//! Labels use an embedded DejaVu Sans Mono face so output does not depend on
//! fonts installed on the host.

use std::sync::LazyLock;

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use tracing::warn;

use crate::spectral_pipeline::common::config::LegendStyle;
use crate::spectral_pipeline::render::bounds::DisplayBounds;
use crate::spectral_pipeline::render::colormap::jet;

const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_OFFSET: usize = 10;

static LABEL_FONT: LazyLock<Option<FontRef<'static>>> = LazyLock::new(|| {
    FontRef::try_from_slice(include_bytes!("../../../assets/DejaVuSansMono.ttf"))
        .map_err(|e| warn!("Legend font unusable, labels disabled: {}", e))
        .ok()
});

/// Draws `text` with its baseline at `baseline_y`; glyphs outside the image are clipped.
pub fn draw_label(
    image: &mut RgbImage,
    text: &str,
    x: i32,
    baseline_y: i32,
    font_size: f32,
    color: Rgb<u8>,
) {
    let Some(font) = LABEL_FONT.as_ref() else {
        return;
    };
    let scale = PxScale::from(font_size);
    let ascent = font.as_scaled(scale).ascent().round() as i32;
    draw_text_mut(image, color, x, baseline_y - ascent, scale, font, text);
}

/// Evenly spaced tick values from `min` to `max` inclusive.
pub fn tick_values(min: f64, max: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![min],
        n => (0..n)
            .map(|i| min + (max - min) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Palette level shown at legend row `y` of `height`: 255 at the top, 0 at the bottom.
fn gradient_level(y: usize, height: usize) -> u8 {
    if height <= 1 {
        return 255;
    }
    (255.0 - 255.0 * y as f64 / (height - 1) as f64) as u8
}

/// Legend of `height` rows for `bounds`.
pub fn render_legend(height: usize, bounds: &DisplayBounds, style: &LegendStyle) -> RgbImage {
    let mut legend = RgbImage::new(style.width as u32, height as u32);

    let bar_x1 = style.bar_x1.min(style.width);
    for y in 0..height {
        let color = jet(gradient_level(y, height));
        for x in style.bar_x0.min(bar_x1)..bar_x1 {
            legend.put_pixel(x as u32, y as u32, color);
        }
    }

    let usable = height as i64 - style.top_margin as i64 - style.bottom_margin as i64;
    let usable = if usable <= 0 { height as i64 } else { usable };
    let span = bounds.max - bounds.min;

    for value in tick_values(bounds.min, bounds.max, style.ticks) {
        let fraction = if span != 0.0 { (value - bounds.min) / span } else { 0.0 };
        let y = (height as f64 - style.bottom_margin as f64 - fraction * usable as f64) as i64;
        draw_label(
            &mut legend,
            &format!("{value:.2}"),
            (bar_x1 + LABEL_OFFSET) as i32,
            y as i32,
            style.font_size,
            LABEL_COLOR,
        );
    }

    legend
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral_pipeline::render::bounds::RangeSource;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn unit_bounds() -> DisplayBounds {
        DisplayBounds {
            min: -1.0,
            max: 1.0,
            source: RangeSource::Fixed,
        }
    }

    #[test]
    fn test_ticks_span_bounds() {
        let ticks = tick_values(-1.0, 1.0, 9);
        assert_eq!(ticks.len(), 9);
        assert_eq!(ticks[0], -1.0);
        assert_eq!(ticks[4], 0.0);
        assert_eq!(ticks[8], 1.0);
    }

    #[test]
    fn test_gradient_runs_top_to_bottom() {
        let style = LegendStyle::default();
        let legend = render_legend(300, &unit_bounds(), &style);

        assert_eq!(legend.dimensions(), (260, 300));
        assert_eq!(*legend.get_pixel(30, 0), jet(255));
        assert_eq!(*legend.get_pixel(30, 299), jet(0));
        assert_eq!(*legend.get_pixel(5, 150), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_labels_are_drawn_right_of_bar() {
        let style = LegendStyle::default();
        let legend = render_legend(300, &unit_bounds(), &style);

        let label_pixels = legend
            .enumerate_pixels()
            .filter(|(x, _, p)| *x as usize >= style.bar_x1 && **p != BLACK)
            .count();
        assert!(label_pixels > 0);
    }

    #[test]
    fn test_extreme_labels_fit_inside_margins() {
        let style = LegendStyle::default();
        let legend = render_legend(400, &unit_bounds(), &style);
        let text_x = style.bar_x1 + LABEL_OFFSET;

        // Bottom label rests on the bottom margin line, top label hangs above the top margin.
        let rows_with_text: Vec<u32> = legend
            .enumerate_pixels()
            .filter(|(x, _, p)| *x as usize >= text_x && **p != BLACK)
            .map(|(_, y, _)| y)
            .collect();
        let top = *rows_with_text.iter().min().unwrap();
        let bottom = *rows_with_text.iter().max().unwrap();
        assert!(top > 0);
        assert!((top as usize) < style.top_margin);
        assert!((bottom as usize) < 400 - style.bottom_margin / 2);
    }

    #[test]
    fn test_draw_label_clips_at_edges() {
        let mut image = RgbImage::new(16, 16);
        draw_label(&mut image, "-1.00", 4, 12, 14.0, LABEL_COLOR);
        draw_label(&mut image, "8", -6, 40, 14.0, LABEL_COLOR);
        draw_label(&mut image, "0.50", 12, 3, 14.0, LABEL_COLOR);

        let lit = image.pixels().filter(|p| **p != BLACK).count();
        assert!(lit > 0);
        assert!(lit < 16 * 16);
    }

    #[test]
    fn test_labels_are_deterministic() {
        let style = LegendStyle::default();
        let first = render_legend(240, &unit_bounds(), &style);
        let second = render_legend(240, &unit_bounds(), &style);
        assert_eq!(first.as_raw(), second.as_raw());
    }
}
