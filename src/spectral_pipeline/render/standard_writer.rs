use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, ImageFormat, RgbImage};
use tracing::debug;

use crate::spectral_pipeline::common::config::{OutputFormat, PipelineConfig, TiffCompression};
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::cube::Raster;
use crate::spectral_pipeline::render::writer::RasterWriter;

/// Writes JPEG/PNG through `image` and float rasters through `tiff`.
pub struct StandardImageWriter;

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            PipelineError::OutputWriteError(format!("{}: {}", parent.display(), e))
        })?;
    }
    Ok(())
}

fn format_for(path: &Path) -> Result<OutputFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputFormat::from_extension)
        .ok_or_else(|| {
            PipelineError::EncodeError(format!("unsupported output format: {}", path.display()))
        })
}

fn encode(
    buf: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
    path: &Path,
    config: &PipelineConfig,
) -> Result<()> {
    create_parent(path)?;
    match format_for(path)? {
        OutputFormat::Jpeg => {
            let file = File::create(path).map_err(|e| {
                PipelineError::OutputWriteError(format!("{}: {}", path.display(), e))
            })?;
            JpegEncoder::new_with_quality(BufWriter::new(file), config.jpeg_quality)
                .write_image(buf, width, height, color)
                .map_err(|e| PipelineError::EncodeError(format!("{}: {}", path.display(), e)))
        }
        OutputFormat::Png => image::save_buffer_with_format(
            path,
            buf,
            width,
            height,
            color,
            ImageFormat::Png,
        )
        .map_err(|e| PipelineError::EncodeError(format!("{}: {}", path.display(), e))),
    }
}

impl RasterWriter for StandardImageWriter {
    fn write_gray(&self, image: &GrayImage, path: &Path, config: &PipelineConfig) -> Result<()> {
        debug!(path = %path.display(), "Encoding {}x{} gray image", image.width(), image.height());
        encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
            path,
            config,
        )
    }

    fn write_rgb(&self, image: &RgbImage, path: &Path, config: &PipelineConfig) -> Result<()> {
        debug!(path = %path.display(), "Encoding {}x{} RGB image", image.width(), image.height());
        encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
            path,
            config,
        )
    }

    fn write_float_tiff(&self, raster: &Raster, path: &Path, config: &PipelineConfig) -> Result<()> {
        debug!("Encoding float TIFF image: {}x{}", raster.width, raster.height);

        let mut buffer = Vec::new();

        let compression = match config.tiff_compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => tiff::encoder::Compression::Deflate(
                tiff::encoder::compression::DeflateLevel::Fast,
            ),
            TiffCompression::DeflateBalanced => tiff::encoder::Compression::Deflate(
                tiff::encoder::compression::DeflateLevel::Balanced,
            ),
            TiffCompression::DeflateBest => tiff::encoder::Compression::Deflate(
                tiff::encoder::compression::DeflateLevel::Best,
            ),
        };

        tiff::encoder::TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?
            .with_compression(compression)
            .write_image::<tiff::encoder::colortype::Gray32Float>(
                raster.width as u32,
                raster.height as u32,
                &raster.data,
            )
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?;

        create_parent(path)?;
        std::fs::write(path, &buffer)
            .map_err(|e| PipelineError::OutputWriteError(format!("{}: {}", path.display(), e)))?;

        debug!("TIFF encoding complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_png_round_trip_is_lossless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.png");
        let image = GrayImage::from_fn(4, 3, |x, y| image::Luma([(x * 10 + y) as u8]));

        StandardImageWriter
            .write_gray(&image, &path, &PipelineConfig::default())
            .unwrap();

        let read = image::open(&path).unwrap().into_luma8();
        assert_eq!(read, image);
    }

    #[test]
    fn test_jpeg_written_with_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heat.jpg");
        let image = RgbImage::from_pixel(16, 8, image::Rgb([200, 10, 10]));

        StandardImageWriter
            .write_rgb(&image, &path, &PipelineConfig::default())
            .unwrap();

        let read = image::open(&path).unwrap();
        assert_eq!((read.width(), read.height()), (16, 8));
    }

    #[test]
    fn test_unknown_extension_fails() {
        let dir = TempDir::new().unwrap();
        let image = GrayImage::new(2, 2);
        let err = StandardImageWriter
            .write_gray(&image, &dir.path().join("x.gif"), &PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::EncodeError(_)));
    }

    #[test]
    fn test_float_tiff_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("float/Image_NDVI.tif");
        let raster = Raster::from_vec(3, 1, vec![-0.5, 0.25, 12.75]).unwrap();
        let config = PipelineConfig::builder()
            .tiff_compression(TiffCompression::Lzw)
            .build();

        StandardImageWriter
            .write_float_tiff(&raster, &path, &config)
            .unwrap();

        let mut decoder = tiff::decoder::Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 1));
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::F32(values) => {
                assert_eq!(values, vec![-0.5, 0.25, 12.75])
            }
            _ => panic!("expected f32 samples"),
        }
    }
}
