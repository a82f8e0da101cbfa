//! In-process raster image conversion backed by the `image` crate.

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use super::{cross_pairs, file_size, ConversionEngine, ConversionOutcome};
use crate::error::EngineError;
use crate::job::ConversionOptions;

const FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp"];

const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Default)]
pub struct ImageEngine;

impl ImageEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ConversionEngine for ImageEngine {
    fn name(&self) -> &'static str {
        "image"
    }

    fn can_convert(&self, source_ext: &str, target_ext: &str) -> bool {
        FORMATS.contains(&source_ext) && FORMATS.contains(&target_ext)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn supported_pairs(&self) -> Vec<(&'static str, &'static str)> {
        cross_pairs(FORMATS)
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
        options: &ConversionOptions,
    ) -> Result<ConversionOutcome, EngineError> {
        let _span = tracing::info_span!("engine.image").entered();

        let quality = match options.quality {
            Some(q) if (1..=100).contains(&q) => q,
            Some(q) => {
                return Err(EngineError::InvalidOptions(format!(
                    "quality {} out of range 1-100",
                    q
                )))
            }
            None => DEFAULT_JPEG_QUALITY,
        };

        let mut img = image::open(input).map_err(|e| EngineError::Failed {
            engine: "image",
            message: format!("decode failed: {}", e),
        })?;

        if let Some((width, height)) = options.resolution {
            if width == 0 || height == 0 {
                return Err(EngineError::InvalidOptions(
                    "resolution dimensions must be non-zero".to_string(),
                ));
            }
            img = img.resize_exact(width, height, FilterType::Lanczos3);
        }

        let format = ImageFormat::from_extension(target_ext).ok_or_else(|| {
            EngineError::InvalidOptions(format!("unknown image format '{}'", target_ext))
        })?;

        // JPEG has no alpha channel.
        if format == ImageFormat::Jpeg && img.color().has_alpha() {
            img = flatten_onto_white(&img);
        }

        if format == ImageFormat::Jpeg {
            let file = fs::File::create(output).map_err(|e| EngineError::Failed {
                engine: "image",
                message: format!("could not create '{}': {}", output.display(), e),
            })?;
            let mut writer = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            img.write_with_encoder(encoder)
                .map_err(|e| EngineError::Failed {
                    engine: "image",
                    message: format!("encode failed: {}", e),
                })?;
        } else {
            img.save_with_format(output, format)
                .map_err(|e| EngineError::Failed {
                    engine: "image",
                    message: format!("encode failed: {}", e),
                })?;
        }

        Ok(ConversionOutcome {
            engine: "image",
            input_size: file_size(input, "image")?,
            output_size: file_size(output, "image")?,
        })
    }
}

/// Composites a transparent image onto a white background.
fn flatten_onto_white(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = image::RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(rgb)
}
