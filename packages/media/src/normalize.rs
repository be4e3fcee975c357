use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::sniff::ImageKind;

/// Settings for the image normalization pass.
#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerConfig {
    /// Whether uploads are normalized at all. Default: true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Images wider than this are scaled to fit a square of this size. Default: 1920.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// JPEG re-encode quality (1-100). Default: 85.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_enabled() -> bool {
    true
}
fn default_max_dimension() -> u32 {
    1920
}
fn default_jpeg_quality() -> u8 {
    85
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Outcome of a normalization pass.
#[derive(Debug)]
pub enum Normalized {
    /// Keep the uploaded bytes as they are.
    Original,
    /// The image was downsampled and re-encoded.
    Transcoded {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
}

/// Downsamples oversized JPEG and PNG uploads.
///
/// Decoding or encoding failures never fail the upload: the original bytes
/// are kept and a warning is logged.
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    config: NormalizerConfig,
}

impl ImageNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Whether uploads of this kind go through [`ImageNormalizer::normalize`].
    pub fn applies_to(&self, kind: ImageKind) -> bool {
        self.config.enabled && matches!(kind, ImageKind::Jpeg | ImageKind::Png)
    }

    /// Normalize `data`, which claims to be an image of `kind`. CPU bound.
    pub fn normalize(&self, data: &[u8], kind: ImageKind) -> Normalized {
        if !self.applies_to(kind) {
            return Normalized::Original;
        }
        let format = match kind {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            _ => ImageFormat::Png,
        };

        match self.downsample(data, format) {
            Ok(Some((data, width, height))) => Normalized::Transcoded {
                data,
                width,
                height,
            },
            Ok(None) => Normalized::Original,
            Err(e) => {
                warn!(
                    error = %e,
                    format = ?format,
                    size = data.len(),
                    "Image normalization failed, keeping original bytes"
                );
                Normalized::Original
            }
        }
    }

    fn downsample(
        &self,
        data: &[u8],
        format: ImageFormat,
    ) -> Result<Option<(Vec<u8>, u32, u32)>, ImageError> {
        let max = self.config.max_dimension;
        let (width, height) = ImageReader::with_format(Cursor::new(data), format).into_dimensions()?;
        if width <= max {
            return Ok(None);
        }

        let image = image::load_from_memory_with_format(data, format)?;
        let resized = image.resize(max, max, FilterType::Lanczos3);

        let mut out = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
                let quality = self.config.jpeg_quality.clamp(1, 100);
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
            }
            _ => {
                resized.write_with_encoder(PngEncoder::new_with_quality(
                    &mut out,
                    CompressionType::Best,
                    PngFilter::Adaptive,
                ))?;
            }
        }

        debug!(
            from_width = width,
            from_height = height,
            to_width = resized.width(),
            to_height = resized.height(),
            bytes = out.len(),
            "Downsampled oversized image"
        );
        Ok(Some((out, resized.width(), resized.height())))
    }
}
