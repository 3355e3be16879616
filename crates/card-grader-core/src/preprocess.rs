//! Image decoding and normalization.
//!
//! All analyzer thresholds are tuned for a fixed working resolution, so
//! every input is rescaled until its longer side equals the reference length.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::domain::{ImageDimensions, NormalizedImage};
use crate::error::{GradingError, Result};

/// Configuration for the preprocessor.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Smallest accepted width or height of the input, in pixels.
    pub min_dimension: u32,
    /// Length of the longer side after normalization, in pixels.
    pub reference_length: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_dimension: 200,
            reference_length: 1000,
        }
    }
}

/// Decodes and normalizes card images.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Creates a preprocessor with the given configuration.
    #[must_use]
    pub const fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Decodes raw image bytes and normalizes the result.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::InvalidImage`] if the format is not recognised,
    /// decoding fails, or the image is too small.
    pub fn decode(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        if bytes.is_empty() {
            return Err(GradingError::InvalidImage("no image data".to_string()));
        }
        let format = image::guess_format(bytes)
            .map_err(|e| GradingError::InvalidImage(format!("unrecognised format: {e}")))?;
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| GradingError::InvalidImage(format!("decode failed: {e}")))?;
        self.normalize(&decoded)
    }

    /// Normalizes an already decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::InvalidImage`] if either dimension is below
    /// the configured minimum.
    pub fn normalize(&self, image: &DynamicImage) -> Result<NormalizedImage> {
        let (width, height) = (image.width(), image.height());
        if width < self.config.min_dimension || height < self.config.min_dimension {
            return Err(GradingError::InvalidImage(format!(
                "{width}x{height} is below the minimum of {min}x{min} pixels",
                min = self.config.min_dimension
            )));
        }

        let (target_w, target_h) = self.target_size(width, height);
        let color = if (target_w, target_h) == (width, height) {
            image.to_rgb8()
        } else {
            debug!(width, height, target_w, target_h, "rescaling card image");
            image
                .resize_exact(target_w, target_h, FilterType::Lanczos3)
                .to_rgb8()
        };
        let gray = DynamicImage::ImageRgb8(color.clone()).to_luma8();

        Ok(NormalizedImage::new(
            color,
            gray,
            ImageDimensions { width, height },
        ))
    }

    /// Size after scaling the longer side to the reference length.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let reference = self.config.reference_length;
        let longer = width.max(height);
        if longer == reference {
            return (width, height);
        }
        let scale = f64::from(reference) / f64::from(longer);
        let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
        if width >= height {
            (reference, scaled(height))
        } else {
            (scaled(width), reference)
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 130, 140])))
    }

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn test_rejects_small_images() {
        let result = Preprocessor::default().normalize(&solid(199, 600));
        assert!(matches!(result, Err(GradingError::InvalidImage(_))));
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        let preprocessor = Preprocessor::default();
        assert!(matches!(
            preprocessor.decode(b"definitely not an image"),
            Err(GradingError::InvalidImage(_))
        ));
        assert!(matches!(
            preprocessor.decode(&[]),
            Err(GradingError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_rescales_longer_side_to_reference() {
        let normalized = Preprocessor::default()
            .normalize(&solid(350, 500))
            .expect("normalize");
        assert_eq!(normalized.height(), 1000);
        assert_eq!(normalized.width(), 700);
        assert_eq!(normalized.color().dimensions(), normalized.gray().dimensions());
        assert_eq!(
            normalized.original_dimensions(),
            ImageDimensions {
                width: 350,
                height: 500
            }
        );
    }

    #[test]
    fn test_landscape_input() {
        let normalized = Preprocessor::default()
            .normalize(&solid(2000, 1400))
            .expect("normalize");
        assert_eq!((normalized.width(), normalized.height()), (1000, 700));
    }

    #[test]
    fn test_reference_sized_input_is_untouched() {
        let input = solid(700, 1000);
        let normalized = Preprocessor::default().normalize(&input).expect("normalize");
        assert_eq!(normalized.color(), &input.to_rgb8());
    }

    #[test]
    fn test_decode_png() {
        let bytes = png_bytes(&solid(300, 400));
        let normalized = Preprocessor::default().decode(&bytes).expect("decode");
        assert_eq!((normalized.width(), normalized.height()), (750, 1000));
        let luma = normalized.gray().get_pixel(10, 10).0[0];
        assert!((125..=135).contains(&luma), "unexpected gray level {luma}");
    }
}
