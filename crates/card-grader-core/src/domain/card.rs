//! Card images and graded results.

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use super::AnalysisReport;
use crate::trace::TraceReport;

/// A decoded card image as loaded from a source.
#[derive(Debug, Clone)]
pub struct CardImage {
    /// Path (or other identifier) of the image.
    pub path: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Decoded image data.
    pub image: DynamicImage,
}

impl CardImage {
    /// Wraps a decoded image.
    #[must_use]
    pub fn new(path: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            path: path.into(),
            width: image.width(),
            height: image.height(),
            image,
        }
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> ImageDimensions {
        ImageDimensions {
            width: self.width,
            height: self.height,
        }
    }
}

/// Image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Color and grayscale working pair produced by the preprocessor.
///
/// Both views share the same dimensions, with the longer side at the
/// preprocessor's reference length.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    color: RgbImage,
    gray: GrayImage,
    original: ImageDimensions,
}

impl NormalizedImage {
    pub(crate) const fn new(color: RgbImage, gray: GrayImage, original: ImageDimensions) -> Self {
        Self {
            color,
            gray,
            original,
        }
    }

    /// Working width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    /// Working height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    /// Color view.
    #[must_use]
    pub const fn color(&self) -> &RgbImage {
        &self.color
    }

    /// Grayscale view.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Dimensions of the decoded input before rescaling.
    #[must_use]
    pub const fn original_dimensions(&self) -> ImageDimensions {
        self.original
    }
}

/// A graded card as written by the output layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedCard {
    /// Path to the card image.
    pub path: String,
    /// Time of grading (RFC 3339).
    pub timestamp: String,
    /// Dimensions of the input image.
    pub dimensions: ImageDimensions,
    /// The grading report.
    pub report: AnalysisReport,
    /// Trace of the run, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceReport>,
}
