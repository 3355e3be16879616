//! Component analyzers.
//!
//! Each analyzer implements [`CardAnalyzer`] for one component. The grading
//! pipeline holds them in the fixed [`Analyzer`] enum so that the set of
//! components is known at compile time.

mod centering;
mod corners;
mod edges;
mod surface;

use image::GrayImage;
use tokio_util::sync::CancellationToken;

use crate::domain::{CardAnalyzer, Component, ComponentAnalysis, NormalizedImage};
use crate::error::{GradingError, Result};

pub use centering::{centering_score, CenteringAnalyzer, CenteringConfig};
pub use corners::{aggregate_corner_scores, CornerAnalyzer, CornerConfig};
pub use edges::{EdgeAnalyzer, EdgeConfig};
pub use surface::{SurfaceAnalyzer, SurfaceConfig};

/// One of the four analyzers.
#[derive(Debug, Clone)]
pub enum Analyzer {
    Edge(EdgeAnalyzer),
    Corner(CornerAnalyzer),
    Surface(SurfaceAnalyzer),
    Centering(CenteringAnalyzer),
}

impl CardAnalyzer for Analyzer {
    fn component(&self) -> Component {
        match self {
            Self::Edge(a) => a.component(),
            Self::Corner(a) => a.component(),
            Self::Surface(a) => a.component(),
            Self::Centering(a) => a.component(),
        }
    }

    fn analyze(
        &self,
        image: &NormalizedImage,
        cancel: &CancellationToken,
    ) -> Result<ComponentAnalysis> {
        match self {
            Self::Edge(a) => a.analyze(image, cancel),
            Self::Corner(a) => a.analyze(image, cancel),
            Self::Surface(a) => a.analyze(image, cancel),
            Self::Centering(a) => a.analyze(image, cancel),
        }
    }
}

/// Returns [`GradingError::Cancelled`] once the token is set.
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(GradingError::Cancelled)
    } else {
        Ok(())
    }
}

/// Width of an edge strip: `fraction` of `length`, at least one pixel.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn fraction_of(length: u32, fraction: f64) -> u32 {
    ((f64::from(length) * fraction).round() as u32).clamp(1, length.max(1))
}

/// Copies a rectangular region out of an image.
pub(crate) fn crop(image: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> GrayImage {
    image::imageops::crop_imm(image, x, y, width, height).to_image()
}

/// Minimum and maximum intensity.
pub(crate) fn intensity_range(image: &GrayImage) -> (u8, u8) {
    image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])))
}

/// Hand-drawn cards for analyzer unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use image::{DynamicImage, GrayImage, Luma};

    use crate::domain::{ImageDimensions, NormalizedImage};

    pub(crate) const WIDTH: u32 = 700;
    pub(crate) const HEIGHT: u32 = 1000;
    pub(crate) const BACKGROUND: u8 = 30;
    pub(crate) const CARD: u8 = 230;
    pub(crate) const PRINT: u8 = 100;

    /// Card at (30, 30)-(670, 970) with the print area at (100, 100)-(600, 900),
    /// shifted right by `print_shift` pixels.
    pub(crate) fn card_gray(print_shift: i64) -> GrayImage {
        GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
            let (xi, yi) = (i64::from(x), i64::from(y));
            let on_card = (30..670).contains(&xi) && (30..970).contains(&yi);
            let in_print =
                (100 + print_shift..600 + print_shift).contains(&xi) && (100..900).contains(&yi);
            Luma([match (on_card, in_print) {
                (true, true) => PRINT,
                (true, false) => CARD,
                _ => BACKGROUND,
            }])
        })
    }

    pub(crate) fn normalized(gray: GrayImage) -> NormalizedImage {
        let color = DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
        let original = ImageDimensions {
            width: gray.width(),
            height: gray.height(),
        };
        NormalizedImage::new(color, gray, original)
    }

    pub(crate) fn perfect_card() -> NormalizedImage {
        normalized(card_gray(0))
    }
}
