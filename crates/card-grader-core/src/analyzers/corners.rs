//! Corner analysis.
//!
//! Each corner window is smoothed, stretched to the full intensity range and
//! searched for its peak Harris response. The peak is compared with an ideal
//! right-angle step corner that went through the same smoothing. Responses are
//! taken relative to the squared tensor trace, which keeps them independent of
//! contrast and of the slight softening left by rescaling.

use image::{GrayImage, Luma};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_cancelled, crop, fraction_of, intensity_range};
use crate::domain::{
    CardAnalyzer, Component, ComponentAnalysis, ComponentDetails, CornerDetails,
    CornerMeasurement, CornerPosition, NormalizedImage,
};
use crate::error::{GradingError, Result};
use crate::kernels::{self, Backend};

/// Side of the synthetic reference corner image.
const REFERENCE_SIZE: u32 = 64;

/// Blur applied to the ideal corner before the shared smoothing, so that a
/// corner softened by rescaling (up to about 1.5 pixels) still matches it.
const REFERENCE_SOFTENING: f32 = 1.5;

/// Configuration for corner analysis.
#[derive(Debug, Clone)]
pub struct CornerConfig {
    /// Window side as a fraction of the shorter image side.
    pub window_fraction: f64,
    /// Windows with a smaller intensity range than this score 0.
    pub min_contrast: u8,
    /// Harris sensitivity `k`, in `(0, 0.25)`.
    pub harris_k: f64,
    /// Structure tensor neighbourhood radius (window is `2r + 1` square).
    pub harris_radius: u32,
    /// Gaussian sigma applied to every window and to the reference.
    pub smoothing_sigma: f32,
    /// Weight of the response ratio in the corner score; the gradient ratio gets the rest.
    pub response_weight: f64,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            window_fraction: 0.12,
            min_contrast: 24,
            harris_k: 0.04,
            harris_radius: 5,
            smoothing_sigma: 2.0,
            response_weight: 0.7,
        }
    }
}

impl CornerConfig {
    fn validate(&self) -> Result<()> {
        if self.harris_k.is_nan() || self.harris_k <= 0.0 || self.harris_k >= 0.25 {
            return Err(GradingError::Configuration(format!(
                "corner harris_k must be in (0, 0.25), got {}",
                self.harris_k
            )));
        }
        if self.harris_radius == 0 {
            return Err(GradingError::Configuration(
                "corner harris_radius must be at least 1".to_string(),
            ));
        }
        if self.smoothing_sigma.is_nan() || self.smoothing_sigma < 0.0 {
            return Err(GradingError::Configuration(format!(
                "corner smoothing_sigma must not be negative, got {}",
                self.smoothing_sigma
            )));
        }
        if !(0.0..=1.0).contains(&self.response_weight) {
            return Err(GradingError::Configuration(format!(
                "corner response_weight must be in [0, 1], got {}",
                self.response_weight
            )));
        }
        Ok(())
    }
}

/// Peak Harris response and the strongest gradient around the peak.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HarrisPeak {
    /// `(det - k * trace^2) / trace^2` at the peak.
    response: f64,
    /// Largest gradient magnitude in the `(2r + 1)` square around the peak.
    gradient: f64,
}

/// Scores sharpness of the four card corners.
#[derive(Debug, Clone)]
pub struct CornerAnalyzer {
    config: CornerConfig,
    backend: Backend,
    reference: HarrisPeak,
}

impl CornerAnalyzer {
    /// Creates a corner analyzer. The ideal-corner reference is computed here,
    /// once, with the configured parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::Configuration`] for out-of-range parameters or
    /// when they leave the ideal corner without a positive response.
    pub fn new(config: CornerConfig, backend: Backend) -> Result<Self> {
        config.validate()?;
        let ideal = kernels::gaussian_blur(backend, &ideal_corner(), REFERENCE_SOFTENING);
        let reference = prepared_peak(backend, &config, &ideal);
        debug!(
            response = reference.response,
            gradient = reference.gradient,
            "ideal corner reference"
        );
        if reference.response <= 0.0 || reference.gradient <= 0.0 {
            return Err(GradingError::Configuration(format!(
                "corner parameters give the ideal corner no response \
                 (response {}, gradient {})",
                reference.response, reference.gradient
            )));
        }
        Ok(Self {
            config,
            backend,
            reference,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CornerConfig {
        &self.config
    }

    fn measure(&self, position: CornerPosition, window: &GrayImage) -> CornerMeasurement {
        let smoothed = kernels::gaussian_blur(self.backend, window, self.config.smoothing_sigma);
        let (lo, hi) = intensity_range(&smoothed);
        if hi.saturating_sub(lo) < self.config.min_contrast {
            debug!(?position, lo, hi, "corner window has too little contrast");
            return CornerMeasurement {
                position,
                response_ratio: 0.0,
                gradient_ratio: 0.0,
                score: 0.0,
            };
        }

        let peak = harris_peak(
            self.backend,
            &stretch(&smoothed, lo, hi),
            self.config.harris_k,
            self.config.harris_radius,
        );
        let response_ratio = (peak.response / self.reference.response).max(0.0);
        let gradient_ratio = (peak.gradient / self.reference.gradient).max(0.0);
        let weight = self.config.response_weight;
        let score = 100.0
            * (weight * response_ratio.min(1.0) + (1.0 - weight) * gradient_ratio.min(1.0));
        debug!(?position, response_ratio, gradient_ratio, score, "corner measured");
        CornerMeasurement {
            position,
            response_ratio,
            gradient_ratio,
            score,
        }
    }
}

/// Smooths and stretches `image` the way every corner window is, then finds its peak.
fn prepared_peak(backend: Backend, config: &CornerConfig, image: &GrayImage) -> HarrisPeak {
    let smoothed = kernels::gaussian_blur(backend, image, config.smoothing_sigma);
    let (lo, hi) = intensity_range(&smoothed);
    if hi <= lo {
        return HarrisPeak {
            response: 0.0,
            gradient: 0.0,
        };
    }
    harris_peak(
        backend,
        &stretch(&smoothed, lo, hi),
        config.harris_k,
        config.harris_radius,
    )
}

/// Combines per-corner scores as `0.6 * min + 0.4 * mean`.
///
/// The weakest corner dominates, while the mean keeps one bad corner from
/// zeroing the component.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_corner_scores(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    0.6 * min + 0.4 * mean
}

/// Dark image with a bright lower-right quadrant: a perfect right-angle corner.
fn ideal_corner() -> GrayImage {
    let half = REFERENCE_SIZE / 2;
    GrayImage::from_fn(REFERENCE_SIZE, REFERENCE_SIZE, |x, y| {
        Luma([if x >= half && y >= half { 255 } else { 0 }])
    })
}

/// Stretches `[lo, hi]` to the full 8-bit range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn stretch(window: &GrayImage, lo: u8, hi: u8) -> GrayImage {
    let range = f32::from(hi - lo);
    GrayImage::from_fn(window.width(), window.height(), |x, y| {
        let value = f32::from(window.get_pixel(x, y).0[0].saturating_sub(lo)) / range * 255.0;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Finds the maximum of `det(M) - k * trace(M)^2`, with `M` summed over a
/// `(2r + 1)` square of Sobel gradient products, and reports it relative to
/// `trace(M)^2` together with the strongest gradient around it.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn harris_peak(backend: Backend, image: &GrayImage, k: f64, radius: u32) -> HarrisPeak {
    let gradients = kernels::sobel(backend, image);
    let (width, height) = (image.width() as usize, image.height() as usize);
    let mut xx = vec![0.0f64; width * height];
    let mut yy = vec![0.0f64; width * height];
    let mut xy = vec![0.0f64; width * height];
    for i in 0..width * height {
        let (gx, gy) = gradients.at_index(i);
        let (gx, gy) = (f64::from(gx), f64::from(gy));
        xx[i] = gx * gx;
        yy[i] = gy * gy;
        xy[i] = gx * gy;
    }

    let r = radius as i64;
    let (w, h) = (width as i64, height as i64);
    let neighbourhood = |x: i64, y: i64| {
        ((y - r).max(0)..=(y + r).min(h - 1))
            .flat_map(move |ny| ((x - r).max(0)..=(x + r).min(w - 1)).map(move |nx| (nx, ny)))
    };

    let mut best: Option<(f64, f64, i64, i64)> = None;
    for y in 0..h {
        for x in 0..w {
            let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
            for (nx, ny) in neighbourhood(x, y) {
                let j = ny as usize * width + nx as usize;
                sxx += xx[j];
                syy += yy[j];
                sxy += xy[j];
            }
            let trace = sxx + syy;
            let response = sxx.mul_add(syy, -(sxy * sxy)) - k * trace * trace;
            match best {
                Some((peak, ..)) if peak >= response => {}
                _ => best = Some((response, trace, x, y)),
            }
        }
    }

    match best {
        Some((response, trace, x, y)) if trace > 0.0 => {
            let gradient = neighbourhood(x, y)
                .map(|(nx, ny)| gradients.magnitude_at(ny as usize * width + nx as usize))
                .fold(0.0f32, f32::max);
            HarrisPeak {
                response: response / (trace * trace),
                gradient: f64::from(gradient),
            }
        }
        _ => HarrisPeak {
            response: 0.0,
            gradient: 0.0,
        },
    }
}

impl CardAnalyzer for CornerAnalyzer {
    fn component(&self) -> Component {
        Component::Corners
    }

    fn analyze(
        &self,
        image: &NormalizedImage,
        cancel: &CancellationToken,
    ) -> Result<ComponentAnalysis> {
        let gray = image.gray();
        let (width, height) = gray.dimensions();
        let size = fraction_of(width.min(height), self.config.window_fraction);
        let windows = [
            (CornerPosition::TopLeft, 0, 0),
            (CornerPosition::TopRight, width - size, 0),
            (CornerPosition::BottomLeft, 0, height - size),
            (CornerPosition::BottomRight, width - size, height - size),
        ];

        let mut corners = Vec::with_capacity(4);
        for (position, x, y) in windows {
            check_cancelled(cancel)?;
            corners.push(self.measure(position, &crop(gray, x, y, size, size)));
        }
        let scores: Vec<f64> = corners.iter().map(|c| c.score).collect();
        Ok(ComponentAnalysis::new(
            aggregate_corner_scores(&scores),
            ComponentDetails::Corners(CornerDetails { corners }),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures;

    fn analyzer() -> CornerAnalyzer {
        CornerAnalyzer::new(CornerConfig::default(), Backend::active()).expect("valid config")
    }

    fn analyze(image: &NormalizedImage) -> (f64, CornerDetails) {
        let analysis = analyzer()
            .analyze(image, &CancellationToken::new())
            .expect("corner analysis");
        match analysis.details {
            ComponentDetails::Corners(details) => (analysis.score, details),
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_weights_weakest_corner() {
        let score = aggregate_corner_scores(&[100.0, 100.0, 100.0, 0.0]);
        assert!((score - 30.0).abs() < 1e-9, "expected 30, got {score}");
        let uniform = aggregate_corner_scores(&[80.0; 4]);
        assert!((uniform - 80.0).abs() < 1e-9);
        assert!(aggregate_corner_scores(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reference_corner_has_positive_response() {
        for backend in [Backend::Accelerated, Backend::Portable] {
            let analyzer =
                CornerAnalyzer::new(CornerConfig::default(), backend).expect("valid config");
            assert!(analyzer.reference.response > 0.0, "{backend:?}");
            assert!(analyzer.reference.gradient > 0.0, "{backend:?}");
        }
    }

    #[test]
    fn test_out_of_range_parameters_are_rejected() {
        for config in [
            CornerConfig {
                harris_k: 0.3,
                ..CornerConfig::default()
            },
            CornerConfig {
                harris_radius: 0,
                ..CornerConfig::default()
            },
            CornerConfig {
                response_weight: 1.5,
                ..CornerConfig::default()
            },
        ] {
            let err = CornerAnalyzer::new(config, Backend::Portable).expect_err("rejected");
            assert!(matches!(err, GradingError::Configuration(_)), "{err}");
        }
    }

    #[test]
    fn test_softened_corners_still_score_high() {
        let softened = kernels::gaussian_blur(Backend::Portable, &fixtures::card_gray(0), 0.8);
        let (score, _) = analyze(&fixtures::normalized(softened));
        assert!(score >= 95.0, "softened corners scored {score}");
    }

    #[test]
    fn test_low_contrast_corners_match_high_contrast() {
        let faded = GrayImage::from_fn(fixtures::WIDTH, fixtures::HEIGHT, |x, y| {
            Luma([if (30..670).contains(&x) && (30..970).contains(&y) { 150 } else { 90 }])
        });
        let (score, _) = analyze(&fixtures::normalized(faded));
        assert!(score >= 95.0, "faded corners scored {score}");
    }

    #[test]
    fn test_sharp_corners_score_high() {
        let (score, details) = analyze(&fixtures::perfect_card());
        assert!(score >= 95.0, "sharp corners scored {score}");
        for corner in &details.corners {
            assert!(
                corner.response_ratio > 0.9,
                "{:?} response ratio {}",
                corner.position,
                corner.response_ratio
            );
        }
    }

    #[test]
    fn test_rounded_corner_scores_lower() {
        let mut gray = fixtures::card_gray(0);
        // Round the top-left corner with a radius of 25 px.
        let (cx, cy, radius) = (55i64, 55i64, 25i64);
        for y in 30..55u32 {
            for x in 30..55u32 {
                let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
                if dx * dx + dy * dy > radius * radius {
                    gray.put_pixel(x, y, Luma([fixtures::BACKGROUND]));
                }
            }
        }
        let (score, details) = analyze(&fixtures::normalized(gray));
        let top_left = &details.corners[0];
        assert_eq!(top_left.position, CornerPosition::TopLeft);
        assert!(top_left.score < 80.0, "rounded corner scored {}", top_left.score);
        assert!(score < 90.0, "aggregate {score} should be pulled down");
    }

    #[test]
    fn test_flat_window_scores_zero() {
        let gray = GrayImage::from_pixel(700, 1000, Luma([200]));
        let (score, details) = analyze(&fixtures::normalized(gray));
        assert!(score.abs() < f64::EPSILON);
        assert!(details.corners.iter().all(|c| c.score.abs() < f64::EPSILON));
    }
}
