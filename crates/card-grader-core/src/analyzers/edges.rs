//! Edge analysis.
//!
//! Each card edge is examined in a border strip. Vertical strips are rotated
//! so every strip is measured with the edge running along its x axis:
//! continuity counts the columns that have an edge pixel near the dominant
//! edge row, smoothness is the orientation coherence of the edge pixels.

use image::imageops;
use image::GrayImage;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_cancelled, crop, fraction_of};
use crate::domain::{
    CardAnalyzer, Component, ComponentAnalysis, ComponentDetails, EdgeDetails, EdgeMeasurement,
    NormalizedImage, Side,
};
use crate::error::Result;
use crate::kernels::{self, Backend};

/// Configuration for edge analysis.
///
/// Edges are found where the card meets the background inside each border
/// strip. A card cropped tight to the image leaves no background in the
/// strips, so every edge falls to `floor_score`; photograph or scan cards
/// with a visible margin around them, or raise `floor_score` for such input.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Strip width as a fraction of the perpendicular image dimension.
    pub strip_fraction: f64,
    /// Fraction of the edge length excluded at each end (corner zones).
    pub corner_exclusion: f64,
    /// Canny thresholds are `median * (1 -/+ threshold_sigma)`.
    pub threshold_sigma: f64,
    /// Lowest Canny low threshold, for dark strips.
    pub min_low_threshold: f64,
    /// Distance in pixels from the dominant edge row that still counts as on the edge.
    pub line_tolerance: u32,
    /// Weight of continuity in the per-edge score; smoothness gets the rest.
    pub continuity_weight: f64,
    /// Score of an edge with no detectable edge pixels (0-100).
    pub floor_score: f64,
    /// Blur applied before measuring orientation.
    pub orientation_sigma: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            strip_fraction: 0.08,
            corner_exclusion: 0.10,
            threshold_sigma: 0.33,
            min_low_threshold: 20.0,
            line_tolerance: 3,
            continuity_weight: 0.6,
            floor_score: 10.0,
            orientation_sigma: 1.4,
        }
    }
}

/// Scores straightness and continuity of the four card edges.
#[derive(Debug, Clone)]
pub struct EdgeAnalyzer {
    config: EdgeConfig,
    backend: Backend,
}

impl EdgeAnalyzer {
    /// Creates an edge analyzer.
    #[must_use]
    pub const fn new(config: EdgeConfig, backend: Backend) -> Self {
        Self { config, backend }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Extracts the strip for one side, rotated so the edge runs along x.
    fn strip(&self, gray: &GrayImage, side: Side) -> GrayImage {
        let (width, height) = gray.dimensions();
        let exclusion_x =
            fraction_of(width, self.config.corner_exclusion).min((width / 2).saturating_sub(1));
        let exclusion_y =
            fraction_of(height, self.config.corner_exclusion).min((height / 2).saturating_sub(1));
        let strip_h = fraction_of(height, self.config.strip_fraction);
        let strip_w = fraction_of(width, self.config.strip_fraction);
        let along_x = width - 2 * exclusion_x;
        let along_y = height - 2 * exclusion_y;

        match side {
            Side::Top => crop(gray, exclusion_x, 0, along_x, strip_h),
            Side::Bottom => crop(gray, exclusion_x, height - strip_h, along_x, strip_h),
            Side::Left => imageops::rotate90(&crop(gray, 0, exclusion_y, strip_w, along_y)),
            Side::Right => imageops::rotate90(&crop(
                gray,
                width - strip_w,
                exclusion_y,
                strip_w,
                along_y,
            )),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn measure(&self, side: Side, strip: &GrayImage) -> EdgeMeasurement {
        let median = f64::from(kernels::median(strip));
        let low = (median * (1.0 - self.config.threshold_sigma)).max(self.config.min_low_threshold);
        let high = (median * (1.0 + self.config.threshold_sigma)).max(low + 1.0);
        let edges = kernels::canny(self.backend, strip, low as f32, high as f32);

        let (width, height) = edges.dimensions();
        let mut row_counts = vec![0usize; height as usize];
        let mut pixels = Vec::new();
        for (x, y, p) in edges.enumerate_pixels() {
            if p.0[0] > 0 {
                row_counts[y as usize] += 1;
                pixels.push((x, y));
            }
        }

        if pixels.is_empty() {
            debug!(?side, "no edge pixels found");
            return EdgeMeasurement {
                side,
                continuity: 0.0,
                smoothness: 0.0,
                edge_pixels: 0,
                score: self.config.floor_score,
            };
        }

        // Dominant edge row; ties go to the lowest row index.
        let mode = row_counts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
            .map_or(0, |(row, _)| row as u32);
        let mut covered = vec![false; width as usize];
        for &(x, y) in &pixels {
            if y.abs_diff(mode) <= self.config.line_tolerance {
                covered[x as usize] = true;
            }
        }
        let continuity = covered.iter().filter(|&&c| c).count() as f64 / f64::from(width);

        let blurred = kernels::gaussian_blur(self.backend, strip, self.config.orientation_sigma);
        let gradients = kernels::sobel(self.backend, &blurred);
        let smoothness = orientation_coherence(pixels.iter().map(|&(x, y)| gradients.at(x, y)));

        let weight = self.config.continuity_weight;
        let score = 100.0 * (weight * continuity + (1.0 - weight) * smoothness);
        debug!(
            ?side,
            continuity,
            smoothness,
            edge_pixels = pixels.len(),
            score,
            "edge measured"
        );
        EdgeMeasurement {
            side,
            continuity,
            smoothness,
            edge_pixels: pixels.len(),
            score,
        }
    }
}

impl Default for EdgeAnalyzer {
    fn default() -> Self {
        Self::new(EdgeConfig::default(), Backend::active())
    }
}

/// `1 - circular variance` of gradient orientations taken modulo pi,
/// weighted by gradient magnitude.
fn orientation_coherence(gradients: impl Iterator<Item = (f32, f32)>) -> f64 {
    let (mut cos_sum, mut sin_sum, mut weight_sum) = (0.0f64, 0.0f64, 0.0f64);
    for (gx, gy) in gradients {
        let (gx, gy) = (f64::from(gx), f64::from(gy));
        let magnitude = gx.hypot(gy);
        if magnitude < 1e-6 {
            continue;
        }
        let doubled = 2.0 * gy.atan2(gx);
        cos_sum += magnitude * doubled.cos();
        sin_sum += magnitude * doubled.sin();
        weight_sum += magnitude;
    }
    if weight_sum <= 0.0 {
        0.0
    } else {
        (cos_sum.hypot(sin_sum) / weight_sum).clamp(0.0, 1.0)
    }
}

impl CardAnalyzer for EdgeAnalyzer {
    fn component(&self) -> Component {
        Component::Edges
    }

    #[allow(clippy::cast_precision_loss)]
    fn analyze(
        &self,
        image: &NormalizedImage,
        cancel: &CancellationToken,
    ) -> Result<ComponentAnalysis> {
        let gray = image.gray();
        let mut edges = Vec::with_capacity(4);
        for side in [Side::Top, Side::Bottom, Side::Left, Side::Right] {
            check_cancelled(cancel)?;
            let strip = self.strip(gray, side);
            edges.push(self.measure(side, &strip));
        }
        let score = edges.iter().map(|e| e.score).sum::<f64>() / edges.len() as f64;
        Ok(ComponentAnalysis::new(
            score,
            ComponentDetails::Edges(EdgeDetails { edges }),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures;
    use image::Luma;

    fn analyze(image: &NormalizedImage) -> (f64, EdgeDetails) {
        let analysis = EdgeAnalyzer::default()
            .analyze(image, &CancellationToken::new())
            .expect("edge analysis");
        match analysis.details {
            ComponentDetails::Edges(details) => (analysis.score, details),
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn test_perfect_card_edges_score_high() {
        let (score, details) = analyze(&fixtures::perfect_card());
        assert!(score >= 95.0, "perfect card edges scored {score}");
        assert_eq!(details.edges.len(), 4);
        for edge in &details.edges {
            assert!(edge.continuity > 0.95, "{:?} continuity {}", edge.side, edge.continuity);
            assert!(edge.smoothness > 0.95, "{:?} smoothness {}", edge.side, edge.smoothness);
        }
    }

    #[test]
    fn test_frame_filling_card_falls_to_floor_score() {
        let flat = fixtures::normalized(GrayImage::from_pixel(
            fixtures::WIDTH,
            fixtures::HEIGHT,
            Luma([fixtures::CARD]),
        ));
        let (score, details) = analyze(&flat);
        assert!((score - EdgeConfig::default().floor_score).abs() < 1e-9);
        assert!(details.edges.iter().all(|e| e.edge_pixels == 0));

        let lenient = EdgeAnalyzer::new(
            EdgeConfig {
                floor_score: 60.0,
                ..EdgeConfig::default()
            },
            Backend::Portable,
        )
        .analyze(&flat, &CancellationToken::new())
        .expect("edge analysis");
        assert!((lenient.score - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_chipped_edge_scores_lower() {
        let mut gray = fixtures::card_gray(0);
        // Notch knocked out of the top edge.
        for y in 30..45 {
            for x in 250..330 {
                gray.put_pixel(x, y, Luma([fixtures::BACKGROUND]));
            }
        }
        let (perfect, _) = analyze(&fixtures::perfect_card());
        let (chipped, details) = analyze(&fixtures::normalized(gray));
        assert!(chipped < perfect - 1.0, "chipped {chipped} vs perfect {perfect}");
        let top = &details.edges[0];
        assert_eq!(top.side, Side::Top);
        assert!(top.continuity < 0.95, "top continuity {}", top.continuity);
    }

    #[test]
    fn test_missing_edge_gets_floor_score() {
        let gray = GrayImage::from_pixel(700, 1000, Luma([128]));
        let (score, details) = analyze(&fixtures::normalized(gray));
        assert!((score - 10.0).abs() < 1e-9, "flat image scored {score}");
        assert!(details.edges.iter().all(|e| e.edge_pixels == 0));
    }

    #[test]
    fn test_orientation_coherence() {
        let aligned = orientation_coherence([(0.0, 5.0), (0.0, -3.0), (0.0, 1.0)].into_iter());
        assert!((aligned - 1.0).abs() < 1e-9, "opposite signs are the same orientation");

        let crossed = orientation_coherence([(1.0, 0.0), (0.0, 1.0)].into_iter());
        assert!(crossed < 1e-9, "perpendicular orientations cancel, got {crossed}");

        assert!(orientation_coherence(std::iter::empty()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cancelled_run_stops() {
        let token = CancellationToken::new();
        token.cancel();
        let result = EdgeAnalyzer::default().analyze(&fixtures::perfect_card(), &token);
        assert!(matches!(result, Err(crate::GradingError::Cancelled)));
    }
}
