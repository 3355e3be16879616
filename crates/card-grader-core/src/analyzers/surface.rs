//! Surface analysis: scratches and spots from a morphological residual,
//! print unevenness from tile variance.

use image::GrayImage;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_cancelled, crop, fraction_of};
use crate::domain::{
    CardAnalyzer, Component, ComponentAnalysis, ComponentDetails, NormalizedImage, SurfaceDetails,
};
use crate::error::Result;
use crate::kernels::{self, Backend};

/// Configuration for surface analysis.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Margin excluded on each side, as a fraction of the perpendicular dimension.
    pub margin_fraction: f64,
    /// Residual above this many gray levels marks a defect pixel.
    pub residual_threshold: u8,
    /// Defect fraction at which the defect score reaches 0.
    pub sensitivity: f64,
    /// Number of tiles along each axis.
    pub tile_grid: u32,
    /// Tiles whose peak Sobel magnitude exceeds this contain printed design
    /// edges and are left out of the uniformity check.
    pub structure_gradient: f32,
    /// Absolute variance tolerance.
    pub abs_tolerance: f64,
    /// Variance tolerance relative to the median tile variance.
    pub rel_tolerance: f64,
    /// Weight of the defect score; uniformity gets the rest.
    pub defect_weight: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            margin_fraction: 0.08,
            residual_threshold: 24,
            sensitivity: 0.02,
            tile_grid: 8,
            structure_gradient: 200.0,
            abs_tolerance: 25.0,
            rel_tolerance: 1.0,
            defect_weight: 0.7,
        }
    }
}

/// Scores scratches, spots and print unevenness on the card interior.
#[derive(Debug, Clone)]
pub struct SurfaceAnalyzer {
    config: SurfaceConfig,
    backend: Backend,
}

impl SurfaceAnalyzer {
    /// Creates a surface analyzer.
    #[must_use]
    pub const fn new(config: SurfaceConfig, backend: Backend) -> Self {
        Self { config, backend }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Card interior: the image minus the edge-strip margins.
    fn interior(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let mx = fraction_of(width, self.config.margin_fraction).min((width - 1) / 2);
        let my = fraction_of(height, self.config.margin_fraction).min((height - 1) / 2);
        crop(gray, mx, my, width - 2 * mx, height - 2 * my)
    }

    #[allow(clippy::cast_precision_loss)]
    fn defect_fraction(&self, interior: &GrayImage) -> f64 {
        let baseline = kernels::open_close3(interior);
        let defects = interior
            .pixels()
            .zip(baseline.pixels())
            .filter(|(original, clean)| {
                original.0[0].abs_diff(clean.0[0]) > self.config.residual_threshold
            })
            .count();
        let area = u64::from(interior.width()) * u64::from(interior.height());
        if area == 0 {
            0.0
        } else {
            defects as f64 / area as f64
        }
    }

    /// Variances of the tiles that contain no structural edges.
    fn flat_tile_variances(
        &self,
        interior: &GrayImage,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>> {
        let gradients = kernels::sobel(self.backend, interior);
        let (width, height) = interior.dimensions();
        let grid = self.config.tile_grid.max(1);
        let mut variances = Vec::new();
        for ty in 0..grid {
            check_cancelled(cancel)?;
            let (y0, y1) = (ty * height / grid, (ty + 1) * height / grid);
            for tx in 0..grid {
                let (x0, x1) = (tx * width / grid, (tx + 1) * width / grid);
                if x0 == x1 || y0 == y1 {
                    continue;
                }
                let structured = (y0..y1).any(|y| {
                    (x0..x1).any(|x| gradients.magnitude(x, y) > self.config.structure_gradient)
                });
                if !structured {
                    variances.push(tile_variance(interior, x0, y0, x1, y1));
                }
            }
        }
        Ok(variances)
    }
}

impl Default for SurfaceAnalyzer {
    fn default() -> Self {
        Self::new(SurfaceConfig::default(), Backend::active())
    }
}

#[allow(clippy::cast_precision_loss)]
fn tile_variance(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
    let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
    for y in y0..y1 {
        for x in x0..x1 {
            let v = f64::from(image.get_pixel(x, y).0[0]);
            sum += v;
            sum_sq += v * v;
        }
    }
    let n = f64::from((x1 - x0) * (y1 - y0));
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 0 => (sorted[mid - 1] + sorted[mid]) / 2.0,
        _ => sorted[mid],
    }
}

impl CardAnalyzer for SurfaceAnalyzer {
    fn component(&self) -> Component {
        Component::Surface
    }

    #[allow(clippy::cast_precision_loss)]
    fn analyze(
        &self,
        image: &NormalizedImage,
        cancel: &CancellationToken,
    ) -> Result<ComponentAnalysis> {
        let interior = self.interior(image.gray());
        check_cancelled(cancel)?;

        let defect_fraction = self.defect_fraction(&interior);
        let sensitivity = self.config.sensitivity.max(f64::EPSILON);
        let defect_score = 100.0 * (1.0 - (defect_fraction / sensitivity).clamp(0.0, 1.0));
        check_cancelled(cancel)?;

        let variances = self.flat_tile_variances(&interior, cancel)?;
        let median = median_of(&variances);
        let tolerance = self
            .config
            .abs_tolerance
            .max(self.config.rel_tolerance * median);
        let uneven_tiles = variances
            .iter()
            .filter(|&&v| (v - median).abs() > tolerance)
            .count();
        let flat_tiles = variances.len();
        let uniformity_score = if flat_tiles == 0 {
            100.0
        } else {
            100.0 * (1.0 - uneven_tiles as f64 / flat_tiles as f64)
        };

        let weight = self.config.defect_weight;
        let score = weight * defect_score + (1.0 - weight) * uniformity_score;
        debug!(
            defect_fraction,
            defect_score,
            flat_tiles,
            uneven_tiles,
            uniformity_score,
            score,
            "surface measured"
        );
        Ok(ComponentAnalysis::new(
            score,
            ComponentDetails::Surface(SurfaceDetails {
                defect_fraction,
                defect_score,
                flat_tiles,
                uneven_tiles,
                uniformity_score,
            }),
        ))
    }
}
