//! Centering analysis.
//!
//! The grayscale view is binarized at Otsu's level and its contours traced.
//! Quadrilateral-like contours are candidates; the inner printed border is
//! the largest candidate nested inside another, and its margins are measured
//! against the smallest candidate enclosing it (the card outline).

use image::GrayImage;
use imageproc::contours::{find_contours, Contour};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::check_cancelled;
use crate::domain::{
    CardAnalyzer, CenteringDetails, CenteringFrame, CenteringRatio, Component, ComponentAnalysis,
    ComponentDetails, Margins, NormalizedImage,
};
use crate::error::{GradingError, Result};
use crate::kernels::{self, Backend};

/// Configuration for centering analysis.
#[derive(Debug, Clone)]
pub struct CenteringConfig {
    /// Smallest bounding-box area of a candidate, as a fraction of the image.
    pub min_inner_area_fraction: f64,
    /// Contour area over bounding-box area at which a contour counts as rectangular.
    pub min_rectangularity: f64,
    /// Douglas-Peucker tolerance as a fraction of the contour's perimeter.
    pub dp_epsilon_fraction: f64,
    /// Penalty factor `k` in `100 - k * d^2`.
    pub penalty: f64,
}

impl Default for CenteringConfig {
    fn default() -> Self {
        Self {
            min_inner_area_fraction: 0.15,
            min_rectangularity: 0.85,
            dp_epsilon_fraction: 0.02,
            penalty: 0.2,
        }
    }
}

/// Score for a measured pair of ratios: `100 - k * d^2` on the worse axis.
#[must_use]
pub fn centering_score(horizontal: CenteringRatio, vertical: CenteringRatio, penalty: f64) -> f64 {
    let deviation = horizontal.deviation().max(vertical.deviation());
    (100.0 - penalty * deviation * deviation).clamp(0.0, 100.0)
}

/// Inclusive pixel bounding box of a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BoundingBox {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl BoundingBox {
    fn of(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(points.iter().fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    fn pixel_area(&self) -> f64 {
        f64::from(self.max_x - self.min_x + 1) * f64::from(self.max_y - self.min_y + 1)
    }

    fn span_area(&self) -> f64 {
        f64::from(self.max_x - self.min_x) * f64::from(self.max_y - self.min_y)
    }

    /// `true` if `self` lies strictly inside `outer`.
    const fn inside(&self, outer: &Self) -> bool {
        self.min_x > outer.min_x
            && self.min_y > outer.min_y
            && self.max_x < outer.max_x
            && self.max_y < outer.max_y
    }
}

/// Shoelace area of a closed polygon.
#[allow(clippy::cast_precision_loss)]
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}

/// Aligns the inner printed border relative to the card.
#[derive(Debug, Clone)]
pub struct CenteringAnalyzer {
    config: CenteringConfig,
    backend: Backend,
}

impl CenteringAnalyzer {
    /// Creates a centering analyzer.
    #[must_use]
    pub const fn new(config: CenteringConfig, backend: Backend) -> Self {
        Self { config, backend }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CenteringConfig {
        &self.config
    }

    fn is_quadrilateral(&self, contour: &Contour<i32>, bbox: &BoundingBox) -> bool {
        let span = bbox.span_area();
        if span > 0.0 && polygon_area(&contour.points) / span >= self.config.min_rectangularity {
            return true;
        }
        let epsilon = self.config.dp_epsilon_fraction * arc_length(&contour.points, true);
        let approx = approximate_polygon_dp(&contour.points, epsilon, true);
        approx.len() == 4
    }

    /// Bounding boxes of the plausible border contours.
    #[allow(clippy::cast_possible_wrap)]
    fn candidates(
        &self,
        gray: &GrayImage,
        cancel: &CancellationToken,
    ) -> Result<Vec<BoundingBox>> {
        let (width, height) = gray.dimensions();
        let level = kernels::otsu_level(self.backend, gray);
        let binary = GrayImage::from_fn(width, height, |x, y| {
            image::Luma([if gray.get_pixel(x, y).0[0] > level { 255 } else { 0 }])
        });
        check_cancelled(cancel)?;

        let contours = find_contours::<i32>(&binary);
        check_cancelled(cancel)?;

        let image_area = f64::from(width) * f64::from(height);
        let (max_x, max_y) = (width as i32 - 1, height as i32 - 1);
        let candidates = contours
            .iter()
            .filter_map(|contour| {
                let bbox = BoundingBox::of(&contour.points)?;
                let touches_border = bbox.min_x <= 0
                    || bbox.min_y <= 0
                    || bbox.max_x >= max_x
                    || bbox.max_y >= max_y;
                let large = bbox.pixel_area() / image_area >= self.config.min_inner_area_fraction;
                (large && !touches_border && self.is_quadrilateral(contour, &bbox)).then_some(bbox)
            })
            .collect::<Vec<_>>();
        debug!(
            level,
            contours = contours.len(),
            candidates = candidates.len(),
            "centering candidates"
        );
        Ok(candidates)
    }
}

impl Default for CenteringAnalyzer {
    fn default() -> Self {
        Self::new(CenteringConfig::default(), Backend::active())
    }
}

/// Picks the inner border and the frame to measure it against.
fn select_border(candidates: &[BoundingBox]) -> Option<(BoundingBox, Option<BoundingBox>)> {
    let by_area = |a: &&BoundingBox, b: &&BoundingBox| a.pixel_area().total_cmp(&b.pixel_area());
    let nested = candidates
        .iter()
        .filter(|c| candidates.iter().any(|outer| c.inside(outer)))
        .max_by(by_area);
    match nested {
        Some(inner) => {
            let frame = candidates
                .iter()
                .filter(|outer| inner.inside(outer))
                .min_by(by_area)
                .copied();
            Some((*inner, frame))
        }
        None => candidates.iter().max_by(by_area).map(|inner| (*inner, None)),
    }
}

impl CardAnalyzer for CenteringAnalyzer {
    fn component(&self) -> Component {
        Component::Centering
    }

    #[allow(clippy::cast_possible_wrap)]
    fn analyze(
        &self,
        image: &NormalizedImage,
        cancel: &CancellationToken,
    ) -> Result<ComponentAnalysis> {
        let gray = image.gray();
        let candidates = self.candidates(gray, cancel)?;
        let (inner, frame) = select_border(&candidates).ok_or_else(|| {
            GradingError::component(Component::Centering, "no plausible inner border found")
        })?;

        let (outer, frame_kind) = frame.map_or_else(
            || {
                let bounds = BoundingBox {
                    min_x: 0,
                    min_y: 0,
                    max_x: gray.width() as i32 - 1,
                    max_y: gray.height() as i32 - 1,
                };
                (bounds, CenteringFrame::ImageBounds)
            },
            |outline| (outline, CenteringFrame::CardOutline),
        );
        let margins = Margins {
            left: f64::from(inner.min_x - outer.min_x),
            right: f64::from(outer.max_x - inner.max_x),
            top: f64::from(inner.min_y - outer.min_y),
            bottom: f64::from(outer.max_y - inner.max_y),
        };

        let horizontal = CenteringRatio::from_margins(margins.left, margins.right);
        let vertical = CenteringRatio::from_margins(margins.top, margins.bottom);
        let score = centering_score(horizontal, vertical, self.config.penalty);
        debug!(%horizontal, %vertical, ?frame_kind, score, "centering measured");

        Ok(ComponentAnalysis::new(
            score,
            ComponentDetails::Centering(CenteringDetails {
                horizontal,
                vertical,
                margins,
                frame: frame_kind,
            }),
        ))
    }
}
