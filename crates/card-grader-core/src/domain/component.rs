//! Graded components and the per-analyzer measurement types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CenteringRatio;

/// One of the four independently scored quality dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Straightness and continuity of the four card edges.
    Edges,
    /// Sharpness of the four card corners.
    Corners,
    /// Scratches, spots and print unevenness.
    Surface,
    /// Alignment of the printed border within the card.
    Centering,
}

impl Component {
    /// All components in report order.
    pub const ALL: [Self; 4] = [Self::Edges, Self::Corners, Self::Surface, Self::Centering];

    /// Lowercase component name as used in reports and configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Edges => "edges",
            Self::Corners => "corners",
            Self::Surface => "surface",
            Self::Centering => "centering",
        }
    }

    /// Position of this component in [`Component::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Edges => 0,
            Self::Corners => 1,
            Self::Surface => 2,
            Self::Centering => 3,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw output of a single analyzer, before weighting and grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentAnalysis {
    /// Component score, clamped to 0-100.
    pub score: f64,
    /// Analyzer-specific measurements.
    pub details: ComponentDetails,
}

impl ComponentAnalysis {
    /// Creates an analysis result, clamping the score to 0-100.
    #[must_use]
    pub fn new(score: f64, details: ComponentDetails) -> Self {
        Self {
            score: clamp_score(score),
            details,
        }
    }

    /// Returns the centering measurement, if this is a centering analysis.
    #[must_use]
    pub const fn centering(&self) -> Option<&CenteringDetails> {
        match &self.details {
            ComponentDetails::Centering(details) => Some(details),
            _ => None,
        }
    }
}

/// Clamps a score into 0-100, mapping NaN to 0.
#[must_use]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Analyzer-specific measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentDetails {
    /// Edge measurements.
    Edges(EdgeDetails),
    /// Corner measurements.
    Corners(CornerDetails),
    /// Surface measurements.
    Surface(SurfaceDetails),
    /// Centering measurements.
    Centering(CenteringDetails),
}

/// Physical card edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

/// Measurement of one edge strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMeasurement {
    /// Which edge was measured.
    pub side: Side,
    /// Fraction of the expected edge length that was detected (0-1).
    pub continuity: f64,
    /// Orientation consistency along the edge (0-1).
    pub smoothness: f64,
    /// Number of edge pixels found in the strip.
    pub edge_pixels: usize,
    /// Per-edge score (0-100).
    pub score: f64,
}

/// Details for edge analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDetails {
    /// Per-edge measurements in top, bottom, left, right order.
    pub edges: Vec<EdgeMeasurement>,
}

/// Corner position on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Measurement of one corner window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerMeasurement {
    /// Which corner was measured.
    pub position: CornerPosition,
    /// Maximum cornerness response relative to an ideal corner.
    pub response_ratio: f64,
    /// Gradient magnitude at the response peak relative to an ideal corner.
    pub gradient_ratio: f64,
    /// Per-corner score (0-100).
    pub score: f64,
}

/// Details for corner analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerDetails {
    /// Per-corner measurements.
    pub corners: Vec<CornerMeasurement>,
}

/// Details for surface analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDetails {
    /// Fraction of interior pixels flagged as defects.
    pub defect_fraction: f64,
    /// Score from the defect map (0-100).
    pub defect_score: f64,
    /// Tiles without structural edges that entered the uniformity check.
    pub flat_tiles: usize,
    /// Flat tiles whose variance deviates from the median.
    pub uneven_tiles: usize,
    /// Score from tile uniformity (0-100).
    pub uniformity_score: f64,
}

/// Margin widths in pixels between the printed border and the card frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// What the centering margins were measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenteringFrame {
    /// The detected outline of the card.
    CardOutline,
    /// The outer edges of the image.
    ImageBounds,
}

/// Details for centering analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenteringDetails {
    /// Left:right ratio.
    pub horizontal: CenteringRatio,
    /// Top:bottom ratio.
    pub vertical: CenteringRatio,
    /// Measured margins.
    pub margins: Margins,
    /// Reference frame for the margins.
    pub frame: CenteringFrame,
}

impl CenteringDetails {
    /// Returns the worse of the two axis ratios.
    #[must_use]
    pub fn stricter(&self) -> CenteringRatio {
        if self.horizontal.deviation() >= self.vertical.deviation() {
            self.horizontal
        } else {
            self.vertical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_order_and_names() {
        let names: Vec<_> = Component::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["edges", "corners", "surface", "centering"]);
        for (i, component) in Component::ALL.iter().enumerate() {
            assert_eq!(component.index(), i);
        }
    }

    #[test]
    fn test_clamp_score() {
        assert!((clamp_score(120.0) - 100.0).abs() < f64::EPSILON);
        assert!(clamp_score(-3.0).abs() < f64::EPSILON);
        assert!(clamp_score(f64::NAN).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stricter_ratio_picks_worse_axis() {
        let details = CenteringDetails {
            horizontal: CenteringRatio::from_margins(55.0, 45.0),
            vertical: CenteringRatio::from_margins(35.0, 65.0),
            margins: Margins {
                left: 55.0,
                right: 45.0,
                top: 35.0,
                bottom: 65.0,
            },
            frame: CenteringFrame::ImageBounds,
        };
        assert_eq!(details.stricter().to_string(), "65/35");
    }
}
