//! Component weighting.

use serde::{Deserialize, Serialize};

use super::Component;
use crate::error::{GradingError, Result};

/// Allowed distance of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Validated weights for the four components. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradingWeights {
    edges: f64,
    corners: f64,
    surface: f64,
    centering: f64,
}

impl GradingWeights {
    /// Creates validated weights.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::Configuration`] if any weight is outside 0-1
    /// or the weights do not sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
    pub fn new(edges: f64, corners: f64, surface: f64, centering: f64) -> Result<Self> {
        let weights = [edges, corners, surface, centering];
        for (component, weight) in Component::ALL.iter().zip(weights) {
            if !(0.0..=1.0).contains(&weight) {
                return Err(GradingError::Configuration(format!(
                    "{component} weight must be 0.0-1.0, got {weight}"
                )));
            }
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(GradingError::Configuration(format!(
                "weights must sum to 1.0, got {sum:.4}"
            )));
        }
        Ok(Self {
            edges,
            corners,
            surface,
            centering,
        })
    }

    /// Weight for one component.
    #[must_use]
    pub const fn get(&self, component: Component) -> f64 {
        match component {
            Component::Edges => self.edges,
            Component::Corners => self.corners,
            Component::Surface => self.surface,
            Component::Centering => self.centering,
        }
    }
}

impl Default for GradingWeights {
    /// 25% edges, 30% corners, 30% surface, 15% centering.
    fn default() -> Self {
        Self {
            edges: 0.25,
            corners: 0.30,
            surface: 0.30,
            centering: 0.15,
        }
    }
}

#[derive(Deserialize)]
struct RawWeights {
    edges: f64,
    corners: f64,
    surface: f64,
    centering: f64,
}

impl<'de> Deserialize<'de> for GradingWeights {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawWeights::deserialize(deserializer)?;
        Self::new(raw.edges, raw.corners, raw.surface, raw.centering)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = GradingWeights::default();
        let sum: f64 = Component::ALL.iter().map(|c| weights.get(*c)).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((weights.get(Component::Corners) - 0.30).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let result = GradingWeights::new(0.25, 0.25, 0.25, 0.30);
        assert!(matches!(result, Err(GradingError::Configuration(_))));

        let result = GradingWeights::new(0.25, 0.25, 0.25, 0.20);
        assert!(matches!(result, Err(GradingError::Configuration(_))));
    }

    #[test]
    fn test_weights_within_tolerance_accepted() {
        assert!(GradingWeights::new(0.25, 0.30, 0.30, 0.1505).is_ok());
        assert!(GradingWeights::new(1.0, 0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let result = GradingWeights::new(-0.1, 0.5, 0.3, 0.3);
        assert!(matches!(result, Err(GradingError::Configuration(msg)) if msg.contains("edges")));
    }
}
