//! The analysis report handed to the output layer.

use serde::{Deserialize, Serialize};

use super::{CenteringRatio, Component, ComponentDetails};

/// Score spread below which confidence is high.
pub const HIGH_CONFIDENCE_SPREAD: f64 = 15.0;
/// Score spread below which confidence is medium.
pub const MEDIUM_CONFIDENCE_SPREAD: f64 = 30.0;

/// Confidence in the predicted grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Confidence from the spread (max - min) of the component scores.
    #[must_use]
    pub fn from_spread(spread: f64) -> Self {
        if spread < HIGH_CONFIDENCE_SPREAD {
            Self::High
        } else if spread < MEDIUM_CONFIDENCE_SPREAD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        f.write_str(label)
    }
}

/// Weighted, graded score for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    /// Which component.
    pub component: Component,
    /// Score (0-100).
    pub score: f64,
    /// Grade for this score on the report's grade table.
    pub grade: u8,
    /// Weight used for the overall score.
    pub weight: f64,
    /// `true` if the analyzer failed and a neutral score was substituted.
    #[serde(default)]
    pub substituted: bool,
    /// Analyzer measurements; absent for substituted scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ComponentDetails>,
}

/// Centering compared against the standard's bound for the target grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenteringEvaluation {
    /// Left:right ratio, absent if centering could not be measured.
    pub horizontal: Option<CenteringRatio>,
    /// Top:bottom ratio, absent if centering could not be measured.
    pub vertical: Option<CenteringRatio>,
    /// The worse of the two axes.
    pub stricter: Option<CenteringRatio>,
    /// Bound for the target grade, absent if the tier has none.
    pub required_for_grade: Option<CenteringRatio>,
    /// `true` if the stricter ratio is within the bound.
    pub meets_standard: bool,
}

/// Result of checking one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCompliance {
    /// Tier grade.
    pub grade: u8,
    /// Tier label.
    pub label: String,
    /// `true` if every requirement is met.
    pub compliant: bool,
    /// Unmet requirements, in check order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

/// Standards compliance for a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compliance {
    /// Standard name.
    pub standard: String,
    /// Tier the card was checked against.
    pub target_grade: u8,
    /// `true` if the card meets the target tier.
    pub overall_compliant: bool,
    /// Every tier of the standard, highest first.
    pub tiers: Vec<TierCompliance>,
    /// Highest tier met, if any.
    pub highest_tier: Option<u8>,
    /// One-line summary.
    pub summary: String,
}

impl Compliance {
    /// Result for one tier.
    #[must_use]
    pub fn tier(&self, grade: u8) -> Option<&TierCompliance> {
        self.tiers.iter().find(|tier| tier.grade == grade)
    }
}

/// Name and version of the grade table a report was graded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub version: String,
}

/// Complete grading report for one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Weighted overall score (0-100).
    pub overall_score: f64,
    /// Predicted grade (1-10).
    pub predicted_grade: u8,
    /// Label of the predicted grade.
    pub grade_label: String,
    /// Description of the predicted grade.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub grade_description: String,
    /// Confidence in the prediction.
    pub confidence: Confidence,
    /// One entry per component, in component order.
    pub components: Vec<ComponentScore>,
    /// Centering against the standard.
    pub centering: CenteringEvaluation,
    /// Components that stand out as strong.
    pub strengths: Vec<Component>,
    /// Components that hold the grade back.
    pub weaknesses: Vec<Component>,
    /// Caveats and improvement hints, in a fixed order.
    pub suggestions: Vec<String>,
    /// Standards compliance.
    pub compliance: Compliance,
    /// Grade table used.
    pub grade_table: TableRef,
}

impl AnalysisReport {
    /// Score entry for one component.
    #[must_use]
    pub fn component(&self, component: Component) -> Option<&ComponentScore> {
        self.components.iter().find(|c| c.component == component)
    }

    /// Returns `true` if any component score was substituted.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.components.iter().any(|c| c.substituted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(Confidence::from_spread(0.0), Confidence::High);
        assert_eq!(Confidence::from_spread(14.9), Confidence::High);
        assert_eq!(Confidence::from_spread(15.0), Confidence::Medium);
        assert_eq!(Confidence::from_spread(29.9), Confidence::Medium);
        assert_eq!(Confidence::from_spread(30.0), Confidence::Low);
        assert_eq!(Confidence::from_spread(50.0), Confidence::Low);
    }

    #[test]
    fn test_confidence_serializes_capitalized() {
        let json = serde_json::to_string(&Confidence::Medium).unwrap_or_default();
        assert_eq!(json, "\"Medium\"");
    }
}
