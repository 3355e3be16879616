//! Grading-company standards (PSA, BGS, ...).

use serde::{Deserialize, Serialize};

use super::{CenteringRatio, Component};
use crate::error::{GradingError, Result};

/// Requirements for one grade tier of a standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRequirement {
    /// Grade this tier awards.
    pub grade: u8,
    /// Tier label, e.g. "Gem Mint".
    pub label: String,
    /// Minimum overall score.
    pub min_overall: f64,
    /// Minimum edges score.
    #[serde(default)]
    pub min_edges: f64,
    /// Minimum corners score.
    #[serde(default)]
    pub min_corners: f64,
    /// Minimum surface score.
    #[serde(default)]
    pub min_surface: f64,
    /// Minimum centering score.
    #[serde(default)]
    pub min_centering: f64,
    /// Worst centering ratio accepted on the front ("55/45"). `None` means
    /// centering is not bounded for this tier.
    #[serde(default)]
    pub max_centering: Option<CenteringRatio>,
}

impl TierRequirement {
    /// Per-component minimum score.
    #[must_use]
    pub const fn min_for(&self, component: Component) -> f64 {
        match component {
            Component::Edges => self.min_edges,
            Component::Corners => self.min_corners,
            Component::Surface => self.min_surface,
            Component::Centering => self.min_centering,
        }
    }
}

/// A named grading standard: tiers sorted descending by grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingStandard {
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    tiers: Vec<TierRequirement>,
}

impl GradingStandard {
    /// Creates a validated standard.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::Configuration`] if the name is empty, there are
    /// no tiers, grades repeat or are not sorted descending, or a minimum
    /// falls outside 0-100.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tiers: Vec<TierRequirement>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GradingError::Configuration(
                "grading standard needs a name".to_string(),
            ));
        }
        let invalid =
            |msg: String| GradingError::Configuration(format!("standard '{name}': {msg}"));

        if tiers.is_empty() {
            return Err(invalid("no tiers defined".to_string()));
        }
        for tier in &tiers {
            if !(1..=10).contains(&tier.grade) {
                return Err(invalid(format!("tier grade {} is outside 1-10", tier.grade)));
            }
            let minimums = std::iter::once(("overall", tier.min_overall)).chain(
                Component::ALL
                    .iter()
                    .map(|component| (component.name(), tier.min_for(*component))),
            );
            for (what, value) in minimums {
                if !(0.0..=100.0).contains(&value) {
                    return Err(invalid(format!(
                        "tier {} {what} minimum {value} is outside 0-100",
                        tier.grade
                    )));
                }
            }
        }
        for pair in tiers.windows(2) {
            if pair[0].grade <= pair[1].grade {
                return Err(invalid(format!(
                    "tiers must be sorted descending by grade ({} before {})",
                    pair[0].grade, pair[1].grade
                )));
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            tiers,
        })
    }

    /// Standard name, e.g. "PSA".
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Tiers in descending grade order.
    #[must_use]
    pub fn tiers(&self) -> &[TierRequirement] {
        &self.tiers
    }

    /// Tier for an exact grade.
    #[must_use]
    pub fn tier(&self, grade: u8) -> Option<&TierRequirement> {
        self.tiers.iter().find(|tier| tier.grade == grade)
    }
}

#[derive(Deserialize)]
struct RawStandard {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "tier")]
    tiers: Vec<TierRequirement>,
}

impl<'de> Deserialize<'de> for GradingStandard {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawStandard::deserialize(deserializer)?;
        Self::new(raw.name, raw.description, raw.tiers).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn tier(grade: u8, min_overall: f64, min_component: f64, ratio: &str) -> TierRequirement {
        TierRequirement {
            grade,
            label: format!("Grade {grade}"),
            min_overall,
            min_edges: min_component,
            min_corners: min_component,
            min_surface: min_component,
            min_centering: 0.0,
            max_centering: Some(ratio.parse().expect("valid ratio")),
        }
    }

    /// Three-tier standard used by engine tests.
    pub(crate) fn sample_standard() -> GradingStandard {
        GradingStandard::new(
            "TEST",
            "",
            vec![
                tier(10, 95.0, 95.0, "55/45"),
                tier(9, 87.0, 85.0, "60/40"),
                tier(8, 78.0, 75.0, "65/35"),
            ],
        )
        .expect("sample standard is valid")
    }

    #[test]
    fn test_tier_lookup() {
        let standard = sample_standard();
        assert_eq!(standard.tier(9).map(|t| t.min_overall), Some(87.0));
        assert!(standard.tier(3).is_none());
    }

    #[test]
    fn test_min_for_component() {
        let standard = sample_standard();
        let top = standard.tier(10).expect("tier 10");
        assert!((top.min_for(Component::Corners) - 95.0).abs() < f64::EPSILON);
        assert!(top.min_for(Component::Centering).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_invalid_standards() {
        assert!(GradingStandard::new("", "", vec![tier(10, 95.0, 0.0, "55/45")]).is_err());
        assert!(GradingStandard::new("X", "", vec![]).is_err());
        assert!(GradingStandard::new(
            "X",
            "",
            vec![tier(9, 87.0, 0.0, "60/40"), tier(10, 95.0, 0.0, "55/45")]
        )
        .is_err());
        assert!(GradingStandard::new("X", "", vec![tier(10, 120.0, 0.0, "55/45")]).is_err());
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{"name":"PSA","tier":[
            {"grade":10,"label":"Gem Mint","min_overall":95,"min_corners":95,"max_centering":"55/45"},
            {"grade":1,"label":"Poor","min_overall":0}]}"#;
        let standard: GradingStandard = serde_json::from_str(json).expect("valid standard");
        assert_eq!(standard.tiers().len(), 2);
        assert!(standard.tier(1).and_then(|t| t.max_centering).is_none());
        assert_eq!(
            standard.tier(10).and_then(|t| t.max_centering).map(|r| r.to_string()),
            Some("55/45".to_string())
        );
    }
}
