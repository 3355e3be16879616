//! Standards compliance.

use crate::domain::{
    CenteringEvaluation, CenteringRatio, Compliance, ComponentScore, GradingStandard,
    TierCompliance, TierRequirement,
};

/// One unmet requirement.
struct Failure {
    requirement: &'static str,
    message: String,
}

fn check_tier(
    tier: &TierRequirement,
    overall: f64,
    components: &[ComponentScore],
    stricter: Option<CenteringRatio>,
) -> Vec<Failure> {
    let mut failures = Vec::new();
    if overall < tier.min_overall {
        failures.push(Failure {
            requirement: "overall",
            message: format!("overall score {overall:.1} is below {:.1}", tier.min_overall),
        });
    }
    for score in components {
        let min = tier.min_for(score.component);
        if score.score < min {
            failures.push(Failure {
                requirement: score.component.name(),
                message: format!("{} score {:.1} is below {min:.1}", score.component, score.score),
            });
        }
    }
    if let Some(bound) = tier.max_centering {
        match stricter {
            Some(ratio) if ratio.within(&bound) => {}
            Some(ratio) => failures.push(Failure {
                requirement: "centering ratio",
                message: format!("centering {ratio} is worse than {bound}"),
            }),
            None => failures.push(Failure {
                requirement: "centering ratio",
                message: format!("centering could not be measured against {bound}"),
            }),
        }
    }
    failures
}

/// Centering compared with the bound of the target tier.
pub(crate) fn evaluate_centering(
    horizontal: Option<CenteringRatio>,
    vertical: Option<CenteringRatio>,
    stricter: Option<CenteringRatio>,
    tier: Option<&TierRequirement>,
) -> CenteringEvaluation {
    let required_for_grade = tier.and_then(|t| t.max_centering);
    let meets_standard = match (stricter, required_for_grade) {
        (_, None) => true,
        (Some(ratio), Some(bound)) => ratio.within(&bound),
        (None, Some(_)) => false,
    };
    CenteringEvaluation {
        horizontal,
        vertical,
        stricter,
        required_for_grade,
        meets_standard,
    }
}

/// Checks every tier of `standard`, highest first.
///
/// A target grade the standard has no tier for is reported as compliant:
/// the standard places no requirements on it.
pub(crate) fn evaluate(
    standard: &GradingStandard,
    target_grade: u8,
    overall: f64,
    components: &[ComponentScore],
    stricter: Option<CenteringRatio>,
) -> Compliance {
    let name = standard.name();
    let mut tiers = Vec::with_capacity(standard.tiers().len());
    let mut target_failures: Option<Vec<&'static str>> = None;

    for tier in standard.tiers() {
        let failures = check_tier(tier, overall, components, stricter);
        if tier.grade == target_grade {
            let mut requirements: Vec<&'static str> =
                failures.iter().map(|f| f.requirement).collect();
            requirements.dedup();
            target_failures = Some(requirements);
        }
        tiers.push(TierCompliance {
            grade: tier.grade,
            label: tier.label.clone(),
            compliant: failures.is_empty(),
            failures: failures.into_iter().map(|f| f.message).collect(),
        });
    }

    let highest = tiers.iter().find(|t| t.compliant);
    let highest_tier = highest.map(|t| t.grade);
    let highest_text = highest.map_or_else(
        || format!("no {name} tier achieved"),
        |t| format!("highest tier achieved: {name} {} ({})", t.grade, t.label),
    );

    let (overall_compliant, target_text) = match &target_failures {
        None => (true, format!("{name} defines no tier for grade {target_grade}")),
        Some(failed) if failed.is_empty() => (
            true,
            format!("Card meets all {name} {target_grade} requirements"),
        ),
        Some(failed) => (
            false,
            format!(
                "Card fails {name} {target_grade} requirements for: {}",
                failed.join(", ")
            ),
        ),
    };

    Compliance {
        standard: name.to_string(),
        target_grade,
        overall_compliant,
        tiers,
        highest_tier,
        summary: format!("{target_text}; {highest_text}"),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::{sample_standard, Component};

    fn scores(values: [f64; 4]) -> Vec<ComponentScore> {
        Component::ALL
            .iter()
            .zip(values)
            .map(|(component, score)| ComponentScore {
                component: *component,
                score,
                grade: 1,
                weight: 0.25,
                substituted: false,
                details: None,
            })
            .collect()
    }

    fn ratio(s: &str) -> Option<CenteringRatio> {
        Some(s.parse().expect("valid ratio"))
    }

    #[test]
    fn test_off_center_card_fails_top_tier() {
        let standard = sample_standard();
        let compliance = evaluate(
            &standard,
            10,
            96.0,
            &scores([98.8, 98.8, 98.8, 80.0]),
            ratio("60/40"),
        );
        assert!(!compliance.overall_compliant);
        let top = compliance.tier(10).expect("tier 10");
        assert!(!top.compliant);
        assert!(top.failures.iter().any(|f| f.contains("60/40")));
        assert_eq!(compliance.highest_tier, Some(9));
        assert!(compliance.summary.contains("centering ratio"), "{}", compliance.summary);
        assert!(compliance.summary.contains("TEST 9"), "{}", compliance.summary);
    }

    #[test]
    fn test_fully_compliant() {
        let compliance = evaluate(
            &sample_standard(),
            10,
            99.0,
            &scores([99.0; 4]),
            ratio("52/48"),
        );
        assert!(compliance.overall_compliant);
        assert_eq!(compliance.highest_tier, Some(10));
        assert!(compliance.tiers.iter().all(|t| t.compliant));
        assert!(compliance.summary.starts_with("Card meets all TEST 10"));
    }

    #[test]
    fn test_component_minimum_fails_tier() {
        let compliance = evaluate(
            &sample_standard(),
            9,
            90.0,
            &scores([95.0, 80.0, 95.0, 95.0]),
            ratio("50/50"),
        );
        let nine = compliance.tier(9).expect("tier 9");
        assert!(!nine.compliant);
        assert_eq!(nine.failures.len(), 1);
        assert!(nine.failures[0].starts_with("corners"));
        assert_eq!(compliance.highest_tier, Some(8));
    }

    #[test]
    fn test_unmeasured_centering_fails_bounded_tier() {
        let compliance = evaluate(&sample_standard(), 8, 90.0, &scores([90.0; 4]), None);
        assert!(!compliance.overall_compliant);
        assert!(compliance.highest_tier.is_none());
        assert!(compliance.summary.contains("no TEST tier achieved"));
    }

    #[test]
    fn test_missing_target_tier_is_compliant() {
        let compliance = evaluate(&sample_standard(), 3, 30.0, &scores([30.0; 4]), ratio("50/50"));
        assert!(compliance.overall_compliant);
        assert!(compliance.summary.contains("no tier for grade 3"));
    }

    #[test]
    fn test_evaluate_centering() {
        let standard = sample_standard();
        let eval = evaluate_centering(ratio("58/42"), ratio("50/50"), ratio("58/42"), standard.tier(10));
        assert!(!eval.meets_standard);
        assert_eq!(eval.required_for_grade, ratio("55/45"));

        let unbounded = evaluate_centering(None, None, None, None);
        assert!(unbounded.meets_standard);
    }
}
