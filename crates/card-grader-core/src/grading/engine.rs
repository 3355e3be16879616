//! Aggregation of component outcomes into an [`AnalysisReport`].

use std::sync::Arc;

use tracing::{debug, warn};

use super::{compliance, suggestions};
use crate::domain::{
    AnalysisReport, CenteringRatio, Component, ComponentAnalysis, ComponentScore, Confidence,
    GradeTable, GradingStandard, GradingWeights, TableRef,
};
use crate::error::{GradingError, Result};

/// Score substituted for a component whose analyzer failed.
pub const NEUTRAL_SCORE: f64 = 50.0;
/// Strengths must score at least this.
pub const STRENGTH_THRESHOLD: f64 = 80.0;
/// Weaknesses must score below this.
pub const WEAKNESS_THRESHOLD: f64 = 70.0;
/// Distance from the best (or worst) score that still counts as a strength (or weakness).
pub const EXTREME_BAND: f64 = 3.0;

/// Turns four component outcomes into a graded report.
///
/// Holds the weights together with the shared grade table and standard;
/// cloning is cheap.
#[derive(Debug, Clone)]
pub struct GradingEngine {
    weights: GradingWeights,
    table: Arc<GradeTable>,
    standard: Arc<GradingStandard>,
}

impl GradingEngine {
    /// Creates an engine.
    #[must_use]
    pub const fn new(
        weights: GradingWeights,
        table: Arc<GradeTable>,
        standard: Arc<GradingStandard>,
    ) -> Self {
        Self {
            weights,
            table,
            standard,
        }
    }

    /// Returns the weights.
    #[must_use]
    pub const fn weights(&self) -> &GradingWeights {
        &self.weights
    }

    /// Returns the grade table.
    #[must_use]
    pub fn table(&self) -> &GradeTable {
        &self.table
    }

    /// Returns the grading standard.
    #[must_use]
    pub fn standard(&self) -> &GradingStandard {
        &self.standard
    }

    /// Grades one card.
    ///
    /// Outcomes may arrive in any order; a component with no outcome counts
    /// as failed. A single recoverable failure is replaced by
    /// [`NEUTRAL_SCORE`] and forces Low confidence. Two or more fail the run
    /// with [`GradingError::Analysis`], and any fatal error is returned as is.
    ///
    /// `target_grade` selects the compliance tier and defaults to the
    /// predicted grade.
    ///
    /// # Errors
    ///
    /// Returns the first fatal outcome, or `Analysis` when fewer than three
    /// components were measured.
    pub fn grade(
        &self,
        outcomes: impl IntoIterator<Item = (Component, Result<ComponentAnalysis>)>,
        target_grade: Option<u8>,
    ) -> Result<AnalysisReport> {
        let mut slots: [Option<Result<ComponentAnalysis>>; 4] = [None, None, None, None];
        for (component, outcome) in outcomes {
            slots[component.index()] = Some(outcome);
        }

        let mut measured: [Option<ComponentAnalysis>; 4] = [None, None, None, None];
        let mut failures: Vec<(Component, String)> = Vec::new();
        for (component, slot) in Component::ALL.into_iter().zip(slots) {
            match slot {
                Some(Ok(analysis)) => measured[component.index()] = Some(analysis),
                Some(Err(err)) if err.is_recoverable() => {
                    failures.push((component, err.to_string()));
                }
                Some(Err(err)) => return Err(err),
                None => failures.push((component, format!("{component} was not analyzed"))),
            }
        }

        if failures.len() >= 2 {
            let detail = failures
                .iter()
                .map(|(_, reason)| reason.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GradingError::Analysis(format!(
                "{} of 4 components failed: {detail}",
                failures.len()
            )));
        }
        for (component, reason) in &failures {
            warn!(%component, %reason, score = NEUTRAL_SCORE, "substituting neutral score");
        }

        let centering = measured[Component::Centering.index()]
            .as_ref()
            .and_then(ComponentAnalysis::centering);
        let horizontal = centering.map(|c| c.horizontal);
        let vertical = centering.map(|c| c.vertical);
        let stricter: Option<CenteringRatio> = centering.map(|c| c.stricter());

        let components: Vec<ComponentScore> = Component::ALL
            .into_iter()
            .zip(measured)
            .map(|(component, analysis)| {
                let substituted = analysis.is_none();
                let (score, details) = analysis.map_or((NEUTRAL_SCORE, None), |a| {
                    (a.score, Some(a.details))
                });
                ComponentScore {
                    component,
                    score,
                    grade: self.table.grade_for(score),
                    weight: self.weights.get(component),
                    substituted,
                    details,
                }
            })
            .collect();

        let overall_score = crate::domain::clamp_score(
            components.iter().map(|c| c.weight * c.score).sum::<f64>(),
        );
        let row = self.table.lookup(overall_score);
        let predicted_grade = row.grade;

        let confidence = if failures.is_empty() {
            Confidence::from_spread(spread(&components))
        } else {
            Confidence::Low
        };
        let (strengths, weaknesses) = extremes(&components);

        let target = target_grade.unwrap_or(predicted_grade);
        let tier = self.standard.tier(target);
        let centering_eval = compliance::evaluate_centering(horizontal, vertical, stricter, tier);
        let compliance =
            compliance::evaluate(&self.standard, target, overall_score, &components, stricter);

        let suggestions = suggestions::build(&suggestions::SuggestionContext {
            grade: predicted_grade,
            standard: self.standard.name(),
            table: &self.table,
            weaknesses: &weaknesses,
            substituted: &failures,
            stricter,
            centering_bound: centering_eval.required_for_grade,
        });

        debug!(
            overall_score,
            predicted_grade,
            %confidence,
            compliant = compliance.overall_compliant,
            "card graded"
        );

        Ok(AnalysisReport {
            overall_score,
            predicted_grade,
            grade_label: row.label.clone(),
            grade_description: row.description.clone(),
            confidence,
            components,
            centering: centering_eval,
            strengths,
            weaknesses,
            suggestions,
            compliance,
            grade_table: TableRef {
                name: self.table.name().to_string(),
                version: self.table.version().to_string(),
            },
        })
    }
}

fn spread(components: &[ComponentScore]) -> f64 {
    let max = components.iter().map(|c| c.score).fold(f64::MIN, f64::max);
    let min = components.iter().map(|c| c.score).fold(f64::MAX, f64::min);
    (max - min).max(0.0)
}

/// Strengths and weaknesses among measured components, in component order.
fn extremes(components: &[ComponentScore]) -> (Vec<Component>, Vec<Component>) {
    let measured: Vec<&ComponentScore> = components.iter().filter(|c| !c.substituted).collect();
    let max = measured.iter().map(|c| c.score).fold(f64::MIN, f64::max);
    let min = measured.iter().map(|c| c.score).fold(f64::MAX, f64::min);
    let strengths = measured
        .iter()
        .filter(|c| c.score >= STRENGTH_THRESHOLD && max - c.score <= EXTREME_BAND)
        .map(|c| c.component)
        .collect();
    let weaknesses = measured
        .iter()
        .filter(|c| c.score < WEAKNESS_THRESHOLD && c.score - min <= EXTREME_BAND)
        .map(|c| c.component)
        .collect();
    (strengths, weaknesses)
}
