//! Core domain types for card grading.

mod analyzer;
mod card;
mod component;
mod grade_table;
mod ratio;
mod report;
mod standard;
mod weights;

pub use analyzer::CardAnalyzer;
pub use card::{CardImage, GradedCard, ImageDimensions, NormalizedImage};
pub use component::{
    clamp_score, CenteringDetails, CenteringFrame, Component, ComponentAnalysis, ComponentDetails,
    CornerDetails, CornerMeasurement, CornerPosition, EdgeDetails, EdgeMeasurement, Margins, Side,
    SurfaceDetails,
};
pub use grade_table::{GradeRange, GradeTable};
pub use ratio::CenteringRatio;
pub use report::{
    AnalysisReport, CenteringEvaluation, Compliance, ComponentScore, Confidence, TableRef,
    TierCompliance, HIGH_CONFIDENCE_SPREAD, MEDIUM_CONFIDENCE_SPREAD,
};
pub use standard::{GradingStandard, TierRequirement};
pub use weights::{GradingWeights, WEIGHT_SUM_TOLERANCE};

#[cfg(test)]
pub(crate) use grade_table::tests::sample_table;
#[cfg(test)]
pub(crate) use standard::tests::sample_standard;
