//! Card Grader Core - analyzers and grading engine
//!
//! This crate normalizes a card image, scores its edges, corners, surface
//! and centering concurrently, and aggregates the four scores into a grade
//! report checked against a grading standard.

pub mod analyzers;
pub mod domain;
pub mod error;
pub mod grading;
pub mod kernels;
pub mod pipeline;
pub mod ports;
pub mod preprocess;
pub mod trace;

pub use analyzers::{CenteringConfig, CornerConfig, EdgeConfig, SurfaceConfig};
pub use domain::{
    AnalysisReport, CardAnalyzer, CardImage, CenteringEvaluation, CenteringRatio, Compliance,
    Component, ComponentAnalysis, ComponentDetails, ComponentScore, Confidence, GradeRange,
    GradeTable, GradedCard, GradingStandard, GradingWeights, ImageDimensions, NormalizedImage,
    TierCompliance, TierRequirement,
};
pub use error::{GradingError, Result};
pub use grading::GradingEngine;
pub use kernels::{Backend, BackendPreference};
pub use pipeline::{analyze, Grader, GraderConfig, DEFAULT_TIME_BUDGET};
pub use ports::{ImageSource, ProgressEvent, ProgressSink, ReportOutput};
pub use preprocess::{PreprocessConfig, Preprocessor};
pub use trace::{CheckpointSummary, Checkpoints, TraceContext, TraceReport};
