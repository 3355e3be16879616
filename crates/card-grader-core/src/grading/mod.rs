//! Grading: weighted aggregation, confidence, suggestions and standards compliance.

mod compliance;
mod engine;
mod suggestions;

pub use engine::{
    GradingEngine, EXTREME_BAND, NEUTRAL_SCORE, STRENGTH_THRESHOLD, WEAKNESS_THRESHOLD,
};
