//! The grading pipeline: preprocessing, concurrent analyzers, then the engine.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use image::DynamicImage;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analyzers::{
    Analyzer, CenteringAnalyzer, CenteringConfig, CornerAnalyzer, CornerConfig, EdgeAnalyzer,
    EdgeConfig, SurfaceAnalyzer, SurfaceConfig,
};
use crate::domain::{
    AnalysisReport, CardAnalyzer, Component, ComponentAnalysis, GradeTable, GradingStandard,
    GradingWeights, NormalizedImage,
};
use crate::error::{GradingError, Result};
use crate::grading::GradingEngine;
use crate::kernels::{Backend, BackendPreference};
use crate::preprocess::{PreprocessConfig, Preprocessor};
use crate::trace::{Checkpoints, TraceContext, TraceReport};

/// Default time budget for a single analyzer call.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(10);

/// Tuning for a [`Grader`].
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Decoding and normalization.
    pub preprocess: PreprocessConfig,
    /// Edge analyzer tuning.
    pub edges: EdgeConfig,
    /// Corner analyzer tuning.
    pub corners: CornerConfig,
    /// Surface analyzer tuning.
    pub surface: SurfaceConfig,
    /// Centering analyzer tuning.
    pub centering: CenteringConfig,
    /// Budget for each analyzer call.
    pub time_budget: Duration,
    /// Kernel backend request; only the first grader in a process decides.
    pub backend: BackendPreference,
    /// Compliance tier to check; defaults to the predicted grade.
    pub target_grade: Option<u8>,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            edges: EdgeConfig::default(),
            corners: CornerConfig::default(),
            surface: SurfaceConfig::default(),
            centering: CenteringConfig::default(),
            time_budget: DEFAULT_TIME_BUDGET,
            backend: BackendPreference::Auto,
            target_grade: None,
        }
    }
}

/// Reusable grader owning the analyzers and the grading engine.
///
/// A grader holds no per-run state, so one instance can grade many images,
/// including concurrently.
#[derive(Debug, Clone)]
pub struct Grader {
    preprocessor: Preprocessor,
    analyzers: [Arc<Analyzer>; 4],
    engine: GradingEngine,
    time_budget: Duration,
    target_grade: Option<u8>,
    backend: Backend,
}

impl Grader {
    /// Creates a grader.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::Configuration`] when an analyzer rejects its tuning.
    pub fn new(
        config: GraderConfig,
        weights: GradingWeights,
        table: Arc<GradeTable>,
        standard: Arc<GradingStandard>,
    ) -> Result<Self> {
        let backend = Backend::select(config.backend);
        let analyzers = [
            Arc::new(Analyzer::Edge(EdgeAnalyzer::new(config.edges, backend))),
            Arc::new(Analyzer::Corner(CornerAnalyzer::new(config.corners, backend)?)),
            Arc::new(Analyzer::Surface(SurfaceAnalyzer::new(config.surface, backend))),
            Arc::new(Analyzer::Centering(CenteringAnalyzer::new(
                config.centering,
                backend,
            ))),
        ];
        Ok(Self {
            preprocessor: Preprocessor::new(config.preprocess),
            analyzers,
            engine: GradingEngine::new(weights, table, standard),
            time_budget: config.time_budget,
            target_grade: config.target_grade,
            backend,
        })
    }

    /// The grading engine.
    #[must_use]
    pub const fn engine(&self) -> &GradingEngine {
        &self.engine
    }

    /// The preprocessor.
    #[must_use]
    pub const fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Kernel backend in use.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Grades a decoded image.
    ///
    /// # Errors
    ///
    /// Returns `InvalidImage` for unusable input and `Analysis` when two or
    /// more analyzers fail.
    pub async fn analyze(&self, image: &DynamicImage) -> Result<AnalysisReport> {
        self.analyze_with_cancel(image, &CancellationToken::new())
            .await
    }

    /// Decodes and grades raw image bytes.
    ///
    /// # Errors
    ///
    /// As [`Grader::analyze`].
    pub async fn analyze_bytes(&self, bytes: &[u8]) -> Result<AnalysisReport> {
        let normalized = self.preprocessor.decode(bytes)?;
        self.analyze_normalized(normalized, &CancellationToken::new(), None)
            .await
    }

    /// Grades a decoded image, stopping early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// As [`Grader::analyze`], plus `Cancelled` when the token fires before
    /// the analyzers finish.
    pub async fn analyze_with_cancel(
        &self,
        image: &DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport> {
        let normalized = self.preprocessor.normalize(image)?;
        self.analyze_normalized(normalized, cancel, None).await
    }

    /// Grades a decoded image and returns the trace of the run with it.
    ///
    /// # Errors
    ///
    /// As [`Grader::analyze`].
    pub async fn analyze_traced(
        &self,
        image: &DynamicImage,
    ) -> Result<(AnalysisReport, TraceReport)> {
        let normalized = self.preprocessor.normalize(image)?;
        let longer_side = normalized.width().max(normalized.height());
        let trace = TraceContext::new();
        let report = self
            .analyze_normalized(normalized, &CancellationToken::new(), Some(&trace))
            .await?;
        let checkpoints = self.checkpoints(&report, longer_side, trace.calls().len());
        Ok((report, trace.finish(Some(checkpoints.evaluate()))))
    }

    /// Grades an image that was already normalized by this grader's preprocessor.
    ///
    /// # Errors
    ///
    /// As [`Grader::analyze_with_cancel`].
    pub async fn analyze_normalized(
        &self,
        image: NormalizedImage,
        cancel: &CancellationToken,
        trace: Option<&TraceContext>,
    ) -> Result<AnalysisReport> {
        let run_id = trace.map_or_else(Uuid::new_v4, TraceContext::run_id);
        let span = info_span!("analysis", run_id = %run_id);
        async {
            info!(
                width = image.width(),
                height = image.height(),
                backend = %self.backend,
                "grading started"
            );
            let outcomes = self.run_analyzers(image, cancel, trace).await?;
            let report = self.engine.grade(outcomes, self.target_grade)?;
            info!(
                overall = report.overall_score,
                grade = report.predicted_grade,
                confidence = %report.confidence,
                "grading finished"
            );
            Ok::<_, GradingError>(report)
        }
        .instrument(span)
        .await
    }

    /// Runs the four analyzers concurrently and joins their outcomes.
    async fn run_analyzers(
        &self,
        image: NormalizedImage,
        cancel: &CancellationToken,
        trace: Option<&TraceContext>,
    ) -> Result<Vec<(Component, Result<ComponentAnalysis>)>> {
        let image = Arc::new(image);
        let run = cancel.child_token();
        let calls = self.analyzers.iter().map(|analyzer| {
            let component = analyzer.component();
            let call = run_one(
                Arc::clone(analyzer),
                Arc::clone(&image),
                run.child_token(),
                self.time_budget,
            );
            async move {
                let outcome = match trace {
                    Some(trace) => trace.record(component, call).await,
                    None => call.await,
                };
                (component, outcome)
            }
        });

        tokio::select! {
            outcomes = join_all(calls) => {
                if cancel.is_cancelled() {
                    Err(GradingError::Cancelled)
                } else {
                    Ok(outcomes)
                }
            }
            () = cancel.cancelled() => {
                run.cancel();
                warn!("grading cancelled");
                Err(GradingError::Cancelled)
            }
        }
    }

    fn checkpoints(
        &self,
        report: &AnalysisReport,
        longer_side: u32,
        calls: usize,
    ) -> Checkpoints {
        let reference = self.preprocessor.config().reference_length;
        let substituted: Vec<&'static str> = report
            .components
            .iter()
            .filter(|c| c.substituted)
            .map(|c| c.component.name())
            .collect();
        let degraded = !substituted.is_empty();
        let overall = report.overall_score;
        let predicted = report.predicted_grade;
        let expected = self.engine.table().grade_for(overall);
        let centering_ok = report.centering.meets_standard;

        let mut checkpoints = Checkpoints::new();
        checkpoints
            .register(
                "image normalized to reference length",
                move || longer_side == reference,
                Some(json!({ "longer_side": longer_side, "reference": reference })),
            )
            .register(
                "every analyzer call recorded",
                move || calls == Component::ALL.len(),
                Some(json!({ "calls": calls })),
            )
            .register(
                "all components measured",
                move || !degraded,
                Some(json!({ "substituted": substituted })),
            )
            .register(
                "overall score within 0-100",
                move || (0.0..=100.0).contains(&overall),
                Some(json!({ "overall_score": overall })),
            )
            .register(
                "predicted grade matches grade table",
                move || predicted == expected,
                Some(json!({ "predicted": predicted, "table": expected })),
            )
            .register(
                "centering within target tier bound",
                move || centering_ok,
                None,
            );
        checkpoints
    }
}

/// Runs one analyzer on the blocking pool under a time budget.
///
/// On timeout the analyzer's token is cancelled so it stops at its next
/// checkpoint; the outcome is reported as [`GradingError::AnalysisTimeout`].
async fn run_one(
    analyzer: Arc<Analyzer>,
    image: Arc<NormalizedImage>,
    token: CancellationToken,
    budget: Duration,
) -> Result<ComponentAnalysis> {
    let component = analyzer.component();
    let task_token = token.clone();
    let task = tokio::task::spawn_blocking(move || analyzer.analyze(&image, &task_token));
    match tokio::time::timeout(budget, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => Err(GradingError::component(
            component,
            format!("analyzer task failed: {join_error}"),
        )),
        Err(_) => {
            token.cancel();
            warn!(%component, ?budget, "analyzer exceeded its time budget");
            Err(GradingError::AnalysisTimeout { component, budget })
        }
    }
}

/// Grades one image with default tuning.
///
/// # Errors
///
/// As [`Grader::analyze`].
pub async fn analyze(
    image: &DynamicImage,
    weights: GradingWeights,
    grade_table: Arc<GradeTable>,
    standard: Arc<GradingStandard>,
) -> Result<AnalysisReport> {
    Grader::new(GraderConfig::default(), weights, grade_table, standard)?
        .analyze(image)
        .await
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures;
    use crate::domain::{sample_standard, sample_table, Confidence};

    fn grader(config: GraderConfig) -> Grader {
        Grader::new(
            config,
            GradingWeights::default(),
            Arc::new(sample_table()),
            Arc::new(sample_standard()),
        )
        .expect("default tuning")
    }

    fn perfect() -> DynamicImage {
        DynamicImage::ImageLuma8(fixtures::card_gray(0))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_perfect_card_grades_ten() {
        let report = grader(GraderConfig::default())
            .analyze(&perfect())
            .await
            .expect("report");
        for score in &report.components {
            assert!(score.score >= 95.0, "{} scored {}", score.component, score.score);
            assert!(!score.substituted);
        }
        assert_eq!(report.predicted_grade, 10);
        assert_eq!(report.confidence, Confidence::High);
        assert!(report.compliance.overall_compliant, "{}", report.compliance.summary);
    }

    #[tokio::test]
    async fn test_zero_budget_times_out_every_analyzer() {
        let config = GraderConfig {
            time_budget: Duration::ZERO,
            ..GraderConfig::default()
        };
        let err = grader(config)
            .analyze(&perfect())
            .await
            .expect_err("no analyzer can finish");
        assert!(matches!(err, GradingError::Analysis(_)), "{err}");
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let token = CancellationToken::new();
        token.cancel();
        let err = grader(GraderConfig::default())
            .analyze_with_cancel(&perfect(), &token)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, GradingError::Cancelled));
    }

    #[tokio::test]
    async fn test_small_image_never_reaches_analyzers() {
        let tiny = DynamicImage::new_luma8(50, 50);
        let err = grader(GraderConfig::default())
            .analyze(&tiny)
            .await
            .expect_err("too small");
        assert!(matches!(err, GradingError::InvalidImage(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_traced_run_matches_untraced() {
        let grader = grader(GraderConfig::default());
        let plain = grader.analyze(&perfect()).await.expect("report");
        let (traced, trace) = grader.analyze_traced(&perfect()).await.expect("traced report");
        assert_eq!(plain, traced);
        assert_eq!(trace.calls.len(), 4);
        let checkpoints = trace.checkpoints.expect("checkpoints evaluated");
        assert!(checkpoints.all_passed(), "{checkpoints}");
        assert_eq!(checkpoints.results.len(), checkpoints.registered);
    }

    #[tokio::test]
    async fn test_analyze_bytes_rejects_garbage() {
        let err = grader(GraderConfig::default())
            .analyze_bytes(b"not an image")
            .await
            .expect_err("garbage");
        assert!(matches!(err, GradingError::InvalidImage(_)));
    }
}
