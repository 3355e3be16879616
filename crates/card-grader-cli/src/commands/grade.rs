//! Grade command - predict grades for card images.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use card_grader_adapters::{
    bundled_grade_table, load_grade_table, standards_dir, FsImageSource, StandardRegistry,
};
use card_grader_core::{
    BackendPreference, CardImage, GradedCard, Grader, GraderConfig, GradingWeights, ImageSource,
    ProgressEvent, ProgressSink, ReportOutput, DEFAULT_TIME_BUDGET,
};
use clap::{Args, ValueEnum};
use tracing::{debug, info, info_span, warn, Instrument};

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::{JsonOutput, ProgressBar, TextOutput};

/// Standard used when neither the CLI nor the config names one.
const DEFAULT_STANDARD: &str = "PSA";

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines (one JSON object per line)
    #[default]
    Jsonl,
    /// Single JSON array
    Json,
    /// Human-readable report
    Text,
}

impl OutputFormat {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::Jsonl),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Kernel backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Accelerated kernels when compiled in
    #[default]
    Auto,
    /// Portable in-crate kernels
    Portable,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Self::Auto,
            BackendArg::Portable => Self::Portable,
        }
    }
}

/// Parse and validate a grade (1-10).
fn parse_grade(s: &str) -> Result<u8, String> {
    let value: u8 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid grade"))?;
    if (1..=10).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 1..=10"))
    }
}

/// Parse a positive millisecond budget.
fn parse_budget(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number of milliseconds"))?;
    if value == 0 {
        Err("time budget must be greater than 0".to_string())
    } else {
        Ok(value)
    }
}

/// Shared arguments for card grading.
#[derive(Args, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct GradeArgs {
    /// Card images or directories to grade
    pub paths: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Grading standard to check compliance against (e.g. PSA, BGS)
    #[arg(long, value_name = "NAME")]
    pub standard: Option<String>,

    /// Grade tier to check compliance for (defaults to the predicted grade)
    #[arg(long, value_name = "N", value_parser = parse_grade)]
    pub target_grade: Option<u8>,

    /// Exit with code 1 if any card grades below N
    #[arg(long, value_name = "N", value_parser = parse_grade)]
    pub min_grade: Option<u8>,

    /// Grade table file overriding the bundled table
    #[arg(long, value_name = "FILE")]
    pub grade_table: Option<PathBuf>,

    /// Directory of additional standard files
    #[arg(long, value_name = "DIR")]
    pub standards_dir: Option<PathBuf>,

    /// Per-analyzer time budget in milliseconds
    #[arg(long, value_name = "MS", value_parser = parse_budget)]
    pub time_budget_ms: Option<u64>,

    /// Image kernel backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Include a trace of analyzer calls and checkpoints in the output
    #[arg(long)]
    pub trace: bool,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl GradeArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if !args.recursive {
            args.recursive = config.general.recursive.unwrap_or(false);
        }

        if args.standard.is_none() {
            args.standard.clone_from(&config.grading.standard);
        }
        args.target_grade = args.target_grade.or(config.grading.target_grade);
        if args.grade_table.is_none() {
            args.grade_table.clone_from(&config.grading.grade_table);
        }
        if args.standards_dir.is_none() {
            args.standards_dir.clone_from(&config.data.standards_dir);
        }
        args.time_budget_ms = args.time_budget_ms.or(config.grading.time_budget_ms);
        if args.backend.is_none() {
            args.backend = config
                .grading
                .backend
                .as_deref()
                .and_then(|name| BackendArg::from_str(name, true).ok());
        }

        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_deref()
                .and_then(OutputFormat::from_name);
        }
        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }

        args.config = Some(config.clone());

        args
    }

    /// Get standard name with fallback to PSA.
    fn standard(&self) -> &str {
        self.standard.as_deref().unwrap_or(DEFAULT_STANDARD)
    }

    /// Get standards directory with fallback to the user data directory.
    fn standards_dir(&self) -> PathBuf {
        self.standards_dir.clone().unwrap_or_else(standards_dir)
    }

    /// Get time budget with fallback to the core default.
    fn time_budget(&self) -> Duration {
        self.time_budget_ms
            .map_or(DEFAULT_TIME_BUDGET, Duration::from_millis)
    }

    /// Get output format with fallback to JSONL.
    fn format(&self) -> OutputFormat {
        self.format.unwrap_or(OutputFormat::Jsonl)
    }
}

/// Result of running the grade command.
#[allow(dead_code)] // Fields exposed for programmatic use
pub struct GradeResult {
    /// Number of cards graded.
    pub processed: usize,
    /// Number of images skipped.
    pub skipped: usize,
    /// Number of cards graded below `--min-grade`.
    pub below_min: usize,
    /// Exit code.
    pub exit_code: ExitCode,
}

/// Run the grade command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub async fn run(args: &GradeArgs) -> Result<GradeResult> {
    info!("Running grade command on {} paths", args.paths.len());

    if args.paths.is_empty() {
        anyhow::bail!("No paths specified");
    }

    let grader = build_grader(args)?;

    let source = FsImageSource::new(args.paths.clone(), args.recursive);
    let total = source.count_hint();

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress_bar = ProgressBar::new(total.map(|t| t as u64), args.quiet, show_progress);

    let output: Box<dyn ReportOutput> = match args.format() {
        OutputFormat::Jsonl => Box::new(JsonOutput::stdout()),
        OutputFormat::Json => Box::new(JsonOutput::array(Box::new(std::io::stdout()), args.pretty)),
        OutputFormat::Text => Box::new(TextOutput::stdout()),
    };

    let options = RunOptions {
        trace: args.trace,
        min_grade: args.min_grade,
    };
    process_images(&source, &grader, &progress_bar, output.as_ref(), options).await
}

/// Build the grader from merged args (CLI + config) and reference data.
fn build_grader(args: &GradeArgs) -> Result<Grader> {
    let config = args.config.clone().unwrap_or_default();

    let registry = StandardRegistry::load(&args.standards_dir())?;
    let standard = registry.require(args.standard())?;

    let table = match &args.grade_table {
        Some(path) => load_grade_table(path)?,
        None => bundled_grade_table()?,
    };
    debug!(
        "Grading against {} with table {} v{}",
        standard.name(),
        table.name(),
        table.version()
    );

    let weights = match config.weights.resolve() {
        Ok(Some(weights)) => weights,
        Ok(None) => GradingWeights::default(),
        Err(problem) => {
            warn!("{problem}; using default weights");
            GradingWeights::default()
        }
    };

    let grader_config = GraderConfig {
        edges: config.edge_config(),
        corners: config.corner_config(),
        surface: config.surface_config(),
        centering: config.centering_config(),
        time_budget: args.time_budget(),
        backend: args.backend.unwrap_or_default().into(),
        target_grade: args.target_grade,
        ..GraderConfig::default()
    };

    Grader::new(grader_config, weights, Arc::new(table), standard)
        .context("Invalid analyzer configuration")
}

/// Per-run switches for [`process_images`].
#[derive(Debug, Clone, Copy, Default)]
struct RunOptions {
    trace: bool,
    min_grade: Option<u8>,
}

/// Grade every image from the source and write the results.
async fn process_images(
    source: &dyn ImageSource,
    grader: &Grader,
    progress: &dyn ProgressSink,
    output: &dyn ReportOutput,
    options: RunOptions,
) -> Result<GradeResult> {
    let total = source.count_hint();
    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut below_min = 0usize;

    for (index, image_result) in source.images().enumerate() {
        let image = match image_result {
            Ok(img) => img,
            Err(e) => {
                // The error message carries the path via anyhow context
                progress.on_event(ProgressEvent::Skipped {
                    path: format!("image {index}"),
                    reason: format!("{e:#}"),
                });
                skipped += 1;
                continue;
            }
        };

        progress.on_event(ProgressEvent::Started {
            path: image.path.clone(),
            index,
            total,
        });

        let card = match grade_card(grader, image, options.trace).await {
            Ok(card) => card,
            Err((path, e)) => {
                warn!("Failed to grade {path}: {e:#}");
                progress.on_event(ProgressEvent::Skipped {
                    path,
                    reason: format!("{e:#}"),
                });
                skipped += 1;
                continue;
            }
        };

        if options
            .min_grade
            .is_some_and(|min| card.report.predicted_grade < min)
        {
            below_min += 1;
        }

        output.write(&card)?;
        progress.on_event(ProgressEvent::Completed {
            card: Box::new(card),
        });

        processed += 1;
    }

    output.flush()?;

    progress.on_event(ProgressEvent::Finished { processed, skipped });

    let exit_code = if processed == 0 && skipped > 0 {
        ExitCode::Error
    } else if below_min > 0 {
        ExitCode::BelowMinGrade
    } else {
        ExitCode::Success
    };

    Ok(GradeResult {
        processed,
        skipped,
        below_min,
        exit_code,
    })
}

/// Grade one card; on failure hands back its path alongside the error.
async fn grade_card(
    grader: &Grader,
    image: CardImage,
    trace: bool,
) -> std::result::Result<GradedCard, (String, anyhow::Error)> {
    let span = info_span!("card", path = %image.path);
    let dimensions = image.dimensions();

    let graded = async {
        if trace {
            grader
                .analyze_traced(&image.image)
                .await
                .map(|(report, trace)| (report, Some(trace)))
        } else {
            grader.analyze(&image.image).await.map(|report| (report, None))
        }
    }
    .instrument(span)
    .await;

    match graded.with_context(|| format!("Grading failed for {}", image.path)) {
        Ok((report, trace)) => Ok(GradedCard {
            path: image.path,
            timestamp: iso_timestamp(),
            dimensions,
            report,
            trace,
        }),
        Err(e) => Err((image.path, e)),
    }
}

/// Generate ISO 8601 UTC timestamp (RFC 3339 format).
fn iso_timestamp() -> String {
    match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Timestamp format failed: {e}");
            String::from("1970-01-01T00:00:00Z")
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use card_grader_test_support::{
        MockImageSource, MockProgressSink, MockReportOutput, SyntheticCardBuilder,
    };

    fn grader() -> Grader {
        let registry = StandardRegistry::bundled().expect("bundled standards");
        let table = bundled_grade_table().expect("bundled table");
        Grader::new(
            GraderConfig::default(),
            GradingWeights::default(),
            Arc::new(table),
            registry.require("PSA").expect("psa"),
        )
        .expect("default tuning")
    }

    async fn process(
        source: &MockImageSource,
        options: RunOptions,
    ) -> (GradeResult, MockReportOutput, MockProgressSink) {
        let output = MockReportOutput::new();
        let progress = MockProgressSink::new();
        let result = process_images(source, &grader(), &progress, &output, options)
            .await
            .expect("run completes");
        (result, output, progress)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreadable_images_are_skipped() {
        let source = MockImageSource::new(vec![
            SyntheticCardBuilder::perfect().build_card("perfect.png"),
        ])
        .with_failures(vec!["Failed to open image: corrupt.png".into()]);

        let (result, output, progress) = process(&source, RunOptions::default()).await;

        assert_eq!((result.processed, result.skipped), (1, 1));
        assert_eq!(result.exit_code, ExitCode::Success);
        let cards = output.cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].path, "perfect.png");
        assert_eq!(output.flush_count(), 1);
        assert_eq!(progress.started_count(), 1);
        assert_eq!(progress.completed_count(), 1);
        assert_eq!(progress.skipped_count(), 1);
        assert_eq!(progress.finished_counts(), Some((1, 1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_nothing_graded_is_an_error() {
        let source = MockImageSource::new(vec![CardImage::new(
            "tiny.png",
            SyntheticCardBuilder::too_small(),
        )])
        .with_failures(vec!["Failed to open image: corrupt.png".into()]);

        let (result, output, progress) = process(&source, RunOptions::default()).await;

        assert_eq!((result.processed, result.skipped), (0, 2));
        assert_eq!(result.exit_code, ExitCode::Error);
        assert!(output.cards().is_empty());
        assert_eq!(progress.skipped_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_source_succeeds() {
        let (result, output, progress) =
            process(&MockImageSource::empty(), RunOptions::default()).await;

        assert_eq!(result.processed, 0);
        assert_eq!(result.exit_code, ExitCode::Success);
        assert_eq!(output.flush_count(), 1);
        assert!(progress.has_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_min_grade_counts_cards_below() {
        let source = MockImageSource::new(vec![
            SyntheticCardBuilder::perfect().build_card("perfect.png"),
            SyntheticCardBuilder::perfect()
                .off_center(28, 0)
                .build_card("off-center.png"),
        ]);
        let options = RunOptions {
            min_grade: Some(10),
            ..RunOptions::default()
        };

        let (result, output, _) = process(&source, options).await;

        assert_eq!(result.processed, 2);
        assert_eq!(result.below_min, 1);
        assert_eq!(result.exit_code, ExitCode::BelowMinGrade);
        let grades: Vec<u8> = output.cards().iter().map(|c| c.report.predicted_grade).collect();
        assert_eq!(grades[0], 10);
        assert!(grades[1] < 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_trace_is_attached_on_request() {
        let source = MockImageSource::new(vec![
            SyntheticCardBuilder::perfect().build_card("perfect.png"),
        ]);
        let options = RunOptions {
            trace: true,
            ..RunOptions::default()
        };

        let (_, output, _) = process(&source, options).await;

        let cards = output.cards();
        assert!(cards[0].trace.is_some());
    }

    #[test]
    fn test_parse_grade() {
        assert_eq!(parse_grade("10"), Ok(10));
        assert_eq!(parse_grade("1"), Ok(1));
        assert!(parse_grade("0").is_err());
        assert!(parse_grade("11").is_err());
        assert!(parse_grade("nine").is_err());
    }

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget("250"), Ok(250));
        assert!(parse_budget("0").is_err());
        assert!(parse_budget("-5").is_err());
    }

    #[test]
    fn test_format_names() {
        assert_eq!(OutputFormat::from_name("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_name("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_name("xml"), None);
    }
}
