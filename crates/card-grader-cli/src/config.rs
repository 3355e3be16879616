//! Configuration file support for card-grader.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/card-grader/config.toml` (lowest priority)
//! - Project-local: `.card-grader.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use card_grader_core::{CenteringConfig, CornerConfig, EdgeConfig, GradingWeights, SurfaceConfig};
use serde::Deserialize;
use tracing::{debug, info};

/// Output format names accepted in `[output] format`.
pub const FORMAT_NAMES: &[&str] = &["json", "jsonl", "text"];

/// Backend names accepted in `[grading] backend`.
pub const BACKEND_NAMES: &[&str] = &["auto", "portable"];

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Grading options.
    pub grading: GradingConfig,
    /// Component weights.
    pub weights: WeightsConfig,
    /// Edge analyzer tuning.
    pub edges: EdgesConfig,
    /// Corner analyzer tuning.
    pub corners: CornersConfig,
    /// Surface analyzer tuning.
    pub surface: SurfaceSection,
    /// Centering analyzer tuning.
    pub centering: CenteringSection,
    /// Output formatting settings.
    pub output: OutputConfig,
    /// Reference data locations.
    pub data: DataConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// Grading configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Grading standard name, e.g. "PSA".
    pub standard: Option<String>,
    /// Path to a grade table overriding the bundled one.
    pub grade_table: Option<PathBuf>,
    /// Compliance tier to check (1-10).
    pub target_grade: Option<u8>,
    /// Per-analyzer time budget in milliseconds.
    pub time_budget_ms: Option<u64>,
    /// Kernel backend: "auto" or "portable".
    pub backend: Option<String>,
}

/// Component weights; all four must be given together.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub edges: Option<f64>,
    pub corners: Option<f64>,
    pub surface: Option<f64>,
    pub centering: Option<f64>,
}

/// Edge analyzer tuning.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EdgesConfig {
    /// Strip width as a fraction of the image dimension.
    pub strip_fraction: Option<f64>,
    /// Fraction of each edge excluded near the corners.
    pub corner_exclusion: Option<f64>,
    /// Canny threshold spread around the median.
    pub threshold_sigma: Option<f64>,
    /// Pixel tolerance around the dominant edge line.
    pub line_tolerance: Option<u32>,
    /// Weight of continuity against smoothness (0.0-1.0).
    pub continuity_weight: Option<f64>,
    /// Score of an edge with no card boundary in its strip (0-100).
    pub floor_score: Option<f64>,
}

/// Corner analyzer tuning.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CornersConfig {
    /// Window side as a fraction of the shorter image side.
    pub window_fraction: Option<f64>,
    /// Minimum intensity range for a scorable window.
    pub min_contrast: Option<u8>,
    /// Harris sensitivity.
    pub harris_k: Option<f64>,
    /// Weight of the Harris response against the gradient (0.0-1.0).
    pub response_weight: Option<f64>,
}

/// Surface analyzer tuning.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SurfaceSection {
    /// Margin excluded on each side.
    pub margin_fraction: Option<f64>,
    /// Residual gray levels that mark a defect pixel.
    pub residual_threshold: Option<u8>,
    /// Defect fraction at which the defect score reaches 0.
    pub sensitivity: Option<f64>,
    /// Tiles along each axis.
    pub tile_grid: Option<u32>,
    /// Weight of the defect score against uniformity (0.0-1.0).
    pub defect_weight: Option<f64>,
}

/// Centering analyzer tuning.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CenteringSection {
    /// Smallest inner border area as a fraction of the image.
    pub min_inner_area_fraction: Option<f64>,
    /// Rectangularity needed for a border candidate.
    pub min_rectangularity: Option<f64>,
    /// Penalty factor for off-center ratios.
    pub penalty: Option<f64>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl" or "text".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

/// Reference data configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of additional standard files.
    pub standards_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/card-grader/config.toml`
    /// 2. Project-local: `.card-grader.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are reported as
    /// warnings and dropped, so the built-in default applies instead.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        for problem in config.validate() {
            eprintln!("warning: {problem}");
        }

        config
    }

    /// Drops every out-of-range value and returns one message per value dropped.
    pub fn validate(&mut self) -> Vec<String> {
        let mut problems = Vec::new();

        let fraction = |v: &f64| *v > 0.0 && *v < 0.5;
        let unit = |v: &f64| (0.0..=1.0).contains(v);
        let positive = |v: &f64| *v > 0.0;
        let p = &mut problems;

        check(&mut self.grading.target_grade, "grading.target_grade", "1-10", p, |g| {
            (1..=10).contains(g)
        });
        check(&mut self.grading.time_budget_ms, "grading.time_budget_ms", "above 0", p, |ms| {
            *ms > 0
        });
        check(&mut self.grading.backend, "grading.backend", "auto|portable", p, |b| {
            BACKEND_NAMES.contains(&b.as_str())
        });
        check(&mut self.output.format, "output.format", "json|jsonl|text", p, |f| {
            FORMAT_NAMES.contains(&f.as_str())
        });

        check(&mut self.edges.strip_fraction, "edges.strip_fraction", "0-0.5", p, fraction);
        check(&mut self.edges.corner_exclusion, "edges.corner_exclusion", "0-0.5", p, fraction);
        check(&mut self.edges.threshold_sigma, "edges.threshold_sigma", "0.0-1.0", p, unit);
        check(&mut self.edges.continuity_weight, "edges.continuity_weight", "0.0-1.0", p, unit);
        check(&mut self.edges.floor_score, "edges.floor_score", "0-100", p, |v| {
            (0.0..=100.0).contains(v)
        });
        check(&mut self.corners.window_fraction, "corners.window_fraction", "0-0.5", p, fraction);
        check(&mut self.corners.harris_k, "corners.harris_k", "0-0.25", p, |k| {
            *k > 0.0 && *k < 0.25
        });
        check(&mut self.corners.response_weight, "corners.response_weight", "0.0-1.0", p, unit);
        check(&mut self.surface.margin_fraction, "surface.margin_fraction", "0-0.5", p, fraction);
        check(&mut self.surface.sensitivity, "surface.sensitivity", "above 0", p, positive);
        check(&mut self.surface.tile_grid, "surface.tile_grid", "at least 1", p, |n| *n >= 1);
        check(&mut self.surface.defect_weight, "surface.defect_weight", "0.0-1.0", p, unit);
        check(
            &mut self.centering.min_inner_area_fraction,
            "centering.min_inner_area_fraction",
            "0-1",
            p,
            |v| *v > 0.0 && *v < 1.0,
        );
        check(
            &mut self.centering.min_rectangularity,
            "centering.min_rectangularity",
            "0-1",
            p,
            |v| *v > 0.0 && *v <= 1.0,
        );
        check(&mut self.centering.penalty, "centering.penalty", "above 0", p, positive);

        if let Err(problem) = self.weights.resolve() {
            problems.push(problem);
            self.weights = WeightsConfig::default();
        }

        problems
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // General
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        // Grading
        self.grading.standard = other.grading.standard.or_else(|| self.grading.standard.take());
        self.grading.grade_table = other
            .grading
            .grade_table
            .or_else(|| self.grading.grade_table.take());
        self.grading.target_grade = other.grading.target_grade.or(self.grading.target_grade);
        self.grading.time_budget_ms = other.grading.time_budget_ms.or(self.grading.time_budget_ms);
        self.grading.backend = other.grading.backend.or_else(|| self.grading.backend.take());

        // Weights are replaced as a group; mixing layers would break the sum.
        if other.weights.any_set() {
            self.weights = other.weights;
        }

        // Edges
        self.edges.strip_fraction = other.edges.strip_fraction.or(self.edges.strip_fraction);
        self.edges.corner_exclusion = other.edges.corner_exclusion.or(self.edges.corner_exclusion);
        self.edges.threshold_sigma = other.edges.threshold_sigma.or(self.edges.threshold_sigma);
        self.edges.line_tolerance = other.edges.line_tolerance.or(self.edges.line_tolerance);
        self.edges.continuity_weight = other
            .edges
            .continuity_weight
            .or(self.edges.continuity_weight);
        self.edges.floor_score = other.edges.floor_score.or(self.edges.floor_score);

        // Corners
        self.corners.window_fraction = other.corners.window_fraction.or(self.corners.window_fraction);
        self.corners.min_contrast = other.corners.min_contrast.or(self.corners.min_contrast);
        self.corners.harris_k = other.corners.harris_k.or(self.corners.harris_k);
        self.corners.response_weight = other.corners.response_weight.or(self.corners.response_weight);

        // Surface
        self.surface.margin_fraction = other.surface.margin_fraction.or(self.surface.margin_fraction);
        self.surface.residual_threshold = other
            .surface
            .residual_threshold
            .or(self.surface.residual_threshold);
        self.surface.sensitivity = other.surface.sensitivity.or(self.surface.sensitivity);
        self.surface.tile_grid = other.surface.tile_grid.or(self.surface.tile_grid);
        self.surface.defect_weight = other.surface.defect_weight.or(self.surface.defect_weight);

        // Centering
        self.centering.min_inner_area_fraction = other
            .centering
            .min_inner_area_fraction
            .or(self.centering.min_inner_area_fraction);
        self.centering.min_rectangularity = other
            .centering
            .min_rectangularity
            .or(self.centering.min_rectangularity);
        self.centering.penalty = other.centering.penalty.or(self.centering.penalty);

        // Output
        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
        self.output.progress = other.output.progress.or(self.output.progress);

        // Data
        self.data.standards_dir = other
            .data
            .standards_dir
            .or_else(|| self.data.standards_dir.take());
    }

    /// Edge analyzer config with file overrides applied.
    pub fn edge_config(&self) -> EdgeConfig {
        let mut config = EdgeConfig::default();
        let section = &self.edges;
        config.strip_fraction = section.strip_fraction.unwrap_or(config.strip_fraction);
        config.corner_exclusion = section.corner_exclusion.unwrap_or(config.corner_exclusion);
        config.threshold_sigma = section.threshold_sigma.unwrap_or(config.threshold_sigma);
        config.line_tolerance = section.line_tolerance.unwrap_or(config.line_tolerance);
        config.continuity_weight = section.continuity_weight.unwrap_or(config.continuity_weight);
        config.floor_score = section.floor_score.unwrap_or(config.floor_score);
        config
    }

    /// Corner analyzer config with file overrides applied.
    pub fn corner_config(&self) -> CornerConfig {
        let mut config = CornerConfig::default();
        let section = &self.corners;
        config.window_fraction = section.window_fraction.unwrap_or(config.window_fraction);
        config.min_contrast = section.min_contrast.unwrap_or(config.min_contrast);
        config.harris_k = section.harris_k.unwrap_or(config.harris_k);
        config.response_weight = section.response_weight.unwrap_or(config.response_weight);
        config
    }

    /// Surface analyzer config with file overrides applied.
    pub fn surface_config(&self) -> SurfaceConfig {
        let mut config = SurfaceConfig::default();
        let section = &self.surface;
        config.margin_fraction = section.margin_fraction.unwrap_or(config.margin_fraction);
        config.residual_threshold = section.residual_threshold.unwrap_or(config.residual_threshold);
        config.sensitivity = section.sensitivity.unwrap_or(config.sensitivity);
        config.tile_grid = section.tile_grid.unwrap_or(config.tile_grid);
        config.defect_weight = section.defect_weight.unwrap_or(config.defect_weight);
        config
    }

    /// Centering analyzer config with file overrides applied.
    pub fn centering_config(&self) -> CenteringConfig {
        let mut config = CenteringConfig::default();
        let section = &self.centering;
        config.min_inner_area_fraction = section
            .min_inner_area_fraction
            .unwrap_or(config.min_inner_area_fraction);
        config.min_rectangularity = section.min_rectangularity.unwrap_or(config.min_rectangularity);
        config.penalty = section.penalty.unwrap_or(config.penalty);
        config
    }
}

impl WeightsConfig {
    fn any_set(&self) -> bool {
        self.edges.is_some()
            || self.corners.is_some()
            || self.surface.is_some()
            || self.centering.is_some()
    }

    /// Configured weights, or `None` when the section is empty.
    ///
    /// # Errors
    ///
    /// Returns a message if only some weights are set or they do not form a
    /// valid weighting.
    pub fn resolve(&self) -> Result<Option<GradingWeights>, String> {
        if !self.any_set() {
            return Ok(None);
        }
        let (Some(edges), Some(corners), Some(surface), Some(centering)) =
            (self.edges, self.corners, self.surface, self.centering)
        else {
            return Err(
                "weights must set edges, corners, surface and centering together".to_string(),
            );
        };
        GradingWeights::new(edges, corners, surface, centering)
            .map(Some)
            .map_err(|e| format!("weights: {e}"))
    }
}

/// Clears `value` and records a problem if it fails `valid`.
fn check<T: std::fmt::Debug>(
    value: &mut Option<T>,
    key: &str,
    expected: &str,
    problems: &mut Vec<String>,
    valid: impl Fn(&T) -> bool,
) {
    if let Some(v) = value.as_ref() {
        if !valid(v) {
            problems.push(format!("{key} must be {expected}, got {v:?}; ignoring"));
            *value = None;
        }
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("card-grader").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.card-grader.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".card-grader.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
