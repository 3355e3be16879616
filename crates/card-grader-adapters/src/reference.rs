//! Reference data adapter: grade tables and grading standards.
//!
//! A reference copy of each is bundled into the binary. Standards can be
//! extended or overridden by dropping `*.toml` files into the standards
//! directory; grade tables are swapped by pointing at a file.

use anyhow::{Context, Result};
use card_grader_core::{GradeTable, GradingStandard};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bundled PSA-style grade table.
const BUNDLED_GRADE_TABLE: &str = include_str!("../data/grade_tables/psa-reference.toml");

/// Bundled standards, in listing order.
const BUNDLED_STANDARDS: &[(&str, &str)] = &[
    ("psa.toml", include_str!("../data/standards/psa.toml")),
    ("bgs.toml", include_str!("../data/standards/bgs.toml")),
];

/// Returns the user standards directory.
///
/// Uses `XDG_DATA_HOME/card-grader/standards` or
/// `~/.local/share/card-grader/standards`.
#[must_use]
pub fn standards_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("card-grader")
        .join("standards")
}

/// Parses the bundled reference grade table.
///
/// # Errors
///
/// Returns an error if the bundled table fails validation.
pub fn bundled_grade_table() -> Result<GradeTable> {
    toml::from_str(BUNDLED_GRADE_TABLE).context("Bundled grade table is invalid")
}

/// Loads and validates a grade table from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the table is invalid.
pub fn load_grade_table(path: &Path) -> Result<GradeTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read grade table: {}", path.display()))?;
    let table: GradeTable = toml::from_str(&content)
        .with_context(|| format!("Invalid grade table: {}", path.display()))?;
    debug!(
        "Loaded grade table {} v{} from {}",
        table.name(),
        table.version(),
        path.display()
    );
    Ok(table)
}

/// Grading standards available by name.
#[derive(Debug, Clone, Default)]
pub struct StandardRegistry {
    standards: Vec<Arc<GradingStandard>>,
}

impl StandardRegistry {
    /// Registry holding only the bundled standards.
    ///
    /// # Errors
    ///
    /// Returns an error if a bundled standard fails validation.
    pub fn bundled() -> Result<Self> {
        let mut registry = Self::default();
        for (file, content) in BUNDLED_STANDARDS {
            let standard: GradingStandard = toml::from_str(content)
                .with_context(|| format!("Bundled standard {file} is invalid"))?;
            registry.insert(standard);
        }
        Ok(registry)
    }

    /// Bundled standards plus every `*.toml` file in `dir`.
    ///
    /// A file whose standard shares a name with an existing one replaces it.
    /// Files that fail to parse are skipped with a warning; a missing
    /// directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a bundled standard is invalid or `dir` exists but
    /// cannot be read.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut registry = Self::bundled()?;
        if !dir.is_dir() {
            debug!("No standards directory at {}", dir.display());
            return Ok(registry);
        }

        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read standards directory: {}", dir.display()))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "toml"))
            .collect();
        paths.sort();

        for path in paths {
            match load_standard(&path) {
                Ok(standard) => {
                    debug!("Loaded standard {} from {}", standard.name(), path.display());
                    registry.insert(standard);
                }
                Err(e) => warn!("Skipping standard {}: {e:#}", path.display()),
            }
        }
        Ok(registry)
    }

    /// Adds a standard, replacing any with the same name.
    pub fn insert(&mut self, standard: GradingStandard) {
        let standard = Arc::new(standard);
        match self.position(standard.name()) {
            Some(index) => self.standards[index] = standard,
            None => self.standards.push(standard),
        }
    }

    /// Looks up a standard by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<GradingStandard>> {
        self.position(name).map(|index| Arc::clone(&self.standards[index]))
    }

    /// Like [`get`](Self::get), with an error listing the known names.
    ///
    /// # Errors
    ///
    /// Returns an error if no standard has that name.
    pub fn require(&self, name: &str) -> Result<Arc<GradingStandard>> {
        self.get(name).with_context(|| {
            format!(
                "Unknown grading standard '{name}' (available: {})",
                self.names().join(", ")
            )
        })
    }

    /// Standard names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.standards.iter().map(|s| s.name()).collect()
    }

    /// Iterates over the standards in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &GradingStandard> {
        self.standards.iter().map(AsRef::as_ref)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.standards
            .iter()
            .position(|s| s.name().eq_ignore_ascii_case(name))
    }
}

fn load_standard(path: &Path) -> Result<GradingStandard> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid standard in {}", path.display()))
}
