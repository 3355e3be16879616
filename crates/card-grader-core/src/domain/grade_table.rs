//! Score-to-grade mapping.

use serde::{Deserialize, Serialize};

use crate::error::{GradingError, Result};

/// Largest gap allowed between adjacent rows (integer-granularity tables).
const MAX_ROW_GAP: f64 = 1.0;

/// One row of a grade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRange {
    /// Grade awarded (1-10).
    pub grade: u8,
    /// Lowest score for this grade.
    pub min_score: f64,
    /// Highest score for this grade.
    pub max_score: f64,
    /// Short label, e.g. "Gem Mint".
    pub label: String,
    /// Longer description of the grade's condition requirements.
    #[serde(default)]
    pub description: String,
}

/// Versioned score-range table, sorted descending by grade.
///
/// Tables are reference data supplied from outside the engine; different
/// published sources disagree on some cutoffs, so each table carries its own
/// name and version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeTable {
    name: String,
    version: String,
    rows: Vec<GradeRange>,
}

impl GradeTable {
    /// Creates a validated grade table.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::Configuration`] if the rows are empty, not
    /// sorted strictly descending by grade, overlap, leave a gap wider than
    /// one point, or do not cover 0-100.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        rows: Vec<GradeRange>,
    ) -> Result<Self> {
        let name = name.into();
        let invalid =
            |msg: String| GradingError::Configuration(format!("grade table '{name}': {msg}"));

        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Err(invalid("table has no rows".to_string()));
        };
        if (first.max_score - 100.0).abs() > f64::EPSILON {
            return Err(invalid(format!(
                "highest row must end at 100, ends at {}",
                first.max_score
            )));
        }
        if last.min_score.abs() > f64::EPSILON {
            return Err(invalid(format!(
                "lowest row must start at 0, starts at {}",
                last.min_score
            )));
        }

        for row in &rows {
            if !(1..=10).contains(&row.grade) {
                return Err(invalid(format!("grade {} is outside 1-10", row.grade)));
            }
            if row.min_score > row.max_score {
                return Err(invalid(format!(
                    "grade {} has min {} above max {}",
                    row.grade, row.min_score, row.max_score
                )));
            }
        }

        for pair in rows.windows(2) {
            let (higher, lower) = (&pair[0], &pair[1]);
            if higher.grade <= lower.grade {
                return Err(invalid(format!(
                    "rows must be sorted descending by grade ({} before {})",
                    higher.grade, lower.grade
                )));
            }
            if lower.max_score >= higher.min_score {
                return Err(invalid(format!(
                    "grade {} ({}-{}) overlaps grade {} ({}-{})",
                    lower.grade,
                    lower.min_score,
                    lower.max_score,
                    higher.grade,
                    higher.min_score,
                    higher.max_score
                )));
            }
            if higher.min_score - lower.max_score > MAX_ROW_GAP {
                return Err(invalid(format!(
                    "gap between grade {} and grade {}",
                    lower.grade, higher.grade
                )));
            }
        }

        Ok(Self {
            name,
            version: version.into(),
            rows,
        })
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rows in descending grade order.
    #[must_use]
    pub fn rows(&self) -> &[GradeRange] {
        &self.rows
    }

    /// Returns the row a score falls into.
    ///
    /// The table is scanned once from the top; the first row whose minimum is
    /// at or below the score wins, so scores between integer rows (94.5 in a
    /// "87-94 / 95-100" table) fall to the lower grade.
    #[must_use]
    pub fn lookup(&self, score: f64) -> &GradeRange {
        let score = crate::domain::clamp_score(score);
        self.rows
            .iter()
            .find(|row| score >= row.min_score)
            .unwrap_or_else(|| self.lowest())
    }

    /// Grade for a score.
    #[must_use]
    pub fn grade_for(&self, score: f64) -> u8 {
        self.lookup(score).grade
    }

    /// Row for an exact grade, if the table has one.
    #[must_use]
    pub fn row(&self, grade: u8) -> Option<&GradeRange> {
        self.rows.iter().find(|row| row.grade == grade)
    }

    /// Row immediately above `grade`, if any.
    #[must_use]
    pub fn next_above(&self, grade: u8) -> Option<&GradeRange> {
        self.rows.iter().rev().find(|row| row.grade > grade)
    }

    fn lowest(&self) -> &GradeRange {
        // Construction guarantees at least one row.
        &self.rows[self.rows.len() - 1]
    }
}

#[derive(Deserialize)]
struct RawGradeTable {
    name: String,
    version: String,
    #[serde(rename = "grade")]
    rows: Vec<GradeRange>,
}

impl<'de> Deserialize<'de> for GradeTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawGradeTable::deserialize(deserializer)?;
        Self::new(raw.name, raw.version, raw.rows).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    fn row(grade: u8, min: f64, max: f64, label: &str) -> GradeRange {
        GradeRange {
            grade,
            min_score: min,
            max_score: max,
            label: label.to_string(),
            description: String::new(),
        }
    }

    /// Integer-granularity ten-grade table used by engine tests.
    pub(crate) fn sample_table() -> GradeTable {
        GradeTable::new(
            "sample",
            "test",
            vec![
                row(10, 95.0, 100.0, "Gem Mint"),
                row(9, 87.0, 94.0, "Mint"),
                row(8, 78.0, 86.0, "Near Mint-Mint"),
                row(7, 68.0, 77.0, "Near Mint"),
                row(6, 58.0, 67.0, "Excellent-Near Mint"),
                row(5, 48.0, 57.0, "Excellent"),
                row(4, 38.0, 47.0, "Very Good-Excellent"),
                row(3, 28.0, 37.0, "Very Good"),
                row(2, 18.0, 27.0, "Good"),
                row(1, 0.0, 17.0, "Poor"),
            ],
        )
        .expect("sample table is valid")
    }

    #[test]
    fn test_lookup_boundaries() {
        let table = sample_table();
        assert_eq!(table.grade_for(100.0), 10);
        assert_eq!(table.grade_for(95.0), 10);
        assert_eq!(table.grade_for(94.9), 9);
        assert_eq!(table.grade_for(87.0), 9);
        assert_eq!(table.grade_for(86.99), 8);
        assert_eq!(table.grade_for(0.0), 1);
        assert_eq!(table.grade_for(-5.0), 1);
        assert_eq!(table.grade_for(140.0), 10);
    }

    #[test]
    fn test_grade_is_monotonic_in_score() {
        let table = sample_table();
        let mut previous = table.grade_for(0.0);
        let mut score = 0.0;
        while score <= 100.0 {
            let grade = table.grade_for(score);
            assert!(grade >= previous, "grade dropped at score {score}");
            previous = grade;
            score += 0.25;
        }
    }

    #[test]
    fn test_rejects_overlapping_rows() {
        let result = GradeTable::new(
            "bad",
            "1",
            vec![row(10, 90.0, 100.0, "A"), row(9, 0.0, 92.0, "B")],
        );
        assert!(matches!(result, Err(GradingError::Configuration(msg)) if msg.contains("overlaps")));
    }

    #[test]
    fn test_rejects_gaps_and_bad_coverage() {
        let gap = GradeTable::new(
            "gap",
            "1",
            vec![row(10, 95.0, 100.0, "A"), row(9, 0.0, 90.0, "B")],
        );
        assert!(gap.is_err());

        let short = GradeTable::new("short", "1", vec![row(10, 10.0, 100.0, "A")]);
        assert!(short.is_err());

        let empty = GradeTable::new("empty", "1", vec![]);
        assert!(empty.is_err());
    }

    #[test]
    fn test_rejects_unsorted_rows() {
        let result = GradeTable::new(
            "unsorted",
            "1",
            vec![row(9, 50.0, 100.0, "A"), row(10, 0.0, 49.0, "B")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_alternate_grade_nine_cutoff_is_data() {
        // Same engine, different published cutoff for grade 9.
        let table = GradeTable::new(
            "alt",
            "2",
            vec![
                row(10, 95.0, 100.0, "Gem Mint"),
                row(9, 85.0, 94.0, "Mint"),
                row(1, 0.0, 84.0, "Rest"),
            ],
        )
        .expect("valid table");
        assert_eq!(table.grade_for(86.0), 9);
        assert_eq!(sample_table().grade_for(86.0), 8);
    }

    #[test]
    fn test_next_above() {
        let table = sample_table();
        assert_eq!(table.next_above(8).map(|r| r.grade), Some(9));
        assert!(table.next_above(10).is_none());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"name":"t","version":"1","grade":[
            {"grade":10,"min_score":50,"max_score":100,"label":"A"},
            {"grade":1,"min_score":0,"max_score":49,"label":"B"}]}"#;
        let table: GradeTable = serde_json::from_str(json).expect("valid table");
        assert_eq!(table.rows().len(), 2);

        let bad = r#"{"name":"t","version":"1","grade":[
            {"grade":10,"min_score":50,"max_score":90,"label":"A"}]}"#;
        assert!(serde_json::from_str::<GradeTable>(bad).is_err());
    }
}
