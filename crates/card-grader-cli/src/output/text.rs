//! Human-readable report output.

use anyhow::Result;
use card_grader_core::{GradedCard, ReportOutput};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;

const RULE_WIDTH: usize = 70;

/// Text report output adapter.
pub struct TextOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl TextOutput {
    /// Creates a new text output writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a new text output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl ReportOutput for TextOutput {
    #[allow(clippy::significant_drop_tightening)]
    fn write(&self, card: &GradedCard) -> Result<()> {
        let text = render(card);
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.flush()?;
        Ok(())
    }
}

/// Renders one graded card as a text report.
// Writing to a String cannot fail, so the fmt results are discarded.
#[must_use]
pub fn render(card: &GradedCard) -> String {
    let report = &card.report;
    let standard = &report.compliance.standard;
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "CARD GRADING REPORT ({standard} standards)");
    let _ = writeln!(out, "{}", card.path);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Predicted grade: {}/10 ({})",
        report.predicted_grade, report.grade_label
    );
    let _ = writeln!(out, "Overall score:   {:.1}/100", report.overall_score);
    let _ = writeln!(out, "Confidence:      {}", report.confidence);

    if !report.grade_description.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Grade description:");
        let _ = writeln!(out, "  {}", report.grade_description);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Component breakdown:");
    let _ = writeln!(out, "{}", "-".repeat(50));
    for score in &report.components {
        let marker = if score.substituted {
            "[--]"
        } else if report.weaknesses.contains(&score.component) {
            "[!!]"
        } else {
            "[ok]"
        };
        let _ = write!(
            out,
            "  {marker} {:>10}: {:5.1}/100 (grade {:>2}, weight {:.2})",
            score.component.name(),
            score.score,
            score.grade,
            score.weight
        );
        if score.substituted {
            let _ = write!(out, " substituted");
        }
        let _ = writeln!(out);
    }

    let centering = &report.centering;
    let _ = writeln!(out);
    let _ = writeln!(out, "Centering:");
    match (centering.horizontal, centering.vertical) {
        (Some(h), Some(v)) => {
            let _ = writeln!(out, "  Left/right {h}, top/bottom {v}");
        }
        _ => {
            let _ = writeln!(out, "  Could not be measured");
        }
    }
    if let Some(bound) = centering.required_for_grade {
        let verdict = if centering.meets_standard {
            "meets standard"
        } else {
            "does not meet standard"
        };
        let _ = writeln!(
            out,
            "  Required for {standard} {}: {bound} or better ({verdict})",
            report.compliance.target_grade
        );
    }

    let _ = writeln!(out);
    let verdict = if report.compliance.overall_compliant {
        "PASS"
    } else {
        "FAIL"
    };
    let _ = writeln!(out, "Compliance [{verdict}]: {}", report.compliance.summary);

    if !report.strengths.is_empty() {
        let _ = writeln!(out, "Strengths:      {}", join(&report.strengths));
    }
    if !report.weaknesses.is_empty() {
        let _ = writeln!(out, "Limiting grade: {}", join(&report.weaknesses));
    }

    if !report.suggestions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Insights:");
        for suggestion in &report.suggestions {
            let _ = writeln!(out, "  - {suggestion}");
        }
    }

    if let Some(trace) = &card.trace {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Trace {} ({} calls, {:.1} ms)",
            trace.run_id,
            trace.calls.len(),
            trace.total_ms
        );
        if let Some(checkpoints) = &trace.checkpoints {
            let _ = write!(out, "{checkpoints}");
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    let _ = writeln!(out, "{rule}");
    out
}

fn join(components: &[card_grader_core::Component]) -> String {
    components
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}
