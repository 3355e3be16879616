//! Deterministic improvement hints.
//!
//! Order: caveats for substituted components, one line per weakness in
//! component order, a grade-level remark, then what the next grade needs.

use crate::domain::{CenteringRatio, Component, GradeTable};

/// Inputs the templates draw on.
pub(crate) struct SuggestionContext<'a> {
    pub grade: u8,
    pub standard: &'a str,
    pub table: &'a GradeTable,
    pub weaknesses: &'a [Component],
    pub substituted: &'a [(Component, String)],
    pub stricter: Option<CenteringRatio>,
    pub centering_bound: Option<CenteringRatio>,
}

pub(crate) fn build(ctx: &SuggestionContext<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for (component, reason) in ctx.substituted {
        out.push(format!(
            "Could not analyze {component} ({reason}); a neutral score of 50 was used and \
             confidence is Low"
        ));
    }
    for &component in ctx.weaknesses {
        out.push(weakness_text(ctx, component));
    }
    out.push(grade_remark(ctx.grade).to_string());
    if let Some(hint) = next_grade_hint(ctx.table, ctx.grade) {
        out.push(hint);
    }
    out
}

fn weakness_text(ctx: &SuggestionContext<'_>, component: Component) -> String {
    let grade = ctx.grade;
    match component {
        Component::Edges if grade <= 7 => {
            "Edge wear is preventing a higher grade; graders look for sharp, clean edges"
                .to_string()
        }
        Component::Edges => {
            "Minor edge imperfections detected; protect the card with quality sleeves".to_string()
        }
        Component::Corners if grade <= 6 => {
            "Corner damage is holding the grade down; corners weigh heavily in grading"
                .to_string()
        }
        Component::Corners if grade <= 8 => {
            "Slight corner fraying detected; handle the card carefully to prevent more wear"
                .to_string()
        }
        Component::Corners => {
            "Corners show minor wear; store the card in a rigid holder to keep them sharp"
                .to_string()
        }
        Component::Surface if grade <= 5 => {
            "Surface defects are limiting the grade; scratches and scuffs are penalised heavily"
                .to_string()
        }
        Component::Surface if grade <= 7 => {
            "Minor surface wear detected; some wear is tolerated at this grade".to_string()
        }
        Component::Surface => {
            "Surface shows minimal wear; keep it free of fingerprints and scratches".to_string()
        }
        Component::Centering => match (ctx.stricter, ctx.centering_bound) {
            (Some(ratio), Some(bound)) => format!(
                "Centering is off at {ratio}; {} {grade} requires {bound} or better",
                ctx.standard
            ),
            (Some(ratio), None) => format!("Centering is off at {ratio}"),
            (None, _) => "Centering is off".to_string(),
        },
    }
}

const fn grade_remark(grade: u8) -> &'static str {
    if grade >= 9 {
        "Excellent card quality; it meets high grading standards"
    } else if grade >= 7 {
        "Good card quality with only minor flaws keeping it from a higher grade"
    } else {
        "Card shows wear consistent with its grade level"
    }
}

fn next_grade_hint(table: &GradeTable, grade: u8) -> Option<String> {
    let next = table.next_above(grade)?;
    let mut hint = format!(
        "To reach {} ({}), the overall score needs to be at least {}",
        next.grade, next.label, next.min_score
    );
    if let Some(sentence) = first_sentence(&next.description) {
        hint.push_str(": ");
        hint.push_str(sentence);
    }
    Some(hint)
}

fn first_sentence(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.find(". ").map_or(text, |end| &text[..=end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample_table;

    fn context<'a>(
        table: &'a GradeTable,
        grade: u8,
        weaknesses: &'a [Component],
        substituted: &'a [(Component, String)],
    ) -> SuggestionContext<'a> {
        SuggestionContext {
            grade,
            standard: "PSA",
            table,
            weaknesses,
            substituted,
            stricter: Some(CenteringRatio::from_margins(70.0, 30.0)),
            centering_bound: Some(CenteringRatio::from_margins(65.0, 35.0)),
        }
    }

    #[test]
    fn test_order_is_caveat_weakness_remark_hint() {
        let table = sample_table();
        let substituted = [(Component::Surface, "timed out".to_string())];
        let weaknesses = [Component::Corners, Component::Centering];
        let lines = build(&context(&table, 8, &weaknesses, &substituted));
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("surface"));
        assert!(lines[1].contains("corner fraying"));
        assert!(lines[2].contains("70/30") && lines[2].contains("PSA 8 requires 65/35"));
        assert!(lines[3].starts_with("Good card quality"));
        assert!(lines[4].starts_with("To reach 9"));
    }

    #[test]
    fn test_top_grade_has_no_hint() {
        let table = sample_table();
        let lines = build(&context(&table, 10, &[], &[]));
        assert_eq!(lines, vec![grade_remark(10).to_string()]);
    }

    #[test]
    fn test_templates_depend_on_grade() {
        let table = sample_table();
        let low = build(&context(&table, 4, &[Component::Surface], &[]));
        let high = build(&context(&table, 9, &[Component::Surface], &[]));
        assert_ne!(low[0], high[0]);
        assert_eq!(low[1], "Card shows wear consistent with its grade level");
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("One. Two."), Some("One."));
        assert_eq!(first_sentence("Only one"), Some("Only one"));
        assert_eq!(first_sentence("  "), None);
    }
}
