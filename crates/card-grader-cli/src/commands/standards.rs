//! Standards command - list the grading standards.

use std::path::PathBuf;

use anyhow::Result;
use card_grader_adapters::{standards_dir, StandardRegistry};
use card_grader_core::{GradingStandard, TierRequirement};
use clap::Args;

use crate::config::AppConfig;

/// Arguments for listing standards.
#[derive(Args, Clone)]
pub struct StandardsArgs {
    /// Directory of additional standard files
    #[arg(long, value_name = "DIR")]
    pub standards_dir: Option<PathBuf>,

    /// Print the standards as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the standards command.
pub fn run(args: &StandardsArgs, config: &AppConfig) -> Result<()> {
    let dir = args
        .standards_dir
        .clone()
        .or_else(|| config.data.standards_dir.clone())
        .unwrap_or_else(standards_dir);
    let registry = StandardRegistry::load(&dir)?;

    if args.json {
        let standards: Vec<&GradingStandard> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&standards)?);
        return Ok(());
    }

    for (i, standard) in registry.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", describe(standard));
    }
    Ok(())
}

/// Text listing of one standard.
fn describe(standard: &GradingStandard) -> String {
    let mut out = String::new();
    out.push_str(standard.name());
    if !standard.description().is_empty() {
        out.push_str(" - ");
        out.push_str(standard.description());
    }
    out.push('\n');
    for tier in standard.tiers() {
        out.push_str(&describe_tier(tier));
        out.push('\n');
    }
    out
}

fn describe_tier(tier: &TierRequirement) -> String {
    let mut line = format!(
        "  {:>2} {:<20} overall >= {:.0}",
        tier.grade, tier.label, tier.min_overall
    );
    let minimums = [
        ("edges", tier.min_edges),
        ("corners", tier.min_corners),
        ("surface", tier.min_surface),
        ("centering", tier.min_centering),
    ];
    for (name, min) in minimums {
        if min > 0.0 {
            line.push_str(&format!(", {name} >= {min:.0}"));
        }
    }
    if let Some(bound) = tier.max_centering {
        line.push_str(&format!(", centering {bound} or better"));
    }
    line
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_bundled_psa() {
        let registry = StandardRegistry::bundled().expect("bundled standards");
        let psa = registry.get("PSA").expect("psa");
        let text = describe(&psa);

        assert!(text.starts_with("PSA - "));
        let gem = text.lines().nth(1).expect("tier 10 line");
        assert!(gem.contains("10 Gem Mint"));
        assert!(gem.contains("overall >= 95"));
        assert!(gem.contains("corners >= 95"));
        assert!(gem.contains("centering 55/45 or better"));
        assert!(!gem.contains("centering >="));
    }
}
