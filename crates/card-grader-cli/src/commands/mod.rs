//! CLI command definitions and handlers.

pub mod grade;
pub mod standards;

use clap::{Parser, Subcommand};

/// Card Grader - trading card condition analysis and grade prediction
#[derive(Parser)]
#[command(name = "card-grader")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Shared grade arguments (paths, standard, output flags).
    #[command(flatten)]
    pub grade: grade::GradeArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Grade card images (the default when no subcommand is given)
    Grade(grade::GradeArgs),
    /// List the available grading standards and their tiers
    Standards(standards::StandardsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every card graded at or above the minimum grade.
    Success,
    /// At least one card graded below `--min-grade`.
    BelowMinGrade,
    /// The command failed.
    Error,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        match code {
            ExitCode::Success => Self::SUCCESS,
            ExitCode::BelowMinGrade => Self::from(1),
            ExitCode::Error => Self::from(2),
        }
    }
}
