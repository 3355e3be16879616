//! Card Grader CLI - trading card condition analysis and grade prediction.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{grade::GradeArgs, Cli, Commands, ExitCode};
use config::AppConfig;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load();

    let exit_code = match cli.command {
        Some(Commands::Grade(args)) => grade(GradeArgs::with_config(args, &config)).await,
        Some(Commands::Standards(ref args)) => match commands::standards::run(args, &config) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                eprintln!("error: {e:#}");
                ExitCode::Error
            }
        },
        None => {
            // Default behavior: grade with flattened args
            if cli.grade.paths.is_empty() {
                eprintln!("error: No paths specified. Use --help for usage information.");
                return ExitCode::Error.into();
            }
            grade(GradeArgs::with_config(cli.grade, &config)).await
        }
    };

    exit_code.into()
}

async fn grade(args: GradeArgs) -> ExitCode {
    match commands::grade::run(&args).await {
        Ok(result) => result.exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error
        }
    }
}
