mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codelab-cli")]
#[command(about = "Codelab CLI - Run code and validate problems against the execution service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported languages and their execution-service ids
    Languages,

    /// Run a source file against a test file
    Run {
        /// Language name (e.g., python, cpp, js)
        #[arg(short, long)]
        language: String,

        /// Path to the source file
        #[arg(short, long)]
        source: PathBuf,

        /// JSON file with an array of {"input", "output"} test cases
        #[arg(short, long)]
        tests: PathBuf,

        /// Deadline for the whole batch in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Validate reference solutions of a problem
    Validate {
        /// Reference solution as language=path, repeatable
        #[arg(short, long = "solution", required = true)]
        solutions: Vec<String>,

        /// JSON file with an array of {"input", "output"} test cases
        #[arg(short, long)]
        tests: PathBuf,

        /// Keep going after the first failing language
        #[arg(long, default_value = "false")]
        report_all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let passed = match cli.command {
        Commands::Languages => {
            commands::list_languages();
            true
        }
        Commands::Run {
            language,
            source,
            tests,
            timeout_ms,
        } => commands::run(&language, &source, &tests, timeout_ms).await?,
        Commands::Validate {
            solutions,
            tests,
            report_all,
        } => commands::validate(&solutions, &tests, report_all).await?,
    };

    if !passed {
        std::process::exit(1);
    }

    Ok(())
}
