mod artifact;
mod cmd_analyze;
mod cmd_clear;
mod cmd_generate;
mod cmd_scan;
mod cmd_status;
mod generate;
mod llm;
mod prompt;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "saga",
    version,
    about = "Incremental AI documentation generator for Python projects"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate documentation for a project
    Generate {
        /// Path to the project root
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Path to a configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Output directory for generated documentation
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Regenerate everything, ignoring the change ledger
        #[arg(long, short)]
        full: bool,
        /// Model to use (overrides config)
        #[arg(long, short)]
        model: Option<String>,
        /// API key (overrides ANTHROPIC_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Include test files in documentation
        #[arg(long)]
        include_tests: bool,
        /// Additional directory patterns to exclude (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        /// Show what would be documented without generating
        #[arg(long)]
        dry_run: bool,
    },
    /// List the files a generate run would process
    Scan {
        /// Path to the project root
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Path to a configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Include test files
        #[arg(long)]
        include_tests: bool,
        /// Print the project structure as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the structural analysis of one file as JSON
    Analyze {
        /// Source file to analyze
        file: PathBuf,
    },
    /// Show change-ledger statistics
    Status {
        /// Path to the project root
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Path to a configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Reset the change ledger, forcing a full rebuild next run
    Clear {
        /// Path to the project root
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Path to a configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Generate {
            path,
            config,
            output,
            full,
            model,
            api_key,
            include_tests,
            exclude,
            dry_run,
        } => cmd_generate::execute(cmd_generate::GenerateArgs {
            path,
            config,
            output,
            full,
            model,
            api_key,
            include_tests,
            exclude,
            dry_run,
        }),
        Command::Scan {
            path,
            config,
            include_tests,
            json,
        } => cmd_scan::execute(&path, config.as_deref(), include_tests, json),
        Command::Analyze { file } => cmd_analyze::execute(&file),
        Command::Status { path, config } => cmd_status::execute(&path, config.as_deref()),
        Command::Clear { path, config } => cmd_clear::execute(&path, config.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Load the configuration and point it at `path`.
pub(crate) fn load_config(
    path: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<saga_core::Config> {
    let mut config = match config_file {
        Some(file) => saga_core::Config::from_file(file)?,
        None => saga_core::Config::default(),
    };
    config.project_root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Ok(config)
}
