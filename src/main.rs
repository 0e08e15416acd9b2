//! # buildit CLI Entry Point
//!
//! Parses arguments with clap, installs the tracing subscriber and routes
//! each subcommand to the library.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::PathBuf;

use buildit::build::{self, BuildOptions};
use buildit::config::CONFIG_FILE;
use buildit::scheduler::Concurrency;
use buildit::tree;

#[derive(Parser)]
#[command(name = "buildit")]
#[command(about = "Incremental build engine for C/C++ projects", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the project file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log every rebuild decision
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every stale artifact
    Build {
        /// Parallel jobs: a number or `unbounded`. Without a value, 75% of the cores
        #[arg(short, long, num_args = 0..=1, default_missing_value = "auto")]
        jobs: Option<String>,
        /// Rebuild everything regardless of recorded state
        #[arg(long)]
        force: bool,
        /// Build with optimizations
        #[arg(long)]
        release: bool,
        /// Print the planned commands without running them
        #[arg(long)]
        dry_run: bool,
        /// Disable the progress display
        #[arg(long)]
        no_progress: bool,
    },
    /// Remove build outputs, archives, compiled headers and executables
    Clean,
    /// Write compile_commands.json for clangd
    CompileCommands,
    /// Show libraries in build order and each executable's link line
    List,
    /// Rebuild whenever a project file changes
    Watch {
        #[arg(short, long, num_args = 0..=1, default_missing_value = "auto")]
        jobs: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_jobs(jobs: Option<&str>) -> Result<Concurrency> {
    match jobs {
        None => Ok(Concurrency::default()),
        Some("auto") => Ok(Concurrency::from_cores()),
        Some(value) => value.parse().map_err(|e: String| anyhow::anyhow!(e)),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            jobs,
            force,
            release,
            dry_run,
            no_progress,
        } => {
            let options = BuildOptions {
                force,
                release,
                concurrency: parse_jobs(jobs.as_deref())?,
                progress: !no_progress,
                dry_run,
            };
            build::run_build(&cli.config, &options).map(|_| ())
        }
        Commands::Clean => {
            let register = build::load_register(&cli.config)?;
            build::clean(&register).map(|_| ())
        }
        Commands::CompileCommands => {
            let register = build::load_register(&cli.config)?;
            build::write_compile_commands(&register).map(|_| ())
        }
        Commands::List => {
            let register = build::load_register(&cli.config)?;
            tree::print_tree(&register)?;
            Ok(())
        }
        Commands::Watch { jobs, release } => {
            let options = BuildOptions {
                release,
                concurrency: parse_jobs(jobs.as_deref())?,
                progress: true,
                ..Default::default()
            };
            build::watch(&cli.config, &options)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "x".red(), e);
        std::process::exit(1);
    }
}
