//! pyshift command line
//!
//! `apply` rewrites Python sources with migration catalogs, `list` shows the
//! built-in catalogs and `check` verifies sources parse and print back
//! unchanged.

mod batch;
mod settings;

use anyhow::{bail, Context, Result};
use batch::{BatchOptions, FileStatus, RunReport};
use clap::{Parser, Subcommand};
use pyshift_catalog::Catalog;
use pyshift_core::{Engine, PythonParser};
use pyshift_utils::{discover_sources, LogLevel, LoggerConfig};
use rayon::prelude::*;
use settings::{Overrides, Settings};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pyshift")]
#[command(about = "Rule-driven, formatting-preserving Python migrations")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ./pyshift.toml when present)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warning or error
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite Python files in place
    Apply {
        /// Files or directories to process
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Built-in catalog name or catalog file (repeatable)
        #[arg(long = "catalog")]
        catalogs: Vec<String>,

        /// Catalog file with project rules (repeatable)
        #[arg(long = "rules")]
        rules: Vec<PathBuf>,

        /// Do not write any file
        #[arg(long)]
        dry_run: bool,

        /// Print a unified diff per rewritten file
        #[arg(long)]
        diff: bool,

        /// Worker threads
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Glob of files or directories to leave out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Write a JSON report of the run
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List built-in catalogs and their rules
    List,

    /// Check that sources parse and print back byte-for-byte
    Check {
        /// Files or directories to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let overrides = match &cli.command {
        Commands::Apply {
            catalogs,
            rules,
            jobs,
            exclude,
            ..
        } => Overrides {
            catalogs: catalogs.clone(),
            rules_files: rules.clone(),
            exclude: exclude.clone(),
            jobs: *jobs,
            log_level: cli.log_level,
        },
        _ => Overrides {
            log_level: cli.log_level,
            ..Default::default()
        },
    };
    let settings = Settings::load(cli.config.as_deref(), &cwd)?.merge(overrides);

    // a subscriber may already be installed when embedded; logging is best effort
    if let Err(error) = pyshift_utils::init_logging(LoggerConfig::with_level(settings.log_level)) {
        eprintln!("warning: {}", error);
    }

    match cli.command {
        Commands::Apply {
            paths,
            dry_run,
            diff,
            report,
            ..
        } => apply(&settings, &paths, dry_run, diff, report),
        Commands::List => list(),
        Commands::Check { paths } => check(&settings, &paths),
    }
}

fn load_catalogs(settings: &Settings) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();
    for name in &settings.catalogs {
        catalogs.push(Catalog::resolve(name).with_context(|| format!("Cannot use catalog `{}`", name))?);
    }
    for path in &settings.rules_files {
        catalogs.push(Catalog::load(path).with_context(|| format!("Cannot load rules from {}", path.display()))?);
    }
    if catalogs.is_empty() {
        bail!("No catalogs selected; pass --catalog or --rules, or list them in {}", settings::DEFAULT_CONFIG_FILE);
    }
    Ok(catalogs)
}

fn apply(settings: &Settings, paths: &[PathBuf], dry_run: bool, diff: bool, report: Option<PathBuf>) -> Result<ExitCode> {
    let started_at = chrono::Utc::now();
    let catalogs = load_catalogs(settings)?;
    let rules = pyshift_catalog::compile(&catalogs)?;
    let rule_names: Vec<String> = rules.iter().map(|rule| rule.name().to_string()).collect();
    let engine = Engine::new(rules);

    let files = discover_sources(paths, &settings.discovery())?;
    tracing::info!("Applying {} rules to {} files", rule_names.len(), files.len());

    let options = BatchOptions {
        dry_run,
        diff,
        max_file_size: settings.max_file_size,
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.jobs)
        .build()
        .context("Failed to start worker threads")?;
    let (reports, summary) = pool.install(|| batch::run(&engine, &files, &options));

    for report in &reports {
        if let Some(diff) = &report.diff {
            print!("{}", diff);
        }
        match report.status {
            FileStatus::Rewritten => eprintln!("rewrote {}", report.path.display()),
            FileStatus::WouldRewrite => eprintln!("would rewrite {}", report.path.display()),
            FileStatus::Skipped | FileStatus::Failed => eprintln!(
                "{} {}: {}",
                if report.status == FileStatus::Failed { "failed" } else { "skipped" },
                report.path.display(),
                report.error.as_deref().unwrap_or("unknown error")
            ),
            FileStatus::Unchanged => {}
        }
        for failure in &report.failures {
            eprintln!("failed {}: {}", report.path.display(), failure);
        }
    }
    eprintln!(
        "{} files: {} {}, {} unchanged, {} skipped, {} failed",
        summary.files,
        summary.rewritten,
        if dry_run { "would be rewritten" } else { "rewritten" },
        summary.unchanged,
        summary.skipped,
        summary.failed
    );

    let run_report = RunReport {
        started_at,
        finished_at: chrono::Utc::now(),
        dry_run,
        catalogs: catalogs.iter().map(|catalog| catalog.name.clone()).collect(),
        rules: rule_names,
        summary,
        files: reports,
    };
    if let Some(path) = report {
        run_report
            .write(&path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(if run_report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn list() -> Result<ExitCode> {
    for name in Catalog::builtin_names() {
        let catalog = Catalog::builtin(name)?;
        println!("{}: {}", catalog.name, catalog.description);
        for entry in &catalog.rules {
            println!("  {:<24} {:<26} {}", entry.name, entry.spec.kind(), entry.description);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn check(settings: &Settings, paths: &[PathBuf]) -> Result<ExitCode> {
    let files = discover_sources(paths, &settings.discovery())?;
    let problems: Vec<String> = files
        .par_iter()
        .filter_map(|path| {
            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(error) => return Some(format!("{}: {}", path.display(), error)),
            };
            let parsed = PythonParser::new().and_then(|mut parser| parser.parse_module(&source));
            match parsed {
                Ok(tree) if tree.text() == source => None,
                Ok(_) => Some(format!("{}: printed source differs from input", path.display())),
                Err(error) => Some(format!("{}: {}", path.display(), error)),
            }
        })
        .collect();

    for problem in &problems {
        eprintln!("{}", problem);
    }
    println!("{} files checked, {} with problems", files.len(), problems.len());
    Ok(if problems.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
