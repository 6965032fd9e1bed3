//! Batch application over many modules
//!
//! One rayon task per module. Each task parses, rewrites and (unless this is
//! a dry run) writes its own file; a failure in one module never affects
//! another.

use chrono::{DateTime, Utc};
use pyshift_core::{Diagnostic, Engine, RuleFailure};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub dry_run: bool,
    pub diff: bool,
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Unchanged,
    Rewritten,
    /// Would be rewritten; nothing was written
    WouldRewrite,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<RuleFailure>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diff: Option<String>,
}

impl FileReport {
    fn new(path: &Path, status: FileStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            diagnostics: Vec::new(),
            failures: Vec::new(),
            error: None,
            diff: None,
        }
    }

    fn failed(path: &Path, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(path, FileStatus::Failed)
        }
    }

    /// Whether this module counts against the exit status
    pub fn is_failure(&self) -> bool {
        self.status == FileStatus::Failed || !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub files: usize,
    pub rewritten: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub diagnostics: usize,
    pub rule_failures: usize,
}

/// Everything a run did, serialized as the `--report` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub catalogs: Vec<String>,
    pub rules: Vec<String>,
    pub summary: BatchSummary,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.files.iter().any(FileReport::is_failure)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Unified diff of one module, headed with its path
pub fn unified_diff(path: &Path, before: &str, after: &str) -> String {
    let name = path.display().to_string();
    similar::TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", name), &format!("b/{}", name))
        .to_string()
}

/// Rewrite one module
pub fn process_file(engine: &Engine, path: &Path, options: &BatchOptions) -> FileReport {
    match std::fs::metadata(path) {
        Ok(metadata) if options.max_file_size > 0 && metadata.len() > options.max_file_size => {
            tracing::info!("Skipping {} ({} bytes)", path.display(), metadata.len());
            return FileReport {
                error: Some(format!("larger than {} bytes", options.max_file_size)),
                ..FileReport::new(path, FileStatus::Skipped)
            };
        }
        Ok(_) => {}
        Err(error) => return FileReport::failed(path, error),
    }

    let source = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => return FileReport::failed(path, error),
    };
    let outcome = match engine.transform_bytes(&source) {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!("{}: {}", path.display(), error);
            return FileReport::failed(path, error);
        }
    };

    for failure in &outcome.failures {
        tracing::warn!("{}: {}", path.display(), failure);
    }

    let mut report = FileReport {
        diagnostics: outcome.diagnostics,
        failures: outcome.failures,
        ..FileReport::new(path, FileStatus::Unchanged)
    };
    if !outcome.changed {
        return report;
    }

    if options.diff {
        // transform_bytes already rejected non UTF-8 input
        let before = String::from_utf8_lossy(&source);
        report.diff = Some(unified_diff(path, &before, &outcome.output));
    }

    if options.dry_run {
        report.status = FileStatus::WouldRewrite;
        return report;
    }

    match std::fs::write(path, outcome.output.as_bytes()) {
        Ok(()) => {
            tracing::debug!("Rewrote {}", path.display());
            report.status = FileStatus::Rewritten;
        }
        Err(error) => {
            report.status = FileStatus::Failed;
            report.error = Some(error.to_string());
        }
    }
    report
}

/// Rewrite `files` in parallel; reports come back in input order
pub fn run(engine: &Engine, files: &[PathBuf], options: &BatchOptions) -> (Vec<FileReport>, BatchSummary) {
    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| process_file(engine, path, options))
        .collect();

    let mut summary = BatchSummary {
        files: reports.len(),
        ..Default::default()
    };
    for report in &reports {
        match report.status {
            FileStatus::Rewritten | FileStatus::WouldRewrite => summary.rewritten += 1,
            FileStatus::Unchanged => summary.unchanged += 1,
            FileStatus::Skipped => summary.skipped += 1,
            FileStatus::Failed => summary.failed += 1,
        }
        summary.diagnostics += report.diagnostics.len();
        summary.rule_failures += report.failures.len();
    }
    tracing::info!(
        "Processed {} files: {} rewritten, {} unchanged, {} skipped, {} failed",
        summary.files,
        summary.rewritten,
        summary.unchanged,
        summary.skipped,
        summary.failed
    );
    (reports, summary)
}
