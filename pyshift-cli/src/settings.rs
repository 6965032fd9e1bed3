//! Run settings
//!
//! Values come from `pyshift.toml` (or the file named by `--config`) and are
//! then overridden by command-line flags.

use anyhow::{Context, Result};
use pyshift_utils::{DiscoveryOptions, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "pyshift.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Built-in catalog names or catalog file paths
    pub catalogs: Vec<String>,
    /// Extra catalog files
    pub rules_files: Vec<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Worker threads; 0 lets rayon decide
    pub jobs: usize,
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalogs: Vec::new(),
            rules_files: Vec::new(),
            include: DiscoveryOptions::default().include,
            exclude: Vec::new(),
            jobs: 0,
            max_file_size: 1024 * 1024,
            log_level: LogLevel::Warning,
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub catalogs: Vec<String>,
    pub rules_files: Vec<PathBuf>,
    pub exclude: Vec<String>,
    pub jobs: Option<usize>,
    pub log_level: Option<LogLevel>,
}

impl Settings {
    /// Read `explicit`, or `pyshift.toml` in `dir` when present, or use defaults
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = dir.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let settings: Settings = pyshift_utils::load_config(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Apply command-line overrides; listed catalogs and excludes add to the file's
    pub fn merge(mut self, overrides: Overrides) -> Self {
        for catalog in overrides.catalogs {
            if !self.catalogs.contains(&catalog) {
                self.catalogs.push(catalog);
            }
        }
        self.rules_files.extend(overrides.rules_files);
        self.exclude.extend(overrides.exclude);
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self
    }

    pub fn discovery(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            ..Default::default()
        }
    }
}
