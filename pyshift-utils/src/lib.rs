//! pyshift Utilities
//!
//! Logging setup, configuration loading, Python source discovery and the
//! small text helpers the engine and the command line share.

#![warn(clippy::all)]

pub mod config;
pub mod file;
pub mod logging;
pub mod string;

pub use config::{load_config, ConfigFormat};
pub use file::{discover_sources, DiscoveryOptions};
pub use logging::{init_logging, LogLevel, LoggerConfig};
pub use string::{dedent, indent};

/// Result type used throughout pyshift utilities
pub type Result<T> = std::result::Result<T, UtilError>;

/// Error types for utility operations
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid include/exclude glob
    #[error("Invalid glob pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    /// Directory walk failed
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Directory names never descended into during discovery
pub fn default_exclusion_patterns() -> Vec<&'static str> {
    vec![
        // Version control
        ".git",
        ".svn",
        ".hg",
        // Build artifacts
        "__pycache__",
        "build",
        "dist",
        // Virtual environments
        "venv",
        "env",
        ".venv",
        ".env",
        // Test artifacts
        ".pytest_cache",
        ".tox",
        ".mypy_cache",
        // Package managers
        "node_modules",
        "target",
    ]
}
