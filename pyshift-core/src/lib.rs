//! pyshift Core - Rule-Driven Source Transformation Engine
//!
//! This crate rewrites Python modules according to ordered migration rules
//! while keeping every untouched byte of the source as it was.
//!
//! Key features:
//! - Lossless, immutable concrete syntax tree with structural sharing
//! - Structural pattern matching with sequence wildcards and predicates
//! - Bottom-up traversal threading class/function scope frames
//! - Import binding table and deduplicated import edits
//! - Scope-aware synthesis of missing class members

#![warn(clippy::all)]

pub mod diagnostics;
pub mod edits;
pub mod engine;
pub mod imports;
pub mod matcher;
pub mod parser;
pub mod rule;
pub mod rules;
pub mod synthesis;
pub mod syntax;
pub mod traversal;

// Re-export main types for convenience
pub use diagnostics::{Diagnostic, DiagnosticKind, RuleFailure, Severity};
pub use edits::{ImportSpec, PendingEdit};
pub use engine::{apply_rules, Engine, SourceOutcome, Transformed};
pub use imports::{ImportBinding, ImportTable};
pub use matcher::{matches, MatchReport, NodePattern, Pattern, Predicate};
pub use parser::PythonParser;
pub use rule::{Action, ActionContext, ActionError, Rewrite, Rule, RuleSet};
pub use rules::RuleFamily;
pub use synthesis::{DeclarationPattern, ScopeStack, Synthesis, UnresolvedScopeError};
pub use syntax::{Field, SyntaxKind, SyntaxNode};

/// Result type for transformation operations
pub type Result<T> = std::result::Result<T, TransformError>;

/// Error types for transformation operations
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A rule pattern is structurally inconsistent
    #[error("Malformed pattern in rule `{rule}`: {reason}")]
    MalformedPattern { rule: String, reason: String },

    /// Rule construction error outside of pattern validation
    #[error("Invalid rule `{rule}`: {message}")]
    InvalidRule { rule: String, message: String },

    /// Tree-sitter language error
    #[error("Language error: {0}")]
    Language(String),

    /// UTF-8 encoding error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<tree_sitter::LanguageError> for TransformError {
    fn from(err: tree_sitter::LanguageError) -> Self {
        TransformError::Language(format!("{:?}", err))
    }
}
