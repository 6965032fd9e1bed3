//! Diagnostics and Rule Failures
//!
//! Non-fatal findings collected while transforming a module. Every
//! diagnostic is also emitted as a `tracing` event when it is recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
        }
    }
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A sequence wildcard admitted more than one expansion
    AmbiguousMatch,
    /// Synthesis requested outside of any class
    UnresolvedScope,
    /// Synthesis could not place the member in the class body
    SynthesisSkipped,
    /// A requested import removal was dropped because the name is still used
    ImportKept,
    /// A match was left alone because the name is bound locally
    ShadowedName,
    /// A keyword rename was skipped because the call already passes the new name
    KeywordConflict,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::AmbiguousMatch => "ambiguous_match",
            DiagnosticKind::UnresolvedScope => "unresolved_scope",
            DiagnosticKind::SynthesisSkipped => "synthesis_skipped",
            DiagnosticKind::ImportKept => "import_kept",
            DiagnosticKind::ShadowedName => "shadowed_name",
            DiagnosticKind::KeywordConflict => "keyword_conflict",
        }
    }

    /// Default severity for this kind
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::ShadowedName | DiagnosticKind::ImportKept => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

/// A non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Rule that produced the diagnostic, if any
    pub rule: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, rule: Option<&str>, message: impl Into<String>) -> Self {
        let diagnostic = Self {
            severity: kind.severity(),
            kind,
            rule: rule.map(str::to_string),
            message: message.into(),
        };
        diagnostic.emit();
        diagnostic
    }

    fn emit(&self) {
        let rule = self.rule.as_deref().unwrap_or("-");
        match self.severity {
            Severity::Warning => {
                tracing::warn!(kind = self.kind.as_str(), rule, "{}", self.message)
            }
            Severity::Info => {
                tracing::info!(kind = self.kind.as_str(), rule, "{}", self.message)
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.severity.as_str(), self.kind.as_str())?;
        if let Some(rule) = &self.rule {
            write!(f, " {}", rule)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A rule action that failed on one node; its change there was reverted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: String,
    /// Source text of the node the action was given
    pub node: String,
    pub error: String,
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule `{}` failed on `{}`: {}", self.rule, self.node, self.error)
    }
}
