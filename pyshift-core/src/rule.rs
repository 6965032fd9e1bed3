//! Rules and Actions
//!
//! A rule pairs a set of patterns with an action. The action receives a
//! matched node together with an [`ActionContext`] giving read access to the
//! module's import table and the scope stack, and returns the replacement
//! node plus any import edits.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::edits::PendingEdit;
use crate::imports::ImportTable;
use crate::matcher::{match_node, MatchReport, Pattern};
use crate::synthesis::{DeclarationPattern, ScopeStack, Synthesis, UnresolvedScopeError};
use crate::syntax::{SyntaxKind, SyntaxNode};
use crate::{Result, TransformError};
use std::fmt;

/// Replacement produced by an action
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub node: SyntaxNode,
    pub edits: Vec<PendingEdit>,
}

impl Rewrite {
    pub fn new(node: SyntaxNode) -> Self {
        Self {
            node,
            edits: Vec::new(),
        }
    }

    /// Keep the node as it is
    pub fn unchanged(node: &SyntaxNode) -> Self {
        Self::new(node.clone())
    }

    pub fn with_edit(mut self, edit: PendingEdit) -> Self {
        self.edits.push(edit);
        self
    }
}

/// Failure of a rule action on one node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: SyntaxKind,
    },

    #[error("missing `{0}` field")]
    MissingField(&'static str),

    #[error("{0}")]
    Failed(String),
}

/// What an action can see and do besides its node
pub struct ActionContext<'a> {
    rule: &'a str,
    imports: &'a ImportTable,
    scopes: &'a mut ScopeStack,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ActionContext<'a> {
    pub fn new(rule: &'a str, imports: &'a ImportTable, scopes: &'a mut ScopeStack) -> Self {
        Self {
            rule,
            imports,
            scopes,
            diagnostics: Vec::new(),
        }
    }

    pub fn rule(&self) -> &str {
        self.rule
    }

    pub fn imports(&self) -> &ImportTable {
        self.imports
    }

    pub fn scopes(&self) -> &ScopeStack {
        self.scopes
    }

    /// Whether `name` here refers to something other than its module-level import
    pub fn is_shadowed(&self, name: &str) -> bool {
        self.scopes.is_shadowed(name) || self.imports.is_rebound(name)
    }

    /// Local expression for `module`: its binding when imported, otherwise the module path
    pub fn module_path(&self, module: &str) -> String {
        self.imports
            .module_binding(module)
            .unwrap_or_else(|| module.to_string())
    }

    /// Whether `object` refers to `module` at this position
    pub fn refers_to_module(&mut self, object: &SyntaxNode, module: &str) -> bool {
        let path = self.module_path(module);
        if object.significant_text() != path {
            return false;
        }
        let head = path.split('.').next().unwrap_or(&path);
        if self.is_shadowed(head) {
            self.report(
                DiagnosticKind::ShadowedName,
                format!("`{}` is bound locally; left `{}` alone", head, object.significant_text()),
            );
            return false;
        }
        true
    }

    /// Synthesize a declaration in the nearest enclosing class when missing
    ///
    /// Failures to place it are reported as diagnostics, never as errors.
    pub fn ensure_declaration(
        &mut self,
        pattern: &DeclarationPattern,
        template: &SyntaxNode,
    ) -> Option<Synthesis> {
        match self.scopes.ensure_declaration(pattern, template) {
            Ok(synthesis) => {
                if synthesis == Synthesis::Appended {
                    tracing::debug!(rule = self.rule, member = pattern.name(), "synthesized member");
                }
                Some(synthesis)
            }
            Err(error) => {
                let kind = match error {
                    UnresolvedScopeError::NoEnclosingClass { .. } => DiagnosticKind::UnresolvedScope,
                    UnresolvedScopeError::InlineBody { .. } => DiagnosticKind::SynthesisSkipped,
                };
                self.report(kind, error.to_string());
                None
            }
        }
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, Some(self.rule), message));
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// The behaviour of a rule
pub trait Action: Send + Sync {
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> std::result::Result<Rewrite, ActionError>;
}

impl<F> Action for F
where
    F: Fn(&SyntaxNode, &mut ActionContext<'_>) -> std::result::Result<Rewrite, ActionError> + Send + Sync,
{
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> std::result::Result<Rewrite, ActionError> {
        self(node, ctx)
    }
}

/// A named pattern set with its action
pub struct Rule {
    name: String,
    description: String,
    patterns: Vec<Pattern>,
    action: Box<dyn Action>,
}

impl Rule {
    /// Create a rule, rejecting malformed patterns
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        patterns: Vec<Pattern>,
        action: impl Action + 'static,
    ) -> Result<Self> {
        let name = name.into();
        if patterns.is_empty() {
            return Err(TransformError::MalformedPattern {
                rule: name,
                reason: "rule has no patterns".to_string(),
            });
        }
        for pattern in &patterns {
            pattern
                .validate()
                .map_err(|error| TransformError::MalformedPattern {
                    rule: name.clone(),
                    reason: error.reason,
                })?;
        }
        Ok(Self {
            name,
            description: description.into(),
            patterns,
            action: Box::new(action),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Whether any of the rule's patterns matches `node`
    pub fn matches(&self, node: &SyntaxNode, report: &mut MatchReport) -> bool {
        self.patterns
            .iter()
            .any(|pattern| match_node(node, pattern, report))
    }

    pub fn action(&self) -> &dyn Action {
        self.action.as_ref()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

/// Rules in declaration order
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule; names must be unique
    pub fn add(&mut self, rule: Rule) -> Result<()> {
        if self.rules.iter().any(|existing| existing.name == rule.name) {
            return Err(TransformError::InvalidRule {
                rule: rule.name,
                message: "a rule with this name is already registered".to_string(),
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) -> Result<()> {
        rules.into_iter().try_for_each(|rule| self.add(rule))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
