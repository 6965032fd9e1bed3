//! Transformation Engine
//!
//! [`apply_rules`] is the single entry point over an already parsed tree:
//! gather imports, traverse, then apply the collected import edits once.
//! [`Engine`] wraps a compiled [`RuleSet`] and adds parsing and printing.

use crate::diagnostics::{Diagnostic, RuleFailure};
use crate::edits::{apply_edits, EditSet};
use crate::imports::ImportTable;
use crate::parser::PythonParser;
use crate::rule::RuleSet;
use crate::syntax::SyntaxNode;
use crate::traversal::Traversal;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of rewriting one module tree
#[derive(Debug, Clone)]
pub struct Transformed {
    pub tree: SyntaxNode,
    /// Whether `tree` differs structurally from the input
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<RuleFailure>,
}

/// Rewrite `tree` with `rules`
pub fn apply_rules(tree: &SyntaxNode, rules: &RuleSet) -> Transformed {
    let imports = ImportTable::gather(tree);
    let (rewritten, output) = Traversal::new(rules, &imports).run(tree);

    let mut diagnostics = output.diagnostics;
    let edits = EditSet::new(output.edits);
    let rewritten = apply_edits(&rewritten, &edits, &mut diagnostics);

    let changed = !rewritten.ptr_eq(tree) && rewritten != *tree;
    Transformed {
        tree: rewritten,
        changed,
        diagnostics,
        failures: output.failures,
    }
}

/// Result of rewriting one module's source text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub output: String,
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<RuleFailure>,
}

/// Compiled rules ready to be applied to any number of modules
///
/// The engine is immutable and shared across worker threads; every call
/// parses with its own parser.
#[derive(Debug)]
pub struct Engine {
    rules: RuleSet,
}

impl Engine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Rewrite an already parsed module
    pub fn transform_tree(&self, tree: &SyntaxNode) -> Transformed {
        apply_rules(tree, &self.rules)
    }

    /// Parse, rewrite and print one module
    pub fn transform_source(&self, source: &str) -> Result<SourceOutcome> {
        let tree = PythonParser::new()?.parse_module(source)?;
        let transformed = self.transform_tree(&tree);
        let output = if transformed.changed {
            transformed.tree.text()
        } else {
            source.to_string()
        };
        Ok(SourceOutcome {
            changed: output != source,
            output,
            diagnostics: transformed.diagnostics,
            failures: transformed.failures,
        })
    }

    /// Rewrite raw bytes, which must be UTF-8
    pub fn transform_bytes(&self, bytes: &[u8]) -> Result<SourceOutcome> {
        self.transform_source(std::str::from_utf8(bytes)?)
    }

    /// Read and rewrite a file without writing it back
    pub fn transform_file(&self, path: &Path) -> Result<SourceOutcome> {
        let bytes = std::fs::read(path)?;
        self.transform_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::{ImportSpec, PendingEdit};
    use crate::matcher::Pattern;
    use crate::parser::parse_module;
    use crate::rule::{ActionContext, ActionError, Rewrite, Rule};
    use crate::syntax::{build, Field};
    use crate::TransformError;

    fn move_rule() -> Rule {
        let action = |node: &SyntaxNode, _ctx: &mut ActionContext<'_>| -> std::result::Result<Rewrite, ActionError> {
            Ok(Rewrite::new(node.with_field(Field::Object, build::dotted_expression("wx.adv")))
                .with_edit(PendingEdit::AddImport(ImportSpec::module("wx.adv"))))
        };
        Rule::new(
            "adv",
            "move to wx.adv",
            vec![Pattern::attribute(Pattern::name("wx"), Pattern::name("DP_ALLOWNONE"))],
            action,
        )
        .unwrap()
    }

    fn engine() -> Engine {
        let mut rules = RuleSet::new();
        rules.add(move_rule()).unwrap();
        Engine::new(rules)
    }

    #[test]
    fn test_edits_applied_once_per_module() {
        let outcome = engine()
            .transform_source("a = wx.DP_ALLOWNONE\nb = wx.DP_ALLOWNONE\n")
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(
            outcome.output,
            "import wx.adv\n\na = wx.adv.DP_ALLOWNONE\nb = wx.adv.DP_ALLOWNONE\n"
        );
    }

    #[test]
    fn test_unchanged_source_is_returned_verbatim() {
        let source = "# nothing to see\nx = 1\n";
        let outcome = engine().transform_source(source).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.output, source);
    }

    #[test]
    fn test_apply_rules_reports_changed() {
        let tree = parse_module("wx.DP_ALLOWNONE\n").unwrap();
        let rules = engine();
        let transformed = apply_rules(&tree, rules.rules());
        assert!(transformed.changed);

        let again = apply_rules(&transformed.tree, rules.rules());
        assert!(!again.changed);
        assert_eq!(again.tree.text(), transformed.tree.text());
    }

    #[test]
    fn test_outcome_serializes_for_reports() {
        let outcome = engine().transform_source("wx.DP_ALLOWNONE\n").unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["changed"], true);
        assert_eq!(json["output"], "import wx.adv\n\nwx.adv.DP_ALLOWNONE\n");
        assert!(json["failures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let error = engine().transform_bytes(&[0x66, 0xff, 0x0a]).unwrap_err();
        assert!(matches!(error, TransformError::Utf8(_)));
    }

    #[test]
    fn test_parse_failure_reported() {
        assert!(matches!(
            engine().transform_source("def (:\n"),
            Err(TransformError::Parse(_))
        ));
    }
}
