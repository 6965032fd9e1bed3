//! Traversal Engine
//!
//! Post-order rewrite of a module tree. Children are rewritten before their
//! parent's rules run. Entering the body of a class, function or lambda opens
//! a [`ScopeFrame`]; decorators, bases, parameter defaults and annotations
//! are visited in the enclosing scope. A comprehension is a frame as a whole.
//! As each direct body statement is finished its rewritten form replaces the
//! original in the frame, so synthesis sees the body as it currently stands.
//! Rules are applied to each node as a chain in declaration order.

use crate::diagnostics::{Diagnostic, DiagnosticKind, RuleFailure};
use crate::edits::PendingEdit;
use crate::imports::ImportTable;
use crate::matcher::MatchReport;
use crate::rule::{ActionContext, RuleSet};
use crate::synthesis::{FrameKind, ScopeFrame, ScopeStack};
use crate::syntax::{Field, SyntaxNode};

/// State of one traversal over one module
pub struct Traversal<'a> {
    rules: &'a RuleSet,
    imports: &'a ImportTable,
    scopes: ScopeStack,
    edits: Vec<PendingEdit>,
    diagnostics: Vec<Diagnostic>,
    failures: Vec<RuleFailure>,
}

/// What a traversal collected besides the rewritten tree
#[derive(Debug, Default)]
pub struct TraversalOutput {
    pub edits: Vec<PendingEdit>,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<RuleFailure>,
}

impl<'a> Traversal<'a> {
    pub fn new(rules: &'a RuleSet, imports: &'a ImportTable) -> Self {
        Self {
            rules,
            imports,
            scopes: ScopeStack::new(),
            edits: Vec::new(),
            diagnostics: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Rewrite `tree`, returning the new tree and everything collected on the way
    pub fn run(mut self, tree: &SyntaxNode) -> (SyntaxNode, TraversalOutput) {
        let rewritten = self.visit(tree);
        debug_assert_eq!(self.scopes.depth(), 0, "unbalanced scope frames");
        let output = TraversalOutput {
            edits: self.edits,
            diagnostics: self.diagnostics,
            failures: self.failures,
        };
        (rewritten, output)
    }

    fn visit(&mut self, node: &SyntaxNode) -> SyntaxNode {
        let rebuilt = match ScopeFrame::open(node) {
            None => node.map_children(|_, child| self.visit(child)),
            Some(frame) if frame.kind() == FrameKind::Comprehension => {
                self.scopes.push(frame);
                let rebuilt = node.map_children(|_, child| self.visit(child));
                self.scopes.pop();
                rebuilt
            }
            Some(frame) => {
                let mut pending = Some(frame);
                let mut finished = None;
                let rebuilt = node.map_children(|field, child| {
                    let frame = match pending.take() {
                        Some(frame) if field == Some(Field::Body) => frame,
                        other => {
                            pending = other;
                            return self.visit(child);
                        }
                    };
                    let lambda = frame.kind() == FrameKind::Lambda;
                    self.scopes.push(frame);
                    let body = if lambda { self.visit(child) } else { self.visit_body(child) };
                    finished = self.scopes.pop();
                    body
                });
                match finished {
                    Some(frame) => frame.close(rebuilt),
                    None => rebuilt,
                }
            }
        };

        self.apply_rules(rebuilt)
    }

    /// Visit a definition body, keeping the open frame's members current
    fn visit_body(&mut self, block: &SyntaxNode) -> SyntaxNode {
        let mut index = 0;
        block.map_children(|_, statement| {
            let rewritten = self.visit(statement);
            if let Some(frame) = self.scopes.current_mut() {
                frame.update_member(index, rewritten.clone());
            }
            index += 1;
            rewritten
        })
    }

    fn apply_rules(&mut self, node: SyntaxNode) -> SyntaxNode {
        let mut current = node;
        for rule in self.rules {
            let mut report = MatchReport::default();
            if !rule.matches(&current, &mut report) {
                continue;
            }
            for ambiguity in report.ambiguities {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::AmbiguousMatch,
                    Some(rule.name()),
                    format!(
                        "`{}` admits expansions {:?}; using {}",
                        ambiguity.snippet, ambiguity.expansions, ambiguity.chosen
                    ),
                ));
            }

            let checkpoint = self.scopes.checkpoint();
            let mut ctx = ActionContext::new(rule.name(), self.imports, &mut self.scopes);
            let result = rule.action().apply(&current, &mut ctx);
            let diagnostics = ctx.into_diagnostics();

            match result {
                Ok(rewrite) => {
                    if !rewrite.node.ptr_eq(&current) || !rewrite.edits.is_empty() {
                        tracing::debug!(
                            rule = rule.name(),
                            from = %current.significant_text(),
                            to = %rewrite.node.significant_text(),
                            "rule fired"
                        );
                    }
                    self.diagnostics.extend(diagnostics);
                    self.edits.extend(rewrite.edits);
                    current = rewrite.node;
                }
                Err(error) => {
                    self.scopes.rollback(checkpoint);
                    let failure = RuleFailure {
                        rule: rule.name().to_string(),
                        node: current.significant_text(),
                        error: error.to_string(),
                    };
                    tracing::warn!("{}", failure);
                    self.failures.push(failure);
                }
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Pattern;
    use crate::parser::parse_module;
    use crate::rule::{ActionError, Rewrite, Rule};
    use crate::syntax::{build, SyntaxKind};

    fn rename_to(name: &'static str) -> impl Fn(&SyntaxNode, &mut ActionContext<'_>) -> Result<Rewrite, ActionError> {
        move |node: &SyntaxNode, _ctx: &mut ActionContext<'_>| {
            Ok(Rewrite::new(node.with_field(Field::Attribute, build::identifier(name))))
        }
    }

    fn run(source: &str, rules: &RuleSet) -> (SyntaxNode, TraversalOutput) {
        let tree = parse_module(source).unwrap();
        let imports = ImportTable::gather(&tree);
        Traversal::new(rules, &imports).run(&tree)
    }

    #[test]
    fn test_untouched_tree_is_shared() {
        let rules = RuleSet::new();
        let tree = parse_module("x = wx.Color(1)\n").unwrap();
        let imports = ImportTable::gather(&tree);
        let (output, collected) = Traversal::new(&rules, &imports).run(&tree);
        assert!(output.ptr_eq(&tree));
        assert!(collected.edits.is_empty());
    }

    #[test]
    fn test_rules_chain_in_declaration_order() {
        let mut rules = RuleSet::new();
        rules
            .add(Rule::new("a-to-b", "", vec![Pattern::attribute(Pattern::Wildcard, Pattern::name("A"))], rename_to("B")).unwrap())
            .unwrap();
        rules
            .add(Rule::new("b-to-c", "", vec![Pattern::attribute(Pattern::Wildcard, Pattern::name("B"))], rename_to("C")).unwrap())
            .unwrap();
        let (output, _) = run("x.A\n", &rules);
        assert_eq!(output.text(), "x.C\n");
    }

    #[test]
    fn test_failed_action_reverts_only_its_change() {
        let mut rules = RuleSet::new();
        rules
            .add(Rule::new("rename", "", vec![Pattern::attribute(Pattern::Wildcard, Pattern::name("A"))], rename_to("B")).unwrap())
            .unwrap();
        let fail = |node: &SyntaxNode, _ctx: &mut ActionContext<'_>| -> Result<Rewrite, ActionError> {
            Err(ActionError::UnexpectedShape {
                expected: "call",
                found: node.kind(),
            })
        };
        rules
            .add(Rule::new("broken", "", vec![Pattern::attribute(Pattern::Wildcard, Pattern::name("B"))], fail).unwrap())
            .unwrap();
        let (output, collected) = run("x.A\n", &rules);
        assert_eq!(output.text(), "x.B\n");
        assert_eq!(collected.failures.len(), 1);
        assert_eq!(collected.failures[0].rule, "broken");
        assert_eq!(collected.failures[0].node, "x.B");
    }

    #[test]
    fn test_children_are_rewritten_before_parents() {
        let seen_inner = |node: &SyntaxNode, _ctx: &mut ActionContext<'_>| -> Result<Rewrite, ActionError> {
            let function = node.field(Field::Function).ok_or(ActionError::MissingField("function"))?;
            assert_eq!(function.significant_text(), "x.B");
            Ok(Rewrite::unchanged(node))
        };
        let mut rules = RuleSet::new();
        rules
            .add(Rule::new("rename", "", vec![Pattern::attribute(Pattern::Wildcard, Pattern::name("A"))], rename_to("B")).unwrap())
            .unwrap();
        rules
            .add(Rule::new("outer", "", vec![Pattern::node(SyntaxKind::Call).into()], seen_inner).unwrap())
            .unwrap();
        let (output, collected) = run("x.A()\n", &rules);
        assert_eq!(output.text(), "x.B()\n");
        assert!(collected.failures.is_empty());
    }

    fn depth_rules() -> RuleSet {
        let mark_depth = |node: &SyntaxNode, ctx: &mut ActionContext<'_>| -> Result<Rewrite, ActionError> {
            let depth = ctx.scopes().depth();
            Ok(Rewrite::new(node.with_field(Field::Attribute, build::identifier(&format!("D{}", depth)))))
        };
        let mut rules = RuleSet::new();
        rules
            .add(Rule::new("depth", "", vec![Pattern::attribute(Pattern::Wildcard, Pattern::name("here"))], mark_depth).unwrap())
            .unwrap();
        rules
    }

    #[test]
    fn test_scope_depth_follows_nesting() {
        let source = "x.here\nclass A:\n    y = x.here\n    def f(self):\n        return x.here\n";
        let (output, _) = run(source, &depth_rules());
        assert_eq!(
            output.text(),
            "x.D0\nclass A:\n    y = x.D1\n    def f(self):\n        return x.D2\n"
        );
    }

    #[test]
    fn test_definition_headers_resolve_in_enclosing_scope() {
        let source = "@x.here\nclass A(x.here):\n    def f(self, wx=x.here) -> x.here:\n        return x.here\n";
        let (output, _) = run(source, &depth_rules());
        assert_eq!(
            output.text(),
            "@x.D0\nclass A(x.D0):\n    def f(self, wx=x.D1) -> x.D1:\n        return x.D2\n"
        );
    }

    #[test]
    fn test_lambda_and_comprehension_frames() {
        let source = "f = lambda a=x.here: x.here\nys = [x.here for x in zs]\n";
        let (output, _) = run(source, &depth_rules());
        assert_eq!(output.text(), "f = lambda a=x.D0: x.D1\nys = [x.D1 for x in zs]\n");
    }
}
