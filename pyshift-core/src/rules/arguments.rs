//! Argument Rewrites

use super::{attribute_name, expect_kind, lookup, required, with_attribute_name, RuleFamily};
use crate::matcher::{Pattern, Predicate};
use crate::parser::parse_expression;
use crate::diagnostics::DiagnosticKind;
use crate::rule::{Action, ActionContext, ActionError, Rewrite};
use crate::syntax::{build, Child, Field, SyntaxKind, SyntaxNode, TokenKind};
use crate::Result;
use std::collections::BTreeSet;

/// Append a positional argument to `module.function(...)` calls of an exact arity
#[derive(Debug, Clone)]
pub struct AppendArgument {
    module: String,
    function: String,
    arity: usize,
    value: SyntaxNode,
}

impl AppendArgument {
    /// `value` is Python expression source, e.g. `"0"`
    pub fn new(module: impl Into<String>, function: impl Into<String>, arity: usize, value: &str) -> Result<Self> {
        Ok(Self {
            module: module.into(),
            function: function.into(),
            arity,
            value: parse_expression(value)?,
        })
    }
}

impl Action for AppendArgument {
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> std::result::Result<Rewrite, ActionError> {
        let function = required(node, Field::Function)?;
        let object = required(&function, Field::Object)?;
        if !ctx.refers_to_module(&object, &self.module) {
            return Ok(Rewrite::unchanged(node));
        }

        let arguments = required(node, Field::Arguments)?;
        expect_kind(&arguments, SyntaxKind::ArgumentList, "argument list")?;
        let last = arguments
            .children()
            .enumerate()
            .filter(|(_, child)| child.as_node().is_some())
            .last()
            .map(|(index, _)| index);

        let mut inserted = Vec::with_capacity(3);
        let at = match last {
            Some(index) => {
                inserted.push(Child::token(TokenKind::Punct, ","));
                inserted.push(Child::token(TokenKind::Whitespace, " "));
                index + 1
            }
            // `(` opens the list
            None => 1,
        };
        inserted.push(Child::node(None, self.value.clone()));

        let arguments = arguments.splice(at..at, inserted);
        Ok(Rewrite::new(node.with_field(Field::Arguments, arguments)))
    }
}

impl RuleFamily for AppendArgument {
    fn patterns(&self) -> Vec<Pattern> {
        let callee = Pattern::attribute(Pattern::Wildcard, Pattern::name(self.function.as_str()));
        vec![Pattern::call(callee)
            .with(Field::Arguments, Pattern::positional(self.arity))
            .into()]
    }
}

/// Rename keyword arguments of `<receiver>.method(...)`, optionally renaming the method too
///
/// Only calls that pass at least one of the listed keywords are touched.
#[derive(Debug, Clone)]
pub struct RenameKeywords {
    method: String,
    rename_to: Option<String>,
    keywords: Vec<(String, String)>,
}

impl RenameKeywords {
    pub fn new(method: impl Into<String>, keywords: Vec<(String, String)>) -> Self {
        Self {
            method: method.into(),
            rename_to: None,
            keywords,
        }
    }

    pub fn renaming_method(mut self, to: Option<String>) -> Self {
        self.rename_to = to;
        self
    }

}

fn keyword_name(argument: &SyntaxNode) -> Option<String> {
    if !argument.is(SyntaxKind::KeywordArgument) {
        return None;
    }
    argument.field(Field::Name).and_then(|name| name.identifier_text())
}

impl Action for RenameKeywords {
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> std::result::Result<Rewrite, ActionError> {
        let arguments = required(node, Field::Arguments)?;
        expect_kind(&arguments, SyntaxKind::ArgumentList, "argument list")?;

        // Keyword names in use, kept current as renames land
        let mut taken: BTreeSet<String> = arguments.nodes().filter_map(|argument| keyword_name(&argument)).collect();
        let arguments = arguments.map_children(|_, argument| {
            let Some(from) = keyword_name(argument) else {
                return argument.clone();
            };
            let Some(to) = lookup(&self.keywords, &from) else {
                return argument.clone();
            };
            if taken.contains(to) {
                ctx.report(
                    DiagnosticKind::KeywordConflict,
                    format!("keyword `{from}` not renamed: the call already passes `{to}`"),
                );
                return argument.clone();
            }
            taken.remove(&from);
            taken.insert(to.to_string());
            argument.with_field(Field::Name, build::identifier(to))
        });
        let mut rewritten = node.with_field(Field::Arguments, arguments);

        if let Some(to) = &self.rename_to {
            let function = required(node, Field::Function)?;
            if attribute_name(&function).as_deref() != Some(to.as_str()) {
                rewritten = rewritten.with_field(Field::Function, with_attribute_name(&function, to));
            }
        }
        Ok(Rewrite::new(rewritten))
    }
}

impl RuleFamily for RenameKeywords {
    fn patterns(&self) -> Vec<Pattern> {
        let keys = self.keywords.iter().map(|(from, _)| from.as_str());
        vec![Pattern::method_call(&self.method)
            .with(Field::Arguments, Predicate::any_keyword_of(keys))
            .into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::rule::{Rule, RuleSet};
    use pretty_assertions::assert_eq;

    fn engine(rule: Rule) -> Engine {
        let mut rules = RuleSet::new();
        rules.add(rule).unwrap();
        Engine::new(rules)
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    fn flex_grid() -> Engine {
        let rule = AppendArgument::new("wx", "FlexGridSizer", 2, "0")
            .unwrap()
            .into_rule("flex-grid-sizer", "")
            .unwrap();
        engine(rule)
    }

    #[test]
    fn test_append_argument() {
        let outcome = flex_grid().transform_source("wx.FlexGridSizer(1, 0)\n").unwrap();
        assert_eq!(outcome.output, "wx.FlexGridSizer(1, 0, 0)\n");
    }

    #[test]
    fn test_append_argument_wrong_arity_is_noop() {
        let source = "wx.FlexGridSizer(1, 0, 0)\n";
        let outcome = flex_grid().transform_source(source).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.output, source);
    }

    #[test]
    fn test_append_argument_to_empty_list() {
        let rule = AppendArgument::new("wx", "Frame", 0, "None")
            .unwrap()
            .into_rule("frame", "")
            .unwrap();
        let outcome = engine(rule).transform_source("wx.Frame()\n").unwrap();
        assert_eq!(outcome.output, "wx.Frame(None)\n");
    }

    #[test]
    fn test_append_argument_rejects_bad_value() {
        assert!(AppendArgument::new("wx", "FlexGridSizer", 2, "0 +").is_err());
    }

    #[test]
    fn test_rename_keywords_multiline() {
        let rule = RenameKeywords::new("Append", pairs(&[("help", "helpString"), ("text", "item")]))
            .into_rule("menu-append", "")
            .unwrap();
        let source = "menu.Append(\n    help=\"\",\n    id=1,\n    kind=wx.ITEM_NORMAL,\n    text=\"Menu item\",\n)\n";
        let expected =
            "menu.Append(\n    helpString=\"\",\n    id=1,\n    kind=wx.ITEM_NORMAL,\n    item=\"Menu item\",\n)\n";
        assert_eq!(engine(rule).transform_source(source).unwrap().output, expected);
    }

    #[test]
    fn test_rename_keywords_and_method() {
        let rule = RenameKeywords::new("DoAddTool", pairs(&[("id", "toolId")]))
            .renaming_method(Some("AddTool".to_string()))
            .into_rule("toolbar", "")
            .unwrap();
        let source = "toolbar.DoAddTool(\n    bitmap=my_bitmap,\n    id=1,\n    label=\"Toolbar tool\"\n)\n";
        let expected = "toolbar.AddTool(\n    bitmap=my_bitmap,\n    toolId=1,\n    label=\"Toolbar tool\"\n)\n";
        assert_eq!(engine(rule).transform_source(source).unwrap().output, expected);
    }

    #[test]
    fn test_rename_keywords_requires_a_listed_keyword() {
        let rule = RenameKeywords::new("Append", pairs(&[("help", "helpText")]))
            .into_rule("append", "")
            .unwrap();
        let source = "menu.Append(1, \"item\", helpText=\"h\")\n";
        let outcome = engine(rule).transform_source(source).unwrap();
        assert!(!outcome.changed);
    }

    #[test]
    fn test_append_argument_leaves_keyword_calls_alone() {
        for source in ["wx.FlexGridSizer(rows=2, cols=3)\n", "wx.FlexGridSizer(1, **k)\n"] {
            let outcome = flex_grid().transform_source(source).unwrap();
            assert!(!outcome.changed, "{source}");
            assert_eq!(outcome.output, source);
        }
    }

    #[test]
    fn test_rename_keywords_skips_names_already_passed() {
        let rule = RenameKeywords::new("Append", pairs(&[("help", "helpString")]))
            .into_rule("menu-append", "")
            .unwrap();
        let source = "menu.Append(help='a', helpString='b')\n";
        let outcome = engine(rule).transform_source(source).unwrap();
        assert_eq!(outcome.output, source);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|diagnostic| diagnostic.kind == DiagnosticKind::KeywordConflict));
    }

    #[test]
    fn test_rename_keywords_swaps_through_freed_names() {
        let rule = RenameKeywords::new("Append", pairs(&[("text", "item"), ("item", "label")]))
            .into_rule("menu-append", "")
            .unwrap();
        let outcome = engine(rule).transform_source("menu.Append(item=1, text='t')\n").unwrap();
        assert_eq!(outcome.output, "menu.Append(label=1, item='t')\n");
    }
}
