//! Attribute, Call and Method Renames

use super::{attribute_name, lookup, required, with_attribute_name, RuleFamily};
use crate::matcher::Pattern;
use crate::rule::{Action, ActionContext, ActionError, Rewrite};
use crate::syntax::{Field, SyntaxKind, SyntaxNode};

/// Rename `module.Old` to `module.New`
///
/// The module is matched through its local binding, so `import wx as w`
/// makes `w.Color` a target. With `calls_only` only callees are renamed.
#[derive(Debug, Clone)]
pub struct RenameAttribute {
    module: String,
    renames: Vec<(String, String)>,
    calls_only: bool,
}

impl RenameAttribute {
    pub fn new(module: impl Into<String>, renames: Vec<(String, String)>) -> Self {
        Self {
            module: module.into(),
            renames,
            calls_only: false,
        }
    }

    /// Only rename the attribute when it is being called
    pub fn calls_only(mut self) -> Self {
        self.calls_only = true;
        self
    }

    fn rename(&self, attribute: &SyntaxNode, ctx: &mut ActionContext<'_>) -> Result<Option<SyntaxNode>, ActionError> {
        let Some(target) = attribute_name(attribute).and_then(|name| lookup(&self.renames, &name)) else {
            return Ok(None);
        };
        let object = required(attribute, Field::Object)?;
        if !ctx.refers_to_module(&object, &self.module) {
            return Ok(None);
        }
        Ok(Some(with_attribute_name(attribute, target)))
    }
}

impl Action for RenameAttribute {
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> Result<Rewrite, ActionError> {
        if self.calls_only {
            let function = required(node, Field::Function)?;
            return Ok(match self.rename(&function, ctx)? {
                Some(renamed) => Rewrite::new(node.with_field(Field::Function, renamed)),
                None => Rewrite::unchanged(node),
            });
        }
        Ok(match self.rename(node, ctx)? {
            Some(renamed) => Rewrite::new(renamed),
            None => Rewrite::unchanged(node),
        })
    }
}

impl RuleFamily for RenameAttribute {
    fn patterns(&self) -> Vec<Pattern> {
        self.renames
            .iter()
            .map(|(from, _)| {
                let attribute = Pattern::attribute(Pattern::Wildcard, Pattern::name(from.as_str()));
                if self.calls_only {
                    Pattern::from(Pattern::call(attribute))
                } else {
                    attribute
                }
            })
            .collect()
    }
}

/// Rename a method on any receiver, optionally only for an exact argument count
#[derive(Debug, Clone)]
pub struct RenameMethod {
    from: String,
    to: String,
    arity: Option<usize>,
}

impl RenameMethod {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            arity: None,
        }
    }

    pub fn with_arity(mut self, arity: Option<usize>) -> Self {
        self.arity = arity;
        self
    }
}

impl Action for RenameMethod {
    fn apply(&self, node: &SyntaxNode, _ctx: &mut ActionContext<'_>) -> Result<Rewrite, ActionError> {
        let function = required(node, Field::Function)?;
        if !function.is(SyntaxKind::Attribute) {
            return Ok(Rewrite::unchanged(node));
        }
        let renamed = with_attribute_name(&function, &self.to);
        Ok(Rewrite::new(node.with_field(Field::Function, renamed)))
    }
}

impl RuleFamily for RenameMethod {
    fn patterns(&self) -> Vec<Pattern> {
        let call = Pattern::method_call(&self.from);
        let call = match self.arity {
            Some(arity) => call.with(Field::Arguments, Pattern::positional(arity)),
            None => call,
        };
        vec![call.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::rule::RuleSet;

    fn engine(rule: crate::rule::Rule) -> Engine {
        let mut rules = RuleSet::new();
        rules.add(rule).unwrap();
        Engine::new(rules)
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn test_rename_attribute_reference_and_call() {
        let rule = RenameAttribute::new("Foo", pairs(&[("Bar", "Baz")]))
            .into_rule("foo-bar", "")
            .unwrap();
        let engine = engine(rule);
        assert_eq!(engine.transform_source("Foo.Bar(1, 2)\n").unwrap().output, "Foo.Baz(1, 2)\n");
        assert_eq!(
            engine.transform_source("isinstance(x, Foo.Bar)\n").unwrap().output,
            "isinstance(x, Foo.Baz)\n"
        );
        assert_eq!(engine.transform_source("Other.Bar\n").unwrap().output, "Other.Bar\n");
    }

    #[test]
    fn test_rename_attribute_through_alias() {
        let rule = RenameAttribute::new("wx", pairs(&[("Color", "Colour")]))
            .into_rule("color", "")
            .unwrap();
        let engine = engine(rule);
        assert_eq!(
            engine.transform_source("import wx as w\nw.Color(1)\n").unwrap().output,
            "import wx as w\nw.Colour(1)\n"
        );
    }

    #[test]
    fn test_rename_attribute_skips_shadowed_module() {
        let rule = RenameAttribute::new("wx", pairs(&[("Color", "Colour")]))
            .into_rule("color", "")
            .unwrap();
        let source = "import wx\n\ndef f(wx):\n    return wx.Color\n";
        let outcome = engine(rule).transform_source(source).unwrap();
        assert_eq!(outcome.output, source);
        assert!(!outcome.changed);
    }

    #[test]
    fn test_calls_only_leaves_references() {
        let rule = RenameAttribute::new("wx", pairs(&[("Colour", "Color")]))
            .calls_only()
            .into_rule("colour", "")
            .unwrap();
        let engine = engine(rule);
        assert_eq!(
            engine.transform_source("wx.Colour(255, 255, 255)\n").unwrap().output,
            "wx.Color(255, 255, 255)\n"
        );
        assert_eq!(engine.transform_source("c = wx.Colour\n").unwrap().output, "c = wx.Colour\n");
    }

    #[test]
    fn test_rename_method_with_arity() {
        let rule = RenameMethod::new("AppendItem", "Append")
            .with_arity(Some(1))
            .into_rule("append-item", "")
            .unwrap();
        let engine = engine(rule);
        assert_eq!(
            engine.transform_source("menu.AppendItem(menu_item)\n").unwrap().output,
            "menu.Append(menu_item)\n"
        );
        let other = "menu.AppendItem(parent, text, image=-1, selImage=-1, data=None)\n";
        assert_eq!(engine.transform_source(other).unwrap().output, other);
    }
}
