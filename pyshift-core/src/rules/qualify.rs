use super::{attribute_name, lookup, required, RuleFamily};
use crate::diagnostics::DiagnosticKind;
use crate::edits::{ImportSpec, PendingEdit};
use crate::matcher::Pattern;
use crate::rule::{Action, ActionContext, ActionError, Rewrite};
use crate::syntax::{build, Field, SyntaxKind, SyntaxNode};

/// Replace deprecated module-level factories with their qualified successors
///
/// `wx.BitmapFromImage(...)` becomes `wx.Bitmap(...)`. A bare call to a name
/// brought in with `from wx import BitmapFromImage` is qualified through the
/// module, importing it if needed and dropping the now unused `from` import.
/// Replacements may be dotted, e.g. `DateTimeFromDMY` to `DateTime.FromDMY`.
#[derive(Debug, Clone)]
pub struct QualifyImported {
    module: String,
    symbols: Vec<(String, String)>,
}

impl QualifyImported {
    pub fn new(module: impl Into<String>, symbols: Vec<(String, String)>) -> Self {
        Self {
            module: module.into(),
            symbols,
        }
    }

    fn qualify_name(&self, node: &SyntaxNode, name: &str, ctx: &mut ActionContext<'_>) -> Rewrite {
        let Some(binding) = ctx.imports().resolve(name).cloned() else {
            return Rewrite::unchanged(node);
        };
        if binding.module != self.module {
            return Rewrite::unchanged(node);
        }
        let Some(replacement) = binding
            .name
            .as_deref()
            .and_then(|original| lookup(&self.symbols, original))
        else {
            return Rewrite::unchanged(node);
        };
        if ctx.is_shadowed(name) {
            ctx.report(
                DiagnosticKind::ShadowedName,
                format!("`{}` is bound locally; left the call alone", name),
            );
            return Rewrite::unchanged(node);
        }

        let (path, imported) = match ctx.imports().module_binding(&self.module) {
            Some(path) => (path, None),
            None => (
                self.module.clone(),
                Some(PendingEdit::AddImport(ImportSpec::module(self.module.as_str()))),
            ),
        };
        let head = path.split('.').next().unwrap_or(&path);
        if ctx.is_shadowed(head) {
            ctx.report(
                DiagnosticKind::ShadowedName,
                format!("`{}` is bound locally; cannot qualify `{}`", head, name),
            );
            return Rewrite::unchanged(node);
        }

        let function = build::dotted_expression(&format!("{}.{}", path, replacement));
        let mut rewrite = Rewrite::new(node.with_field(Field::Function, function));
        if let Some(edit) = imported {
            rewrite = rewrite.with_edit(edit);
        }
        rewrite.with_edit(PendingEdit::RemoveImport(binding.spec()))
    }

    fn qualify_attribute(
        &self,
        node: &SyntaxNode,
        function: &SyntaxNode,
        ctx: &mut ActionContext<'_>,
    ) -> Result<Rewrite, ActionError> {
        let Some(name) = attribute_name(function) else {
            return Ok(Rewrite::unchanged(node));
        };
        let Some(replacement) = lookup(&self.symbols, &name).filter(|replacement| *replacement != name) else {
            return Ok(Rewrite::unchanged(node));
        };
        let object = required(function, Field::Object)?;
        if !ctx.refers_to_module(&object, &self.module) {
            return Ok(Rewrite::unchanged(node));
        }
        let function = replacement.split('.').fold(object, build::attribute);
        Ok(Rewrite::new(node.with_field(Field::Function, function)))
    }
}

impl Action for QualifyImported {
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> Result<Rewrite, ActionError> {
        let function = required(node, Field::Function)?;
        match function.kind() {
            SyntaxKind::Identifier => {
                let name = function.significant_text();
                Ok(self.qualify_name(node, &name, ctx))
            }
            SyntaxKind::Attribute => self.qualify_attribute(node, &function, ctx),
            _ => Ok(Rewrite::unchanged(node)),
        }
    }
}

impl RuleFamily for QualifyImported {
    fn patterns(&self) -> Vec<Pattern> {
        // Bare calls are resolved through the import table, so aliases are covered too
        let mut patterns: Vec<Pattern> = vec![Pattern::call(Pattern::node(SyntaxKind::Identifier)).into()];
        patterns.extend(self.symbols.iter().map(|(from, _)| {
            Pattern::from(Pattern::call(Pattern::attribute(
                Pattern::Wildcard,
                Pattern::name(from.as_str()),
            )))
        }));
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::rule::RuleSet;
    use pretty_assertions::assert_eq;

    fn engine() -> Engine {
        let symbols = [
            ("BitmapFromImage", "Bitmap"),
            ("ImageFromStream", "Image"),
            ("EmptyIcon", "Icon"),
            ("DateTimeFromDMY", "DateTime.FromDMY"),
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        let mut rules = RuleSet::new();
        rules
            .add(QualifyImported::new("wx", symbols).into_rule("deprecated", "").unwrap())
            .unwrap();
        Engine::new(rules)
    }

    fn transform(source: &str) -> String {
        engine().transform_source(source).unwrap().output
    }

    #[test]
    fn test_qualified_call() {
        assert_eq!(transform("wx.BitmapFromImage()\n"), "wx.Bitmap()\n");
        assert_eq!(transform("wx.DateTimeFromDMY(*args)\n"), "wx.DateTime.FromDMY(*args)\n");
    }

    #[test]
    fn test_from_import_replaced_by_module_import() {
        assert_eq!(
            transform("from wx import BitmapFromImage\n\nBitmapFromImage()\n"),
            "import wx\n\nwx.Bitmap()\n"
        );
    }

    #[test]
    fn test_from_import_through_existing_alias() {
        assert_eq!(
            transform("import wx as w\nfrom wx import EmptyIcon as blank\n\nicon = blank()\n"),
            "import wx as w\n\nicon = w.Icon()\n"
        );
    }

    #[test]
    fn test_from_import_kept_while_still_referenced() {
        let outcome = engine()
            .transform_source("from wx import EmptyIcon\n\nicon = EmptyIcon()\nfactory = EmptyIcon\n")
            .unwrap();
        assert_eq!(
            outcome.output,
            "from wx import EmptyIcon\nimport wx\n\nicon = wx.Icon()\nfactory = EmptyIcon\n"
        );
        assert!(outcome
            .diagnostics
            .iter()
            .any(|diagnostic| diagnostic.kind == DiagnosticKind::ImportKept));
    }

    #[test]
    fn test_other_modules_untouched() {
        let source = "from other import BitmapFromImage\n\nBitmapFromImage()\nlen(x)\n";
        assert_eq!(transform(source), source);
    }

    #[test]
    fn test_locally_rebound_name_skipped() {
        let source = "from wx import EmptyIcon\n\ndef f(EmptyIcon):\n    return EmptyIcon()\n";
        let outcome = engine().transform_source(source).unwrap();
        assert_eq!(outcome.output, source);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|diagnostic| diagnostic.kind == DiagnosticKind::ShadowedName));
    }
}
