use super::{attribute_name, required, RuleFamily};
use crate::edits::{ImportSpec, PendingEdit};
use crate::matcher::Pattern;
use crate::rule::{Action, ActionContext, ActionError, Rewrite};
use crate::syntax::{build, Field, SyntaxNode};

/// Move `module.Name` to `module.submodule.Name`, importing the submodule
#[derive(Debug, Clone)]
pub struct MoveToSubmodule {
    module: String,
    submodule: String,
    names: Vec<String>,
}

impl MoveToSubmodule {
    pub fn new(module: impl Into<String>, submodule: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            module: module.into(),
            submodule: submodule.into(),
            names,
        }
    }

    fn qualified_submodule(&self) -> String {
        format!("{}.{}", self.module, self.submodule)
    }
}

impl Action for MoveToSubmodule {
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> Result<Rewrite, ActionError> {
        let moved = attribute_name(node).is_some_and(|name| self.names.contains(&name));
        let object = required(node, Field::Object)?;
        if !moved || !ctx.refers_to_module(&object, &self.module) {
            return Ok(Rewrite::unchanged(node));
        }

        let object = build::attribute(object, &self.submodule);
        Ok(Rewrite::new(node.with_field(Field::Object, object))
            .with_edit(PendingEdit::AddImport(ImportSpec::module(self.qualified_submodule()))))
    }
}

impl RuleFamily for MoveToSubmodule {
    fn patterns(&self) -> Vec<Pattern> {
        self.names
            .iter()
            .map(|name| Pattern::attribute(Pattern::Wildcard, Pattern::name(name.as_str())))
            .collect()
    }
}
