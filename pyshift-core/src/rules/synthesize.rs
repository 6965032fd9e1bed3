use super::RuleFamily;
use crate::matcher::Pattern;
use crate::parser::parse_statement;
use crate::rule::{Action, ActionContext, ActionError, Rewrite};
use crate::synthesis::DeclarationPattern;
use crate::syntax::SyntaxNode;
use crate::{Result, TransformError};
use pyshift_utils::string::dedent;

/// Declare a helper method in the enclosing class when `receiver.method(...)` is called
///
/// The call itself is left alone. The method is appended to the nearest
/// enclosing class unless a method of that name taking a receiver is already
/// declared there.
#[derive(Debug, Clone)]
pub struct EnsureMethod {
    receiver: String,
    method: String,
    declaration: DeclarationPattern,
    template: SyntaxNode,
}

impl EnsureMethod {
    /// `template` is the method's source; common indentation is stripped
    pub fn new(receiver: impl Into<String>, method: impl Into<String>, template: &str) -> Result<Self> {
        let method = method.into();
        let declaration = DeclarationPattern::method(&method);
        let template = parse_statement(&dedent(template))?;
        if !declaration.matches(&template) {
            return Err(TransformError::InvalidRule {
                rule: method,
                message: "template does not declare the method it stands for".to_string(),
            });
        }
        Ok(Self {
            receiver: receiver.into(),
            method,
            declaration,
            template,
        })
    }
}

impl Action for EnsureMethod {
    fn apply(&self, node: &SyntaxNode, ctx: &mut ActionContext<'_>) -> std::result::Result<Rewrite, ActionError> {
        ctx.ensure_declaration(&self.declaration, &self.template);
        Ok(Rewrite::unchanged(node))
    }
}

impl RuleFamily for EnsureMethod {
    fn patterns(&self) -> Vec<Pattern> {
        let callee = Pattern::attribute(
            Pattern::name(self.receiver.as_str()),
            Pattern::name(self.method.as_str()),
        );
        vec![Pattern::call(callee).into()]
    }
}
