use super::RuleFamily;
use crate::matcher::Pattern;
use crate::parser::parse_expression;
use crate::rule::{Action, ActionContext, ActionError, Rewrite};
use crate::syntax::{build, Child, Field, SyntaxKind, SyntaxNode, TokenKind};
use crate::Result;

/// Give every function without a return annotation a default one
#[derive(Debug, Clone)]
pub struct DefaultReturnAnnotation {
    annotation: SyntaxNode,
}

impl DefaultReturnAnnotation {
    /// `annotation` is Python expression source, usually `"None"`
    pub fn new(annotation: &str) -> Result<Self> {
        Ok(Self {
            annotation: parse_expression(annotation)?,
        })
    }
}

impl Action for DefaultReturnAnnotation {
    fn apply(&self, node: &SyntaxNode, _ctx: &mut ActionContext<'_>) -> std::result::Result<Rewrite, ActionError> {
        let parameters = node
            .field_index(Field::Parameters)
            .ok_or(ActionError::MissingField(Field::Parameters.as_str()))?;
        let at = parameters + 1;
        let annotation = vec![
            Child::token(TokenKind::Whitespace, " "),
            Child::token(TokenKind::Punct, "->"),
            Child::token(TokenKind::Whitespace, " "),
            Child::node(Some(Field::ReturnType), build::type_annotation(self.annotation.clone())),
        ];
        Ok(Rewrite::new(node.splice(at..at, annotation)))
    }
}

impl RuleFamily for DefaultReturnAnnotation {
    fn patterns(&self) -> Vec<Pattern> {
        vec![Pattern::node(SyntaxKind::FunctionDefinition)
            .with(Field::ReturnType, Pattern::Absent)
            .into()]
    }
}
