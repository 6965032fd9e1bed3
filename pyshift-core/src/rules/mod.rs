//! Rule Families
//!
//! Reusable actions that migration catalogs instantiate with concrete
//! old-name → new-name tables.

use crate::matcher::Pattern;
use crate::rule::{Action, ActionError, Rule};
use crate::syntax::{build, Field, SyntaxKind, SyntaxNode};
use crate::Result;

pub mod annotations;
pub mod arguments;
pub mod qualify;
pub mod rename;
pub mod submodule;
pub mod synthesize;

pub use annotations::DefaultReturnAnnotation;
pub use arguments::{AppendArgument, RenameKeywords};
pub use qualify::QualifyImported;
pub use rename::{RenameAttribute, RenameMethod};
pub use submodule::MoveToSubmodule;
pub use synthesize::EnsureMethod;

/// An action that knows which nodes it applies to
pub trait RuleFamily: Action + Sized + 'static {
    /// Patterns selecting the nodes handed to the action
    fn patterns(&self) -> Vec<Pattern>;

    /// Turn this family instance into a registered rule
    fn into_rule(self, name: &str, description: &str) -> Result<Rule> {
        let patterns = self.patterns();
        Rule::new(name, description, patterns, self)
    }
}

/// `field` of `node`, or an error naming it
pub(crate) fn required(node: &SyntaxNode, field: Field) -> std::result::Result<SyntaxNode, ActionError> {
    node.field(field).ok_or(ActionError::MissingField(field.as_str()))
}

/// Check `node` has the expected kind
pub(crate) fn expect_kind(
    node: &SyntaxNode,
    kind: SyntaxKind,
    expected: &'static str,
) -> std::result::Result<(), ActionError> {
    if node.is(kind) {
        Ok(())
    } else {
        Err(ActionError::UnexpectedShape {
            expected,
            found: node.kind(),
        })
    }
}

/// `attribute` with its trailing name replaced
pub(crate) fn with_attribute_name(attribute: &SyntaxNode, name: &str) -> SyntaxNode {
    attribute.with_field(Field::Attribute, build::identifier(name))
}

/// Trailing name of an attribute node
pub(crate) fn attribute_name(attribute: &SyntaxNode) -> Option<String> {
    attribute
        .field(Field::Attribute)
        .and_then(|name| name.identifier_text())
}

/// Look up `key` in an ordered rename table
pub(crate) fn lookup<'t>(table: &'t [(String, String)], key: &str) -> Option<&'t str> {
    table
        .iter()
        .find(|(from, _)| from == key)
        .map(|(_, to)| to.as_str())
}
