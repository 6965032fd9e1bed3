//! Scope Frames and Scope-Aware Synthesis
//!
//! A [`ScopeFrame`] is open while traversal is inside a class or function
//! body, a lambda body or a comprehension. It tracks the body as it is being
//! rewritten, the names the scope binds and the members synthesized for it.
//! When the frame closes the synthesized members are appended to the rebuilt
//! definition.

use crate::imports::{collect_bound_names, collect_targets};
use crate::matcher::{matches, Pattern};
use crate::syntax::{Child, Element, Field, SyntaxKind, SyntaxNode, Token, TokenKind};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Class,
    Function,
    Lambda,
    Comprehension,
}

/// An open scope
#[derive(Debug, Clone)]
pub struct ScopeFrame {
    kind: FrameKind,
    name: String,
    /// Direct body statements; replaced by their rewritten form as traversal finishes them
    members: Vec<SyntaxNode>,
    bindings: BTreeSet<String>,
    /// Indentation of the body, `None` when the body sits on the header line
    indent: Option<String>,
    synthesized: Vec<SyntaxNode>,
}

impl ScopeFrame {
    /// Open a frame for a class, function, lambda or comprehension
    pub fn open(definition: &SyntaxNode) -> Option<Self> {
        let kind = match definition.kind() {
            SyntaxKind::ClassDefinition => FrameKind::Class,
            SyntaxKind::FunctionDefinition => FrameKind::Function,
            SyntaxKind::Lambda => FrameKind::Lambda,
            kind if kind.is_comprehension() => FrameKind::Comprehension,
            _ => return None,
        };
        let name = definition
            .field(Field::Name)
            .map(|name| name.significant_text())
            .unwrap_or_else(|| definition.kind().to_string());
        let members: Vec<SyntaxNode> = definition
            .field(Field::Body)
            .filter(|body| body.is(SyntaxKind::Block))
            .map(|block| block.nodes().collect())
            .unwrap_or_default();

        let mut bindings = BTreeSet::new();
        match kind {
            FrameKind::Function | FrameKind::Lambda => {
                if let Some(parameters) = definition.field(Field::Parameters) {
                    bindings.extend(parameters.nodes().filter_map(|parameter| parameter_name(&parameter)));
                }
            }
            FrameKind::Comprehension => {
                let targets = definition
                    .nodes()
                    .filter(|clause| clause.is(SyntaxKind::ForInClause))
                    .filter_map(|clause| clause.field(Field::Left));
                for target in targets {
                    collect_targets(&target, &mut bindings);
                }
            }
            FrameKind::Class => {}
        }
        for member in &members {
            collect_bound_names(member, true, &mut bindings);
        }

        let indent = match kind {
            FrameKind::Class | FrameKind::Function => body_indent(definition),
            FrameKind::Lambda | FrameKind::Comprehension => None,
        };
        Some(Self {
            kind,
            name,
            members,
            bindings,
            indent,
            synthesized: Vec::new(),
        })
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[SyntaxNode] {
        &self.members
    }

    pub fn synthesized(&self) -> &[SyntaxNode] {
        &self.synthesized
    }

    pub fn binds(&self, name: &str) -> bool {
        self.bindings.contains(name)
    }

    pub fn indent(&self) -> Option<&str> {
        self.indent.as_deref()
    }

    pub(crate) fn update_member(&mut self, index: usize, member: SyntaxNode) {
        if let Some(slot) = self.members.get_mut(index) {
            *slot = member;
        }
    }

    /// Append the synthesized members to the rebuilt `definition`
    pub fn close(self, definition: SyntaxNode) -> SyntaxNode {
        let (Some(indent), Some(body)) = (self.indent.as_deref(), definition.field(Field::Body)) else {
            return definition;
        };
        if self.synthesized.is_empty() {
            return definition;
        }

        let mut children: Vec<Child> = body.children().collect();
        let mut at = children
            .iter()
            .rposition(|child| child.as_node().is_some())
            .map_or(children.len(), |index| index + 1);
        let mut preceding: String = children[..at]
            .iter()
            .map(|child| match &child.element {
                Element::Node(node) => node.text(),
                Element::Token(token) => token.text().to_string(),
            })
            .collect();

        for member in self.synthesized {
            let separator = if preceding.ends_with('\n') {
                format!("\n{}", indent)
            } else {
                format!("\n\n{}", indent)
            };
            preceding = member.text();
            children.insert(at, Child::token(TokenKind::Whitespace, &separator));
            children.insert(at + 1, Child::node(None, member));
            at += 2;
        }

        let body = body.with_children(children);
        definition.with_field(Field::Body, body)
    }
}

/// Identifier bound by one parameter node
fn parameter_name(parameter: &SyntaxNode) -> Option<String> {
    match parameter.kind() {
        SyntaxKind::Identifier => Some(parameter.significant_text()),
        SyntaxKind::DefaultParameter | SyntaxKind::TypedDefaultParameter => parameter
            .field(Field::Name)
            .and_then(|name| name.identifier_text()),
        SyntaxKind::TypedParameter | SyntaxKind::ListSplatPattern | SyntaxKind::DictionarySplatPattern => {
            parameter.nodes().next().and_then(|inner| parameter_name(&inner))
        }
        _ => None,
    }
}

/// Indentation of a definition's body, read from the trivia after the header colon
fn body_indent(definition: &SyntaxNode) -> Option<String> {
    let body = definition.field_index(Field::Body)?;
    let header: Vec<Child> = definition.children().take(body).collect();
    let colon = header.iter().rposition(|child| {
        matches!(&child.element, Element::Token(token) if token.kind() == TokenKind::Punct && token.text() == ":")
    })?;
    let gap: String = header[colon + 1..]
        .iter()
        .filter_map(|child| child.element.as_token())
        .map(Token::text)
        .collect();
    let (_, indent) = gap.rsplit_once('\n')?;
    indent
        .chars()
        .all(|c| c == ' ' || c == '\t')
        .then(|| indent.to_string())
}

/// Shift every line after the first of `node` right by `indent`
///
/// String literals are left untouched so multi-line strings keep their content.
pub fn reindent(node: &SyntaxNode, indent: &str) -> SyntaxNode {
    if node.is(SyntaxKind::StringLiteral) {
        return node.clone();
    }
    let children = node
        .children()
        .map(|child| match &child.element {
            Element::Node(inner) => Child::node(child.field, reindent(inner, indent)),
            Element::Token(token) if token.kind() == TokenKind::Whitespace && token.text().contains('\n') => {
                Child::token(TokenKind::Whitespace, &indent_lines(token.text(), indent))
            }
            Element::Token(_) => child.clone(),
        })
        .collect();
    node.with_children(children)
}

fn indent_lines(text: &str, indent: &str) -> String {
    let mut out = String::with_capacity(text.len() + indent.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '\n' && !matches!(chars.peek(), Some('\n' | '\r')) {
            out.push_str(indent);
        }
    }
    out
}

/// Drop whitespace at the very end of `node`
pub fn trim_trailing_whitespace(node: &SyntaxNode) -> SyntaxNode {
    let mut children: Vec<Child> = node.children().collect();
    while let Some(last) = children.last() {
        match &last.element {
            Element::Token(token) if token.kind() == TokenKind::Whitespace => {
                children.pop();
            }
            Element::Node(inner) => {
                let trimmed = trim_trailing_whitespace(inner);
                let field = last.field;
                children.pop();
                children.push(Child::node(field, trimmed));
                break;
            }
            Element::Token(_) => break,
        }
    }
    node.with_children(children)
}

/// Shape of a member a class is expected to declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationPattern {
    name: String,
    pattern: Pattern,
}

impl DeclarationPattern {
    /// A method `name(receiver, ...)`; parameters after the receiver don't care
    pub fn method(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: Pattern::method_definition(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `member` declares this; decorated definitions are looked through
    pub fn matches(&self, member: &SyntaxNode) -> bool {
        let definition = match member.kind() {
            SyntaxKind::DecoratedDefinition => match member.field(Field::Definition) {
                Some(definition) => definition,
                None => return false,
            },
            _ => member.clone(),
        };
        matches(&definition, &self.pattern)
    }
}

/// Outcome of [`ScopeStack::ensure_declaration`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthesis {
    AlreadyPresent,
    Appended,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnresolvedScopeError {
    #[error("no enclosing class to declare `{member}` in")]
    NoEnclosingClass { member: String },

    #[error("class `{class}` has its body on the header line; `{member}` not declared")]
    InlineBody { class: String, member: String },
}

/// Saved synthesis state, used to revert a failed rule action
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint(Vec<usize>);

/// The enclosing class/function frames at the current traversal position
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: ScopeFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<ScopeFrame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&self) -> Option<&ScopeFrame> {
        self.frames.last()
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut ScopeFrame> {
        self.frames.last_mut()
    }

    /// Nearest enclosing class frame
    pub fn enclosing_class(&self) -> Option<&ScopeFrame> {
        self.frames.iter().rev().find(|frame| frame.kind == FrameKind::Class)
    }

    /// Whether `name` is bound locally and so does not refer to a module-level import
    ///
    /// Function, lambda and comprehension scopes are visible to everything
    /// nested in them; a class body only to code directly inside it.
    pub fn is_shadowed(&self, name: &str) -> bool {
        let innermost = self.frames.len().saturating_sub(1);
        self.frames.iter().enumerate().any(|(index, frame)| {
            frame.binds(name) && (frame.kind != FrameKind::Class || index == innermost)
        })
    }

    /// Make sure the nearest enclosing class declares a member matching `pattern`
    ///
    /// The search covers the class's direct body in its current, partially
    /// rewritten state plus members synthesized earlier. Inherited members
    /// are not considered. When absent, `template` is recorded and appended
    /// (reindented to the body) when the class frame closes.
    pub fn ensure_declaration(
        &mut self,
        pattern: &DeclarationPattern,
        template: &SyntaxNode,
    ) -> Result<Synthesis, UnresolvedScopeError> {
        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.kind == FrameKind::Class)
            .ok_or_else(|| UnresolvedScopeError::NoEnclosingClass {
                member: pattern.name().to_string(),
            })?;

        if frame
            .members
            .iter()
            .chain(&frame.synthesized)
            .any(|member| pattern.matches(member))
        {
            return Ok(Synthesis::AlreadyPresent);
        }

        let indent = frame.indent.clone().ok_or_else(|| UnresolvedScopeError::InlineBody {
            class: frame.name.clone(),
            member: pattern.name().to_string(),
        })?;
        let member = reindent(&trim_trailing_whitespace(template), &indent);
        frame.synthesized.push(member);
        Ok(Synthesis::Appended)
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.frames.iter().map(|frame| frame.synthesized.len()).collect())
    }

    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        for (frame, len) in self.frames.iter_mut().zip(checkpoint.0) {
            frame.synthesized.truncate(len);
        }
    }
}
