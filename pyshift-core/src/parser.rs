//! Lossless Python front end
//!
//! Lowers a tree-sitter-python parse into [`SyntaxNode`]s. Every byte between
//! grammar nodes is kept as a trivia token, so `parse_module(src)?.text() == src`.

use crate::syntax::{Field, SyntaxKind, SyntaxNode, TokenKind, TreeBuilder};
use crate::{Result, TransformError};
use tree_sitter::{Parser, TreeCursor};

/// Parser for Python modules and snippets
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(tree_sitter_python::language())?;
        Ok(Self { parser })
    }

    /// Parse a whole module; sources with syntax errors are rejected
    pub fn parse_module(&mut self, source: &str) -> Result<SyntaxNode> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| TransformError::Parse("Failed to parse source code".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(TransformError::Parse(format!(
                "syntax error near line {}",
                first_error_line(&mut tree.walk()).unwrap_or(root.start_position().row) + 1
            )));
        }

        let mut builder = TreeBuilder::new();
        lower(&mut builder, &mut tree.walk(), source, None, 0, source.len());
        Ok(builder.finish())
    }

    /// Parse a single statement such as a method template
    pub fn parse_statement(&mut self, source: &str) -> Result<SyntaxNode> {
        let module = self.parse_module(source)?;
        let mut statements = module.nodes();
        match (statements.next(), statements.next()) {
            (Some(statement), None) => Ok(statement),
            _ => Err(TransformError::Parse(format!(
                "expected exactly one statement in {:?}",
                source.trim()
            ))),
        }
    }

    /// Parse a single expression
    pub fn parse_expression(&mut self, source: &str) -> Result<SyntaxNode> {
        let statement = self.parse_statement(source)?;
        let mut nodes = statement.nodes();
        match (statement.kind(), nodes.next(), nodes.next()) {
            (SyntaxKind::ExpressionStatement, Some(expression), None) => Ok(expression),
            _ => Err(TransformError::Parse(format!(
                "expected an expression, found {}",
                statement.kind()
            ))),
        }
    }
}

/// Parse a module with a fresh parser
pub fn parse_module(source: &str) -> Result<SyntaxNode> {
    PythonParser::new()?.parse_module(source)
}

pub fn parse_statement(source: &str) -> Result<SyntaxNode> {
    PythonParser::new()?.parse_statement(source)
}

pub fn parse_expression(source: &str) -> Result<SyntaxNode> {
    PythonParser::new()?.parse_expression(source)
}

fn first_error_line(cursor: &mut TreeCursor<'_>) -> Option<usize> {
    let node = cursor.node();
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }
    if !node.has_error() || !cursor.goto_first_child() {
        return None;
    }
    let found = loop {
        let found = first_error_line(cursor);
        if found.is_some() || !cursor.goto_next_sibling() {
            break found;
        }
    };
    cursor.goto_parent();
    found
}

/// Lower the node under `cursor`, covering exactly `start..end` of `source`
fn lower(
    builder: &mut TreeBuilder,
    cursor: &mut TreeCursor<'_>,
    source: &str,
    field: Option<Field>,
    start: usize,
    end: usize,
) {
    builder.start_node(field, SyntaxKind::from_ts(cursor.node().kind()));
    let mut pos = start;

    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            let child_field = cursor.field_name().map(Field::from_ts);
            let child_start = child.start_byte().clamp(pos, end);
            let child_end = child.end_byte().clamp(child_start, end);

            if child_start > pos {
                let gap = &source[pos..child_start];
                builder.token(TokenKind::of_gap(gap), gap);
            }

            let text = &source[child_start..child_end];
            if child.is_extra() {
                if !text.is_empty() {
                    builder.token(TokenKind::Comment, text);
                }
            } else if child.is_named() {
                lower(builder, cursor, source, child_field, child_start, child_end);
            } else if !text.is_empty() {
                let token_kind = if text.chars().all(|c| c.is_alphabetic() || c == '_') {
                    TokenKind::Keyword
                } else {
                    TokenKind::Punct
                };
                builder.token(token_kind, text);
            }

            pos = child_end;
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    } else if end > start {
        builder.token(TokenKind::Text, &source[start..end]);
        pos = end;
    }

    if end > pos {
        let gap = &source[pos..end];
        builder.token(TokenKind::of_gap(gap), gap);
    }

    builder.finish_node(field);
}
