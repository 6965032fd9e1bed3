//! Pending Edits and Import Section Rewriting
//!
//! Rule actions never touch imports directly. They emit [`PendingEdit`]s
//! which are collected for the whole module, deduplicated and applied once
//! after traversal.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::imports::{from_module, import_items, ImportTable};
use crate::syntax::{build, Child, Element, Field, SyntaxKind, SyntaxNode, TokenKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An import, either `import module [as alias]` or `from module import name [as alias]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportSpec {
    pub module: String,
    pub name: Option<String>,
    pub alias: Option<String>,
}

impl ImportSpec {
    /// `import module`
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: None,
            alias: None,
        }
    }

    /// `from module import name`
    pub fn name(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: Some(name.into()),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    /// Name the import makes visible in the module
    pub fn local_name(&self) -> String {
        match (&self.alias, &self.name) {
            (Some(alias), _) => alias.clone(),
            (None, Some(name)) => name.clone(),
            (None, None) => self.module.split('.').next().unwrap_or_default().to_string(),
        }
    }

    fn to_statement(&self) -> SyntaxNode {
        match &self.name {
            Some(name) => build::import_from_statement(
                &self.module,
                &[(name.clone(), self.alias.clone())],
            ),
            None => build::import_statement(&self.module, self.alias.as_deref()),
        }
    }
}

impl fmt::Display for ImportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "from {} import {}", self.module, name)?,
            None => write!(f, "import {}", self.module)?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " as {}", alias)?;
        }
        Ok(())
    }
}

/// Deferred change to the import section
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingEdit {
    AddImport(ImportSpec),
    RemoveImport(ImportSpec),
}

/// Deduplicated edits of one module
///
/// Identical edits collapse to their first emission. An add always wins over
/// a remove of the same spec, whichever was emitted first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    adds: Vec<ImportSpec>,
    removes: Vec<ImportSpec>,
}

impl EditSet {
    pub fn new(edits: impl IntoIterator<Item = PendingEdit>) -> Self {
        let mut set = Self::default();
        for edit in edits {
            match edit {
                PendingEdit::AddImport(spec) if !set.adds.contains(&spec) => set.adds.push(spec),
                PendingEdit::RemoveImport(spec) if !set.removes.contains(&spec) => {
                    set.removes.push(spec)
                }
                _ => {}
            }
        }
        let adds = set.adds.clone();
        set.removes.retain(|spec| !adds.contains(spec));
        set
    }

    pub fn adds(&self) -> &[ImportSpec] {
        &self.adds
    }

    pub fn removes(&self) -> &[ImportSpec] {
        &self.removes
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }
}

/// Apply `edits` to the import section of `module`
///
/// Returns `module` itself when there is nothing to do.
pub fn apply_edits(module: &SyntaxNode, edits: &EditSet, diagnostics: &mut Vec<Diagnostic>) -> SyntaxNode {
    if edits.is_empty() {
        return module.clone();
    }

    let table = ImportTable::gather(module);
    let adds: Vec<&ImportSpec> = edits
        .adds()
        .iter()
        .filter(|spec| !table.provides(spec))
        .collect();

    let referenced = referenced_names(module);
    let removes: Vec<&ImportSpec> = edits
        .removes()
        .iter()
        .filter(|spec| {
            let still_used = referenced.contains(&spec.local_name());
            if still_used {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ImportKept,
                    None,
                    format!("kept `{}`: `{}` is still referenced", spec, spec.local_name()),
                ));
            }
            !still_used
        })
        .collect();

    if adds.is_empty() && removes.is_empty() {
        return module.clone();
    }

    let mut children: Vec<Child> = Vec::with_capacity(module.child_count() + adds.len() * 2);
    // Slot of the first removed statement, and whether it opened the module
    let mut first_removed: Option<(usize, bool)> = None;
    // Last kept statement of the leading import block
    let mut last_import: Option<usize> = None;
    let mut in_block = true;
    let mut leading_gap = false;

    for child in module.children() {
        let Some(statement) = child.as_node().filter(|node| node.kind().is_import()).cloned() else {
            if let Some(node) = child.as_node() {
                let opening_docstring = is_docstring(node) && !children.iter().any(|c| c.as_node().is_some());
                in_block &= opening_docstring;
            }
            children.push(child);
            continue;
        };
        match prune_statement(&statement, &removes) {
            Pruned::Kept => {
                children.push(child);
                if in_block {
                    last_import = Some(children.len() - 1);
                }
            }
            Pruned::Rebuilt(node) => {
                children.push(Child::node(child.field, node));
                if in_block {
                    last_import = Some(children.len() - 1);
                }
            }
            Pruned::Removed => {
                let leading = !children.iter().any(|c| c.as_node().is_some());
                if !leading {
                    if children.last().is_some_and(is_whitespace) {
                        children.pop();
                    }
                } else if let Some((slot, _)) = first_removed {
                    while children.len() > slot && children.last().is_some_and(is_whitespace) {
                        children.pop();
                    }
                }
                leading_gap |= leading;
                first_removed.get_or_insert((children.len(), leading));
            }
        }
    }

    let in_place = last_import.is_none() && first_removed.is_some() && !adds.is_empty();
    if leading_gap && !in_place {
        // Statements removed from the top of the module leave no blank gap
        if let Some((slot, _)) = first_removed {
            if children.get(slot).is_some_and(is_whitespace) {
                children.remove(slot);
                last_import = last_import.map(|index| if index > slot { index - 1 } else { index });
            }
        }
    }

    if adds.is_empty() {
        return module.with_children(children);
    }

    let mut inserted = Vec::new();
    match (last_import, first_removed) {
        (Some(index), _) => {
            let at = end_of_line(&children, index + 1);
            for spec in &adds {
                inserted.push(Child::token(TokenKind::Whitespace, "\n"));
                inserted.push(Child::node(None, spec.to_statement()));
            }
            children.splice(at..at, inserted);
        }
        (None, Some((at, leading))) => {
            // The newline before a removed statement went with it
            if !leading {
                inserted.push(Child::token(TokenKind::Whitespace, "\n"));
            }
            push_joined(&mut inserted, &adds);
            children.splice(at..at, inserted);
        }
        (None, None) => match docstring_end(&children) {
            Some(at) => {
                inserted.push(Child::token(TokenKind::Whitespace, "\n"));
                push_joined(&mut inserted, &adds);
                children.splice(at..at, inserted);
            }
            None => {
                let at = children
                    .iter()
                    .position(|child| child.as_node().is_some())
                    .unwrap_or(children.len());
                push_joined(&mut inserted, &adds);
                inserted.push(Child::token(TokenKind::Whitespace, "\n\n"));
                children.splice(at..at, inserted);
            }
        },
    }

    module.with_children(children)
}

fn push_joined(out: &mut Vec<Child>, adds: &[&ImportSpec]) {
    for (index, spec) in adds.iter().enumerate() {
        if index > 0 {
            out.push(Child::token(TokenKind::Whitespace, "\n"));
        }
        out.push(Child::node(None, spec.to_statement()));
    }
}

enum Pruned {
    Kept,
    Rebuilt(SyntaxNode),
    Removed,
}

fn prune_statement(statement: &SyntaxNode, removes: &[&ImportSpec]) -> Pruned {
    let (module, items) = match statement.kind() {
        SyntaxKind::ImportStatement => (None, import_items(statement)),
        SyntaxKind::ImportFromStatement => {
            if statement.nodes().any(|node| node.is(SyntaxKind::WildcardImport)) {
                return Pruned::Kept;
            }
            (Some(from_module(statement)), import_items(statement))
        }
        _ => return Pruned::Kept,
    };

    let removed = |name: &String, alias: &Option<String>| {
        removes.iter().any(|spec| match &module {
            Some(module) => {
                spec.module == *module && spec.name.as_ref() == Some(name) && spec.alias == *alias
            }
            None => spec.name.is_none() && spec.module == *name && spec.alias == *alias,
        })
    };

    let remaining: Vec<(String, Option<String>)> = items
        .iter()
        .filter(|(name, alias)| !removed(name, alias))
        .cloned()
        .collect();

    if remaining.len() == items.len() {
        Pruned::Kept
    } else if remaining.is_empty() {
        Pruned::Removed
    } else {
        match module {
            Some(module) => Pruned::Rebuilt(build::import_from_statement(&module, &remaining)),
            None => Pruned::Rebuilt(build::import_statement_of(&remaining)),
        }
    }
}

fn is_whitespace(child: &Child) -> bool {
    matches!(&child.element, Element::Token(token) if token.kind() == TokenKind::Whitespace)
}

/// Index just past `from`'s line: same-line whitespace and a trailing comment
fn end_of_line(children: &[Child], from: usize) -> usize {
    let mut at = from;
    while let Some(Child {
        element: Element::Token(token),
        ..
    }) = children.get(at)
    {
        let same_line = match token.kind() {
            TokenKind::Comment => true,
            TokenKind::Whitespace => !token.text().contains('\n'),
            _ => false,
        };
        if !same_line {
            break;
        }
        at += 1;
    }
    at
}

/// Index just past a leading docstring
fn docstring_end(children: &[Child]) -> Option<usize> {
    let index = children.iter().position(|child| child.as_node().is_some())?;
    children[index]
        .as_node()
        .is_some_and(is_docstring)
        .then_some(index + 1)
}

fn is_docstring(statement: &SyntaxNode) -> bool {
    let mut nodes = statement.nodes();
    statement.is(SyntaxKind::ExpressionStatement)
        && matches!((nodes.next(), nodes.next()), (Some(node), None) if node.is(SyntaxKind::StringLiteral))
}

/// Identifiers used outside import statements, excluding attribute and keyword names
pub(crate) fn referenced_names(module: &SyntaxNode) -> BTreeSet<String> {
    fn walk(node: &SyntaxNode, out: &mut BTreeSet<String>) {
        if node.is(SyntaxKind::Identifier) {
            out.insert(node.significant_text());
            return;
        }
        for child in node.children() {
            let Some(inner) = child.as_node() else { continue };
            let skipped = match node.kind() {
                SyntaxKind::Attribute => child.field == Some(Field::Attribute),
                SyntaxKind::KeywordArgument => child.field == Some(Field::Name),
                _ => false,
            };
            if !skipped {
                walk(inner, out);
            }
        }
    }

    let mut names = BTreeSet::new();
    for statement in module.nodes().filter(|node| !node.kind().is_import()) {
        walk(&statement, &mut names);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;
    use pretty_assertions::assert_eq;

    fn apply(source: &str, edits: Vec<PendingEdit>) -> String {
        let module = parse_module(source).unwrap();
        let mut diagnostics = Vec::new();
        apply_edits(&module, &EditSet::new(edits), &mut diagnostics).text()
    }

    #[test]
    fn test_dedup_keeps_first_emission_order() {
        let set = EditSet::new(vec![
            PendingEdit::AddImport(ImportSpec::module("wx.adv")),
            PendingEdit::AddImport(ImportSpec::module("wx")),
            PendingEdit::AddImport(ImportSpec::module("wx.adv")),
        ]);
        assert_eq!(set.adds(), &[ImportSpec::module("wx.adv"), ImportSpec::module("wx")]);
    }

    #[test]
    fn test_add_wins_over_remove() {
        let set = EditSet::new(vec![
            PendingEdit::RemoveImport(ImportSpec::module("wx")),
            PendingEdit::AddImport(ImportSpec::module("wx")),
        ]);
        assert!(set.removes().is_empty());
        assert_eq!(set.adds().len(), 1);
    }

    #[test]
    fn test_add_to_module_without_imports() {
        let output = apply("wx.adv.DP_ALLOWNONE\n", vec![PendingEdit::AddImport(ImportSpec::module("wx.adv"))]);
        assert_eq!(output, "import wx.adv\n\nwx.adv.DP_ALLOWNONE\n");
    }

    #[test]
    fn test_add_after_docstring() {
        let output = apply(
            "\"\"\"Doc.\"\"\"\n\nx = 1\n",
            vec![PendingEdit::AddImport(ImportSpec::module("wx"))],
        );
        assert_eq!(output, "\"\"\"Doc.\"\"\"\nimport wx\n\nx = 1\n");
    }

    #[test]
    fn test_add_after_last_import_and_its_comment() {
        let output = apply(
            "import os  # system\nimport sys\n\nprint(os, sys)\n",
            vec![PendingEdit::AddImport(ImportSpec::module("wx"))],
        );
        assert_eq!(output, "import os  # system\nimport sys\nimport wx\n\nprint(os, sys)\n");
    }

    #[test]
    fn test_add_already_provided_is_dropped() {
        let source = "import wx.adv\n\nwx.adv.DP_ALLOWNONE\n";
        let output = apply(source, vec![PendingEdit::AddImport(ImportSpec::module("wx.adv"))]);
        assert_eq!(output, source);
    }

    #[test]
    fn test_remove_only_import_replaced_in_place() {
        let output = apply(
            "from wx import BitmapFromImage\n\nwx.Bitmap()\n",
            vec![
                PendingEdit::RemoveImport(ImportSpec::name("wx", "BitmapFromImage")),
                PendingEdit::AddImport(ImportSpec::module("wx")),
            ],
        );
        assert_eq!(output, "import wx\n\nwx.Bitmap()\n");
    }

    #[test]
    fn test_remove_one_name_rebuilds_statement() {
        let output = apply(
            "import os\nfrom wx import BitmapFromImage, Icon\n\nIcon()\n",
            vec![PendingEdit::RemoveImport(ImportSpec::name("wx", "BitmapFromImage"))],
        );
        assert_eq!(output, "import os\nfrom wx import Icon\n\nIcon()\n");
    }

    #[test]
    fn test_remove_whole_statement_between_imports() {
        let output = apply(
            "import os\nfrom wx import EmptyIcon\nimport sys\n\nprint(os, sys)\n",
            vec![PendingEdit::RemoveImport(ImportSpec::name("wx", "EmptyIcon"))],
        );
        assert_eq!(output, "import os\nimport sys\n\nprint(os, sys)\n");
    }

    #[test]
    fn test_add_ignores_imports_after_code() {
        let output = apply(
            "import wx\nx = wx.adv.DP_ALLOWNONE\nimport os\n",
            vec![PendingEdit::AddImport(ImportSpec::module("wx.adv"))],
        );
        assert_eq!(output, "import wx\nimport wx.adv\nx = wx.adv.DP_ALLOWNONE\nimport os\n");
    }

    #[test]
    fn test_replace_leading_import_with_late_import_below() {
        let output = apply(
            "from wx import EmptyIcon\nicon = wx.Icon()\n\nimport os\n",
            vec![
                PendingEdit::RemoveImport(ImportSpec::name("wx", "EmptyIcon")),
                PendingEdit::AddImport(ImportSpec::module("wx")),
            ],
        );
        assert_eq!(output, "import wx\nicon = wx.Icon()\n\nimport os\n");
    }

    #[test]
    fn test_replace_import_after_code_keeps_line_break() {
        let output = apply(
            "x = 1\nfrom wx import EmptyIcon\nicon = wx.Icon()\n",
            vec![
                PendingEdit::RemoveImport(ImportSpec::name("wx", "EmptyIcon")),
                PendingEdit::AddImport(ImportSpec::module("wx")),
            ],
        );
        assert_eq!(output, "x = 1\nimport wx\nicon = wx.Icon()\n");
    }

    #[test]
    fn test_add_with_import_inside_try_block() {
        let source = "try:\n    import wx\nexcept ImportError:\n    wx = None\nwx.Icon()\n";
        let output = apply(source, vec![PendingEdit::AddImport(ImportSpec::module("wx"))]);
        assert_eq!(output, source);
    }

    #[test]
    fn test_remove_skipped_when_still_referenced() {
        let source = "from wx import BitmapFromImage\n\nfactory = BitmapFromImage\n";
        let module = parse_module(source).unwrap();
        let mut diagnostics = Vec::new();
        let edits = EditSet::new(vec![PendingEdit::RemoveImport(ImportSpec::name("wx", "BitmapFromImage"))]);
        let output = apply_edits(&module, &edits, &mut diagnostics);
        assert!(output.ptr_eq(&module));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::ImportKept);
    }

    #[test]
    fn test_referenced_names_skip_attributes_and_keywords() {
        let module = parse_module("import wx\nwx.Bitmap(help=Icon)\n").unwrap();
        let names: Vec<String> = referenced_names(&module).into_iter().collect();
        assert_eq!(names, vec!["Icon", "wx"]);
    }
}
