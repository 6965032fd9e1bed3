//! Import Binding Table
//!
//! Built once per module in a pre-pass over the module-level import
//! statements, then only read during traversal. Maps every locally visible
//! name to the module (and original name) it was imported from. Imports
//! inside module-level `if`/`try`/`with` blocks count as module-level.

use crate::edits::ImportSpec;
use crate::syntax::{Child, Field, SyntaxKind, SyntaxNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One locally visible name introduced by an import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Name visible in the module (`w` for `import wx as w`)
    pub local: String,
    /// Module the binding comes from (`wx.adv` for `import wx.adv`)
    pub module: String,
    /// Original name for `from` imports
    pub name: Option<String>,
    pub alias: Option<String>,
}

impl ImportBinding {
    /// The import specification this binding satisfies
    pub fn spec(&self) -> ImportSpec {
        ImportSpec {
            module: self.module.clone(),
            name: self.name.clone(),
            alias: self.alias.clone(),
        }
    }

    fn is_module_import(&self) -> bool {
        self.name.is_none()
    }
}

/// Name resolution table for one module
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    bindings: Vec<ImportBinding>,
    star_modules: BTreeSet<String>,
    rebound: BTreeSet<String>,
}

impl ImportTable {
    /// Gather the module-level imports of `module`
    pub fn gather(module: &SyntaxNode) -> Self {
        let mut table = Self::default();
        table.gather_statements(module);
        table
    }

    fn gather_statements(&mut self, parent: &SyntaxNode) {
        for statement in parent.nodes() {
            if statement.kind().is_import() {
                self.add_statement(&statement);
                continue;
            }
            let mut bound = BTreeSet::new();
            collect_bound_names(&statement, false, &mut bound);
            if !statement.kind().is_compound_statement() {
                self.rebound.extend(bound);
                continue;
            }

            // `try: import wx` / `except ImportError: wx = None` keeps `wx` an import
            let mut nested = Self::default();
            nested.gather_statements(&statement);
            bound.retain(|name| nested.resolve(name).is_none());
            self.rebound.extend(bound);
            self.bindings.extend(nested.bindings);
            self.star_modules.extend(nested.star_modules);
        }
    }

    fn add_statement(&mut self, statement: &SyntaxNode) {
        match statement.kind() {
            SyntaxKind::ImportStatement => {
                for (module, alias) in import_items(statement) {
                    let local = alias
                        .clone()
                        .unwrap_or_else(|| head(&module).to_string());
                    self.bindings.push(ImportBinding {
                        local,
                        module,
                        name: None,
                        alias,
                    });
                }
            }
            SyntaxKind::ImportFromStatement | SyntaxKind::FutureImportStatement => {
                let module = from_module(statement);
                if statement.nodes().any(|n| n.is(SyntaxKind::WildcardImport)) {
                    self.star_modules.insert(module);
                    return;
                }
                for (name, alias) in import_items(statement) {
                    self.bindings.push(ImportBinding {
                        local: alias.clone().unwrap_or_else(|| name.clone()),
                        module: module.clone(),
                        name: Some(name),
                        alias,
                    });
                }
            }
            _ => {}
        }
    }

    pub fn bindings(&self) -> &[ImportBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.star_modules.is_empty()
    }

    /// The binding a bare name refers to; later imports shadow earlier ones
    pub fn resolve(&self, name: &str) -> Option<&ImportBinding> {
        self.bindings.iter().rev().find(|binding| binding.local == name)
    }

    /// Original names imported with `from module import ...`
    pub fn names_imported_from(&self, module: &str) -> BTreeSet<String> {
        self.bindings
            .iter()
            .filter(|binding| binding.module == module)
            .filter_map(|binding| binding.name.clone())
            .collect()
    }

    /// Whether `from module import *` is present
    pub fn has_star_import(&self, module: &str) -> bool {
        self.star_modules.contains(module)
    }

    /// Local expression through which `module` is reachable, honouring aliases
    ///
    /// `import wx as w` gives `w` for `wx`; `import wx.adv` gives `wx` for `wx`;
    /// `from wx import adv` gives `adv` for `wx.adv`.
    pub fn module_binding(&self, module: &str) -> Option<String> {
        self.bindings.iter().rev().find_map(|binding| {
            if binding.is_module_import() {
                match &binding.alias {
                    Some(alias) if binding.module == module => Some(alias.clone()),
                    Some(_) => None,
                    None if binding.module == module
                        || binding.module.starts_with(&format!("{}.", module))
                        || module.starts_with(&format!("{}.", binding.module)) =>
                    {
                        Some(module.to_string())
                    }
                    None => None,
                }
            } else {
                let name = binding.name.as_deref()?;
                (format!("{}.{}", binding.module, name) == module).then(|| binding.local.clone())
            }
        })
    }

    /// Whether an existing import already satisfies `spec`
    pub fn provides(&self, spec: &ImportSpec) -> bool {
        self.bindings.iter().any(|binding| match (&spec.name, &binding.name) {
            (None, None) => {
                binding.alias == spec.alias
                    && (binding.module == spec.module
                        || (spec.alias.is_none()
                            && binding.module.starts_with(&format!("{}.", spec.module))))
            }
            (Some(name), Some(bound)) => {
                binding.module == spec.module && bound == name && binding.alias == spec.alias
            }
            _ => false,
        })
    }

    /// Whether `name` is bound at module level by something other than an import
    pub fn is_rebound(&self, name: &str) -> bool {
        self.rebound.contains(name)
    }
}

fn head(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Module named by a `from` statement, including leading dots of relative imports
pub(crate) fn from_module(statement: &SyntaxNode) -> String {
    statement
        .field(Field::ModuleName)
        .map(|name| name.significant_text())
        .unwrap_or_else(|| "__future__".to_string())
}

/// `(name, alias)` pairs listed by an import statement
pub(crate) fn import_items(statement: &SyntaxNode) -> Vec<(String, Option<String>)> {
    statement
        .fields(Field::Name)
        .map(|item| match item.kind() {
            SyntaxKind::AliasedImport => (
                item.field(Field::Name)
                    .map(|name| name.significant_text())
                    .unwrap_or_default(),
                item.field(Field::Alias).map(|alias| alias.significant_text()),
            ),
            _ => (item.significant_text(), None),
        })
        .collect()
}

/// Collect the names a block of statements binds in its own scope
///
/// Does not descend into nested function or class bodies, lambdas or
/// comprehensions; the names of nested definitions are collected.
pub(crate) fn collect_bound_names(node: &SyntaxNode, with_imports: bool, out: &mut BTreeSet<String>) {
    match node.kind() {
        SyntaxKind::FunctionDefinition | SyntaxKind::ClassDefinition => {
            out.extend(node.field(Field::Name).and_then(|name| name.identifier_text()));
        }
        SyntaxKind::ImportStatement => {
            if with_imports {
                for (module, alias) in import_items(node) {
                    out.insert(alias.unwrap_or_else(|| head(&module).to_string()));
                }
            }
        }
        SyntaxKind::ImportFromStatement => {
            if with_imports {
                for (name, alias) in import_items(node) {
                    out.insert(alias.unwrap_or(name));
                }
            }
        }
        SyntaxKind::Assignment | SyntaxKind::AugmentedAssignment | SyntaxKind::ForStatement => {
            if let Some(target) = node.field(Field::Left) {
                collect_targets(&target, out);
            }
            let rest = node
                .children()
                .filter(|child| child.field != Some(Field::Left))
                .filter_map(Child::into_node);
            for child in rest {
                collect_bound_names(&child, with_imports, out);
            }
        }
        SyntaxKind::NamedExpression => {
            out.extend(node.field(Field::Name).and_then(|name| name.identifier_text()));
            if let Some(value) = node.field(Field::Value) {
                collect_bound_names(&value, with_imports, out);
            }
        }
        SyntaxKind::AsPattern => {
            if let Some(alias) = node.field(Field::Alias) {
                collect_targets(&alias, out);
            }
        }
        kind if kind == SyntaxKind::Lambda || kind.is_comprehension() => {}
        _ => {
            for child in node.nodes() {
                collect_bound_names(&child, with_imports, out);
            }
        }
    }
}

/// Names bound by an assignment target, skipping attribute and subscript targets
pub(crate) fn collect_targets(target: &SyntaxNode, out: &mut BTreeSet<String>) {
    match target.kind() {
        SyntaxKind::Identifier => {
            out.insert(target.significant_text());
        }
        SyntaxKind::Attribute | SyntaxKind::Subscript => {}
        _ => {
            for child in target.nodes() {
                collect_targets(&child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn table(source: &str) -> ImportTable {
        ImportTable::gather(&parse_module(source).unwrap())
    }

    #[test]
    fn test_resolve_plain_and_aliased() {
        let table = table("import wx\nimport numpy as np\nfrom wx import BitmapFromImage as BFI, Icon\n");

        let wx = table.resolve("wx").unwrap();
        assert_eq!(wx.module, "wx");
        assert_eq!(wx.name, None);

        let np = table.resolve("np").unwrap();
        assert_eq!(np.module, "numpy");
        assert_eq!(np.alias.as_deref(), Some("np"));

        let bfi = table.resolve("BFI").unwrap();
        assert_eq!(bfi.module, "wx");
        assert_eq!(bfi.name.as_deref(), Some("BitmapFromImage"));
        assert!(table.resolve("BitmapFromImage").is_none());
        assert!(table.resolve("numpy").is_none());
    }

    #[test]
    fn test_names_imported_from() {
        let table = table("from wx import Bitmap, Icon as I\nfrom os import path\n");
        let names: Vec<String> = table.names_imported_from("wx").into_iter().collect();
        assert_eq!(names, vec!["Bitmap", "Icon"]);
        assert!(table.names_imported_from("sys").is_empty());
    }

    #[test]
    fn test_dotted_import_binds_head() {
        let table = table("import wx.adv\n");
        assert_eq!(table.resolve("wx").unwrap().module, "wx.adv");
        assert_eq!(table.module_binding("wx").as_deref(), Some("wx"));
        assert_eq!(table.module_binding("wx.adv").as_deref(), Some("wx.adv"));
        assert!(table.provides(&ImportSpec::module("wx")));
        assert!(table.provides(&ImportSpec::module("wx.adv")));
    }

    #[test]
    fn test_module_binding_honours_alias() {
        let table = table("import wx as w\nfrom wx import adv\n");
        assert_eq!(table.module_binding("wx").as_deref(), Some("w"));
        assert_eq!(table.module_binding("wx.adv").as_deref(), Some("adv"));
        assert!(table.module_binding("os").is_none());
        assert!(!table.provides(&ImportSpec::module("wx")));
    }

    #[test]
    fn test_star_and_future_imports() {
        let table = table("from __future__ import annotations\nfrom wx import *\n");
        assert!(table.has_star_import("wx"));
        assert_eq!(table.resolve("annotations").unwrap().module, "__future__");
    }

    #[test]
    fn test_rebound_names() {
        let table = table("from wx import Bitmap\nBitmap = None\n\ndef f():\n    Icon = 1\n");
        assert!(table.is_rebound("Bitmap"));
        assert!(!table.is_rebound("Icon"));
    }

    #[test]
    fn test_rebinding_a_module_name_is_recorded() {
        let table = table("from wx import EmptyIcon\nwx = 3\n");
        assert!(table.is_rebound("wx"));
        assert!(!table.is_rebound("EmptyIcon"));
    }

    #[test]
    fn test_nested_imports_are_ignored() {
        let table = table("def f():\n    import wx\n\nclass A:\n    import os\n");
        assert!(table.is_empty());
    }

    #[test]
    fn test_imports_in_module_level_blocks() {
        let source = "try:\n    import wx\nexcept ImportError:\n    wx = None\n\nif DEBUG:\n    from wx import adv\n";
        let table = table(source);
        assert_eq!(table.resolve("wx").unwrap().module, "wx");
        assert_eq!(table.module_binding("wx.adv").as_deref(), Some("adv"));
        assert!(table.provides(&ImportSpec::module("wx")));
        assert!(!table.is_rebound("wx"));
    }

    #[test]
    fn test_bound_names_skip_attribute_targets() {
        let module = parse_module("a, b = 1, 2\nself.x = 3\nfor i in y: pass\n(n := 4)\n[j for j in y]\n").unwrap();
        let mut names = BTreeSet::new();
        collect_bound_names(&module, true, &mut names);
        let names: Vec<String> = names.into_iter().collect();
        assert_eq!(names, vec!["a", "b", "i", "n"]);
    }
}
