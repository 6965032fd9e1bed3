//! pyshift Catalog - Declarative Migration Catalogs
//!
//! A catalog is a named, ordered list of rule entries. Each entry picks a
//! rule family by `kind` and supplies its rename tables. Catalogs ship
//! embedded in the crate or are loaded from TOML, YAML or JSON files, and
//! are compiled into a [`RuleSet`] for the engine.

#![warn(clippy::all)]

pub mod entry;

pub use entry::{RuleEntry, RuleSpec};

use pyshift_core::RuleSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown catalog `{0}`")]
    Unknown(String),

    #[error("Catalog `{catalog}`: {message}")]
    Invalid { catalog: String, message: String },

    #[error("Failed to load catalog: {0}")]
    Load(#[from] pyshift_utils::UtilError),

    #[error("Rule error: {0}")]
    Rule(#[from] pyshift_core::TransformError),
}

/// Catalogs compiled into the binary
const BUILTIN: &[(&str, &str)] = &[
    ("wxpython", include_str!("../catalogs/wxpython.toml")),
    ("wx-colour-to-color", include_str!("../catalogs/wx-colour-to-color.toml")),
    ("mypy", include_str!("../catalogs/mypy.toml")),
];

/// A named, ordered list of migration rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl Catalog {
    /// Names of the embedded catalogs
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|(name, _)| *name)
    }

    /// Parse an embedded catalog
    pub fn builtin(name: &str) -> Result<Self> {
        let (_, source) = BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .ok_or_else(|| CatalogError::Unknown(name.to_string()))?;
        let catalog: Catalog = pyshift_utils::config::parse_config(source, pyshift_utils::ConfigFormat::Toml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file; the format follows the extension
    pub fn load(path: &Path) -> Result<Self> {
        let catalog: Catalog = pyshift_utils::load_config(path)?;
        catalog.validate()?;
        tracing::debug!("Loaded catalog `{}` with {} rules from {}", catalog.name, catalog.rules.len(), path.display());
        Ok(catalog)
    }

    /// An embedded catalog name, or else a path to a catalog file
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if Self::builtin_names().any(|name| name == name_or_path) {
            return Self::builtin(name_or_path);
        }
        let path = Path::new(name_or_path);
        if path.is_file() {
            return Self::load(path);
        }
        Err(CatalogError::Unknown(name_or_path.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::Invalid {
                catalog: self.name.clone(),
                message: "catalog has no name".to_string(),
            });
        }
        for (index, entry) in self.rules.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(CatalogError::Invalid {
                    catalog: self.name.clone(),
                    message: format!("rule #{} has no name", index + 1),
                });
            }
            if self.rules[..index].iter().any(|earlier| earlier.name == entry.name) {
                return Err(CatalogError::Invalid {
                    catalog: self.name.clone(),
                    message: format!("rule `{}` is declared twice", entry.name),
                });
            }
        }
        Ok(())
    }

    /// Qualified rule name, unique across catalogs
    pub fn rule_name(&self, entry: &RuleEntry) -> String {
        format!("{}/{}", self.name, entry.name)
    }

    /// Compile every entry and append it to `rules` in declaration order
    pub fn register(&self, rules: &mut RuleSet) -> Result<()> {
        for entry in &self.rules {
            let rule = entry.spec.build(&self.rule_name(entry), &entry.description)?;
            rules.add(rule)?;
        }
        Ok(())
    }

    /// This catalog alone as a rule set
    pub fn into_rule_set(self) -> Result<RuleSet> {
        compile(std::slice::from_ref(&self))
    }
}

/// Compile catalogs into one rule set; earlier catalogs' rules run first
pub fn compile(catalogs: &[Catalog]) -> Result<RuleSet> {
    let mut rules = RuleSet::new();
    for catalog in catalogs {
        catalog.register(&mut rules)?;
    }
    tracing::debug!("Compiled {} rules from {} catalogs", rules.len(), catalogs.len());
    Ok(rules)
}
