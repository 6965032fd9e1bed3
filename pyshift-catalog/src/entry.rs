//! Rule entries as they appear in catalog files

use pyshift_core::rules::{
    AppendArgument, DefaultReturnAnnotation, EnsureMethod, MoveToSubmodule, QualifyImported,
    RenameAttribute, RenameKeywords, RenameMethod,
};
use pyshift_core::{Rule, RuleFamily};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named rule in a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub spec: RuleSpec,
}

/// Which rule family to instantiate, with its tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// `module.Old` → `module.New`, in calls and plain references
    RenameAttribute {
        module: String,
        renames: BTreeMap<String, String>,
    },
    /// Like `rename_attribute`, but only where the attribute is called
    RenameCall {
        module: String,
        renames: BTreeMap<String, String>,
    },
    /// `module.Name` → `module.submodule.Name`, importing the submodule
    MoveToSubmodule {
        module: String,
        submodule: String,
        names: Vec<String>,
    },
    /// Append `value` to `module.function(...)` calls with exactly `arity` arguments
    AppendArgument {
        module: String,
        function: String,
        arity: usize,
        value: String,
    },
    /// `x.from(...)` → `x.to(...)`, optionally only for one arity
    RenameMethod {
        from: String,
        to: String,
        #[serde(default)]
        arity: Option<usize>,
    },
    /// Rename keyword arguments of `x.method(...)`
    RenameKeywords {
        method: String,
        keywords: BTreeMap<String, String>,
        #[serde(default)]
        rename_method: Option<String>,
    },
    /// Deprecated symbols; bare imported names are qualified with the module
    QualifyImported {
        module: String,
        symbols: BTreeMap<String, String>,
    },
    /// Declare `method` in the calling class when `receiver.method(...)` is used
    EnsureMethod {
        receiver: String,
        method: String,
        template: String,
    },
    /// Annotate functions lacking a return annotation
    DefaultReturnAnnotation {
        #[serde(default = "default_annotation")]
        annotation: String,
    },
}

fn default_annotation() -> String {
    "None".to_string()
}

fn pairs(table: &BTreeMap<String, String>) -> Vec<(String, String)> {
    table
        .iter()
        .map(|(from, to)| (from.clone(), to.clone()))
        .collect()
}

impl RuleSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleSpec::RenameAttribute { .. } => "rename_attribute",
            RuleSpec::RenameCall { .. } => "rename_call",
            RuleSpec::MoveToSubmodule { .. } => "move_to_submodule",
            RuleSpec::AppendArgument { .. } => "append_argument",
            RuleSpec::RenameMethod { .. } => "rename_method",
            RuleSpec::RenameKeywords { .. } => "rename_keywords",
            RuleSpec::QualifyImported { .. } => "qualify_imported",
            RuleSpec::EnsureMethod { .. } => "ensure_method",
            RuleSpec::DefaultReturnAnnotation { .. } => "default_return_annotation",
        }
    }

    /// Instantiate the rule family and register it under `name`
    pub fn build(&self, name: &str, description: &str) -> pyshift_core::Result<Rule> {
        match self {
            RuleSpec::RenameAttribute { module, renames } => {
                RenameAttribute::new(module.as_str(), pairs(renames)).into_rule(name, description)
            }
            RuleSpec::RenameCall { module, renames } => RenameAttribute::new(module.as_str(), pairs(renames))
                .calls_only()
                .into_rule(name, description),
            RuleSpec::MoveToSubmodule {
                module,
                submodule,
                names,
            } => MoveToSubmodule::new(module.as_str(), submodule.as_str(), names.clone())
                .into_rule(name, description),
            RuleSpec::AppendArgument {
                module,
                function,
                arity,
                value,
            } => AppendArgument::new(module.as_str(), function.as_str(), *arity, value)?
                .into_rule(name, description),
            RuleSpec::RenameMethod { from, to, arity } => RenameMethod::new(from.as_str(), to.as_str())
                .with_arity(*arity)
                .into_rule(name, description),
            RuleSpec::RenameKeywords {
                method,
                keywords,
                rename_method,
            } => RenameKeywords::new(method.as_str(), pairs(keywords))
                .renaming_method(rename_method.clone())
                .into_rule(name, description),
            RuleSpec::QualifyImported { module, symbols } => {
                QualifyImported::new(module.as_str(), pairs(symbols)).into_rule(name, description)
            }
            RuleSpec::EnsureMethod {
                receiver,
                method,
                template,
            } => EnsureMethod::new(receiver.as_str(), method.as_str(), template)?.into_rule(name, description),
            RuleSpec::DefaultReturnAnnotation { annotation } => {
                DefaultReturnAnnotation::new(annotation)?.into_rule(name, description)
            }
        }
    }
}
