//! Value types stored in attribute records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use prism_core::Name;
use prism_types::Type;
use serde::{Deserialize, Serialize};

use crate::decl::{TypeExpr, UseDecl, UseKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: Option<PathBuf>,
    pub line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_readonly: bool,
}

/// Present when the declaration is deprecated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deprecation {
    pub message: Option<String>,
}

/// `use` imports in effect for a declaration, keyed by the local alias.
///
/// Class and function aliases are stored lowercased (the language matches them
/// case-insensitively); constant aliases are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    pub classes: BTreeMap<String, Name>,
    pub functions: BTreeMap<String, Name>,
    pub constants: BTreeMap<String, Name>,
}

impl ImportMap {
    pub fn from_uses(uses: &[UseDecl]) -> Self {
        let mut out = ImportMap::default();
        for import in uses {
            let name = Name::new(&import.name);
            let alias = import
                .alias
                .clone()
                .unwrap_or_else(|| name.short().to_string());
            match import.kind {
                UseKind::Class => {
                    out.classes.insert(alias.to_ascii_lowercase(), name);
                }
                UseKind::Function => {
                    out.functions.insert(alias.to_ascii_lowercase(), name);
                }
                UseKind::Constant => {
                    out.constants.insert(alias, name);
                }
            }
        }
        out
    }

    pub fn class(&self, alias: &str) -> Option<&Name> {
        self.classes.get(&alias.to_ascii_lowercase())
    }

    pub fn function(&self, alias: &str) -> Option<&Name> {
        self.functions.get(&alias.to_ascii_lowercase())
    }

    pub fn constant(&self, alias: &str) -> Option<&Name> {
        self.constants.get(alias)
    }
}

/// A reference to an ancestor with the generic arguments supplied at the use site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AncestorRef {
    pub class: Name,
    pub args: Vec<Type>,
}

impl AncestorRef {
    pub fn new(class: Name) -> Self {
        Self {
            class,
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraitAdaptation {
    Precedence {
        trait_name: Name,
        method: Name,
        instead_of: Vec<Name>,
    },
    Alias {
        trait_name: Option<Name>,
        method: Name,
        alias: Option<Name>,
        visibility: Option<Visibility>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub bound: Option<Type>,
    pub variance: Variance,
}

impl TemplateParam {
    /// What an omitted argument for this template defaults to.
    pub fn fallback(&self) -> Type {
        self.bound.clone().unwrap_or(Type::Mixed)
    }
}

/// A type alias imported from another class (`@import-type Row from Table as TableRow`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasImport {
    pub class: Name,
    pub name: Name,
}

/// A native signature type before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeType {
    pub expr: TypeExpr,
    pub tentative: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFlags {
    pub position: u32,
    pub by_ref: bool,
    pub variadic: bool,
    pub promoted: bool,
}

/// Recorded on class constants that are enum cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumCase {
    /// The backing value of a backed enum case.
    pub backing: Option<crate::ConstValue>,
}

/// A non-fatal problem found while resolving a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
