//! Interfaces to the collaborators the reflector consumes but does not implement:
//! locating source, extracting declarations from it, and parsing doc comments.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use prism_cache::ChangeDetector;
use prism_core::Name;

use crate::decl::{FileDeclarations, TypeExpr};
use crate::model::{Deprecation, Variance};

/// A symbol a [`SourceProvider`] is asked to locate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolRef {
    Class(Name),
    Function(Name),
    Constant(Name),
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolRef::Class(name) => write!(f, "class {name}"),
            SymbolRef::Function(name) => write!(f, "function {name}"),
            SymbolRef::Constant(name) => write!(f, "constant {name}"),
        }
    }
}

/// Raw source text plus the detector that decides when facts derived from it go stale.
#[derive(Debug, Clone)]
pub struct Source {
    pub file: Option<PathBuf>,
    pub code: Arc<str>,
    pub change_detector: ChangeDetector,
}

impl Source {
    /// Read `path` and fingerprint exactly the bytes that were read.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let change_detector = ChangeDetector::from_contents(path, &bytes);
        let code = String::from_utf8_lossy(&bytes);
        Ok(Self {
            file: Some(path.to_path_buf()),
            code: Arc::from(code.as_ref()),
            change_detector,
        })
    }

    /// Source that does not live in a file (a REPL buffer, a test fixture).
    pub fn in_memory(code: impl AsRef<str>, change_detector: ChangeDetector) -> Self {
        Self {
            file: None,
            code: Arc::from(code.as_ref()),
            change_detector,
        }
    }
}

/// Finds the source declaring a symbol. How (autoloading, scanning, an index) is up to
/// the implementation, as are any timeouts.
pub trait SourceProvider: Send + Sync {
    fn locate(&self, symbol: &SymbolRef) -> anyhow::Result<Option<Source>>;

    /// Load a file by path, used for declarations addressed by position (anonymous
    /// classes and closures).
    fn load_file(&self, path: &Path) -> anyhow::Result<Source> {
        Source::from_file(path)
    }
}

/// Turns raw source into structural declarations.
pub trait DeclarationExtractor: Send + Sync {
    fn extract(&self, source: &Source) -> anyhow::Result<FileDeclarations>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTemplate {
    pub name: String,
    pub bound: Option<TypeExpr>,
    pub variance: Variance,
}

impl DocTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bound: None,
            variance: Variance::Invariant,
        }
    }

    #[must_use]
    pub fn bounded(mut self, bound: TypeExpr) -> Self {
        self.bound = Some(bound);
        self
    }
}

/// `@import-type Row from Table as TableRow`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocAliasImport {
    pub name: String,
    pub from: String,
    pub alias: Option<String>,
}

/// The structured tags of one doc comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocBlock {
    pub var: Option<TypeExpr>,
    /// `@param` types keyed by parameter name without the `$`.
    pub params: Vec<(String, TypeExpr)>,
    pub returns: Option<TypeExpr>,
    pub templates: Vec<DocTemplate>,
    pub aliases: Vec<(String, TypeExpr)>,
    pub imported_aliases: Vec<DocAliasImport>,
    /// Generic ancestor references: `@extends Base<int>`, `@implements`, `@use`.
    pub extends: Vec<TypeExpr>,
    pub implements: Vec<TypeExpr>,
    pub uses: Vec<TypeExpr>,
    pub deprecation: Option<Deprecation>,
    pub readonly: bool,
}

impl DocBlock {
    pub fn param(&self, name: &str) -> Option<&TypeExpr> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, ty)| ty)
    }
}

pub trait DocCommentParser: Send + Sync {
    fn parse(&self, text: &str) -> anyhow::Result<DocBlock>;
}

/// Ignores doc comments entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDocParser;

impl DocCommentParser for NullDocParser {
    fn parse(&self, _text: &str) -> anyhow::Result<DocBlock> {
        Ok(DocBlock::default())
    }
}
