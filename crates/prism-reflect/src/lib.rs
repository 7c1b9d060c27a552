//! Declaration reflection: complete, cached attribute records for classes, functions and
//! constants.
//!
//! Each declaration is described by three sources of truth: its native signature, the
//! type metadata in its doc comment, and what evaluating its constant expressions
//! yields. The [`Reflector`] combines them through a priority-ordered hook pipeline,
//! resolves cross-declaration relationships (inheritance, trait composition, template
//! substitution, type aliases) and caches the result behind change detectors, so a
//! record is rebuilt exactly when a source it depends on changes.
//!
//! ```text
//! DeclId ─▶ cache ─hit─▶ TypedMap
//!             │miss
//!             ▼
//!   SourceProvider ─▶ DeclarationExtractor ─▶ seed record ─▶ hooks ─▶ stage ─▶ commit
//! ```
//!
//! Source location, parsing and doc-comment parsing are collaborators supplied by the
//! embedder (see [`SourceProvider`], [`DeclarationExtractor`], [`DocCommentParser`]).

mod collab;
mod const_eval;
mod context;
mod decl;
mod error;
mod hook;
pub mod hooks;
mod inheritance;
pub mod keys;
mod model;
mod record;
mod reflector;
mod seed;
mod session;

pub use collab::{
    DeclarationExtractor, DocAliasImport, DocBlock, DocCommentParser, DocTemplate, NullDocParser, Source,
    SourceProvider, SymbolRef,
};
pub use const_eval::{ArrayKey, ClassScope, ConstEvaluator, ConstValue, ConstantLookup};
pub use context::{CustomTypeResolver, ResolverChain, TypeContext};
pub use decl::{
    AdaptationDecl, ArrayItem, BinaryOp, ClassConstantDecl, ClassDecl, ConstantDecl, EnumCaseDecl, Expr,
    FileDeclarations, FunctionDecl, MethodDecl, ParamDecl, Position, PropertyDecl, TraitUseDecl, TypeExpr,
    UnaryOp, UseDecl, UseKind,
};
pub use error::{ReflectError, Result};
pub use hook::{ClassHook, ConstantHook, FunctionHook, HookPipeline, Prioritized};
pub use inheritance::InheritanceResolver;
pub use model::{
    AliasImport, AncestorRef, ClassKind, Deprecation, Diagnostic, EnumCase, ImportMap, Location, Modifiers,
    NativeType, ParameterFlags, TemplateParam, TraitAdaptation, Variance, Visibility,
};
pub use record::{Key, Merge, MergePolicy, TypedMap};
pub use reflector::{Reflector, ReflectorBuilder};
pub use session::ReflectionSession;

pub use prism_cache::{CacheStats, ChangeDetector};
pub use prism_config::PrismConfig;
pub use prism_core::{DeclId, Name};
pub use prism_types::{Type, TypeFacet};
