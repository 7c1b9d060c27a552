//! Every key an attribute record can hold.
//!
//! Member maps (`Methods`, `Properties`, `Constants`, `Parameters`) hold one nested
//! record per member, keyed by declared name, in declaration order with inherited
//! members after own ones.

use indexmap::IndexMap;
use prism_cache::ChangeDetector;
use prism_core::Name;
use prism_types::{Type, TypeFacet};

use crate::const_eval::ConstValue;
use crate::decl::Expr;
use crate::model;
use crate::record::{facts, TypedMap};

facts! {
    Location: model::Location => Overwrite;
    /// The enclosing namespace; empty for the global namespace.
    Namespace: Name => Overwrite;
    Imports: model::ImportMap => Overwrite;
    Kind: model::ClassKind => Overwrite;
    Modifiers: model::Modifiers => Overwrite;
    Deprecated: model::Deprecation => Overwrite;
    /// Decides whether this record is stale. Ancestors' detectors are folded in.
    Detector: ChangeDetector => Additive;
    DocComment: String => Overwrite;
    /// Native, annotated, tentative and inferred types of the declaration.
    TypeInfo: TypeFacet => Additive;
    NativeTypeExpr: model::NativeType => Overwrite;
    /// Initializer of a constant, or default of a property or parameter.
    DefaultExpr: Expr => Overwrite;
    Value: ConstValue => Overwrite;
    DeclaredParent: model::AncestorRef => Overwrite;
    DeclaredInterfaces: Vec<model::AncestorRef> => Overwrite;
    DeclaredTraits: Vec<model::AncestorRef> => Overwrite;
    TraitAdaptations: Vec<model::TraitAdaptation> => Overwrite;
    Templates: IndexMap<Name, model::TemplateParam> => Overwrite;
    TemplateVariance: model::Variance => Overwrite;
    Aliases: IndexMap<Name, Type> => Overwrite;
    ImportedAliases: IndexMap<Name, model::AliasImport> => Overwrite;
    Methods: IndexMap<Name, TypedMap> => Additive;
    Properties: IndexMap<Name, TypedMap> => Additive;
    Constants: IndexMap<Name, TypedMap> => Additive;
    Parameters: IndexMap<Name, TypedMap> => Additive;
    Parameter: model::ParameterFlags => Overwrite;
    /// The class a member was declared in; differs from the owner for inherited members.
    DeclaringClass: Name => Overwrite;
    EnumCase: model::EnumCase => Overwrite;
    BackingType: Type => Overwrite;
    /// Transitive parent classes, nearest first.
    Parents: Vec<Name> => Overwrite;
    /// Every interface implemented directly or through an ancestor.
    Interfaces: Vec<Name> => Overwrite;
    Diagnostics: Vec<model::Diagnostic> => Additive;
}
