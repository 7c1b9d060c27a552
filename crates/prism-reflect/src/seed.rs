//! The initial record of a declaration, built from its structural description.
//!
//! Seeding records what the source says literally; names of ancestors are resolved
//! against the declaration's imports, but no type is resolved and no other
//! declaration is consulted. Everything else is the hooks' job.

use indexmap::IndexMap;
use prism_core::{ClassLikeId, Name};

use crate::collab::Source;
use crate::context::TypeContext;
use crate::decl::{
    AdaptationDecl, ClassConstantDecl, ClassDecl, ConstantDecl, EnumCaseDecl, FunctionDecl,
    MethodDecl, ParamDecl, Position, PropertyDecl, TypeExpr, UseDecl,
};
use crate::keys;
use crate::model::{
    AncestorRef, ClassKind, EnumCase, ImportMap, Location, Modifiers, NativeType, ParameterFlags,
    TraitAdaptation, Visibility,
};
use crate::record::TypedMap;

const CONSTRUCTOR: &str = "__construct";

pub(crate) fn class(decl: &ClassDecl, id: &ClassLikeId, source: &Source) -> TypedMap {
    let (namespace, imports, record) = common(decl.namespace.as_deref(), &decl.uses, source);
    let context = TypeContext::new(namespace, imports);
    let class_name = id.type_name();
    let resolve = |name: &String| AncestorRef::new(context.resolve_class_name(name));

    let mut record = record
        .with::<keys::Location>(location(source, decl.position))
        .with::<keys::Kind>(decl.kind)
        .with::<keys::Modifiers>(Modifiers {
            is_abstract: decl.is_abstract || decl.kind == ClassKind::Interface,
            is_final: decl.is_final,
            is_readonly: decl.is_readonly,
            ..Modifiers::default()
        });
    record = with_doc(record, decl.doc_comment.as_ref());

    match decl.kind {
        ClassKind::Interface => {
            record = record.with::<keys::DeclaredInterfaces>(decl.extends.iter().map(resolve).collect());
        }
        _ => {
            if let Some(parent) = decl.extends.first() {
                record = record.with::<keys::DeclaredParent>(resolve(parent));
            }
            if !decl.implements.is_empty() {
                record = record
                    .with::<keys::DeclaredInterfaces>(decl.implements.iter().map(resolve).collect());
            }
        }
    }

    let traits: Vec<AncestorRef> = decl
        .trait_uses
        .iter()
        .flat_map(|trait_use| trait_use.traits.iter())
        .map(resolve)
        .collect();
    if !traits.is_empty() {
        record = record.with::<keys::DeclaredTraits>(traits);
    }
    let adaptations: Vec<TraitAdaptation> = decl
        .trait_uses
        .iter()
        .flat_map(|trait_use| trait_use.adaptations.iter())
        .map(|adaptation| match adaptation {
            AdaptationDecl::Precedence {
                trait_name,
                method,
                instead_of,
            } => TraitAdaptation::Precedence {
                trait_name: context.resolve_class_name(trait_name),
                method: Name::new(method),
                instead_of: instead_of
                    .iter()
                    .map(|name| context.resolve_class_name(name))
                    .collect(),
            },
            AdaptationDecl::Alias {
                trait_name,
                method,
                alias,
                visibility,
            } => TraitAdaptation::Alias {
                trait_name: trait_name.as_ref().map(|name| context.resolve_class_name(name)),
                method: Name::new(method),
                alias: alias.as_ref().map(Name::new),
                visibility: *visibility,
            },
        })
        .collect();
    if !adaptations.is_empty() {
        record = record.with::<keys::TraitAdaptations>(adaptations);
    }

    if let Some(backing) = &decl.enum_backing {
        record = record.with::<keys::NativeTypeExpr>(NativeType {
            expr: backing.clone(),
            tentative: false,
        });
    }

    let mut constants = IndexMap::new();
    for constant in &decl.constants {
        constants.insert(
            Name::new(&constant.name),
            class_constant(constant, &class_name, source),
        );
    }
    for case in &decl.cases {
        constants.insert(Name::new(&case.name), enum_case(case, &class_name, source));
    }

    let mut properties = IndexMap::new();
    for property in &decl.properties {
        properties.insert(
            Name::new(&property.name),
            self::property(property, decl.is_readonly, &class_name, source),
        );
    }

    let mut methods = IndexMap::new();
    for method in &decl.methods {
        let is_abstract = method.is_abstract || decl.kind == ClassKind::Interface;
        methods.insert(
            Name::new(&method.name),
            self::method(method, is_abstract, &class_name, source),
        );
        if method.name.eq_ignore_ascii_case(CONSTRUCTOR) {
            for param in &method.params {
                if let Some(visibility) = param.promoted {
                    properties.insert(
                        Name::new(&param.name),
                        promoted_property(param, visibility, decl.is_readonly, method, &class_name, source),
                    );
                }
            }
        }
    }

    record
        .with::<keys::Constants>(constants)
        .with::<keys::Properties>(properties)
        .with::<keys::Methods>(methods)
}

pub(crate) fn function(decl: &FunctionDecl, source: &Source) -> TypedMap {
    let (_, _, record) = common(decl.namespace.as_deref(), &decl.uses, source);
    let record = with_doc(
        record.with::<keys::Location>(location(source, decl.position)),
        decl.doc_comment.as_ref(),
    );
    let record = with_native(record, decl.return_type.as_ref(), false);
    record.with::<keys::Parameters>(parameters(&decl.params))
}

pub(crate) fn constant(decl: &ConstantDecl, source: &Source) -> TypedMap {
    let (_, _, record) = common(decl.namespace.as_deref(), &decl.uses, source);
    with_doc(
        record
            .with::<keys::Location>(location(source, decl.position))
            .with::<keys::DefaultExpr>(decl.value.clone()),
        decl.doc_comment.as_ref(),
    )
}

/// Namespace, imports and the source's change detector. The detector covers the whole
/// file: imports and namespace affect resolution as much as the declaration body.
fn common(namespace: Option<&str>, uses: &[UseDecl], source: &Source) -> (Name, ImportMap, TypedMap) {
    let namespace = Name::new(namespace.unwrap_or_default());
    let imports = ImportMap::from_uses(uses);
    let record = TypedMap::new()
        .with::<keys::Namespace>(namespace.clone())
        .with::<keys::Imports>(imports.clone())
        .with::<keys::Detector>(source.change_detector.clone());
    (namespace, imports, record)
}

fn location(source: &Source, position: Position) -> Location {
    Location {
        file: source.file.clone(),
        line: position.line,
        end_line: position.end_line.max(position.line),
    }
}

fn with_doc(record: TypedMap, doc: Option<&String>) -> TypedMap {
    match doc {
        Some(doc) if !doc.trim().is_empty() => record.with::<keys::DocComment>(doc.clone()),
        _ => record,
    }
}

fn with_native(record: TypedMap, ty: Option<&TypeExpr>, tentative: bool) -> TypedMap {
    match ty {
        Some(expr) => record.with::<keys::NativeTypeExpr>(NativeType {
            expr: expr.clone(),
            tentative,
        }),
        None => record,
    }
}

fn member(class: &Name, source: &Source, position: Position, modifiers: Modifiers) -> TypedMap {
    TypedMap::new()
        .with::<keys::DeclaringClass>(class.clone())
        .with::<keys::Location>(location(source, position))
        .with::<keys::Modifiers>(modifiers)
}

fn class_constant(decl: &ClassConstantDecl, class: &Name, source: &Source) -> TypedMap {
    let record = member(
        class,
        source,
        decl.position,
        Modifiers {
            visibility: decl.visibility,
            is_final: decl.is_final,
            ..Modifiers::default()
        },
    )
    .with::<keys::DefaultExpr>(decl.value.clone());
    let record = with_native(record, decl.native_type.as_ref(), false);
    with_doc(record, decl.doc_comment.as_ref())
}

fn enum_case(decl: &EnumCaseDecl, class: &Name, source: &Source) -> TypedMap {
    let mut record = member(
        class,
        source,
        decl.position,
        Modifiers {
            is_final: true,
            ..Modifiers::default()
        },
    )
    .with::<keys::EnumCase>(EnumCase::default());
    if let Some(value) = &decl.value {
        record = record.with::<keys::DefaultExpr>(value.clone());
    }
    with_doc(record, decl.doc_comment.as_ref())
}

fn property(decl: &PropertyDecl, readonly_class: bool, class: &Name, source: &Source) -> TypedMap {
    let mut record = member(
        class,
        source,
        decl.position,
        Modifiers {
            visibility: decl.visibility,
            is_static: decl.is_static,
            is_readonly: decl.is_readonly || (readonly_class && !decl.is_static),
            ..Modifiers::default()
        },
    );
    record = with_native(record, decl.native_type.as_ref(), false);
    if let Some(default) = &decl.default {
        record = record.with::<keys::DefaultExpr>(default.clone());
    }
    with_doc(record, decl.doc_comment.as_ref())
}

fn promoted_property(
    param: &ParamDecl,
    visibility: Visibility,
    readonly_class: bool,
    constructor: &MethodDecl,
    class: &Name,
    source: &Source,
) -> TypedMap {
    let record = member(
        class,
        source,
        constructor.position,
        Modifiers {
            visibility,
            is_readonly: readonly_class,
            ..Modifiers::default()
        },
    );
    with_native(record, param.native_type.as_ref(), false)
}

fn method(decl: &MethodDecl, is_abstract: bool, class: &Name, source: &Source) -> TypedMap {
    let record = member(
        class,
        source,
        decl.position,
        Modifiers {
            visibility: decl.visibility,
            is_static: decl.is_static,
            is_abstract,
            is_final: decl.is_final,
            is_readonly: false,
        },
    );
    let record = with_native(record, decl.return_type.as_ref(), decl.tentative_return);
    with_doc(record, decl.doc_comment.as_ref()).with::<keys::Parameters>(parameters(&decl.params))
}

fn parameters(params: &[ParamDecl]) -> IndexMap<Name, TypedMap> {
    params
        .iter()
        .enumerate()
        .map(|(position, param)| {
            let mut record = TypedMap::new().with::<keys::Parameter>(ParameterFlags {
                position: u32::try_from(position).unwrap_or(u32::MAX),
                by_ref: param.by_ref,
                variadic: param.variadic,
                promoted: param.promoted.is_some(),
            });
            record = with_native(record, param.native_type.as_ref(), false);
            if let Some(default) = &param.default {
                record = record.with::<keys::DefaultExpr>(default.clone());
            }
            (Name::new(&param.name), record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prism_cache::ChangeDetector;

    use super::*;
    use crate::decl::{Expr, TraitUseDecl};

    fn source() -> Source {
        Source::in_memory("<?php", ChangeDetector::AlwaysFresh)
    }

    #[test]
    fn class_seed_resolves_ancestor_names() {
        let decl = ClassDecl::class("User")
            .in_namespace("App")
            .with_use(UseDecl::class("Lib\\Model"))
            .extends("Model")
            .implements("\\JsonSerializable")
            .uses_trait(TraitUseDecl::new(["HasName"]).with(AdaptationDecl::Alias {
                trait_name: None,
                method: "name".to_string(),
                alias: Some("label".to_string()),
                visibility: None,
            }));
        let record = class(&decl, &ClassLikeId::named("App\\User"), &source());

        assert_eq!(
            record.get::<keys::DeclaredParent>(),
            Some(&AncestorRef::new(Name::new("Lib\\Model")))
        );
        assert_eq!(
            record.value::<keys::DeclaredInterfaces>(),
            vec![AncestorRef::new(Name::new("JsonSerializable"))]
        );
        assert_eq!(
            record.value::<keys::DeclaredTraits>(),
            vec![AncestorRef::new(Name::new("App\\HasName"))]
        );
        assert_eq!(record.value::<keys::TraitAdaptations>().len(), 1);
    }

    #[test]
    fn interface_members_are_abstract_and_extends_become_interfaces() {
        let decl = ClassDecl::interface("Repo")
            .extends("Countable")
            .with_method(MethodDecl::new("find"));
        let record = class(&decl, &ClassLikeId::named("Repo"), &source());

        assert_eq!(record.get::<keys::DeclaredParent>(), None);
        assert_eq!(
            record.value::<keys::DeclaredInterfaces>(),
            vec![AncestorRef::new(Name::new("Countable"))]
        );
        let find = &record.value::<keys::Methods>()[&Name::new("find")];
        assert!(find.value::<keys::Modifiers>().is_abstract);
    }

    #[test]
    fn promoted_constructor_params_become_properties() {
        let decl = ClassDecl::class("Point").with_method(
            MethodDecl::new("__construct")
                .param(ParamDecl::new("x").typed(TypeExpr::named("int")).promoted(Visibility::Private))
                .param(ParamDecl::new("scale").default_value(Expr::Int(1))),
        );
        let record = class(&decl, &ClassLikeId::named("Point"), &source());

        let properties = record.value::<keys::Properties>();
        let names: Vec<_> = properties.keys().map(Name::as_str).collect();
        assert_eq!(names, vec!["x"]);
        assert_eq!(
            properties[&Name::new("x")].value::<keys::Modifiers>().visibility,
            Visibility::Private
        );

        let constructor = &record.value::<keys::Methods>()[&Name::new("__construct")];
        let params = constructor.value::<keys::Parameters>();
        assert_eq!(params[&Name::new("scale")].value::<keys::Parameter>().position, 1);
        assert_eq!(
            params[&Name::new("scale")].get::<keys::DefaultExpr>(),
            Some(&Expr::Int(1))
        );
    }

    #[test]
    fn enum_cases_are_constants() {
        let decl = ClassDecl::enum_("Suit")
            .backed_by(TypeExpr::named("string"))
            .with_case(EnumCaseDecl::new("Hearts", Some(Expr::string("H"))));
        let record = class(&decl, &ClassLikeId::named("Suit"), &source());

        let hearts = &record.value::<keys::Constants>()[&Name::new("Hearts")];
        assert!(hearts.contains::<keys::EnumCase>());
        assert_eq!(hearts.get::<keys::DefaultExpr>(), Some(&Expr::string("H")));
        assert!(record.contains::<keys::NativeTypeExpr>());
    }
}
