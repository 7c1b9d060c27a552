use indexmap::IndexMap;
use prism_core::{ClassLikeId, ConstantId, FunctionLikeId, MethodId, Name, TemplateSite};
use prism_types::{Type, TypeFacet};

use crate::collab::DocBlock;
use crate::context::TypeContext;
use crate::decl::TypeExpr;
use crate::error::{ReflectError, Result};
use crate::hook::{ClassHook, ConstantHook, FunctionHook};
use crate::keys;
use crate::model::{AliasImport, AncestorRef, ClassKind, Diagnostic, TemplateParam};
use crate::record::TypedMap;
use crate::session::ReflectionSession;

const CONSTRUCTOR: &str = "__construct";

/// Records what doc comments say: annotated types, templates, type aliases, generic
/// ancestor arguments, deprecation and `@readonly`.
///
/// A doc type that cannot be resolved is a diagnostic on the declaration, not an
/// error: the comment is advisory and the rest of the record stays valid.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocCommentHook;

impl DocCommentHook {
    pub const PRIORITY: i32 = -200;
}

impl ClassHook for DocCommentHook {
    fn name(&self) -> &'static str {
        "doc-comments"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn process(
        &self,
        id: &ClassLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        let parser = session.doc_parser();
        let mut diagnostics = Vec::new();
        let mut record = record;

        if let Some(text) = record.get::<keys::DocComment>().cloned() {
            let block = parser.parse(&text)?;
            record = class_block(id, record, &block, session, &mut diagnostics)?;
        }
        let context = session.class_context(id, &record);

        let mut methods = IndexMap::new();
        let mut promoted = IndexMap::new();
        for (name, method) in record.value::<keys::Methods>() {
            let Some(text) = method.get::<keys::DocComment>() else {
                continue;
            };
            let block = parser.parse(text)?;
            let site = TemplateSite::Function(FunctionLikeId::Method(MethodId::new(
                id.clone(),
                name.clone(),
            )));
            let method_context = context
                .clone()
                .with_templates(site, template_names(&block));
            let mut member_diagnostics = Vec::new();
            let update = signature(
                &block,
                &method_context,
                &method.value::<keys::Parameters>(),
                &mut member_diagnostics,
            )?;

            if name.as_str().eq_ignore_ascii_case(CONSTRUCTOR) {
                promoted_annotations(&method, &update, &mut promoted);
            }
            methods.insert(name, with_diagnostics(update, member_diagnostics));
        }

        let mut properties = IndexMap::new();
        for (name, property) in record.value::<keys::Properties>() {
            let Some(text) = property.get::<keys::DocComment>() else {
                continue;
            };
            let block = parser.parse(text)?;
            let mut member_diagnostics = Vec::new();
            let mut update = variable(&block, &context, &mut member_diagnostics)?;
            if block.readonly {
                let mut modifiers = property.value::<keys::Modifiers>();
                modifiers.is_readonly = true;
                update = update.with::<keys::Modifiers>(modifiers);
            }
            properties.insert(name, with_diagnostics(update, member_diagnostics));
        }
        // A constructor `@param` documents the promoted property as well, unless the
        // property carries its own `@var`.
        for (name, update) in promoted {
            if !properties.contains_key(&name) {
                properties.insert(name, update);
            }
        }

        let mut constants = IndexMap::new();
        for (name, constant) in record.value::<keys::Constants>() {
            let Some(text) = constant.get::<keys::DocComment>() else {
                continue;
            };
            let block = parser.parse(text)?;
            let mut member_diagnostics = Vec::new();
            let update = variable(&block, &context, &mut member_diagnostics)?;
            constants.insert(name, with_diagnostics(update, member_diagnostics));
        }

        Ok(with_diagnostics(
            record
                .with::<keys::Methods>(methods)
                .with::<keys::Properties>(properties)
                .with::<keys::Constants>(constants),
            diagnostics,
        ))
    }
}

impl FunctionHook for DocCommentHook {
    fn name(&self) -> &'static str {
        "doc-comments"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn process(
        &self,
        id: &FunctionLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        let Some(text) = record.get::<keys::DocComment>().cloned() else {
            return Ok(record);
        };
        let block = session.doc_parser().parse(&text)?;
        let context = session
            .function_context(id, &record)
            .with_templates(TemplateSite::Function(id.clone()), template_names(&block));
        let mut diagnostics = Vec::new();
        let update = signature(
            &block,
            &context,
            &record.value::<keys::Parameters>(),
            &mut diagnostics,
        )?;
        Ok(with_diagnostics(record.merge(&update), diagnostics))
    }
}

impl ConstantHook for DocCommentHook {
    fn name(&self) -> &'static str {
        "doc-comments"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn process(
        &self,
        _id: &ConstantId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        let Some(text) = record.get::<keys::DocComment>().cloned() else {
            return Ok(record);
        };
        let block = session.doc_parser().parse(&text)?;
        let context = session.plain_context(&record);
        let mut diagnostics = Vec::new();
        let update = variable(&block, &context, &mut diagnostics)?;
        Ok(with_diagnostics(record.merge(&update), diagnostics))
    }
}

/// Class-level tags. Template and alias names are declared before anything is
/// resolved so bounds and alias bodies may refer to them.
fn class_block(
    id: &ClassLikeId,
    record: TypedMap,
    block: &DocBlock,
    session: &ReflectionSession<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<TypedMap> {
    let mut record = record;
    let scope = session.class_context(id, &record);

    if !block.templates.is_empty() {
        let declared = block
            .templates
            .iter()
            .map(|template| {
                (
                    Name::new(&template.name),
                    TemplateParam {
                        bound: None,
                        variance: template.variance,
                    },
                )
            })
            .collect();
        record = record.with::<keys::Templates>(declared);
    }
    if !block.aliases.is_empty() {
        let declared = block
            .aliases
            .iter()
            .map(|(name, _)| (Name::new(name), Type::Mixed))
            .collect();
        record = record.with::<keys::Aliases>(declared);
    }
    if !block.imported_aliases.is_empty() {
        let imported = block
            .imported_aliases
            .iter()
            .map(|import| {
                let local = import.alias.as_deref().unwrap_or(&import.name);
                (
                    Name::new(local),
                    AliasImport {
                        class: scope.resolve_class_name(&import.from),
                        name: Name::new(&import.name),
                    },
                )
            })
            .collect();
        record = record.with::<keys::ImportedAliases>(imported);
    }

    let context = session.class_context(id, &record);
    if !block.templates.is_empty() {
        let templates = resolve_templates(block, &context, diagnostics)?;
        record = record.with::<keys::Templates>(templates);
    }
    if !block.aliases.is_empty() {
        let mut aliases = IndexMap::new();
        for (name, expr) in &block.aliases {
            if let Some(ty) = annotate(&context, expr, &format!("alias {name}"), diagnostics)? {
                aliases.insert(Name::new(name), ty);
            }
        }
        record = record.with::<keys::Aliases>(aliases);
    }

    if let Some(deprecation) = &block.deprecation {
        record = record.with::<keys::Deprecated>(deprecation.clone());
    }
    if block.readonly {
        let mut modifiers = record.value::<keys::Modifiers>();
        modifiers.is_readonly = true;
        record = record.with::<keys::Modifiers>(modifiers);
    }

    let is_interface = record.value::<keys::Kind>() == ClassKind::Interface;
    let mut parent = record.get::<keys::DeclaredParent>().cloned();
    let mut interfaces = record.value::<keys::DeclaredInterfaces>();
    let mut traits = record.value::<keys::DeclaredTraits>();

    for expr in &block.extends {
        let Some(ty) = annotate(&context, expr, "@extends", diagnostics)? else {
            continue;
        };
        let applied = if is_interface {
            apply_args(&mut interfaces, &ty)
        } else {
            parent
                .as_mut()
                .is_some_and(|parent| apply_args(std::slice::from_mut(parent), &ty))
        };
        if !applied {
            diagnostics.push(ancestor_mismatch("@extends", &ty));
        }
    }
    for expr in &block.implements {
        let Some(ty) = annotate(&context, expr, "@implements", diagnostics)? else {
            continue;
        };
        if !apply_args(&mut interfaces, &ty) {
            diagnostics.push(ancestor_mismatch("@implements", &ty));
        }
    }
    for expr in &block.uses {
        let Some(ty) = annotate(&context, expr, "@use", diagnostics)? else {
            continue;
        };
        if !apply_args(&mut traits, &ty) {
            diagnostics.push(ancestor_mismatch("@use", &ty));
        }
    }

    if let Some(parent) = parent {
        record = record.with::<keys::DeclaredParent>(parent);
    }
    if !interfaces.is_empty() {
        record = record.with::<keys::DeclaredInterfaces>(interfaces);
    }
    if !traits.is_empty() {
        record = record.with::<keys::DeclaredTraits>(traits);
    }
    Ok(record)
}

/// Templates, `@return`, `@param` and deprecation of a function or method.
fn signature(
    block: &DocBlock,
    context: &TypeContext,
    params: &IndexMap<Name, TypedMap>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<TypedMap> {
    let mut update = TypedMap::new();

    let templates = resolve_templates(block, context, diagnostics)?;
    if !templates.is_empty() {
        update = update.with::<keys::Templates>(templates);
    }
    if let Some(returns) = &block.returns {
        if let Some(ty) = annotate(context, returns, "@return", diagnostics)? {
            update = update.with::<keys::TypeInfo>(TypeFacet::annotated(ty));
        }
    }

    let mut param_updates = IndexMap::new();
    for (name, expr) in &block.params {
        let name = Name::new(name.trim_start_matches('$'));
        if !params.contains_key(&name) {
            diagnostics.push(Diagnostic::new(
                "unknown-parameter",
                format!("@param ${name} does not match any parameter"),
            ));
            continue;
        }
        if let Some(ty) = annotate(context, expr, &format!("@param ${name}"), diagnostics)? {
            param_updates.insert(name, TypedMap::new().with::<keys::TypeInfo>(TypeFacet::annotated(ty)));
        }
    }
    if !param_updates.is_empty() {
        update = update.with::<keys::Parameters>(param_updates);
    }

    if let Some(deprecation) = &block.deprecation {
        update = update.with::<keys::Deprecated>(deprecation.clone());
    }
    Ok(update)
}

/// `@var` and deprecation of a property or constant.
fn variable(
    block: &DocBlock,
    context: &TypeContext,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<TypedMap> {
    let mut update = TypedMap::new();
    if let Some(var) = &block.var {
        if let Some(ty) = annotate(context, var, "@var", diagnostics)? {
            update = update.with::<keys::TypeInfo>(TypeFacet::annotated(ty));
        }
    }
    if let Some(deprecation) = &block.deprecation {
        update = update.with::<keys::Deprecated>(deprecation.clone());
    }
    Ok(update)
}

fn template_names(block: &DocBlock) -> Vec<Name> {
    block
        .templates
        .iter()
        .map(|template| Name::new(&template.name))
        .collect()
}

fn resolve_templates(
    block: &DocBlock,
    context: &TypeContext,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<IndexMap<Name, TemplateParam>> {
    let mut templates = IndexMap::new();
    for template in &block.templates {
        let bound = match &template.bound {
            Some(bound) => annotate(
                context,
                bound,
                &format!("bound of template {}", template.name),
                diagnostics,
            )?,
            None => None,
        };
        templates.insert(
            Name::new(&template.name),
            TemplateParam {
                bound,
                variance: template.variance,
            },
        );
    }
    Ok(templates)
}

/// Resolve a doc type; resolution failures become diagnostics.
fn annotate(
    context: &TypeContext,
    expr: &TypeExpr,
    what: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Option<Type>> {
    match context.resolve_type_expr(expr) {
        Ok(ty) => Ok(Some(ty)),
        Err(ReflectError::InvalidType { ty, message }) => {
            diagnostics.push(Diagnostic::new(
                "invalid-doc-type",
                format!("{what}: invalid type `{ty}`: {message}"),
            ));
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Copy generic arguments from a doc ancestor reference onto the declared ancestor.
fn apply_args(refs: &mut [AncestorRef], ty: &Type) -> bool {
    let Type::Named { class, args } = ty else {
        return false;
    };
    match refs.iter_mut().find(|entry| entry.class.eq_ignore_case(class)) {
        Some(entry) => {
            entry.args = args.clone();
            true
        }
        None => false,
    }
}

fn ancestor_mismatch(tag: &str, ty: &Type) -> Diagnostic {
    Diagnostic::new(
        "doc-ancestor-mismatch",
        format!("{tag} {ty} does not name a declared ancestor"),
    )
}

fn promoted_annotations(
    constructor: &TypedMap,
    update: &TypedMap,
    properties: &mut IndexMap<Name, TypedMap>,
) {
    let Some(annotated) = update.get::<keys::Parameters>() else {
        return;
    };
    let params = constructor.value::<keys::Parameters>();
    for (name, param_update) in annotated {
        let is_promoted = params
            .get(name)
            .is_some_and(|param| param.value::<keys::Parameter>().promoted);
        if let (true, Some(facet)) = (is_promoted, param_update.get::<keys::TypeInfo>()) {
            properties.insert(
                name.clone(),
                TypedMap::new().with::<keys::TypeInfo>(facet.clone()),
            );
        }
    }
}

fn with_diagnostics(record: TypedMap, diagnostics: Vec<Diagnostic>) -> TypedMap {
    if diagnostics.is_empty() {
        return record;
    }
    record.with::<keys::Diagnostics>(diagnostics)
}
