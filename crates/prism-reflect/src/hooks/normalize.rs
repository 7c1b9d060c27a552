use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use prism_core::{ClassLikeId, ConstantId, DeclId, FunctionLikeId, Name};
use prism_types::{rewrite_all, Type, TypeRewriter, UnionNormalizer};

use crate::error::Result;
use crate::hook::{ClassHook, ConstantHook, FunctionHook};
use crate::keys;
use crate::model::{AncestorRef, Diagnostic};
use crate::record::TypedMap;
use crate::session::ReflectionSession;

/// Expansion stops here; whatever is left is reported as unresolved.
const MAX_ALIAS_DEPTH: usize = 16;

/// Expands type aliases into their definitions and normalizes unions, as the last step
/// of the pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeNormalizationHook;

impl TypeNormalizationHook {
    pub const PRIORITY: i32 = 300;
}

impl ClassHook for TypeNormalizationHook {
    fn name(&self) -> &'static str {
        "type-normalization"
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
        let class = id.type_name();
        let mut expander = AliasExpander::default();
        expander.define(&class, &record.value::<keys::Aliases>());
        normalize(record, Some(&class), expander, session)
    }
}

impl FunctionHook for TypeNormalizationHook {
    fn name(&self) -> &'static str {
        "type-normalization"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn process(
        &self,
        _id: &FunctionLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        normalize(record, None, AliasExpander::default(), session)
    }
}

impl ConstantHook for TypeNormalizationHook {
    fn name(&self) -> &'static str {
        "type-normalization"
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
        normalize(record, None, AliasExpander::default(), session)
    }
}

/// Alias definitions keyed by `(declaring class, alias name)`.
#[derive(Debug, Default)]
struct AliasExpander {
    definitions: HashMap<(Name, Name), Type>,
}

impl AliasExpander {
    fn define(&mut self, class: &Name, aliases: &IndexMap<Name, Type>) {
        for (name, ty) in aliases {
            self.definitions.insert((class.clone(), name.clone()), ty.clone());
        }
    }

    fn expand(&self, ty: &Type, depth: usize) -> Type {
        match ty {
            Type::Alias { class, name, .. } if depth < MAX_ALIAS_DEPTH => {
                match self.definitions.get(&(class.clone(), name.clone())) {
                    Some(definition) => self.expand(definition, depth + 1),
                    None => ty.clone(),
                }
            }
            _ => ty.map_children(|child| self.expand(child, depth)),
        }
    }
}

impl TypeRewriter for AliasExpander {
    fn rewrite(&self, ty: &Type) -> Type {
        self.expand(ty, 0)
    }
}

fn normalize(
    record: TypedMap,
    class: Option<&Name>,
    mut expander: AliasExpander,
    session: &mut ReflectionSession<'_>,
) -> Result<TypedMap> {
    let mut diagnostics = Vec::new();

    let mut referenced: IndexSet<Name> = IndexSet::new();
    for_each_type(&record, &mut |ty| {
        ty.walk(&mut |node| {
            if let Type::Alias { class: owner, .. } = node {
                referenced.insert(owner.clone());
            }
        })
    });
    for owner in referenced {
        if class.is_some_and(|class| class.eq_ignore_case(&owner)) {
            continue;
        }
        if session.in_progress(&DeclId::class(owner.clone())) {
            diagnostics.push(Diagnostic::new(
                "unresolved-alias",
                format!("aliases of {owner} are not available while it is being resolved"),
            ));
            continue;
        }
        match session.try_reflect_class(&owner)? {
            Some(declaring) => expander.define(&owner, &declaring.value::<keys::Aliases>()),
            None => diagnostics.push(Diagnostic::new(
                "unresolved-alias",
                format!("{owner} is not a known class-like"),
            )),
        }
    }

    let rewriters: [&dyn TypeRewriter; 2] = [&expander, &UnionNormalizer];
    let record = map_types(&record, &|ty| rewrite_all(ty, &rewriters));

    let mut unresolved: IndexSet<String> = IndexSet::new();
    for_each_type(&record, &mut |ty| {
        ty.walk(&mut |node| {
            if let Type::Alias { class, name, .. } = node {
                unresolved.insert(format!("{class}::{name}"));
            }
        })
    });
    diagnostics.extend(
        unresolved
            .into_iter()
            .map(|alias| Diagnostic::new("unresolved-alias", format!("type alias {alias} could not be expanded"))),
    );

    if diagnostics.is_empty() {
        Ok(record)
    } else {
        Ok(record.with::<keys::Diagnostics>(diagnostics))
    }
}

/// Every type stored in `record` or one of its nested member records.
fn for_each_type(record: &TypedMap, f: &mut dyn FnMut(&Type)) {
    if let Some(facet) = record.get::<keys::TypeInfo>() {
        for ty in [&facet.native, &facet.annotated, &facet.tentative, &facet.inferred]
            .into_iter()
            .flatten()
        {
            f(ty);
        }
    }
    if let Some(aliases) = record.get::<keys::Aliases>() {
        aliases.values().for_each(&mut *f);
    }
    if let Some(backing) = record.get::<keys::BackingType>() {
        f(backing);
    }
    if let Some(templates) = record.get::<keys::Templates>() {
        templates.values().filter_map(|param| param.bound.as_ref()).for_each(&mut *f);
    }
    let ancestors = record
        .get::<keys::DeclaredParent>()
        .into_iter()
        .chain(record.get::<keys::DeclaredInterfaces>().into_iter().flatten())
        .chain(record.get::<keys::DeclaredTraits>().into_iter().flatten());
    for ancestor in ancestors {
        ancestor.args.iter().for_each(&mut *f);
    }
    for members in [
        record.get::<keys::Methods>(),
        record.get::<keys::Properties>(),
        record.get::<keys::Constants>(),
        record.get::<keys::Parameters>(),
    ]
    .into_iter()
    .flatten()
    {
        for member in members.values() {
            for_each_type(member, f);
        }
    }
}

/// Rebuild `record` with `f` applied to every stored type. Nothing is added or dropped,
/// so each fact is replaced rather than merged.
fn map_types(record: &TypedMap, f: &dyn Fn(&Type) -> Type) -> TypedMap {
    let mut record = record.clone();
    if let Some(facet) = record.get::<keys::TypeInfo>() {
        let rewriter: &dyn TypeRewriter = &f;
        let facet = facet.rewrite(&[rewriter]);
        record = record.replace::<keys::TypeInfo>(facet);
    }
    if let Some(aliases) = record.get::<keys::Aliases>() {
        let aliases = aliases.iter().map(|(name, ty)| (name.clone(), f(ty))).collect();
        record = record.replace::<keys::Aliases>(aliases);
    }
    if let Some(backing) = record.get::<keys::BackingType>() {
        let backing = f(backing);
        record = record.replace::<keys::BackingType>(backing);
    }
    if let Some(templates) = record.get::<keys::Templates>() {
        let mut templates = templates.clone();
        for param in templates.values_mut() {
            param.bound = param.bound.as_ref().map(f);
        }
        record = record.replace::<keys::Templates>(templates);
    }

    let ancestor = |ancestor: &AncestorRef| AncestorRef {
        class: ancestor.class.clone(),
        args: ancestor.args.iter().map(f).collect(),
    };
    if let Some(parent) = record.get::<keys::DeclaredParent>() {
        let parent = ancestor(parent);
        record = record.replace::<keys::DeclaredParent>(parent);
    }
    if let Some(interfaces) = record.get::<keys::DeclaredInterfaces>() {
        let interfaces = interfaces.iter().map(ancestor).collect();
        record = record.replace::<keys::DeclaredInterfaces>(interfaces);
    }
    if let Some(traits) = record.get::<keys::DeclaredTraits>() {
        let traits = traits.iter().map(ancestor).collect();
        record = record.replace::<keys::DeclaredTraits>(traits);
    }

    let members = |members: &IndexMap<Name, TypedMap>| -> IndexMap<Name, TypedMap> {
        members
            .iter()
            .map(|(name, member)| (name.clone(), map_types(member, f)))
            .collect()
    };
    if let Some(methods) = record.get::<keys::Methods>() {
        let methods = members(methods);
        record = record.replace::<keys::Methods>(methods);
    }
    if let Some(properties) = record.get::<keys::Properties>() {
        let properties = members(properties);
        record = record.replace::<keys::Properties>(properties);
    }
    if let Some(constants) = record.get::<keys::Constants>() {
        let constants = members(constants);
        record = record.replace::<keys::Constants>(constants);
    }
    if let Some(params) = record.get::<keys::Parameters>() {
        let params = members(params);
        record = record.replace::<keys::Parameters>(params);
    }
    record
}
