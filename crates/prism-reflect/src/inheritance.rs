//! Member inheritance.
//!
//! A class's member maps are completed with what its ancestors contribute. Ancestors
//! are reflected in declared order (parent, interfaces, traits) and their members are
//! merged by priority:
//!
//! 1. the class's own declarations,
//! 2. trait members, after `insteadof` and `as` adaptations,
//! 3. interface members,
//! 4. parent members.
//!
//! A member is only inserted when no higher-priority source supplied it, with one
//! exception: an inherited abstract member gives way to a concrete one from a lower
//! source. Template parameters of each ancestor are substituted with the arguments
//! supplied at the use site, and `static` is rebound to the inheriting class.

use std::collections::HashMap;

use indexmap::IndexMap;
use prism_core::{ClassLikeId, DeclId, Name, TemplateSite};
use prism_types::{SelfRebinder, StaticRebinder, TemplateSubstitution, Type, TypeRewriter};

use crate::error::{ReflectError, Result};
use crate::keys;
use crate::model::{AncestorRef, Diagnostic, TraitAdaptation, Visibility};
use crate::record::TypedMap;
use crate::session::ReflectionSession;

type Members = IndexMap<Name, TypedMap>;

pub struct InheritanceResolver<'s, 'r> {
    session: &'s mut ReflectionSession<'r>,
}

/// Working state for one class.
struct Merge {
    class: Name,
    own_methods: Vec<Name>,
    own_properties: Vec<Name>,
    own_constants: Vec<Name>,
    methods: Members,
    properties: Members,
    constants: Members,
    parents: Vec<Name>,
    interfaces: Vec<Name>,
    detectors: Vec<TypedMap>,
    diagnostics: Vec<Diagnostic>,
}

/// A method one trait offers to the using class.
struct TraitMethod {
    from: Name,
    name: Name,
    record: TypedMap,
}

impl<'s, 'r> InheritanceResolver<'s, 'r> {
    pub fn new(session: &'s mut ReflectionSession<'r>) -> Self {
        Self { session }
    }

    pub fn resolve(&mut self, id: &ClassLikeId, record: TypedMap) -> Result<TypedMap> {
        let class = id.type_name();
        let own_methods = record.value::<keys::Methods>();
        let own_properties = record.value::<keys::Properties>();
        let own_constants = record.value::<keys::Constants>();

        let mut merge = Merge {
            class: class.clone(),
            own_methods: own_methods.keys().cloned().collect(),
            own_properties: own_properties.keys().cloned().collect(),
            own_constants: own_constants.keys().cloned().collect(),
            methods: own_methods,
            properties: own_properties,
            constants: own_constants,
            parents: Vec::new(),
            interfaces: Vec::new(),
            detectors: Vec::new(),
            diagnostics: Vec::new(),
        };

        let parent = record.get::<keys::DeclaredParent>().cloned();
        let interfaces = record.value::<keys::DeclaredInterfaces>();
        let traits = record.value::<keys::DeclaredTraits>();

        // Reflect every direct ancestor once, in declared order.
        let mut visited: Vec<Name> = Vec::new();
        let mut reflected = |resolver: &mut Self,
                             merge: &mut Merge,
                             ancestor: &AncestorRef|
         -> Result<Option<TypedMap>> {
            if visited.iter().any(|seen| seen.eq_ignore_case(&ancestor.class)) {
                return Ok(None);
            }
            visited.push(ancestor.class.clone());
            resolver.ancestor(&class, ancestor, merge)
        };

        let parent_record = match &parent {
            Some(parent) => reflected(self, &mut merge, parent)?.map(|record| (parent.clone(), record)),
            None => None,
        };
        let mut interface_records = Vec::new();
        for interface in &interfaces {
            if let Some(record) = reflected(self, &mut merge, interface)? {
                interface_records.push((interface.clone(), record));
            }
        }
        let mut trait_records = Vec::new();
        for used in &traits {
            if let Some(record) = reflected(self, &mut merge, used)? {
                trait_records.push((used.clone(), record));
            }
        }

        let adaptations = record.value::<keys::TraitAdaptations>();
        merge_traits(&mut merge, &trait_records, &adaptations)?;
        for (interface, interface_record) in &interface_records {
            merge_interface(&mut merge, interface, interface_record);
        }
        if let Some((parent, parent_record)) = &parent_record {
            merge_parent(&mut merge, parent, parent_record);
        }

        // The merged maps already hold the own members.
        let mut record = record
            .replace::<keys::Methods>(merge.methods)
            .replace::<keys::Properties>(merge.properties)
            .replace::<keys::Constants>(merge.constants);
        if !merge.parents.is_empty() {
            record = record.with::<keys::Parents>(merge.parents);
        }
        if !merge.interfaces.is_empty() {
            record = record.with::<keys::Interfaces>(merge.interfaces);
        }
        // A change anywhere up the hierarchy invalidates this record.
        for ancestor in &merge.detectors {
            if let Some(detector) = ancestor.get::<keys::Detector>() {
                record = record.with::<keys::Detector>(detector.clone());
            }
        }
        if !merge.diagnostics.is_empty() {
            record = record.with::<keys::Diagnostics>(merge.diagnostics);
        }
        Ok(record)
    }

    /// Reflect one ancestor.
    ///
    /// Only a loop made purely of inheritance edges is `CyclicInheritance`. An ancestor
    /// that is in progress for another reason (a constant of it referring to this class,
    /// say) is a `CyclicResolution` the caller may recover from.
    fn ancestor(
        &mut self,
        class: &Name,
        ancestor: &AncestorRef,
        merge: &mut Merge,
    ) -> Result<Option<TypedMap>> {
        let ancestor_id = DeclId::class(ancestor.class.clone());
        if ancestor.class.eq_ignore_case(class) {
            return Err(ReflectError::CyclicInheritance {
                class: class.clone(),
                chain: vec![class.clone(), ancestor.class.clone()],
            });
        }
        if let Some(chain) = self.session.inheritance_cycle(&ancestor_id) {
            return Err(ReflectError::CyclicInheritance {
                class: class.clone(),
                chain,
            });
        }
        if self.session.in_progress(&ancestor_id) {
            return Err(self.session.cyclic_resolution(&ancestor_id));
        }

        match self.session.reflect_ancestor(&ancestor_id) {
            Ok(record) => {
                merge.detectors.push(record.clone());
                Ok(Some(record))
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(
                    target: "prism.reflect",
                    class = %class,
                    ancestor = %ancestor.class,
                    "ancestor not found; members are not inherited"
                );
                merge.diagnostics.push(Diagnostic::new(
                    "unknown-ancestor",
                    format!("{} is not a known class-like", ancestor.class),
                ));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Substitution of `ancestor`'s templates with the use-site arguments. Missing
/// arguments fall back to the template's bound, then to `mixed`.
fn substitution(ancestor: &AncestorRef, record: &TypedMap) -> TemplateSubstitution {
    let templates = record.value::<keys::Templates>();
    let args: HashMap<Name, Type> = templates
        .iter()
        .enumerate()
        .map(|(idx, (name, param))| {
            let arg = ancestor.args.get(idx).cloned().unwrap_or_else(|| param.fallback());
            (name.clone(), arg)
        })
        .collect();
    TemplateSubstitution::new(TemplateSite::Class(ClassLikeId::named(ancestor.class.clone())), args)
}

/// Rewrite every type inside a member record, including its parameters.
fn rewrite_member(member: &TypedMap, rewriters: &[&dyn TypeRewriter]) -> TypedMap {
    let mut member = member.clone();
    if let Some(facet) = member.get::<keys::TypeInfo>() {
        let facet = facet.rewrite(rewriters);
        member = member.replace::<keys::TypeInfo>(facet);
    }
    if let Some(params) = member.get::<keys::Parameters>() {
        let params = params
            .iter()
            .map(|(name, param)| (name.clone(), rewrite_member(param, rewriters)))
            .collect();
        member = member.replace::<keys::Parameters>(params);
    }
    member
}

fn is_abstract(member: &TypedMap) -> bool {
    member.value::<keys::Modifiers>().is_abstract
}

fn find_method<'m>(members: &'m Members, name: &Name) -> Option<&'m Name> {
    members.keys().find(|existing| existing.eq_ignore_case(name))
}

/// Insert `member` unless a higher-priority source already supplied it. An inherited
/// abstract member is replaced by a concrete one; own declarations never are.
fn offer(members: &mut Members, own: &[Name], name: &Name, member: TypedMap, case_insensitive: bool) {
    let existing = if case_insensitive {
        find_method(members, name).cloned()
    } else {
        members.contains_key(name).then(|| name.clone())
    };
    match existing {
        None => {
            members.insert(name.clone(), member);
        }
        Some(existing) => {
            let is_own = own.iter().any(|own| own.eq_ignore_case(&existing));
            let replaces_abstract = members.get(&existing).is_some_and(is_abstract) && !is_abstract(&member);
            if !is_own && replaces_abstract {
                members.insert(existing, member);
            }
        }
    }
}

fn merge_traits(
    merge: &mut Merge,
    traits: &[(AncestorRef, TypedMap)],
    adaptations: &[TraitAdaptation],
) -> Result<()> {
    let mut offered: Vec<TraitMethod> = Vec::new();

    for (used, record) in traits {
        let substitution = substitution(used, record);
        let self_rebinder = SelfRebinder::new(used.class.clone(), merge.class.clone());
        let static_rebinder = StaticRebinder::new(merge.class.clone());
        let rewriters: [&dyn TypeRewriter; 3] = [&substitution, &self_rebinder, &static_rebinder];
        // Trait members become members of the using class.
        let adopt = |member: &TypedMap| {
            rewrite_member(member, &rewriters).replace::<keys::DeclaringClass>(merge.class.clone())
        };

        for (name, method) in record.value::<keys::Methods>() {
            offered.push(TraitMethod {
                from: used.class.clone(),
                record: adopt(&method),
                name,
            });
        }
        for (name, property) in record.value::<keys::Properties>() {
            let property = adopt(&property);
            offer(&mut merge.properties, &merge.own_properties, &name, property, false);
        }
        for (name, constant) in record.value::<keys::Constants>() {
            let constant = adopt(&constant);
            offer(&mut merge.constants, &merge.own_constants, &name, constant, false);
        }
        merge
            .interfaces
            .extend(record.value::<keys::Interfaces>());
    }

    // Aliases may name a method that `insteadof` excludes, so they are matched first.
    let mut aliased: Vec<TraitMethod> = Vec::new();
    for adaptation in adaptations {
        let TraitAdaptation::Alias {
            trait_name,
            method,
            alias,
            visibility,
        } = adaptation
        else {
            continue;
        };
        let source = offered.iter_mut().find(|candidate| {
            candidate.name.eq_ignore_case(method)
                && trait_name
                    .as_ref()
                    .map_or(true, |from| candidate.from.eq_ignore_case(from))
        });
        let Some(source) = source else {
            merge.diagnostics.push(Diagnostic::new(
                "unknown-trait-method",
                format!("adaptation of {method} matches no trait method"),
            ));
            continue;
        };
        match alias {
            Some(alias) => aliased.push(TraitMethod {
                from: source.from.clone(),
                name: alias.clone(),
                record: with_visibility(source.record.clone(), *visibility),
            }),
            None => source.record = with_visibility(source.record.clone(), *visibility),
        }
    }
    for adaptation in adaptations {
        if let TraitAdaptation::Precedence {
            trait_name,
            method,
            instead_of,
        } = adaptation
        {
            offered.retain(|candidate| {
                !(candidate.name.eq_ignore_case(method)
                    && !candidate.from.eq_ignore_case(trait_name)
                    && instead_of.iter().any(|excluded| excluded.eq_ignore_case(&candidate.from)))
            });
        }
    }
    offered.extend(aliased);

    // Group by name, keeping the first-seen order.
    let mut groups: IndexMap<String, Vec<TraitMethod>> = IndexMap::new();
    for candidate in offered {
        groups
            .entry(candidate.name.as_str().to_ascii_lowercase())
            .or_default()
            .push(candidate);
    }

    for (_, candidates) in groups {
        let Some(first) = candidates.first() else {
            continue;
        };
        let name = first.name.clone();
        if merge.own_methods.iter().any(|own| own.eq_ignore_case(&name)) {
            continue;
        }
        let concrete: Vec<&TraitMethod> = candidates
            .iter()
            .filter(|candidate| !is_abstract(&candidate.record))
            .collect();
        if concrete.len() > 1 {
            return Err(ReflectError::ConflictingInheritance {
                class: merge.class.clone(),
                member: name,
                traits: concrete.iter().map(|candidate| candidate.from.clone()).collect(),
            });
        }
        let chosen = concrete.first().copied().unwrap_or(first);
        offer(&mut merge.methods, &merge.own_methods, &name, chosen.record.clone(), true);
    }
    Ok(())
}

fn with_visibility(record: TypedMap, visibility: Option<Visibility>) -> TypedMap {
    let Some(visibility) = visibility else {
        return record;
    };
    let mut modifiers = record.value::<keys::Modifiers>();
    modifiers.visibility = visibility;
    record.with::<keys::Modifiers>(modifiers)
}

fn merge_interface(merge: &mut Merge, interface: &AncestorRef, record: &TypedMap) {
    let substitution = substitution(interface, record);
    let static_rebinder = StaticRebinder::new(merge.class.clone());
    let rewriters: [&dyn TypeRewriter; 2] = [&substitution, &static_rebinder];

    for (name, method) in record.value::<keys::Methods>() {
        offer(&mut merge.methods, &merge.own_methods, &name, rewrite_member(&method, &rewriters), true);
    }
    for (name, constant) in record.value::<keys::Constants>() {
        offer(&mut merge.constants, &merge.own_constants, &name, rewrite_member(&constant, &rewriters), false);
    }
    merge.interfaces.push(interface.class.clone());
    merge.interfaces.extend(record.value::<keys::Interfaces>());
    dedup_names(&mut merge.interfaces);
}

/// Private parent methods stay visible to reflection; private properties and constants
/// are not inherited.
fn merge_parent(merge: &mut Merge, parent: &AncestorRef, record: &TypedMap) {
    let substitution = substitution(parent, record);
    let static_rebinder = StaticRebinder::new(merge.class.clone());
    let rewriters: [&dyn TypeRewriter; 2] = [&substitution, &static_rebinder];
    let is_private = |member: &TypedMap| member.value::<keys::Modifiers>().visibility == Visibility::Private;

    for (name, method) in record.value::<keys::Methods>() {
        offer(&mut merge.methods, &merge.own_methods, &name, rewrite_member(&method, &rewriters), true);
    }
    for (name, property) in record.value::<keys::Properties>() {
        if !is_private(&property) {
            offer(&mut merge.properties, &merge.own_properties, &name, rewrite_member(&property, &rewriters), false);
        }
    }
    for (name, constant) in record.value::<keys::Constants>() {
        if !is_private(&constant) {
            offer(&mut merge.constants, &merge.own_constants, &name, rewrite_member(&constant, &rewriters), false);
        }
    }

    merge.parents.push(parent.class.clone());
    merge.parents.extend(record.value::<keys::Parents>());
    merge.interfaces.extend(record.value::<keys::Interfaces>());
    dedup_names(&mut merge.interfaces);
}

fn dedup_names(names: &mut Vec<Name>) {
    let mut seen: Vec<Name> = Vec::with_capacity(names.len());
    names.retain(|name| {
        if seen.iter().any(|other| other.eq_ignore_case(name)) {
            false
        } else {
            seen.push(name.clone());
            true
        }
    });
}
