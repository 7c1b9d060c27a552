//! Sequential type-tree rewriting.
//!
//! A [`TypeRewriter`] receives a whole tree and returns a new one; it decides itself
//! whether to descend (usually through [`Type::map_children`]). [`rewrite_all`] threads
//! a tree through an ordered list of rewriters, each seeing the previous output.

use std::collections::HashMap;

use crate::{Name, TemplateSite, Type};

pub trait TypeRewriter {
    fn rewrite(&self, ty: &Type) -> Type;
}

impl<F> TypeRewriter for F
where
    F: Fn(&Type) -> Type,
{
    fn rewrite(&self, ty: &Type) -> Type {
        self(ty)
    }
}

/// Apply `rewriters` in order. An empty list returns `ty` unchanged.
pub fn rewrite_all(ty: &Type, rewriters: &[&dyn TypeRewriter]) -> Type {
    let mut current = ty.clone();
    for rewriter in rewriters {
        current = rewriter.rewrite(&current);
    }
    current
}

/// Replace template parameters declared at `site` with concrete arguments.
///
/// Templates with no entry in `args` are left in place.
#[derive(Debug, Clone)]
pub struct TemplateSubstitution {
    site: TemplateSite,
    args: HashMap<Name, Type>,
}

impl TemplateSubstitution {
    pub fn new(site: TemplateSite, args: HashMap<Name, Type>) -> Self {
        Self { site, args }
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl TypeRewriter for TemplateSubstitution {
    fn rewrite(&self, ty: &Type) -> Type {
        match ty {
            Type::Template { name, site } if *site == self.site => match self.args.get(name) {
                Some(arg) => arg.clone(),
                None => ty.clone(),
            },
            _ => ty.map_children(|child| self.rewrite(child)),
        }
    }
}

/// Rebind every late-bound `static` to `class`.
///
/// Applied when a member is inherited: `static` in the ancestor now means the inheritor.
#[derive(Debug, Clone)]
pub struct StaticRebinder {
    class: Name,
}

impl StaticRebinder {
    pub fn new(class: Name) -> Self {
        Self { class }
    }
}

impl TypeRewriter for StaticRebinder {
    fn rewrite(&self, ty: &Type) -> Type {
        match ty {
            Type::Static { args, .. } => Type::Static {
                class: self.class.clone(),
                args: args.iter().map(|arg| self.rewrite(arg)).collect(),
            },
            _ => ty.map_children(|child| self.rewrite(child)),
        }
    }
}

/// Rebind trait-relative `self` (and `static`) from the trait to the using class.
#[derive(Debug, Clone)]
pub struct SelfRebinder {
    from: Name,
    to: Name,
}

impl SelfRebinder {
    pub fn new(from: Name, to: Name) -> Self {
        Self { from, to }
    }
}

impl TypeRewriter for SelfRebinder {
    fn rewrite(&self, ty: &Type) -> Type {
        match ty {
            Type::SelfRef { class } if class.eq_ignore_case(&self.from) => Type::class(self.to.clone()),
            Type::Static { class, args } if class.eq_ignore_case(&self.from) => Type::Static {
                class: self.to.clone(),
                args: args.iter().map(|arg| self.rewrite(arg)).collect(),
            },
            _ => ty.map_children(|child| self.rewrite(child)),
        }
    }
}

/// Flatten nested unions and intersections, drop duplicates (first occurrence wins),
/// drop `never` from unions and let `mixed` absorb a union.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionNormalizer;

impl TypeRewriter for UnionNormalizer {
    fn rewrite(&self, ty: &Type) -> Type {
        match ty {
            Type::Union(parts) => {
                let mut flat = Vec::with_capacity(parts.len());
                for part in parts {
                    match self.rewrite(part) {
                        Type::Union(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                if flat.contains(&Type::Mixed) {
                    return Type::Mixed;
                }
                flat.retain(|part| *part != Type::Never);
                dedup_in_order(&mut flat);
                Type::union(flat)
            }
            Type::Intersection(parts) => {
                let mut flat = Vec::with_capacity(parts.len());
                for part in parts {
                    match self.rewrite(part) {
                        Type::Intersection(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                dedup_in_order(&mut flat);
                if flat.len() == 1 {
                    return flat.pop().unwrap_or(Type::Never);
                }
                Type::Intersection(flat)
            }
            _ => ty.map_children(|child| self.rewrite(child)),
        }
    }
}

fn dedup_in_order(types: &mut Vec<Type>) {
    let mut seen = Vec::with_capacity(types.len());
    types.retain(|ty| {
        if seen.contains(ty) {
            false
        } else {
            seen.push(ty.clone());
            true
        }
    });
}
