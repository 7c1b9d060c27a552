//! The prism type model.
//!
//! Types are plain trees ([`Type`]). Names inside a type are always already resolved
//! (fully qualified); turning source text into a `Type` is the job of
//! `prism-reflect`'s `TypeContext`. This crate owns the tree itself, the per-declaration
//! [`TypeFacet`] and the sequential rewriting protocol in [`rewrite`].

mod display;
mod facet;
pub mod rewrite;

pub use facet::TypeFacet;
pub use prism_core::{Name, TemplateSite};
pub use rewrite::{
    rewrite_all, SelfRebinder, StaticRebinder, TemplateSubstitution, TypeRewriter, UnionNormalizer,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Never,
    Void,
    Null,
    Mixed,
    Bool,
    Int,
    Float,
    String,
    ArrayKey,
    Scalar,
    Object,
    Callable,
    Iterable,
    Literal(Literal),
    Array {
        key: Box<Type>,
        value: Box<Type>,
    },
    List(Box<Type>),
    /// A class-like type with (possibly empty) generic arguments.
    Named {
        class: Name,
        args: Vec<Type>,
    },
    /// Late-bound `static`, remembering the class it was last bound to.
    Static {
        class: Name,
        args: Vec<Type>,
    },
    /// `self` written inside a trait; rebound to the using class on import.
    SelfRef {
        class: Name,
    },
    Template {
        name: Name,
        site: TemplateSite,
    },
    /// Reference to a doc-comment type alias declared on `class`.
    Alias {
        class: Name,
        name: Name,
        args: Vec<Type>,
    },
    /// The type of a class constant, e.g. `Status::ACTIVE`.
    ClassConstant {
        class: Name,
        name: Name,
    },
    /// The type of a global constant.
    Constant(Name),
    Union(Vec<Type>),
    Intersection(Vec<Type>),
}

impl Type {
    pub fn named(class: impl Into<Name>, args: Vec<Type>) -> Self {
        Type::Named {
            class: class.into(),
            args,
        }
    }

    pub fn class(class: impl Into<Name>) -> Self {
        Type::named(class, Vec::new())
    }

    pub fn list(value: Type) -> Self {
        Type::List(Box::new(value))
    }

    pub fn array(key: Type, value: Type) -> Self {
        Type::Array {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn int_literal(value: i64) -> Self {
        Type::Literal(Literal::Int(value))
    }

    pub fn string_literal(value: impl Into<String>) -> Self {
        Type::Literal(Literal::String(value.into()))
    }

    pub fn bool_literal(value: bool) -> Self {
        Type::Literal(Literal::Bool(value))
    }

    /// `T|null`, without duplicating an existing `null` member.
    pub fn nullable(inner: Type) -> Self {
        match inner {
            Type::Null | Type::Mixed => inner,
            Type::Union(mut parts) => {
                if !parts.contains(&Type::Null) {
                    parts.push(Type::Null);
                }
                Type::Union(parts)
            }
            other => Type::Union(vec![other, Type::Null]),
        }
    }

    /// Build a union, collapsing the trivial cases.
    pub fn union(parts: impl IntoIterator<Item = Type>) -> Self {
        let mut parts: Vec<Type> = parts.into_iter().collect();
        match parts.len() {
            0 => Type::Never,
            1 => parts.pop().unwrap_or(Type::Never),
            _ => Type::Union(parts),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Type::Null)
    }

    /// Rebuild this node with `f` applied to each direct child.
    ///
    /// Leaves are returned unchanged. Rewriters use this to decide, per node,
    /// whether to descend.
    pub fn map_children(&self, mut f: impl FnMut(&Type) -> Type) -> Type {
        fn map_all(types: &[Type], f: &mut impl FnMut(&Type) -> Type) -> Vec<Type> {
            types.iter().map(f).collect()
        }

        match self {
            Type::Array { key, value } => {
                let key = f(key);
                let value = f(value);
                Type::array(key, value)
            }
            Type::List(value) => Type::List(Box::new(f(value))),
            Type::Named { class, args } => Type::Named {
                class: class.clone(),
                args: map_all(args, &mut f),
            },
            Type::Static { class, args } => Type::Static {
                class: class.clone(),
                args: map_all(args, &mut f),
            },
            Type::Alias { class, name, args } => Type::Alias {
                class: class.clone(),
                name: name.clone(),
                args: map_all(args, &mut f),
            },
            Type::Union(parts) => Type::Union(map_all(parts, &mut f)),
            Type::Intersection(parts) => Type::Intersection(map_all(parts, &mut f)),
            leaf => leaf.clone(),
        }
    }

    /// Visit every node, parents before children.
    pub fn walk(&self, f: &mut impl FnMut(&Type)) {
        f(self);
        match self {
            Type::Array { key, value } => {
                key.walk(f);
                value.walk(f);
            }
            Type::List(value) => value.walk(f),
            Type::Named { args, .. } | Type::Static { args, .. } | Type::Alias { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            Type::Union(parts) | Type::Intersection(parts) => {
                for part in parts {
                    part.walk(f);
                }
            }
            _ => {}
        }
    }

    pub fn contains_templates(&self) -> bool {
        let mut found = false;
        self.walk(&mut |ty| found |= matches!(ty, Type::Template { .. }));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nullable_does_not_duplicate_null() {
        let ty = Type::nullable(Type::Union(vec![Type::Int, Type::Null]));
        assert_eq!(ty, Type::Union(vec![Type::Int, Type::Null]));
        assert_eq!(Type::nullable(Type::Mixed), Type::Mixed);
        assert_eq!(
            Type::nullable(Type::String),
            Type::Union(vec![Type::String, Type::Null])
        );
    }

    #[test]
    fn map_children_leaves_leaves_alone() {
        let ty = Type::Int;
        assert_eq!(ty.map_children(|_| Type::Never), Type::Int);

        let list = Type::list(Type::Int);
        assert_eq!(list.map_children(|_| Type::String), Type::list(Type::String));
    }

    #[test]
    fn walk_finds_nested_templates() {
        let t = Type::Template {
            name: Name::new("T"),
            site: TemplateSite::Class(prism_core::ClassLikeId::named("Box")),
        };
        let ty = Type::array(Type::Int, Type::named("Box", vec![t]));
        assert!(ty.contains_templates());
        assert!(!Type::list(Type::Int).contains_templates());
    }
}
