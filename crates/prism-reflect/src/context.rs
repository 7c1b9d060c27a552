//! Name and type resolution inside one declaration's scope.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use prism_core::{ClassLikeId, FunctionLikeId, Name, TemplateSite};
use prism_types::Type;

use crate::decl::TypeExpr;
use crate::error::{ReflectError, Result};
use crate::keys;
use crate::model::{AliasImport, ClassKind, ImportMap};
use crate::record::TypedMap;

/// Resolves names the built-in rules do not know (framework pseudo-types and the like).
///
/// Resolvers run in registration order and the first `Some` wins. They must be free of
/// side effects and must not assume anything about the resolvers after them.
pub trait CustomTypeResolver: Send + Sync {
    fn resolve(&self, name: &str, args: &[Type], context: &TypeContext) -> Option<Type>;
}

impl<F> CustomTypeResolver for F
where
    F: Fn(&str, &[Type], &TypeContext) -> Option<Type> + Send + Sync,
{
    fn resolve(&self, name: &str, args: &[Type], context: &TypeContext) -> Option<Type> {
        self(name, args, context)
    }
}

pub type ResolverChain = Arc<[Arc<dyn CustomTypeResolver>]>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ClassScope {
    name: Name,
    kind: ClassKind,
    parent: Option<Name>,
}

/// Everything needed to turn a name written inside a declaration into a resolved type.
#[derive(Clone)]
pub struct TypeContext {
    namespace: Name,
    imports: ImportMap,
    class: Option<ClassScope>,
    /// Innermost scope first.
    templates: Vec<(Name, TemplateSite)>,
    aliases: IndexMap<Name, AliasImport>,
    resolvers: ResolverChain,
}

impl fmt::Debug for TypeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeContext")
            .field("namespace", &self.namespace)
            .field("class", &self.class)
            .field("templates", &self.templates)
            .field("aliases", &self.aliases)
            .field("resolvers", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}

impl TypeContext {
    pub fn new(namespace: Name, imports: ImportMap) -> Self {
        Self {
            namespace,
            imports,
            class: None,
            templates: Vec::new(),
            aliases: IndexMap::new(),
            resolvers: Arc::from(Vec::new()),
        }
    }

    /// The scope of a class-like record: its namespace, imports, parent, class
    /// templates and type aliases.
    pub fn for_class(record: &TypedMap, id: &ClassLikeId, resolvers: ResolverChain) -> Self {
        let class_name = id.type_name();
        let mut context = Self::new(record.value::<keys::Namespace>(), record.value::<keys::Imports>())
            .with_resolvers(resolvers)
            .with_class(
                class_name.clone(),
                record.value::<keys::Kind>(),
                record.get::<keys::DeclaredParent>().map(|parent| parent.class.clone()),
            );

        if let Some(templates) = record.get::<keys::Templates>() {
            context = context.with_templates(TemplateSite::Class(id.clone()), templates.keys().cloned());
        }
        if let Some(aliases) = record.get::<keys::Aliases>() {
            for alias in aliases.keys() {
                context = context.with_alias(alias.clone(), class_name.clone(), alias.clone());
            }
        }
        if let Some(imported) = record.get::<keys::ImportedAliases>() {
            for (local, import) in imported {
                context = context.with_alias(local.clone(), import.class.clone(), import.name.clone());
            }
        }
        context
    }

    /// The scope of a free function or closure record.
    pub fn for_function(record: &TypedMap, id: &FunctionLikeId, resolvers: ResolverChain) -> Self {
        let mut context = Self::new(record.value::<keys::Namespace>(), record.value::<keys::Imports>())
            .with_resolvers(resolvers);
        if let Some(templates) = record.get::<keys::Templates>() {
            context = context.with_templates(TemplateSite::Function(id.clone()), templates.keys().cloned());
        }
        context
    }

    #[must_use]
    pub fn with_resolvers(mut self, resolvers: ResolverChain) -> Self {
        self.resolvers = resolvers;
        self
    }

    #[must_use]
    pub fn with_class(mut self, name: Name, kind: ClassKind, parent: Option<Name>) -> Self {
        self.class = Some(ClassScope { name, kind, parent });
        self
    }

    /// Bring templates declared at `site` into scope, shadowing outer ones.
    #[must_use]
    pub fn with_templates(mut self, site: TemplateSite, names: impl IntoIterator<Item = Name>) -> Self {
        let inner: Vec<_> = names.into_iter().map(|name| (name, site.clone())).collect();
        self.templates.splice(0..0, inner);
        self
    }

    #[must_use]
    pub fn with_alias(mut self, local: Name, class: Name, name: Name) -> Self {
        self.aliases.insert(local, AliasImport { class, name });
        self
    }

    pub fn namespace(&self) -> &Name {
        &self.namespace
    }

    pub fn current_class(&self) -> Option<&Name> {
        self.class.as_ref().map(|class| &class.name)
    }

    pub fn parent_class(&self) -> Option<&Name> {
        self.class.as_ref().and_then(|class| class.parent.as_ref())
    }

    pub fn resolvers(&self) -> &ResolverChain {
        &self.resolvers
    }

    /// Resolve a class-like name to its fully qualified form, applying `use` imports and
    /// the current namespace. `self`, `static` and `parent` resolve to the classes they
    /// denote when a class is in scope.
    pub fn resolve_class_name(&self, name: &str) -> Name {
        let name = name.trim();
        if let Some(absolute) = name.strip_prefix('\\') {
            return Name::new(absolute);
        }
        match name.to_ascii_lowercase().as_str() {
            "self" | "static" => {
                if let Some(class) = self.current_class() {
                    return class.clone();
                }
            }
            "parent" => {
                if let Some(parent) = self.parent_class() {
                    return parent.clone();
                }
            }
            _ => {}
        }
        self.qualify(name, |alias| self.imports.class(alias))
    }

    pub fn resolve_function_name(&self, name: &str) -> Name {
        let name = name.trim();
        if let Some(absolute) = name.strip_prefix('\\') {
            return Name::new(absolute);
        }
        if !name.contains('\\') {
            if let Some(imported) = self.imports.function(name) {
                return imported.clone();
            }
        }
        self.qualify(name, |alias| self.imports.class(alias))
    }

    /// Resolve a constant reference to `(owner, member)`.
    ///
    /// `Foo::BAR` yields the resolved class and `Some("BAR")`; a global constant yields
    /// its namespaced name and `None`. See [`TypeContext::global_fallback`] for the
    /// global namespace fallback of unqualified names.
    pub fn resolve_constant(&self, reference: &str) -> (Name, Option<Name>) {
        let reference = reference.trim();
        if let Some((class, member)) = reference.rsplit_once("::") {
            return (self.resolve_class_name(class), Some(Name::new(member)));
        }
        if let Some(absolute) = reference.strip_prefix('\\') {
            return (Name::new(absolute), None);
        }
        if !reference.contains('\\') {
            if let Some(imported) = self.imports.constant(reference) {
                return (imported.clone(), None);
            }
        }
        (self.qualify(reference, |alias| self.imports.class(alias)), None)
    }

    /// The global name an unqualified, unimported function or constant reference falls
    /// back to when the namespaced one does not exist.
    pub fn global_fallback(&self, reference: &str) -> Option<Name> {
        let reference = reference.trim();
        if self.namespace.is_empty()
            || reference.starts_with('\\')
            || reference.contains('\\')
            || reference.contains("::")
            || self.imports.constant(reference).is_some()
            || self.imports.function(reference).is_some()
        {
            return None;
        }
        Some(Name::new(reference))
    }

    fn qualify<'a>(&'a self, name: &str, import: impl Fn(&str) -> Option<&'a Name>) -> Name {
        if let Some(rest) = strip_prefix_ignore_case(name, "namespace\\") {
            return self.namespace.join(rest);
        }
        let (first, rest) = match name.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        if let Some(imported) = import(first) {
            return match rest {
                Some(rest) => imported.join(rest),
                None => imported.clone(),
            };
        }
        self.namespace.join(name)
    }

    /// Build a type from a name and already resolved arguments.
    ///
    /// The custom resolver chain is consulted first; built-in keywords, `self`,
    /// `static`, `parent`, templates, aliases and finally class names follow.
    pub fn resolve_type(&self, name: &str, args: Vec<Type>) -> Result<Type> {
        for resolver in self.resolvers.iter() {
            if let Some(ty) = resolver.resolve(name, &args, self) {
                return Ok(ty);
            }
        }

        let name = name.trim();
        if !name.contains('\\') {
            if let Some(ty) = keyword_type(&name.to_ascii_lowercase(), &args) {
                return Ok(ty);
            }
            match name.to_ascii_lowercase().as_str() {
                "self" => return self.self_type(name),
                "static" => {
                    let class = self.require_class(name)?;
                    return Ok(Type::Static {
                        class: class.name.clone(),
                        args,
                    });
                }
                "parent" => {
                    let parent = self.parent_class().ok_or_else(|| ReflectError::InvalidType {
                        ty: name.to_string(),
                        message: "no parent class in scope".to_string(),
                    })?;
                    return Ok(Type::named(parent.clone(), args));
                }
                _ => {}
            }
            if let Some((template, site)) = self.templates.iter().find(|(t, _)| t.as_str() == name) {
                return Ok(Type::Template {
                    name: template.clone(),
                    site: site.clone(),
                });
            }
            if let Some(alias) = self.aliases.get(name) {
                return Ok(Type::Alias {
                    class: alias.class.clone(),
                    name: alias.name.clone(),
                    args,
                });
            }
        }

        Ok(Type::named(self.resolve_class_name(name), args))
    }

    pub fn resolve_type_expr(&self, expr: &TypeExpr) -> Result<Type> {
        match expr {
            TypeExpr::Named { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve_type_expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.resolve_type(name, args)
            }
            TypeExpr::Nullable(inner) => Ok(Type::nullable(self.resolve_type_expr(inner)?)),
            TypeExpr::Union(parts) => Ok(Type::union(
                parts
                    .iter()
                    .map(|part| self.resolve_type_expr(part))
                    .collect::<Result<Vec<_>>>()?,
            )),
            TypeExpr::Intersection(parts) => {
                let mut parts = parts
                    .iter()
                    .map(|part| self.resolve_type_expr(part))
                    .collect::<Result<Vec<_>>>()?;
                if parts.len() == 1 {
                    return Ok(parts.remove(0));
                }
                Ok(Type::Intersection(parts))
            }
            TypeExpr::Literal(literal) => Ok(Type::Literal(literal.clone())),
            TypeExpr::ClassConstant { class, name } => Ok(Type::ClassConstant {
                class: self.resolve_class_name(class),
                name: Name::new(name),
            }),
        }
    }

    fn require_class(&self, written: &str) -> Result<&ClassScope> {
        self.class.as_ref().ok_or_else(|| ReflectError::InvalidType {
            ty: written.to_string(),
            message: "used outside of a class".to_string(),
        })
    }

    fn self_type(&self, written: &str) -> Result<Type> {
        let class = self.require_class(written)?;
        if class.kind == ClassKind::Trait {
            return Ok(Type::SelfRef {
                class: class.name.clone(),
            });
        }
        Ok(Type::class(class.name.clone()))
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

fn keyword_type(lower: &str, args: &[Type]) -> Option<Type> {
    let arg = |idx: usize| args.get(idx).cloned();
    let ty = match lower {
        "int" | "integer" | "positive-int" | "negative-int" | "non-negative-int"
        | "non-positive-int" | "non-zero-int" => Type::Int,
        "float" | "double" => Type::Float,
        "string" | "non-empty-string" | "numeric-string" | "class-string" | "literal-string"
        | "lowercase-string" | "callable-string" => Type::String,
        "bool" | "boolean" => Type::Bool,
        "true" => Type::bool_literal(true),
        "false" => Type::bool_literal(false),
        "null" => Type::Null,
        "void" => Type::Void,
        "never" | "never-return" | "never-returns" | "no-return" => Type::Never,
        "mixed" | "resource" => Type::Mixed,
        "object" => Type::Object,
        "callable" => Type::Callable,
        "iterable" => match args {
            [] => Type::Iterable,
            [value] => iterable_of(Type::ArrayKey, Type::Mixed, value.clone()),
            [key, value, ..] => iterable_of(key.clone(), key.clone(), value.clone()),
        },
        "array-key" => Type::ArrayKey,
        "scalar" => Type::Scalar,
        "numeric" => Type::Union(vec![Type::Int, Type::Float]),
        "array" | "non-empty-array" => match args.len() {
            0 => Type::array(Type::ArrayKey, Type::Mixed),
            1 => Type::array(Type::ArrayKey, arg(0)?),
            _ => Type::array(arg(0)?, arg(1)?),
        },
        "list" | "non-empty-list" => Type::list(arg(0).unwrap_or(Type::Mixed)),
        _ => return None,
    };
    Some(ty)
}

/// `iterable<K, V>` is an array or a `Traversable` with those parameters.
fn iterable_of(array_key: Type, traversable_key: Type, value: Type) -> Type {
    Type::Union(vec![
        Type::array(array_key, value.clone()),
        Type::named("Traversable", vec![traversable_key, value]),
    ])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::decl::UseDecl;

    fn context() -> TypeContext {
        let imports = ImportMap::from_uses(&[
            UseDecl::class("Vendor\\Lib\\Collection"),
            UseDecl::class("Vendor\\Http").alias("H"),
        ]);
        TypeContext::new(Name::new("App\\Model"), imports).with_class(
            Name::new("App\\Model\\User"),
            ClassKind::Class,
            Some(Name::new("App\\Model\\Base")),
        )
    }

    #[test]
    fn class_name_rules() {
        let ctx = context();
        assert_eq!(ctx.resolve_class_name("\\DateTime"), Name::new("DateTime"));
        assert_eq!(ctx.resolve_class_name("Post"), Name::new("App\\Model\\Post"));
        assert_eq!(
            ctx.resolve_class_name("collection"),
            Name::new("Vendor\\Lib\\Collection")
        );
        assert_eq!(
            ctx.resolve_class_name("H\\Request"),
            Name::new("Vendor\\Http\\Request")
        );
        assert_eq!(
            ctx.resolve_class_name("namespace\\Sub\\Thing"),
            Name::new("App\\Model\\Sub\\Thing")
        );
        assert_eq!(ctx.resolve_class_name("self"), Name::new("App\\Model\\User"));
        assert_eq!(ctx.resolve_class_name("parent"), Name::new("App\\Model\\Base"));
    }

    #[test]
    fn constant_references() {
        let ctx = context();
        assert_eq!(
            ctx.resolve_constant("self::TABLE"),
            (Name::new("App\\Model\\User"), Some(Name::new("TABLE")))
        );
        assert_eq!(
            ctx.resolve_constant("Collection::EMPTY"),
            (Name::new("Vendor\\Lib\\Collection"), Some(Name::new("EMPTY")))
        );
        assert_eq!(
            ctx.resolve_constant("VERSION"),
            (Name::new("App\\Model\\VERSION"), None)
        );
        assert_eq!(ctx.global_fallback("VERSION"), Some(Name::new("VERSION")));
        assert_eq!(ctx.global_fallback("\\VERSION"), None);
        assert_eq!(ctx.global_fallback("Sub\\VERSION"), None);

        let global = TypeContext::new(Name::default(), ImportMap::default());
        assert_eq!(global.resolve_constant("PHP_EOL"), (Name::new("PHP_EOL"), None));
        assert_eq!(global.global_fallback("PHP_EOL"), None);
    }

    #[test]
    fn function_names() {
        let ctx = context();
        assert_eq!(ctx.resolve_function_name("helper"), Name::new("App\\Model\\helper"));
        assert_eq!(ctx.resolve_function_name("\\strlen"), Name::new("strlen"));
    }

    #[test]
    fn keywords_and_special_classes() {
        let ctx = context();
        let ty = ctx
            .resolve_type_expr(&TypeExpr::generic(
                "array",
                vec![TypeExpr::named("string"), TypeExpr::named("Post")],
            ))
            .unwrap();
        assert_eq!(ty, Type::array(Type::String, Type::class("App\\Model\\Post")));

        assert_eq!(
            ctx.resolve_type("static", Vec::new()).unwrap(),
            Type::Static {
                class: Name::new("App\\Model\\User"),
                args: Vec::new(),
            }
        );
        assert_eq!(
            ctx.resolve_type("self", Vec::new()).unwrap(),
            Type::class("App\\Model\\User")
        );
        assert_eq!(
            ctx.resolve_type_expr(&TypeExpr::nullable(TypeExpr::named("int"))).unwrap(),
            Type::Union(vec![Type::Int, Type::Null])
        );

        let outside = TypeContext::new(Name::default(), ImportMap::default());
        assert!(matches!(
            outside.resolve_type("self", Vec::new()),
            Err(ReflectError::InvalidType { .. })
        ));
    }

    #[test]
    fn generic_iterables_are_arrays_or_traversables() {
        let ctx = context();
        assert_eq!(ctx.resolve_type("iterable", Vec::new()).unwrap(), Type::Iterable);
        assert_eq!(
            ctx.resolve_type("iterable", vec![Type::Int]).unwrap(),
            Type::Union(vec![
                Type::array(Type::ArrayKey, Type::Int),
                Type::named("Traversable", vec![Type::Mixed, Type::Int]),
            ])
        );
        assert_eq!(
            ctx.resolve_type_expr(&TypeExpr::generic(
                "Iterable",
                vec![TypeExpr::named("string"), TypeExpr::named("Post")],
            ))
            .unwrap(),
            Type::Union(vec![
                Type::array(Type::String, Type::class("App\\Model\\Post")),
                Type::named("Traversable", vec![Type::String, Type::class("App\\Model\\Post")]),
            ])
        );
    }

    #[test]
    fn self_inside_traits_is_rebindable() {
        let ctx = TypeContext::new(Name::default(), ImportMap::default()).with_class(
            Name::new("Greets"),
            ClassKind::Trait,
            None,
        );
        assert_eq!(
            ctx.resolve_type("self", Vec::new()).unwrap(),
            Type::SelfRef {
                class: Name::new("Greets")
            }
        );
    }

    #[test]
    fn inner_templates_shadow_outer_ones() {
        let class = ClassLikeId::named("Box");
        let method = FunctionLikeId::Method(prism_core::MethodId::new(class.clone(), "map"));
        let ctx = TypeContext::new(Name::default(), ImportMap::default())
            .with_templates(TemplateSite::Class(class.clone()), [Name::new("T")])
            .with_templates(TemplateSite::Function(method.clone()), [Name::new("T"), Name::new("U")]);

        assert_eq!(
            ctx.resolve_type("T", Vec::new()).unwrap(),
            Type::Template {
                name: Name::new("T"),
                site: TemplateSite::Function(method),
            }
        );
    }

    #[test]
    fn resolver_chain_is_first_match_wins() {
        let declines: Arc<dyn CustomTypeResolver> =
            Arc::new(|_: &str, _: &[Type], _: &TypeContext| None);
        let answers: Arc<dyn CustomTypeResolver> = Arc::new(|name: &str, _: &[Type], _: &TypeContext| {
            (name == "X").then(|| Type::class("Resolved\\T"))
        });
        let other: Arc<dyn CustomTypeResolver> = Arc::new(|name: &str, _: &[Type], _: &TypeContext| {
            (name == "X").then(|| Type::class("Other"))
        });

        let chain: ResolverChain = Arc::from(vec![declines.clone(), answers.clone()]);
        let ctx = TypeContext::new(Name::default(), ImportMap::default()).with_resolvers(chain);
        assert_eq!(ctx.resolve_type("X", Vec::new()).unwrap(), Type::class("Resolved\\T"));

        let chain: ResolverChain = Arc::from(vec![answers.clone(), declines]);
        let ctx = ctx.with_resolvers(chain);
        assert_eq!(ctx.resolve_type("X", Vec::new()).unwrap(), Type::class("Resolved\\T"));

        let chain: ResolverChain = Arc::from(vec![other, answers]);
        let ctx = ctx.with_resolvers(chain);
        assert_eq!(ctx.resolve_type("X", Vec::new()).unwrap(), Type::class("Other"));

        // Names no resolver claims fall through to the built-in rules.
        assert_eq!(ctx.resolve_type("int", Vec::new()).unwrap(), Type::Int);
    }
}
